//! LRC lyrics (`.lrc`), including the enhanced variant with `<mm:ss.xx>` word timestamps.
//!
//! A line may carry several time tags, in which case it is shown at each of them. A line
//! ends where the next one starts; an empty timed line only marks such an end. The last
//! line is shown for [`LAST_LINE_MS`]. `[key:value]` tags become script info, `ti` and `ar`
//! the title and author. The `offset` tag is kept but not applied.

use crate::diagnostics::ErrorCode;
use crate::subtitle::{Document, Event};
use crate::tags::lexer::Cursor;
use crate::tags::{self, TextSegment};

use super::{
    MarkupReader, ParseOptions, ParseResult, SubtitleFormat, WordTiming, ass_to_plain, clock_ms,
    dialogue, fraction_ms,
};

pub struct Lrc;

/// How long the last line is shown when no end marker follows it.
pub const LAST_LINE_MS: i64 = 5000;

struct Line<'a> {
    start: i64,
    text: &'a str,
}

impl SubtitleFormat for Lrc {
    fn parse(&self, input: &str, options: &ParseOptions) -> ParseResult {
        let mut diagnostics = options.diagnostics();
        let mut document = Document::default();
        let mut lines: Vec<Line<'_>> = vec![];

        let mut cursor = Cursor::new(input);
        while let Some((number, line)) = cursor.next_line() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if !line.starts_with('[') {
                diagnostics.report(
                    ErrorCode::MalformedEvent,
                    number,
                    1,
                    format!("expected a time tag, found {line:?}"),
                );
                continue;
            }

            if let Some((key, value)) = metadata(line) {
                let info = &mut document.script_info;
                match key {
                    "ti" => value.clone_into(&mut info.title),
                    "ar" => value.clone_into(&mut info.author),
                    _ => {
                        info.extra_info.insert(key.to_owned(), value.to_owned());
                    }
                }
                continue;
            }

            let mut rest = line;
            let mut starts = vec![];
            while let Some(tag) = rest.strip_prefix('[') {
                let Some((time, after)) = tag.split_once(']') else {
                    break;
                };
                match parse_time(time) {
                    Some(start) => starts.push(start),
                    None => diagnostics.report(
                        ErrorCode::InvalidTimestamp,
                        number,
                        line.len() - rest.len() + 1,
                        format!("invalid time tag [{time}]"),
                    ),
                }
                rest = after;
            }

            lines.extend(starts.into_iter().map(|start| Line { start, text: rest }));
        }

        lines.sort_by_key(|line| line.start);

        for (index, line) in lines.iter().enumerate() {
            if line.text.trim().is_empty() {
                continue;
            }
            let end = lines[index + 1..]
                .iter()
                .map(|next| next.start)
                .find(|&next| next > line.start)
                .unwrap_or(line.start.saturating_add(LAST_LINE_MS));
            let segments = read_words(line.text, line.start, end);
            document.push_event(Event::new(tags::serialize_tags(&segments)).timed(line.start, end));
        }

        ParseResult::new(document, diagnostics)
    }

    fn serialize(&self, document: &Document) -> String {
        let info = &document.script_info;
        let mut output = vec![];
        if !info.title.is_empty() {
            output.push(format!("[ti:{}]", info.title));
        }
        if !info.author.is_empty() {
            output.push(format!("[ar:{}]", info.author));
        }
        output.extend(
            info.extra_info
                .iter()
                .filter(|(key, _)| is_metadata_key(key))
                .map(|(key, value)| format!("[{key}:{value}]")),
        );

        let events: Vec<&Event> = dialogue(document).collect();
        for (index, event) in events.iter().enumerate() {
            output.push(format!("[{}]{}", timestamp(event.start), write_words(event)));

            let continues = events
                .get(index + 1)
                .is_some_and(|next| next.start <= event.end);
            if !continues {
                output.push(format!("[{}]", timestamp(event.end)));
            }
        }

        let mut output = output.join("\n");
        output.push('\n');
        output
    }
}

fn is_metadata_key(key: &str) -> bool {
    !key.is_empty() && key.bytes().all(|byte| byte.is_ascii_lowercase())
}

/// `[key:value]` with an alphabetic key.
fn metadata(line: &str) -> Option<(&str, &str)> {
    let inner = line.strip_prefix('[')?.strip_suffix(']')?;
    let (key, value) = inner.split_once(':')?;
    let key = key.trim();
    (!key.is_empty() && key.bytes().all(|byte| byte.is_ascii_alphabetic()))
        .then(|| (key, value.trim()))
}

/// `mm:ss`, `mm:ss.xx` or `mm:ss.xxx`; minutes may exceed 59.
fn parse_time(text: &str) -> Option<i64> {
    let (minutes, seconds) = text.trim().split_once(':')?;
    let (seconds, fraction) = seconds.split_once(['.', ':']).unwrap_or((seconds, "0"));
    let is_number = |part: &str| !part.is_empty() && part.bytes().all(|byte| byte.is_ascii_digit());
    if !(is_number(minutes) && is_number(seconds) && is_number(fraction)) {
        return None;
    }

    let minutes: i64 = minutes.parse().ok()?;
    let seconds: i64 = seconds.parse().ok()?;
    if seconds >= 60 {
        return None;
    }
    clock_ms(0, minutes, seconds, fraction_ms(fraction)?)
}

/// `mm:ss.xx`, rounded to centiseconds.
fn timestamp(ms: i64) -> String {
    let centiseconds = ms.max(0).saturating_add(5) / 10;
    format!(
        "{:02}:{:02}.{:02}",
        centiseconds / 6000,
        centiseconds / 100 % 60,
        centiseconds % 100
    )
}

/// Split enhanced LRC word timestamps out of `text`. Angle brackets that do not hold a
/// valid time are kept as text.
fn read_words(text: &str, start: i64, end: i64) -> Vec<TextSegment> {
    enum Piece<'a> {
        Text(&'a str),
        Time,
    }

    let mut pieces = vec![];
    let mut times = vec![];
    let mut cursor = Cursor::new(text);
    let mut text_start = 0;
    while let Some(open) = cursor.find("<") {
        cursor.advance_to(open + 1);
        let Some(close) = cursor.find(">") else {
            break;
        };
        if let Some(time) = parse_time(cursor.slice(open + 1, close)) {
            pieces.push(Piece::Text(cursor.slice(text_start, open)));
            pieces.push(Piece::Time);
            times.push(time);
            cursor.advance_to(close + 1);
            text_start = close + 1;
        }
    }
    pieces.push(Piece::Text(cursor.slice(text_start, text.len())));

    let mut timing = WordTiming::new(start, &times, end);
    let mut reader = MarkupReader::default();
    for piece in pieces {
        match piece {
            Piece::Time => timing.mark(),
            Piece::Text(words) if !words.is_empty() => {
                if let Some(effect) = timing.take() {
                    reader.push_effect(effect);
                }
                reader.push_text(words);
            }
            Piece::Text(_) => {}
        }
    }
    reader.finish()
}

/// The event's text with word timestamps for its karaoke syllables.
fn write_words(event: &Event) -> String {
    let mut output = String::new();
    let mut elapsed: i64 = 0;
    for segment in event.materialize() {
        if let Some(karaoke) = segment.karaoke() {
            output.push('<');
            output.push_str(&timestamp(event.start.saturating_add(elapsed)));
            output.push('>');
            elapsed = elapsed.saturating_add(karaoke.duration_ms.max(0));
        }
        output.push_str(&ass_to_plain(&segment.text).replace('\n', " "));
    }
    output
}

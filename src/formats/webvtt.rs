//! WebVTT (`.vtt`).
//!
//! Cue identifiers are checked for uniqueness but not kept. `NOTE` blocks become comments
//! anchored to the cue that follows them, `STYLE` blocks are kept as opaque lines and
//! `REGION` blocks as opaque settings. Cue settings are mapped to `\pos` (when both
//! `position` and `line` are percentages) or to `\an`, and inline timestamps to karaoke.

use std::collections::{HashMap, HashSet};

use crate::diagnostics::ErrorCode;
use crate::subtitle::{Comment, Document, Event, EventId, Region, Resolution};
use crate::tags::lexer::Cursor;
use crate::tags::{self, Effect, EffectParams, Position, TaggedEffect, TextSegment};

use super::{
    MarkupOptions, MarkupReader, ParseOptions, ParseResult, SubtitleFormat, WordTiming, blocks,
    clock, clock_ms, dialogue, unescape_entities, write_markup,
};

pub struct WebVtt;

/// Key of [`Document::extra_sections`] holding the lines of all `STYLE` blocks.
pub const STYLE_SECTION: &str = "STYLE";

const HEADER: &str = "WEBVTT";

impl SubtitleFormat for WebVtt {
    fn parse(&self, input: &str, options: &ParseOptions) -> ParseResult {
        let mut diagnostics = options.diagnostics();
        let mut document = Document::default();
        let mut blocks = blocks(input).into_iter().peekable();

        match blocks.peek().and_then(|block| header_title(block.lines[0])) {
            Some(title) => {
                document.script_info.title = title.to_owned();
                blocks.next();
            }
            None => diagnostics.report(
                ErrorCode::InvalidSection,
                1,
                1,
                "file does not start with a WEBVTT header",
            ),
        }

        let resolution = document.script_info.playback_resolution;
        let mut seen_identifiers = HashSet::new();
        let mut notes: Vec<String> = vec![];

        for block in blocks {
            let first = block.lines[0];

            if let Some(note) = note_text(first) {
                let mut lines: Vec<&str> = vec![];
                if !note.is_empty() {
                    lines.push(note);
                }
                lines.extend(&block.lines[1..]);
                notes.push(lines.join("\n"));
                continue;
            }

            match first.trim() {
                "STYLE" => {
                    document
                        .extra_sections
                        .entry(STYLE_SECTION.to_owned())
                        .or_default()
                        .extend(block.lines[1..].iter().map(|line| (*line).to_owned()));
                    continue;
                }
                "REGION" => {
                    let settings: Vec<String> = block.lines[1..]
                        .iter()
                        .flat_map(|line| line.split_whitespace())
                        .map(str::to_owned)
                        .collect();
                    let id = settings
                        .iter()
                        .find_map(|setting| setting.strip_prefix("id:"))
                        .unwrap_or_default()
                        .to_owned();
                    if id.is_empty() && diagnostics.is_strict() {
                        diagnostics.report(
                            ErrorCode::MissingField,
                            block.line,
                            1,
                            "region has no id",
                        );
                    }
                    document.regions.push(Region { id, settings });
                    continue;
                }
                _ => {}
            }

            let timing_index = usize::from(!first.contains("-->"));
            if timing_index == 1 && !seen_identifiers.insert(first.trim().to_owned()) {
                diagnostics.report(
                    ErrorCode::DuplicateId,
                    block.line,
                    1,
                    format!("cue identifier {:?} is used more than once", first.trim()),
                );
            }

            let line_number = block.line + timing_index;
            let Some(timing) = block
                .lines
                .get(timing_index)
                .filter(|line| line.contains("-->"))
            else {
                diagnostics.report(
                    ErrorCode::MalformedEvent,
                    line_number,
                    1,
                    "cue has no timing line",
                );
                continue;
            };

            let Some((start, end, settings)) = parse_timing(timing) else {
                diagnostics.report(
                    ErrorCode::InvalidTimestamp,
                    line_number,
                    1,
                    format!("invalid cue timing {timing:?}"),
                );
                continue;
            };

            let text = block.lines[timing_index + 1..].join("\n");
            let cue = read_cue_text(&text, start, end);
            let mut segments = cue.segments;
            if let Some(effect) = read_settings(settings, resolution) {
                match segments.first_mut() {
                    Some(leading) => leading.effects.insert(0, effect),
                    None => segments.push(TextSegment::new("").with_effect(effect)),
                }
            }

            let mut event = Event::new(tags::serialize_tags(&segments)).timed(start, end);
            event.actor = cue.voice;
            let id = document.push_event(event);
            document
                .comments
                .extend(notes.drain(..).map(|text| Comment {
                    text,
                    anchor: Some(id),
                }));
        }

        document.comments.extend(notes.into_iter().map(Comment::new));

        ParseResult::new(document, diagnostics)
    }

    fn serialize(&self, document: &Document) -> String {
        let info = &document.script_info;
        let mut output_blocks = vec![if info.title.is_empty() {
            HEADER.to_owned()
        } else {
            format!("{HEADER} - {}", info.title)
        }];

        if let Some(lines) = document.extra_sections.get(STYLE_SECTION) {
            output_blocks.push(format!("STYLE\n{}", lines.join("\n")));
        }

        for region in &document.regions {
            let mut lines = vec!["REGION".to_owned()];
            if !region.settings.iter().any(|setting| setting.starts_with("id:")) {
                lines.push(format!("id:{}", region.id));
            }
            lines.extend(region.settings.iter().cloned());
            output_blocks.push(lines.join("\n"));
        }

        let cue_ids: HashSet<EventId> = dialogue(document).map(Event::id).collect();
        let mut anchored: HashMap<EventId, Vec<&Comment>> = HashMap::new();
        let mut unanchored = vec![];
        for comment in &document.comments {
            match comment.anchor.filter(|anchor| cue_ids.contains(anchor)) {
                Some(anchor) => anchored.entry(anchor).or_default().push(comment),
                None => unanchored.push(comment),
            }
        }

        for event in dialogue(document) {
            for comment in anchored.get(&event.id()).into_iter().flatten() {
                output_blocks.push(note(&comment.text));
            }
            output_blocks.push(write_cue(event, info.playback_resolution));
        }

        output_blocks.extend(unanchored.into_iter().map(|comment| note(&comment.text)));

        let mut output = output_blocks.join("\n\n");
        output.push('\n');
        output
    }
}

/// The title after `WEBVTT`, if `line` is a valid header line.
fn header_title(line: &str) -> Option<&str> {
    let rest = line.strip_prefix(HEADER)?;
    if !rest.is_empty() && !rest.starts_with([' ', '\t']) {
        return None;
    }
    Some(rest.trim().trim_start_matches('-').trim_start())
}

fn note_text(line: &str) -> Option<&str> {
    let rest = line.strip_prefix("NOTE")?;
    if !rest.is_empty() && !rest.starts_with([' ', '\t']) {
        return None;
    }
    Some(rest.trim())
}

fn note(text: &str) -> String {
    if text.contains('\n') {
        format!("NOTE\n{text}")
    } else {
        format!("NOTE {text}")
    }
}

/// `mm:ss.ttt` or `hh:mm:ss.ttt`.
fn parse_timestamp(text: &str) -> Option<i64> {
    let (clock_part, fraction) = text.trim().split_once('.')?;
    let is_number = |part: &str| !part.is_empty() && part.bytes().all(|byte| byte.is_ascii_digit());
    if fraction.len() != 3 || !is_number(fraction) {
        return None;
    }

    let parts: Vec<&str> = clock_part.split(':').collect();
    let (hours, minutes, seconds) = match parts.as_slice() {
        [minutes, seconds] => ("0", *minutes, *seconds),
        [hours, minutes, seconds] => (*hours, *minutes, *seconds),
        _ => return None,
    };
    if ![hours, minutes, seconds].into_iter().all(is_number) {
        return None;
    }

    let hours: i64 = hours.parse().ok()?;
    let minutes: i64 = minutes.parse().ok()?;
    let seconds: i64 = seconds.parse().ok()?;
    if minutes >= 60 || seconds >= 60 {
        return None;
    }
    clock_ms(hours, minutes, seconds, fraction.parse().ok()?)
}

/// Start, end and the cue settings following them.
fn parse_timing(line: &str) -> Option<(i64, i64, &str)> {
    let (start, rest) = line.split_once("-->")?;
    let rest = rest.trim_start();
    let (end, settings) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
    Some((parse_timestamp(start)?, parse_timestamp(end)?, settings.trim()))
}

fn timestamp(ms: i64) -> String {
    let (hours, minutes, seconds, ms) = clock(ms);
    format!("{hours:02}:{minutes:02}:{seconds:02}.{ms:03}")
}

/// A percentage like `25%` or `12.5%`.
fn parse_percent(value: &str) -> Option<f64> {
    let number: f64 = value.strip_suffix('%')?.parse().ok()?;
    (0.0..=100.0).contains(&number).then_some(number)
}

fn percent(value: f64) -> String {
    let rounded = (value * 100.0).round() / 100.0;
    format!("{rounded}%")
}

/// Turn cue settings into a placement override.
fn read_settings(settings: &str, resolution: Resolution) -> Option<Effect> {
    let mut position = None;
    let mut line = None;
    let mut align = None;
    for setting in settings.split_whitespace() {
        let Some((key, value)) = setting.split_once(':') else {
            continue;
        };
        // `position` and `line` may carry an alignment after a comma.
        let value = value.split(',').next().unwrap_or_default();
        match key {
            "position" => position = parse_percent(value),
            "line" => line = Some(value),
            "align" => align = Some(value),
            _ => {}
        }
    }

    if let (Some(x), Some(y)) = (position, line.and_then(parse_percent)) {
        return Some(Effect::Position(Position {
            x: x * f64::from(resolution.x) / 100.0,
            y: y * f64::from(resolution.y) / 100.0,
        }));
    }

    let horizontal = match align {
        Some("start" | "left") => 1,
        Some("end" | "right") => 3,
        _ => 2,
    };
    let vertical = match line {
        Some(value) if value.ends_with('%') => match parse_percent(value) {
            Some(y) if y <= 33.0 => 6,
            Some(y) if y <= 66.0 => 3,
            _ => 0,
        },
        Some(value) => match value.parse::<i64>() {
            Ok(number) if number >= 0 => 6,
            _ => 0,
        },
        None => 0,
    };

    let an = horizontal + vertical;
    (an != 2).then(|| {
        Effect::Tagged(TaggedEffect {
            tag: "an".to_owned(),
            effect_type: "alignment".to_owned(),
            params: EffectParams::Integer(an),
        })
    })
}

/// Numpad alignment of an `\an` or legacy `\a` override.
fn numpad_alignment(tagged: &TaggedEffect) -> Option<i64> {
    let EffectParams::Integer(value) = tagged.params else {
        return None;
    };
    match tagged.tag.as_str() {
        "an" => Some(value),
        "a" => match value {
            1..=3 => Some(value),
            5..=7 => Some(value + 2),
            9..=11 => Some(value - 5),
            _ => None,
        },
        _ => None,
    }
}

/// Cue settings for the first placement override in `segments`.
fn write_settings(segments: &[TextSegment], resolution: Resolution) -> Vec<String> {
    let effects = segments.iter().flat_map(|segment| segment.effects.iter());
    for effect in effects {
        let position = match effect {
            Effect::Position(position) => *position,
            Effect::Move(movement) => movement.initial_position,
            Effect::Tagged(tagged) if tagged.effect_type == "alignment" => {
                let Some(an) = numpad_alignment(tagged) else {
                    continue;
                };
                let mut settings = vec![];
                match an {
                    7..=9 => settings.push("line:0%".to_owned()),
                    4..=6 => settings.push("line:50%".to_owned()),
                    _ => {}
                }
                match an % 3 {
                    1 => settings.push("align:start".to_owned()),
                    0 => settings.push("align:end".to_owned()),
                    _ => {}
                }
                return settings;
            }
            _ => continue,
        };

        let x = position.x / f64::from(resolution.x.max(1)) * 100.0;
        let y = position.y / f64::from(resolution.y.max(1)) * 100.0;
        return vec![
            format!("position:{}", percent(x.clamp(0.0, 100.0))),
            format!("line:{}", percent(y.clamp(0.0, 100.0))),
        ];
    }
    vec![]
}

fn write_cue(event: &Event, resolution: Resolution) -> String {
    let segments = event.materialize();

    let mut timing = format!("{} --> {}", timestamp(event.start), timestamp(event.end));
    for setting in write_settings(segments, resolution) {
        timing.push(' ');
        timing.push_str(&setting);
    }

    let options = MarkupOptions {
        colours: false,
        escape: true,
    };
    let mut elapsed: i64 = 0;
    let text = write_markup(segments, &options, |segment, output| {
        if let Some(karaoke) = segment.karaoke() {
            if elapsed > 0 {
                output.push('<');
                output.push_str(&timestamp(event.start.saturating_add(elapsed)));
                output.push('>');
            }
            elapsed = elapsed.saturating_add(karaoke.duration_ms.max(0));
        }
    });

    if event.actor.is_empty() {
        format!("{timing}\n{text}")
    } else {
        format!("{timing}\n<v {}>{text}", event.actor)
    }
}

enum Token<'a> {
    Text(&'a str),
    Tag(&'a str),
}

fn tokenize(text: &str) -> Vec<Token<'_>> {
    let mut cursor = Cursor::new(text);
    let mut tokens = vec![];

    while !cursor.is_at_end() {
        let Some(open) = cursor.find("<") else {
            tokens.push(Token::Text(cursor.rest()));
            break;
        };
        if open > cursor.offset() {
            tokens.push(Token::Text(cursor.slice(cursor.offset(), open)));
        }
        cursor.advance_to(open);

        let Some(close) = cursor.find(">") else {
            tokens.push(Token::Text(cursor.rest()));
            break;
        };
        tokens.push(Token::Tag(cursor.slice(open + 1, close)));
        cursor.advance_to(close + 1);
    }

    tokens
}

struct CueText {
    /// The speaker of the first `<v>` span.
    voice: String,
    segments: Vec<TextSegment>,
}

/// Read cue text markup. Class, language and unknown tags are dropped; ruby annotations are
/// kept in parentheses after their base text. Inline timestamps become karaoke syllables;
/// a syllable without text lends its time to the next one.
fn read_cue_text(text: &str, start: i64, end: i64) -> CueText {
    let tokens = tokenize(text);
    let times: Vec<i64> = tokens
        .iter()
        .filter_map(|token| match token {
            Token::Tag(tag) => parse_timestamp(tag),
            Token::Text(_) => None,
        })
        .collect();

    let mut timing = WordTiming::new(start, &times, end);
    let mut reader = MarkupReader::default();
    let mut voice = String::new();

    for token in tokens {
        let tag = match token {
            Token::Text(text) => {
                if let Some(effect) = timing.take() {
                    reader.push_effect(effect);
                }
                reader.push_text(&unescape_entities(text));
                continue;
            }
            Token::Tag(tag) => tag,
        };

        if parse_timestamp(tag).is_some() {
            timing.mark();
            continue;
        }

        let (closing, body) = match tag.strip_prefix('/') {
            Some(body) => (true, body.trim()),
            None => (false, tag.trim()),
        };
        let (name, annotation) = body
            .split_once(char::is_whitespace)
            .unwrap_or((body, ""));
        let name = name.split('.').next().unwrap_or_default();

        if reader.apply_basic_tag(name, closing) {
            continue;
        }
        match name {
            "v" if !closing && voice.is_empty() => voice = annotation.trim().to_owned(),
            "rt" => reader.push_text(if closing { ")" } else { "(" }),
            _ => {}
        }
    }

    CueText {
        voice,
        segments: reader.finish(),
    }
}

#[cfg(test)]
mod tests {
    use assert_matches2::assert_matches;

    use super::*;
    use crate::tags::FontWeight;

    const SAMPLE: &str = "WEBVTT - Demo\n\n\
                          STYLE\n::cue { color: yellow }\n\n\
                          REGION\nid:fred\nwidth:40%\n\n\
                          NOTE first note\n\n\
                          00:00:01.000 --> 00:00:02.500 line:0% align:start\n\
                          <v Narrator><b>Hello</b> &amp; welcome\n\n\
                          00:01:00.000 --> 00:01:02.000 position:25% line:50%\n\
                          Hel<00:01:00.500>lo\n\n\
                          NOTE trailing\n";

    #[test]
    fn read() {
        let result = WebVtt.parse(SAMPLE, &ParseOptions::default());
        assert!(result.ok);
        let document = &result.document;
        assert_eq!(document.script_info.title, "Demo");
        assert_eq!(
            document.extra_sections[STYLE_SECTION],
            vec!["::cue { color: yellow }".to_owned()]
        );
        assert_eq!(document.regions.len(), 1);
        assert_eq!(document.regions[0].id, "fred");

        let events = document.events();
        assert_eq!(events.len(), 2);
        assert_eq!((events[0].start, events[0].end), (1000, 2500));
        assert_eq!(events[0].actor, "Narrator");

        let segments = events[0].materialize();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].text, "Hello");
        assert_matches!(segments[0].style.bold, Some(FontWeight::BoldToggle(true)));
        assert_matches!(segments[0].effects.as_slice(), [Effect::Tagged(alignment)]);
        assert_eq!(alignment.params, EffectParams::Integer(7));
        assert_eq!(segments[1].text, " & welcome");

        let segments = events[1].materialize();
        assert_matches!(
            segments[0].effects.as_slice(),
            [Effect::Position(position), Effect::Karaoke(first)]
        );
        assert_eq!((position.x, position.y), (480.0, 540.0));
        assert_eq!(first.duration_ms, 500);
        assert_matches!(segments[1].karaoke(), Some(second));
        assert_eq!(second.duration_ms, 1500);

        assert_eq!(document.comments.len(), 2);
        assert_eq!(document.comments[0].text, "first note");
        assert_eq!(document.comments[0].anchor, Some(events[0].id()));
        assert_eq!(document.comments[1].anchor, None);
    }

    #[test]
    fn write() {
        let result = WebVtt.parse(SAMPLE, &ParseOptions::default());
        assert_eq!(WebVtt.serialize(&result.document), SAMPLE);
    }

    #[test]
    fn missing_header() {
        let result = WebVtt.parse(
            "00:01.000 --> 00:02.000\nno header\n",
            &ParseOptions::default(),
        );
        assert!(!result.ok);
        assert_eq!(result.errors[0].code, ErrorCode::InvalidSection);
        assert_eq!(result.document.events().len(), 1);
        assert_eq!(result.document.events()[0].start, 1000);
    }

    #[test]
    fn cue_identifiers() {
        let input = "WEBVTT\n\n\
                     a\n00:01.000 --> 00:02.000\none\n\n\
                     a\n00:02.000 --> 00:03.000\ntwo\n\n\
                     b\n00:03.000 --> 00:0x.000\nthree\n\n\
                     c\nno timing\n";
        let result = WebVtt.parse(input, &ParseOptions::default());
        let codes: Vec<(ErrorCode, usize)> = result
            .errors
            .iter()
            .map(|error| (error.code, error.line))
            .collect();
        assert_eq!(
            codes,
            vec![
                (ErrorCode::DuplicateId, 7),
                (ErrorCode::InvalidTimestamp, 12),
                (ErrorCode::MalformedEvent, 16),
            ]
        );
        assert_eq!(result.document.events().len(), 2);
    }

    #[test]
    fn markup_details() {
        let cue = read_cue_text(
            "<c.yellow>a</c> <lang en>b</lang> <ruby>漢<rt>kan</rt></ruby> 1 &lt; 2",
            0,
            1000,
        );
        assert!(cue.voice.is_empty());
        assert_eq!(tags::serialize_tags(&cue.segments), "a b 漢(kan) 1 < 2");
    }

    #[test]
    fn leading_timestamp() {
        let cue = read_cue_text("<00:00:00.200>a<00:00:00.500>b", 0, 1000);
        let durations: Vec<i64> = cue
            .segments
            .iter()
            .filter_map(|segment| segment.karaoke().map(|karaoke| karaoke.duration_ms))
            .collect();
        assert_eq!(durations, vec![500, 500]);
    }

    #[test]
    fn legacy_alignment() {
        let mut document = Document::default();
        document.push_event(Event::new(r"{\a6}top").timed(0, 1000));
        let output = WebVtt.serialize(&document);
        assert!(output.contains("00:00:00.000 --> 00:00:01.000 line:0%\ntop\n"));
    }
}

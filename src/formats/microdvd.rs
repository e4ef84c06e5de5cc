//! MicroDVD (`.sub`): `{start}{end}text` timed in frames, with `|` separating lines.
//!
//! A first line `{1}{1}<fps>` sets the frame rate; otherwise [`ParseOptions::frame_rate`] is
//! used. The rate used is recorded in the script info under [`FRAME_RATE_INFO`] so that the
//! writer can time the output the same way. Formatting codes at the start of a line
//! (`{y:b,i}`, `{c:$BBGGRR}`, `{f:Font}`, `{s:20}`) apply to that line; their upper case
//! forms apply to the rest of the subtitle.

use once_cell::sync::OnceCell;
use regex::Regex;

use crate::diagnostics::ErrorCode;
use crate::subtitle::{Document, Event};
use crate::tags::lexer::Cursor;
use crate::tags::{self, Colour, Drawing, Effect, FontSize, FontWeight, StyleDelta, TextSegment};

use super::{
    DEFAULT_FRAME_RATE, MarkupReader, ParseOptions, ParseResult, SubtitleFormat, ass_to_plain,
    dialogue,
};

pub struct MicroDvd;

/// Script info key holding the frame rate a document was timed with.
pub const FRAME_RATE_INFO: &str = "Frame Rate";

static LINE_REGEX: OnceCell<Regex> = OnceCell::new();

impl SubtitleFormat for MicroDvd {
    fn parse(&self, input: &str, options: &ParseOptions) -> ParseResult {
        let line_regex =
            LINE_REGEX.get_or_init(|| Regex::new(r"^\{(\d+)\}\{(\d+)\}(.*)$").unwrap());

        let mut diagnostics = options.diagnostics();
        let mut document = Document::default();
        let mut frame_rate = options.frame_rate;
        let mut first = true;

        let mut cursor = Cursor::new(input);
        while let Some((number, line)) = cursor.next_line() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if !line.starts_with('{') {
                diagnostics.report(
                    ErrorCode::MalformedEvent,
                    number,
                    1,
                    format!("expected {{start}}{{end}}, found {line:?}"),
                );
                continue;
            }

            let Some(captures) = line_regex.captures(line) else {
                diagnostics.report(
                    ErrorCode::InvalidTimestamp,
                    number,
                    1,
                    format!("invalid frame numbers in {line:?}"),
                );
                continue;
            };
            let (Ok(start), Ok(end)) = (captures[1].parse::<i64>(), captures[2].parse::<i64>())
            else {
                diagnostics.report(
                    ErrorCode::InvalidTimestamp,
                    number,
                    1,
                    "frame number out of range",
                );
                continue;
            };
            let text = captures.get(3).map_or("", |text| text.as_str());

            if std::mem::take(&mut first) && start == 1 && end == 1 {
                if let Some(rate) = text.trim().parse::<f64>().ok().filter(|rate| *rate > 0.0) {
                    log::debug!("MicroDVD header sets frame rate to {rate}");
                    frame_rate = rate;
                    continue;
                }
            }

            let segments = read_text(text);
            let event = Event::new(tags::serialize_tags(&segments))
                .timed(to_ms(start, frame_rate), to_ms(end, frame_rate));
            document.push_event(event);
        }

        document
            .script_info
            .extra_info
            .insert(FRAME_RATE_INFO.to_owned(), frame_rate.to_string());

        ParseResult::new(document, diagnostics)
    }

    fn serialize(&self, document: &Document) -> String {
        let frame_rate = document
            .script_info
            .extra_info
            .get(FRAME_RATE_INFO)
            .and_then(|rate| rate.parse::<f64>().ok())
            .filter(|rate| *rate > 0.0)
            .unwrap_or(DEFAULT_FRAME_RATE);

        let mut lines = vec![format!("{{1}}{{1}}{frame_rate}")];
        lines.extend(dialogue(document).map(|event| {
            format!(
                "{{{}}}{{{}}}{}",
                to_frame(event.start, frame_rate),
                to_frame(event.end, frame_rate),
                write_text(event.materialize())
            )
        }));

        let mut output = lines.join("\n");
        output.push('\n');
        output
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn to_ms(frame: i64, frame_rate: f64) -> i64 {
    (frame as f64 * 1000.0 / frame_rate).round() as i64
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn to_frame(ms: i64, frame_rate: f64) -> i64 {
    (ms.max(0) as f64 * frame_rate / 1000.0).round() as i64
}

/// Apply one formatting code to `style`. Returns false for codes that are not understood.
fn apply_code(style: &mut StyleDelta, kind: char, value: &str) -> bool {
    match kind.to_ascii_lowercase() {
        'y' => {
            for flag in value.split(',') {
                match flag.trim().to_ascii_lowercase().as_str() {
                    "b" => style.bold = Some(FontWeight::BoldToggle(true)),
                    "i" => style.italic = Some(true),
                    "u" => style.underline = Some(true),
                    "s" => style.strike_out = Some(true),
                    _ => {}
                }
            }
        }
        'c' => {
            let hex = value.trim().trim_start_matches('$');
            match u32::from_str_radix(hex, 16) {
                Ok(packed) if hex.len() == 6 => {
                    style.primary_colour = Some(Colour::from_bgr_packed(packed));
                }
                _ => return false,
            }
        }
        'f' => style.font_name = Some(value.trim().to_owned()),
        's' => match value.trim().parse::<f64>() {
            Ok(size) => style.font_size = Some(FontSize::Set(size)),
            Err(_) => return false,
        },
        _ => return false,
    }
    true
}

/// Read the text part of a line. Unknown codes (like `{P:x,y}`) are dropped.
fn read_text(text: &str) -> Vec<TextSegment> {
    let mut reader = MarkupReader::default();
    let mut subtitle_style = StyleDelta::empty();

    for (index, mut line) in text.split('|').enumerate() {
        let mut line_style = StyleDelta::empty();
        while let Some(code) = line.strip_prefix('{') {
            let Some((inner, rest)) = code.split_once('}') else {
                break;
            };
            let mut chars = inner.chars();
            let (Some(kind), Some(':')) = (chars.next(), chars.next()) else {
                break;
            };
            let value = chars.as_str();
            let target = if kind.is_ascii_uppercase() {
                &mut subtitle_style
            } else {
                &mut line_style
            };
            if !apply_code(target, kind, value) {
                log::debug!("ignoring MicroDVD code {{{inner}}}");
            }
            line = rest;
        }

        let mut style = subtitle_style.clone();
        style.override_from(&line_style);
        if index > 0 {
            reader.push_text("\n");
        }
        reader.restyle(|current| *current = style);
        reader.push_text(line);
    }

    reader.finish()
}

fn codes(style: &StyleDelta) -> String {
    let mut flags = vec![];
    if style.is_bold() {
        flags.push("b");
    }
    if style.italic == Some(true) {
        flags.push("i");
    }
    if style.underline == Some(true) {
        flags.push("u");
    }
    if style.strike_out == Some(true) {
        flags.push("s");
    }

    let mut codes = vec![];
    if !flags.is_empty() {
        codes.push(format!("{{y:{}}}", flags.join(",")));
    }
    if let Some(colour) = style.primary_colour {
        codes.push(format!(
            "{{c:${:02X}{:02X}{:02X}}}",
            colour.blue, colour.green, colour.red
        ));
    }
    if let Some(font) = &style.font_name {
        codes.push(format!("{{f:{font}}}"));
    }
    if let Some(FontSize::Set(size)) = style.font_size {
        codes.push(format!("{{s:{size}}}"));
    }
    codes.concat()
}

/// Formatting is per line, so each line takes the style of its first piece of text.
fn write_text(segments: &[TextSegment]) -> String {
    let mut lines: Vec<(Option<&StyleDelta>, String)> = vec![(None, String::new())];
    let mut drawing = false;

    for segment in segments {
        for effect in &segment.effects {
            if let Effect::Drawing(Drawing::Mode(scale)) = effect {
                drawing = *scale > 0;
            }
        }
        if drawing {
            continue;
        }

        let text = ass_to_plain(&segment.text);
        for (index, part) in text.split('\n').enumerate() {
            if index > 0 {
                lines.push((None, String::new()));
            }
            if let Some((style, line)) = lines.last_mut() {
                if style.is_none() && !part.is_empty() {
                    *style = Some(&segment.style);
                }
                line.push_str(part);
            }
        }
    }

    let lines: Vec<String> = lines
        .into_iter()
        .map(|(style, line)| format!("{}{line}", style.map(codes).unwrap_or_default()))
        .collect();
    lines.join("|")
}

#[cfg(test)]
mod tests {
    use assert_matches2::assert_matches;

    use super::*;

    const SAMPLE: &str = "{1}{1}25\n\
                          {25}{50}{y:b}Bold line|plain line\n\
                          {100}{150}{c:$0000FF}red\n";

    #[test]
    fn read() {
        let result = MicroDvd.parse(SAMPLE, &ParseOptions::default());
        assert!(result.ok);
        let document = &result.document;
        assert_eq!(document.script_info.extra_info[FRAME_RATE_INFO], "25");

        let events = document.events();
        assert_eq!(events.len(), 2);
        assert_eq!((events[0].start, events[0].end), (1000, 2000));
        assert_eq!(events[0].text(), r"{\b1}Bold line\N{\b}plain line");

        let segments = events[1].materialize();
        assert_matches!(segments[0].style.primary_colour, Some(colour));
        assert_eq!((colour.red, colour.green, colour.blue), (255, 0, 0));
    }

    #[test]
    fn write() {
        let result = MicroDvd.parse(SAMPLE, &ParseOptions::default());
        assert_eq!(MicroDvd.serialize(&result.document), SAMPLE);
    }

    #[test]
    fn frame_rate_from_options() {
        let options = ParseOptions {
            frame_rate: 10.0,
            ..ParseOptions::default()
        };
        let result = MicroDvd.parse("{10}{20}a\n", &options);
        let event = &result.document.events()[0];
        assert_eq!((event.start, event.end), (1000, 2000));

        let mut document = Document::default();
        document.push_event(Event::new("b").timed(1000, 2000));
        assert_eq!(MicroDvd.serialize(&document), "{1}{1}23.976\n{24}{48}b\n");
    }

    #[test]
    fn subtitle_wide_codes() {
        let segments = read_text("{Y:i}{f:Arial}one|two");
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].style.italic, Some(true));
        assert_eq!(segments[0].style.font_name.as_deref(), Some("Arial"));
        assert_eq!(segments[1].style.italic, Some(true));
        assert_eq!(segments[1].style.font_name, None);
    }

    #[test]
    fn recovery() {
        let result = MicroDvd.parse(
            "{1}{1}25\nno braces\n{x}{10}bad\n{50}{75}{P:1,2}ok\n",
            &ParseOptions::default(),
        );
        let codes: Vec<(ErrorCode, usize)> = result
            .errors
            .iter()
            .map(|error| (error.code, error.line))
            .collect();
        assert_eq!(
            codes,
            vec![(ErrorCode::MalformedEvent, 2), (ErrorCode::InvalidTimestamp, 3)]
        );
        assert_matches!(result.document.events(), [event]);
        assert_eq!(event.text(), "ok");
    }
}

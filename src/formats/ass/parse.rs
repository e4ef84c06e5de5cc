//! Reading `.ass` and `.ssa` files.

use once_cell::sync::OnceCell;
use regex::Regex;
use thiserror::Error;

use crate::diagnostics::{Diagnostics, ErrorCode};
use crate::formats::{ParseOptions, ParseResult, clock_ms, fraction_ms};
use crate::subtitle::{
    Alignment, Attachment, AttachmentKind, Colour, Comment, Document, Event, EventKind, Style,
    uu,
};
use crate::tags::lexer::Cursor;
use crate::tags::parse::{parse_int, parse_number};

use super::{EVENT_FORMAT, SCRIPT_TYPE, STYLE_FORMAT};

#[derive(Error, Debug, PartialEq, Eq)]
enum LineError {
    #[error("expected {0} comma separated fields")]
    TruncatedLine(usize),

    #[error("{field} is not a number: {value:?}")]
    InvalidNumber { field: &'static str, value: String },

    #[error("invalid timecode {0:?}")]
    InvalidTimecode(String),
}

impl LineError {
    fn code(&self) -> ErrorCode {
        match self {
            LineError::TruncatedLine(_) | LineError::InvalidNumber { .. } => {
                ErrorCode::MalformedEvent
            }
            LineError::InvalidTimecode(_) => ErrorCode::InvalidTimestamp,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum ParseState {
    /// Before the first section header.
    Preamble,
    ScriptInfo,
    Styles { legacy: bool },
    Events,
    Fonts,
    Graphics,

    /// Any other section, kept verbatim under its header.
    Unknown(String),
}

impl ParseState {
    fn from_header(header: &str) -> Self {
        match header.to_ascii_lowercase().as_str() {
            "[script info]" => Self::ScriptInfo,
            "[v4+ styles]" => Self::Styles { legacy: false },
            "[v4 styles]" => Self::Styles { legacy: true },
            "[events]" => Self::Events,
            "[fonts]" => Self::Fonts,
            "[graphics]" => Self::Graphics,
            _ => Self::Unknown(header.to_owned()),
        }
    }
}

/// An attachment whose data lines are still being read.
struct PendingAttachment {
    attachment: Attachment,
    line: usize,
    data: Vec<String>,
}

enum AttachmentParseResult {
    NotFinished,
    FinishedAndLineConsumed,
    FinishedWithoutConsumingLine,
}

struct Parser {
    document: Document,
    diagnostics: Diagnostics,
    state: ParseState,
    style_format: Vec<String>,
    event_format: Vec<String>,
    current_attachment: Option<PendingAttachment>,

    /// `;` lines in `[Events]` belong to the event that follows them.
    pending_comments: Vec<String>,

    /// Source line of every event, in document order.
    event_lines: Vec<usize>,
    script_info_line: Option<usize>,
}

pub(super) fn parse(input: &str, options: &ParseOptions) -> ParseResult {
    let mut parser = Parser {
        document: Document::empty(),
        diagnostics: options.diagnostics(),
        state: ParseState::Preamble,
        style_format: to_owned_format(STYLE_FORMAT),
        event_format: to_owned_format(EVENT_FORMAT),
        current_attachment: None,
        pending_comments: vec![],
        event_lines: vec![],
        script_info_line: None,
    };

    let mut cursor = Cursor::new(input);
    while let Some((number, line)) = cursor.next_line() {
        parser.line(number, line.trim());
    }

    parser.finish()
}

fn to_owned_format(format: &[&str]) -> Vec<String> {
    format.iter().map(|&field| field.to_owned()).collect()
}

impl Parser {
    fn line(&mut self, number: usize, line: &str) {
        if let Some(mut pending) = self.current_attachment.take() {
            match parse_attachment_line(line, &mut pending) {
                AttachmentParseResult::NotFinished => {
                    self.current_attachment = Some(pending);
                    return;
                }
                AttachmentParseResult::FinishedAndLineConsumed => {
                    self.finish_attachment(pending);
                    return;
                }
                AttachmentParseResult::FinishedWithoutConsumingLine => {
                    self.finish_attachment(pending);
                }
            }
        }

        if line.is_empty() {
            return;
        }

        if line.starts_with('[') && line.ends_with(']') {
            self.state = ParseState::from_header(line);
            if self.state == ParseState::ScriptInfo {
                self.script_info_line.get_or_insert(number);
            }
            return;
        }

        match self.state.clone() {
            ParseState::Preamble => self.diagnostics.report(
                ErrorCode::InvalidSection,
                number,
                1,
                format!("expected a section header, found {line:?}"),
            ),
            ParseState::ScriptInfo => self.script_info_line(line),
            ParseState::Styles { legacy } => self.style_line(number, line, legacy),
            ParseState::Events => self.event_line(number, line),
            ParseState::Fonts => {
                self.attachment_header(number, line, "fontname:", AttachmentKind::Font);
            }
            ParseState::Graphics => {
                self.attachment_header(number, line, "filename:", AttachmentKind::Graphic);
            }
            ParseState::Unknown(header) => self
                .document
                .extra_sections
                .entry(header)
                .or_default()
                .push(line.to_owned()),
        }
    }

    fn script_info_line(&mut self, line: &str) {
        if let Some(comment) = line.strip_prefix(';') {
            self.document.comments.push(Comment::new(comment.trim()));
            return;
        }
        let Some((key, value)) = parse_kv_generic(line) else {
            log::debug!("ignoring script info line without a colon: {line:?}");
            return;
        };

        let info = &mut self.document.script_info;
        match key {
            "Title" => value.clone_into(&mut info.title),
            "Original Script" => value.clone_into(&mut info.author),
            "PlayResX" => {
                if let Some(x) = parse_int(value) {
                    info.playback_resolution.x = x;
                }
            }
            "PlayResY" => {
                if let Some(y) = parse_int(value) {
                    info.playback_resolution.y = y;
                }
            }
            "WrapStyle" => {
                if let Some(wrap_style) = parse_int(value) {
                    info.wrap_style = wrap_style.into();
                }
            }
            "ScaledBorderAndShadow" => {
                info.scaled_border_and_shadow = !value.eq_ignore_ascii_case("no");
            }
            _ => {
                info.extra_info.insert(key.to_owned(), value.to_owned());
            }
        }
    }

    fn style_line(&mut self, number: usize, line: &str, legacy: bool) {
        if let Some(comment) = line.strip_prefix(';') {
            self.document.comments.push(Comment::new(comment.trim()));
            return;
        }
        let Some((key, value)) = parse_kv_generic(line) else {
            log::debug!("ignoring style section line without a colon: {line:?}");
            return;
        };

        match key {
            "Format" => self.style_format = parse_format(value),
            "Style" => self.style(number, value, legacy),
            _ => log::debug!("ignoring unknown style section line {key:?}"),
        }
    }

    fn style(&mut self, number: usize, value: &str, legacy: bool) {
        let expected = self.style_format.len();
        let fields: Vec<&str> = value.splitn(expected, ',').map(str::trim).collect();
        if fields.len() < expected && self.diagnostics.is_strict() {
            self.diagnostics.report(
                ErrorCode::MissingField,
                number,
                1,
                format!(
                    "style has {} of {expected} fields, the rest use defaults",
                    fields.len()
                ),
            );
        }

        let mut style = Style::default();
        for (name, field) in self.style_format.iter().zip(fields) {
            if let Err(code) = apply_style_field(&mut style, name, field, legacy) {
                self.diagnostics.report(
                    code,
                    number,
                    1,
                    format!("invalid {name} {field:?}, the default is used"),
                );
            }
        }

        if self.document.insert_style(style).is_some() {
            self.diagnostics.report(
                ErrorCode::DuplicateStyle,
                number,
                1,
                "a style with this name was already defined, the later one is used",
            );
        }
    }

    fn event_line(&mut self, number: usize, line: &str) {
        if let Some(comment) = line.strip_prefix(';') {
            self.pending_comments.push(comment.trim().to_owned());
            return;
        }
        let Some((key, value)) = parse_kv_generic(line) else {
            self.diagnostics.report(
                ErrorCode::MalformedEvent,
                number,
                1,
                format!("expected an event, found {line:?}"),
            );
            return;
        };

        let kind = match key {
            "Format" => {
                self.event_format = parse_format(value);
                return;
            }
            "Dialogue" => EventKind::Dialogue,
            "Comment" => EventKind::Comment,
            _ => {
                self.diagnostics.report(
                    ErrorCode::MalformedEvent,
                    number,
                    1,
                    format!("unknown event type {key:?}"),
                );
                return;
            }
        };

        match parse_event_fields(&self.event_format, value) {
            Ok(mut event) => {
                event.kind = kind;
                let id = self.document.push_event(event);
                self.event_lines.push(number);
                self.document
                    .comments
                    .extend(self.pending_comments.drain(..).map(|text| Comment {
                        text,
                        anchor: Some(id),
                    }));
            }
            Err(error) => self
                .diagnostics
                .report(error.code(), number, 1, error.to_string()),
        }
    }

    fn attachment_header(&mut self, number: usize, line: &str, key: &str, kind: AttachmentKind) {
        match parse_attachment_header(line, key, kind) {
            Some(attachment) => {
                self.current_attachment = Some(PendingAttachment {
                    attachment,
                    line: number,
                    data: vec![],
                });
            }
            None => self.diagnostics.report(
                ErrorCode::InvalidSection,
                number,
                1,
                format!("expected `{key}` before attachment data"),
            ),
        }
    }

    fn finish_attachment(&mut self, pending: PendingAttachment) {
        let PendingAttachment {
            mut attachment,
            line,
            data,
        } = pending;

        match uu::decode_lines(data.iter().map(String::as_str)) {
            Ok(decoded) => {
                attachment.data = decoded;
                self.document.attachments.push(attachment);
            }
            Err(error) => self.diagnostics.report(
                ErrorCode::InvalidSection,
                line,
                1,
                format!("could not decode attachment {}: {error}", attachment.filename),
            ),
        }
    }

    fn finish(mut self) -> ParseResult {
        if let Some(pending) = self.current_attachment.take() {
            self.finish_attachment(pending);
        }
        self.document
            .comments
            .extend(self.pending_comments.drain(..).map(Comment::new));

        if self.diagnostics.is_strict()
            && !self.document.script_info.extra_info.contains_key(SCRIPT_TYPE)
        {
            self.diagnostics.report(
                ErrorCode::MissingField,
                self.script_info_line.unwrap_or(1),
                1,
                "script info has no ScriptType",
            );
        }

        for (event, &line) in self.document.events().iter().zip(&self.event_lines) {
            if self.document.style(&event.style).is_none() {
                self.diagnostics.report(
                    ErrorCode::UnknownStyle,
                    line,
                    1,
                    format!("style {:?} is not defined", event.style),
                );
            }
        }

        ParseResult::new(self.document, self.diagnostics)
    }
}

/// Set the field called `name` from its text. Colours and alignments that cannot be read
/// leave the default in place and return the code to report.
fn apply_style_field(
    style: &mut Style,
    name: &str,
    value: &str,
    legacy: bool,
) -> Result<(), ErrorCode> {
    fn set_number(target: &mut f64, value: &str) {
        if let Some(number) = parse_number(value) {
            *target = number;
        }
    }

    fn set_int(target: &mut i32, value: &str) {
        if let Some(number) = parse_int(value) {
            *target = number;
        }
    }

    fn set_colour(target: &mut Colour, value: &str) -> Result<(), ErrorCode> {
        let colour = Colour::from_ass(value).ok_or(ErrorCode::InvalidColor)?;
        *target = colour;
        Ok(())
    }

    let flag = |value: &str| parse_int(value).is_some_and(|number| number != 0);

    match name.to_ascii_lowercase().as_str() {
        "name" => value.clone_into(&mut style.name),
        "fontname" => value.clone_into(&mut style.font_name),
        "fontsize" => set_number(&mut style.font_size, value),
        "primarycolour" => return set_colour(&mut style.primary_colour, value),
        "secondarycolour" => return set_colour(&mut style.secondary_colour, value),
        "outlinecolour" | "tertiarycolour" => return set_colour(&mut style.outline_colour, value),
        "backcolour" => return set_colour(&mut style.back_colour, value),
        "bold" => style.bold = flag(value),
        "italic" => style.italic = flag(value),
        "underline" => style.underline = flag(value),
        "strikeout" => style.strike_out = flag(value),
        "scalex" => set_number(&mut style.scale_x, value),
        "scaley" => set_number(&mut style.scale_y, value),
        "spacing" => set_number(&mut style.spacing, value),
        "angle" => set_number(&mut style.angle, value),
        "borderstyle" => {
            if let Some(border_style) = parse_int(value) {
                style.border_style = border_style.into();
            }
        }
        "outline" => set_number(&mut style.outline, value),
        "shadow" => set_number(&mut style.shadow, value),
        "alignment" => {
            let alignment = parse_int(value).and_then(|number| {
                if legacy {
                    Alignment::from_legacy(number)
                } else {
                    Alignment::from_an(number)
                }
            });
            style.alignment = alignment.ok_or(ErrorCode::MalformedEvent)?;
        }
        "marginl" => set_int(&mut style.margins.left, value),
        "marginr" => set_int(&mut style.margins.right, value),
        "marginv" => set_int(&mut style.margins.vertical, value),
        "encoding" => set_int(&mut style.encoding, value),
        _ => {}
    }
    Ok(())
}

/// The field names of a `Format:` line.
fn parse_format(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|field| field.trim().to_owned())
        .collect()
}

/// Read the comma separated part of a `Dialogue:` or `Comment:` line. Only the last field
/// may contain commas, and only the end of it is trimmed.
fn parse_event_fields(format: &[String], fields: &str) -> Result<Event, LineError> {
    let mut split = fields.splitn(format.len(), ',');
    let mut event = Event::new("");

    for (index, name) in format.iter().enumerate() {
        let is_last = index + 1 == format.len();
        let value = next_split_trim(&mut split, !is_last, format.len())?;

        match name.to_ascii_lowercase().as_str() {
            "layer" => event.layer = parse_int_field("Layer", value)?,
            "start" => event.start = parse_timecode(value)?,
            "end" => event.end = parse_timecode(value)?,
            "style" => value.clone_into(&mut event.style),
            "name" | "actor" => value.clone_into(&mut event.actor),
            "marginl" => event.margins.left = parse_int_field("MarginL", value)?,
            "marginr" => event.margins.right = parse_int_field("MarginR", value)?,
            "marginv" => event.margins.vertical = parse_int_field("MarginV", value)?,
            "effect" => value.clone_into(&mut event.effect),
            "text" => event.set_text(value),
            // SSA's `Marked=0` has no counterpart.
            _ => {}
        }
    }

    Ok(event)
}

/// Empty numeric fields are read as zero, like most renderers do.
fn parse_int_field(field: &'static str, value: &str) -> Result<i32, LineError> {
    if value.is_empty() {
        return Ok(0);
    }
    parse_int(value).ok_or_else(|| LineError::InvalidNumber {
        field,
        value: value.to_owned(),
    })
}

fn parse_attachment_header(line: &str, key: &str, kind: AttachmentKind) -> Option<Attachment> {
    line.strip_prefix(key).map(|filename| Attachment {
        kind,
        filename: filename.trim().to_owned(),
        data: vec![],
    })
}

fn parse_attachment_line(line: &str, pending: &mut PendingAttachment) -> AttachmentParseResult {
    let is_filename = line.starts_with("filename:") || line.starts_with("fontname:");
    let valid_data = !line.is_empty()
        && line.len() <= 80
        && line.bytes().all(|byte| (33..=97).contains(&byte));

    if !valid_data || is_filename {
        return AttachmentParseResult::FinishedWithoutConsumingLine;
    }

    pending.data.push(line.to_owned());

    if line.len() < 80 {
        AttachmentParseResult::FinishedAndLineConsumed
    } else {
        AttachmentParseResult::NotFinished
    }
}

fn next_split_trim<'a>(
    split: &mut std::str::SplitN<'a, char>,
    trim_start: bool,
    expected: usize,
) -> Result<&'a str, LineError> {
    match split.next() {
        Some(str) => Ok(if trim_start {
            str.trim()
        } else {
            str.trim_end()
        }),
        None => Err(LineError::TruncatedLine(expected)),
    }
}

/// Parse a generic key/value line of the form `Key: Value`.
fn parse_kv_generic(line: &str) -> Option<(&str, &str)> {
    let colon_pos = line.find(':')?;
    let key = &line[0..colon_pos];
    let value = line[(colon_pos + 1)..].trim_start();
    Some((key, value))
}

static TIMECODE_REGEX: OnceCell<Regex> = OnceCell::new();

/// `H:MM:SS.CC`. More or fewer fraction digits are accepted.
fn parse_timecode(timecode: &str) -> Result<i64, LineError> {
    let timecode_regex = TIMECODE_REGEX
        .get_or_init(|| Regex::new(r"^(\d+):(\d{1,2}):(\d{1,2})[.:](\d+)$").unwrap());

    let invalid = || LineError::InvalidTimecode(timecode.to_owned());
    let captures = timecode_regex.captures(timecode).ok_or_else(invalid)?;

    let hours = captures[1].parse::<i64>().map_err(|_| invalid())?;
    let minutes = captures[2].parse::<i64>().map_err(|_| invalid())?;
    let seconds = captures[3].parse::<i64>().map_err(|_| invalid())?;
    let ms = fraction_ms(&captures[4]).ok_or_else(invalid)?;
    if minutes >= 60 || seconds >= 60 {
        return Err(invalid());
    }

    clock_ms(hours, minutes, seconds, ms).ok_or_else(invalid)
}

#[cfg(test)]
mod tests {
    use assert_matches2::assert_matches;

    use super::*;
    use crate::subtitle::{BorderStyle, WrapStyle};

    fn default_format() -> Vec<String> {
        to_owned_format(EVENT_FORMAT)
    }

    #[test]
    fn kv_generic() {
        assert_eq!(parse_kv_generic("Title: a: b"), Some(("Title", "a: b")));
        assert_eq!(parse_kv_generic("Key:"), Some(("Key", "")));
        assert_eq!(parse_kv_generic("no colon"), None);
    }

    #[test]
    fn timecode() {
        assert_eq!(parse_timecode("0:00:05.00"), Ok(5000));
        assert_eq!(parse_timecode("1:02:03.45"), Ok(3_723_450));
        assert_eq!(parse_timecode("0:00:01.5"), Ok(1500));
        assert_eq!(parse_timecode("0:00:01.234"), Ok(1234));
        assert_matches!(parse_timecode("0:00:61.00"), Err(LineError::InvalidTimecode(_)));
        assert_matches!(parse_timecode("0:00:01.00x"), Err(LineError::InvalidTimecode(_)));
        assert_matches!(parse_timecode("nope"), Err(LineError::InvalidTimecode(_)));
        assert_matches!(
            parse_timecode("9999999999999999:00:00.00"),
            Err(LineError::InvalidTimecode(_))
        );
    }

    #[test]
    fn event() -> Result<(), LineError> {
        let event = parse_event_fields(
            &default_format(),
            r"0,0:00:05.00,0:00:07.00,Default,,1,2,3,,{\fs100}text, with commas  ",
        )?;

        assert_eq!(event.style, "Default");
        assert_eq!(event.layer, 0);
        assert_eq!(event.start, 5000);
        assert_eq!(event.end, 7000);
        assert_eq!(event.margins.left, 1);
        assert_eq!(event.margins.right, 2);
        assert_eq!(event.margins.vertical, 3);
        assert_eq!(event.actor, "");
        assert_eq!(event.effect, "");
        assert_eq!(event.text(), r"{\fs100}text, with commas");
        assert!(!event.is_dirty());

        Ok(())
    }

    #[test]
    fn event_errors() {
        let format = default_format();
        assert_eq!(
            parse_event_fields(&format, "0,0:00:05.00,0:00:07.00,Default"),
            Err(LineError::TruncatedLine(10))
        );
        assert_matches!(
            parse_event_fields(&format, "x,0:00:05.00,0:00:07.00,Default,,0,0,0,,a"),
            Err(LineError::InvalidNumber { field: "Layer", .. })
        );
        assert_matches!(
            parse_event_fields(&format, "0,0:00:05.00,soon,Default,,0,0,0,,a"),
            Err(LineError::InvalidTimecode(_))
        );
        assert_eq!(LineError::TruncatedLine(10).code(), ErrorCode::MalformedEvent);
    }

    #[test]
    fn ssa_event_format() -> Result<(), LineError> {
        let format = parse_format(
            "Marked, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text",
        );
        let event = parse_event_fields(
            &format,
            "Marked=0,0:00:01.00,0:00:02.00,Main,Bob,0000,0000,0000,,Hi",
        )?;
        assert_eq!(event.layer, 0);
        assert_eq!(event.style, "Main");
        assert_eq!(event.actor, "Bob");
        assert_eq!(event.text(), "Hi");
        Ok(())
    }

    #[test]
    fn script_info() {
        let input = "[Script Info]\n\
                     ; made by hand\n\
                     Title: henkan test\n\
                     ScriptType: v4.00+\n\
                     WrapStyle: 1\n\
                     ScaledBorderAndShadow: no\n\
                     YCbCr Matrix: TV.709\n\
                     PlayResX: 640\n\
                     PlayResY: 480\n";
        let result = parse(input, &ParseOptions::default());
        assert!(result.ok);

        let info = &result.document.script_info;
        assert_eq!(info.title, "henkan test");
        assert_eq!(info.playback_resolution.x, 640);
        assert_eq!(info.playback_resolution.y, 480);
        assert_eq!(info.wrap_style, WrapStyle::EndOfLine);
        assert!(!info.scaled_border_and_shadow);
        assert_matches!(info.extra_info.get("YCbCr Matrix"), Some(value));
        assert_eq!(value, "TV.709");
        assert_eq!(info.extra_info[SCRIPT_TYPE], "v4.00+");
        assert_eq!(result.document.comments, vec![Comment::new("made by hand")]);
        assert!(result.document.styles().is_empty());
    }

    #[test]
    fn styles() {
        let input = "[V4+ Styles]\n\
                     Format: Name, Fontname, Fontsize, PrimaryColour, Bold, Alignment, BorderStyle\n\
                     Style: Sign,Verdana,30.5,&H00FF0000,-1,8,3\n\
                     Style: Bad,Arial,20,&Hzz,0,2,1\n";
        let result = parse(input, &ParseOptions::default());

        let sign = result.document.style("Sign").expect("style was read");
        assert_eq!(sign.font_name, "Verdana");
        assert!((sign.font_size - 30.5).abs() < f64::EPSILON);
        assert_eq!(sign.primary_colour, Colour::opaque(0, 0, 255));
        assert!(sign.bold);
        assert_eq!(sign.alignment.as_an(), 8);
        assert_eq!(sign.border_style, BorderStyle::OpaqueBox);
        assert_eq!(sign.outline, Style::default().outline);

        assert!(result.ok);
        assert_matches!(result.warnings.as_slice(), [warning]);
        assert_eq!((warning.code, warning.line), (ErrorCode::InvalidColor, 4));
        assert_eq!(
            result.document.style("Bad").map(|style| style.primary_colour),
            Some(Colour::WHITE)
        );
    }

    #[test]
    fn alignment_out_of_range() {
        let input = "[V4+ Styles]\n\
                     Format: Name, Alignment\n\
                     Style: Low,-2147483648\n\
                     Style: High,10\n\
                     Style: Top,7\n";
        let result = parse(input, &ParseOptions::default());

        let codes: Vec<(ErrorCode, usize)> = result
            .errors
            .iter()
            .map(|error| (error.code, error.line))
            .collect();
        assert_eq!(
            codes,
            vec![(ErrorCode::MalformedEvent, 3), (ErrorCode::MalformedEvent, 4)]
        );
        for name in ["Low", "High"] {
            let style = result.document.style(name).expect("style was read");
            assert_eq!(style.alignment, Style::default().alignment);
        }
        let top = result.document.style("Top").expect("style was read");
        assert_eq!(top.alignment.as_an(), 7);
    }

    #[test]
    fn legacy_styles() {
        let input = "[V4 Styles]\n\
                     Format: Name, Fontname, Fontsize, PrimaryColour, SecondaryColour, TertiaryColour, BackColour, Bold, Italic, BorderStyle, Outline, Shadow, Alignment, MarginL, MarginR, MarginV, AlphaLevel, Encoding\n\
                     Style: Default,Tahoma,24,16777215,65535,65535,0,-1,0,1,1,2,6,30,30,10,0,0\n";
        let result = parse(input, &ParseOptions::default());
        assert!(result.ok);
        let style = result.document.style("Default").expect("style was read");
        assert_eq!(style.alignment.as_an(), 8);
        assert_eq!(style.primary_colour, Colour::WHITE);
        assert_eq!(style.outline_colour, Colour::opaque(255, 255, 0));
        assert_eq!(style.margins.left, 30);
    }

    #[test]
    fn events_and_comments() {
        let input = "[V4+ Styles]\n\
                     Style: Default,Arial,48,&H00FFFFFF,&H000000FF,&H00000000,&H00000000,0,0,0,0,100,100,0,0,1,2,2,2,10,10,10,1\n\
                     \n\
                     [Events]\n\
                     Format: Layer, Start, End, Style, Name, MarginL, MarginR, MarginV, Effect, Text\n\
                     ; about the first line\n\
                     Dialogue: 0,0:00:01.00,0:00:02.00,Default,,0,0,0,,one\n\
                     Comment: 1,0:00:02.00,0:00:03.00,Missing,,0,0,0,,two\n\
                     Picture: nonsense\n\
                     Dialogue: 0,0:00:03.00,0:00:04.00,Default,,0,0,0\n\
                     ; trailing\n";
        let result = parse(input, &ParseOptions::default());
        let document = &result.document;

        let events = document.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].kind, EventKind::Comment);
        assert_eq!(events[1].layer, 1);

        assert_eq!(document.comments.len(), 2);
        assert_eq!(document.comments[0].text, "about the first line");
        assert_eq!(document.comments[0].anchor, Some(events[0].id()));
        assert_eq!(document.comments[1], Comment::new("trailing"));

        let errors: Vec<(ErrorCode, usize)> = result
            .errors
            .iter()
            .map(|error| (error.code, error.line))
            .collect();
        assert_eq!(
            errors,
            vec![(ErrorCode::MalformedEvent, 9), (ErrorCode::MalformedEvent, 10)]
        );
        assert_matches!(result.warnings.as_slice(), [warning]);
        assert_eq!((warning.code, warning.line), (ErrorCode::UnknownStyle, 8));
    }

    #[test]
    fn preamble_and_unknown_sections() {
        let input = "stray text\n\
                     [Script Info]\n\
                     Title: x\n\
                     \n\
                     [Aegisub Project Garbage]\n\
                     Active Line: 3\n";
        let result = parse(input, &ParseOptions::default());
        assert_matches!(result.errors.as_slice(), [error]);
        assert_eq!((error.code, error.line), (ErrorCode::InvalidSection, 1));
        assert_eq!(
            result.document.extra_sections["[Aegisub Project Garbage]"],
            vec!["Active Line: 3".to_owned()]
        );
    }

    #[test]
    fn strict_mode() {
        let input = "[Script Info]\nTitle: x\n\n[V4+ Styles]\nStyle: Short,Arial,20\n";
        let lenient = parse(input, &ParseOptions::default());
        assert!(lenient.ok);

        let strict = parse(
            input,
            &ParseOptions {
                strict: true,
                ..ParseOptions::default()
            },
        );
        let codes: Vec<(ErrorCode, usize)> = strict
            .errors
            .iter()
            .map(|error| (error.code, error.line))
            .collect();
        assert_eq!(
            codes,
            vec![(ErrorCode::MissingField, 5), (ErrorCode::MissingField, 1)]
        );
    }

    #[test]
    fn attachments() {
        let data = b"not really a font, but long enough to need more than one line of uuencoded data";
        let encoded = uu::encode_lines(data);
        assert!(encoded.len() > 1);

        let mut input = vec!["[Fonts]".to_owned(), "fontname: test_0.ttf".to_owned()];
        input.extend(encoded);
        input.push("[Events]".to_owned());
        let result = parse(&input.join("\n"), &ParseOptions::default());

        assert!(result.ok);
        assert_matches!(result.document.attachments.as_slice(), [attachment]);
        assert_eq!(attachment.kind, AttachmentKind::Font);
        assert_eq!(attachment.filename, "test_0.ttf");
        assert_eq!(attachment.data, data);
    }
}

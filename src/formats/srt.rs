//! SubRip (`.srt`).

use std::collections::HashSet;

use once_cell::sync::OnceCell;
use regex::Regex;

use crate::diagnostics::{Diagnostics, ErrorCode};
use crate::subtitle::{Document, Event};
use crate::tags::lexer::Cursor;
use crate::tags::{self, Colour, TextSegment};

use super::{
    MarkupOptions, MarkupReader, ParseOptions, ParseResult, SubtitleFormat, blocks, clock,
    clock_ms, dialogue, fraction_ms, named_colour, write_markup,
};

pub struct Srt;

impl SubtitleFormat for Srt {
    fn parse(&self, input: &str, options: &ParseOptions) -> ParseResult {
        let mut diagnostics = options.diagnostics();
        let mut document = Document::default();
        let mut seen_indices = HashSet::new();

        for block in blocks(input) {
            let mut lines = block.lines.iter().copied();
            let mut line_number = block.line;
            let Some(mut first) = lines.next() else {
                continue;
            };

            if !first.contains("-->") {
                let index = first.trim();
                if index.parse::<u64>().is_err() {
                    diagnostics.report(
                        ErrorCode::MalformedEvent,
                        line_number,
                        1,
                        format!("expected a subtitle number, found {index:?}"),
                    );
                    continue;
                }
                if !seen_indices.insert(index.to_owned()) {
                    diagnostics.report(
                        ErrorCode::DuplicateId,
                        line_number,
                        1,
                        format!("subtitle number {index} is used more than once"),
                    );
                }

                let Some(timing) = lines.next() else {
                    diagnostics.report(
                        ErrorCode::MalformedEvent,
                        line_number,
                        1,
                        "subtitle has no timing line",
                    );
                    continue;
                };
                first = timing;
                line_number += 1;
            } else if diagnostics.is_strict() {
                diagnostics.report(
                    ErrorCode::MissingField,
                    line_number,
                    1,
                    "subtitle has no number",
                );
            }

            let Some((start, end)) = parse_timing(first) else {
                diagnostics.report(
                    ErrorCode::InvalidTimestamp,
                    line_number,
                    1,
                    format!("invalid timing line {first:?}"),
                );
                continue;
            };

            let text: Vec<&str> = lines.collect();
            let segments = read_markup(&text.join("\n"));
            document.push_event(Event::new(tags::serialize_tags(&segments)).timed(start, end));
        }

        ParseResult::new(document, diagnostics)
    }

    fn serialize(&self, document: &Document) -> String {
        let options = MarkupOptions {
            colours: true,
            escape: false,
        };

        let entries: Vec<String> = dialogue(document)
            .enumerate()
            .map(|(index, event)| {
                let text = write_markup(event.materialize(), &options, |_, _| {});
                format!(
                    "{}\n{} --> {}\n{text}\n",
                    index + 1,
                    timestamp(event.start),
                    timestamp(event.end)
                )
            })
            .collect();

        entries.join("\n")
    }
}

static TIMING_REGEX: OnceCell<Regex> = OnceCell::new();

/// `00:00:01,000 --> 00:00:02,500`, tolerating `.` as the decimal separator and ignoring
/// anything after the end time.
fn parse_timing(line: &str) -> Option<(i64, i64)> {
    let timing_regex = TIMING_REGEX.get_or_init(|| {
        Regex::new(r"^\s*(\d+):(\d{1,2}):(\d{1,2})[,.](\d{1,3})\s*-->\s*(\d+):(\d{1,2}):(\d{1,2})[,.](\d{1,3})").unwrap()
    });

    let captures = timing_regex.captures(line)?;
    let time = |offset: usize| -> Option<i64> {
        let hours = captures[offset].parse::<i64>().ok()?;
        let minutes = captures[offset + 1].parse::<i64>().ok()?;
        let seconds = captures[offset + 2].parse::<i64>().ok()?;
        let ms = fraction_ms(&captures[offset + 3])?;
        if minutes >= 60 || seconds >= 60 {
            return None;
        }
        clock_ms(hours, minutes, seconds, ms)
    };

    Some((time(1)?, time(5)?))
}

fn timestamp(ms: i64) -> String {
    let (hours, minutes, seconds, ms) = clock(ms);
    format!("{hours:02}:{minutes:02}:{seconds:02},{ms:03}")
}

/// Read the `<b> <i> <u> <s> <font color>` subset of HTML. Other tags are kept as text.
fn read_markup(text: &str) -> Vec<TextSegment> {
    let mut reader = MarkupReader::default();
    let mut cursor = Cursor::new(text);
    let mut colours: Vec<Option<Colour>> = vec![];

    while !cursor.is_at_end() {
        let Some(open) = cursor.find("<") else {
            reader.push_text(cursor.rest());
            break;
        };
        reader.push_text(cursor.slice(cursor.offset(), open));
        cursor.advance_to(open);

        let Some(close) = cursor.find(">") else {
            reader.push_text(cursor.rest());
            break;
        };
        let tag = cursor.slice(open + 1, close);
        cursor.advance_to(close + 1);

        let (closing, body) = match tag.strip_prefix('/') {
            Some(body) => (true, body.trim()),
            None => (false, tag.trim()),
        };
        let name = body
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_ascii_lowercase();

        if reader.apply_basic_tag(&name, closing) {
            continue;
        }

        if name == "font" {
            if closing {
                colours.pop();
                let previous = colours.last().copied().flatten();
                reader.restyle(|style| style.primary_colour = previous);
            } else {
                let colour = font_colour(body);
                colours.push(colour);
                if let Some(colour) = colour {
                    reader.restyle(|style| style.primary_colour = Some(colour));
                }
            }
            continue;
        }

        reader.push_text(cursor.slice(open, close + 1));
    }

    reader.finish()
}

/// The `color` attribute of a `<font ...>` tag.
fn font_colour(tag: &str) -> Option<Colour> {
    let lower = tag.to_ascii_lowercase();
    let start = lower.find("color")? + "color".len();
    let value = lower[start..].trim_start().strip_prefix('=')?.trim_start();
    let value = value
        .trim_start_matches(['"', '\''])
        .split(['"', '\'', ' '])
        .next()?;
    Colour::from_html(value).or_else(|| named_colour(value))
}

//! Advanced SubStation Alpha (`.ass`, and the older `.ssa`).
//!
//! Everything in a [`Document`] has a place in an ASS file. Sections the reader does not
//! know are kept verbatim and written back after `[Events]`.

use crate::subtitle::Document;

use super::{ParseOptions, ParseResult, SubtitleFormat};

mod emit;
mod parse;

pub struct Ass;

impl SubtitleFormat for Ass {
    fn parse(&self, input: &str, options: &ParseOptions) -> ParseResult {
        parse::parse(input, options)
    }

    fn serialize(&self, document: &Document) -> String {
        emit::emit(document)
    }
}

/// Field order of `[V4+ Styles]` when no `Format:` line says otherwise.
const STYLE_FORMAT: &[&str] = &[
    "Name",
    "Fontname",
    "Fontsize",
    "PrimaryColour",
    "SecondaryColour",
    "OutlineColour",
    "BackColour",
    "Bold",
    "Italic",
    "Underline",
    "StrikeOut",
    "ScaleX",
    "ScaleY",
    "Spacing",
    "Angle",
    "BorderStyle",
    "Outline",
    "Shadow",
    "Alignment",
    "MarginL",
    "MarginR",
    "MarginV",
    "Encoding",
];

/// Field order of `[Events]` when no `Format:` line says otherwise.
const EVENT_FORMAT: &[&str] = &[
    "Layer", "Start", "End", "Style", "Name", "MarginL", "MarginR", "MarginV", "Effect", "Text",
];

const SCRIPT_TYPE: &str = "ScriptType";

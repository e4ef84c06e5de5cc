//! Readers and writers for concrete subtitle formats.
//!
//! Every format implements [`SubtitleFormat`]. Readers never fail: malformed constructs are
//! recovered from and reported in the [`ParseResult`]. Event text is always stored in ASS
//! override tag syntax, so that the rest of the crate only ever deals with one text model.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::diagnostics::{Diagnostic, Diagnostics, ErrorCode, ErrorPolicy};
use crate::error::Error;
use crate::subtitle::{Document, Event, EventKind};
use crate::tags::lexer::Cursor;
use crate::tags::{
    Colour, Drawing, Effect, FontWeight, Karaoke, KaraokeMode, StyleDelta, TextSegment,
};

pub mod ass;
pub mod lrc;
pub mod microdvd;
pub mod sbv;
pub mod srt;
pub mod webvtt;

/// Options for reading subtitles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParseOptions {
    pub on_error: ErrorPolicy,

    /// Collect every diagnostic regardless of `on_error`, treat warnings as errors, and also
    /// report fields that are optional but expected.
    pub strict: bool,

    /// Frames per second, for formats timed in frames.
    pub frame_rate: f64,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            on_error: ErrorPolicy::default(),
            strict: false,
            frame_rate: DEFAULT_FRAME_RATE,
        }
    }
}

impl ParseOptions {
    /// A diagnostics sink configured according to these options.
    #[must_use]
    pub fn diagnostics(&self) -> Diagnostics {
        if self.strict {
            Diagnostics::strict()
        } else {
            Diagnostics::new(self.on_error)
        }
    }
}

pub const DEFAULT_FRAME_RATE: f64 = 23.976;

#[derive(Debug)]
pub struct ParseResult {
    /// Whether no errors were reported. Warnings do not count.
    pub ok: bool,

    /// Everything that could be read, even if `ok` is false.
    pub document: Document,
    pub errors: Vec<Diagnostic>,
    pub warnings: Vec<Diagnostic>,
}

impl ParseResult {
    #[must_use]
    pub fn new(document: Document, diagnostics: Diagnostics) -> Self {
        let (errors, warnings) = diagnostics.into_parts();
        Self {
            ok: errors.is_empty(),
            document,
            errors,
            warnings,
        }
    }

    /// Add diagnostics found outside of the reader itself.
    pub fn absorb(&mut self, diagnostics: Diagnostics) {
        let (errors, warnings) = diagnostics.into_parts();
        self.errors.extend(errors);
        self.warnings.extend(warnings);
        self.ok = self.errors.is_empty();
    }

    /// All diagnostics, errors first.
    pub fn diagnostics(&self) -> impl Iterator<Item = &Diagnostic> {
        self.errors.iter().chain(self.warnings.iter())
    }
}

/// The contract every format module fulfills.
pub trait SubtitleFormat {
    fn parse(&self, input: &str, options: &ParseOptions) -> ParseResult;
    fn serialize(&self, document: &Document) -> String;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Ass,
    Srt,
    WebVtt,
    Sbv,
    Lrc,
    MicroDvd,
}

impl Format {
    pub const ALL: &'static [Format] = &[
        Format::Ass,
        Format::Srt,
        Format::WebVtt,
        Format::Sbv,
        Format::Lrc,
        Format::MicroDvd,
    ];

    /// Short identifier, as accepted by [`Format::from_name`].
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Format::Ass => "ass",
            Format::Srt => "srt",
            Format::WebVtt => "webvtt",
            Format::Sbv => "sbv",
            Format::Lrc => "lrc",
            Format::MicroDvd => "microdvd",
        }
    }

    #[must_use]
    pub fn extensions(self) -> &'static [&'static str] {
        match self {
            Format::Ass => &["ass", "ssa"],
            Format::Srt => &["srt"],
            Format::WebVtt => &["vtt"],
            Format::Sbv => &["sbv"],
            Format::Lrc => &["lrc"],
            Format::MicroDvd => &["sub"],
        }
    }

    /// # Errors
    /// Returns [`Error::UnknownFormat`] if no format uses this extension.
    pub fn from_extension(extension: &str) -> Result<Self, Error> {
        let extension = extension.trim_start_matches('.');
        Self::ALL
            .iter()
            .copied()
            .find(|format| {
                format
                    .extensions()
                    .iter()
                    .any(|known| known.eq_ignore_ascii_case(extension))
            })
            .ok_or_else(|| Error::UnknownFormat(extension.to_owned()))
    }

    /// Look up a format by its [`Format::name`] or one of its extensions.
    ///
    /// # Errors
    /// Returns [`Error::UnknownFormat`] if nothing matches.
    pub fn from_name(name: &str) -> Result<Self, Error> {
        Self::ALL
            .iter()
            .copied()
            .find(|format| format.name().eq_ignore_ascii_case(name))
            .map_or_else(|| Self::from_extension(name), Ok)
    }

    /// # Errors
    /// Returns [`Error::UnknownFormat`] if the path has no extension or an unknown one.
    pub fn from_path(path: &Path) -> Result<Self, Error> {
        let extension = path
            .extension()
            .and_then(|extension| extension.to_str())
            .ok_or_else(|| Error::UnknownFormat(path.display().to_string()))?;
        Self::from_extension(extension)
    }

    fn implementation(self) -> &'static dyn SubtitleFormat {
        match self {
            Format::Ass => &ass::Ass,
            Format::Srt => &srt::Srt,
            Format::WebVtt => &webvtt::WebVtt,
            Format::Sbv => &sbv::Sbv,
            Format::Lrc => &lrc::Lrc,
            Format::MicroDvd => &microdvd::MicroDvd,
        }
    }

    /// Read `input`. A leading byte order mark is ignored.
    #[must_use]
    pub fn parse(self, input: &str, options: &ParseOptions) -> ParseResult {
        let input = input.strip_prefix('\u{feff}').unwrap_or(input);
        let result = self.implementation().parse(input, options);
        log::debug!(
            "read {} events from {self} ({} errors, {} warnings)",
            result.document.events().len(),
            result.errors.len(),
            result.warnings.len()
        );
        result
    }

    #[must_use]
    pub fn serialize(self, document: &Document) -> String {
        self.implementation().serialize(document)
    }
}

impl fmt::Display for Format {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(match self {
            Format::Ass => "Advanced SubStation Alpha",
            Format::Srt => "SubRip",
            Format::WebVtt => "WebVTT",
            Format::Sbv => "YouTube SBV",
            Format::Lrc => "LRC",
            Format::MicroDvd => "MicroDVD",
        })
    }
}

impl FromStr for Format {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Self::from_name(name)
    }
}

/// Decode `bytes` as UTF-8 and read them as `format`. Invalid UTF-8 is reported as
/// [`ErrorCode::InvalidEncoding`] at the first invalid byte and replaced.
#[must_use]
pub fn parse_bytes(bytes: &[u8], format: Format, options: &ParseOptions) -> ParseResult {
    let bytes = bytes.strip_prefix(b"\xef\xbb\xbf").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(text) => format.parse(text, options),
        Err(error) => {
            let valid = String::from_utf8_lossy(&bytes[..error.valid_up_to()]);
            let line = valid.matches('\n').count() + 1;
            let column = valid
                .rsplit('\n')
                .next()
                .map_or(0, |last| last.chars().count())
                + 1;

            let mut diagnostics = options.diagnostics();
            diagnostics.report(
                ErrorCode::InvalidEncoding,
                line,
                column,
                "input is not valid UTF-8, invalid bytes were replaced",
            );

            let text = String::from_utf8_lossy(bytes);
            let mut result = format.parse(&text, options);
            result.absorb(diagnostics);
            result
        }
    }
}

/// A run of non-blank lines, as used by the block-based formats.
pub(crate) struct Block<'a> {
    /// Line number of the first line.
    pub line: usize,
    pub lines: Vec<&'a str>,
}

/// Split `input` into runs of lines separated by blank lines.
pub(crate) fn blocks(input: &str) -> Vec<Block<'_>> {
    let mut cursor = Cursor::new(input);
    let mut blocks = vec![];
    let mut current: Option<Block<'_>> = None;

    while let Some((number, line)) = cursor.next_line() {
        if line.trim().is_empty() {
            blocks.extend(current.take());
            continue;
        }
        current
            .get_or_insert_with(|| Block {
                line: number,
                lines: vec![],
            })
            .lines
            .push(line);
    }

    blocks.extend(current);
    blocks
}

/// Split milliseconds into hours, minutes, seconds and milliseconds. Negative times are
/// clamped to zero.
pub(crate) fn clock(ms: i64) -> (i64, i64, i64, i64) {
    let ms = ms.max(0);
    (
        ms / 3_600_000,
        ms / 60_000 % 60,
        ms / 1000 % 60,
        ms % 1000,
    )
}

/// The latest time readers accept, in milliseconds (100000 hours).
pub(crate) const MAX_TIME_MS: i64 = 100_000 * 3_600_000;

/// Milliseconds from clock fields, or `None` past [`MAX_TIME_MS`].
pub(crate) fn clock_ms(hours: i64, minutes: i64, seconds: i64, ms: i64) -> Option<i64> {
    let total = hours
        .checked_mul(60)?
        .checked_add(minutes)?
        .checked_mul(60)?
        .checked_add(seconds)?
        .checked_mul(1000)?
        .checked_add(ms)?;
    (0..=MAX_TIME_MS).contains(&total).then_some(total)
}

/// Milliseconds from a fraction of a second written with any number of digits, so that
/// `5` means 500 ms and `0005` means 0 ms.
pub(crate) fn fraction_ms(digits: &str) -> Option<i64> {
    let mut padded: String = digits.chars().take(3).collect();
    while padded.len() < 3 {
        padded.push('0');
    }
    padded.parse().ok()
}

/// ASS line breaks (`\N`, and `\n` which only breaks in some wrap styles) and hard spaces
/// (`\h`) to plain text.
pub(crate) fn ass_to_plain(text: &str) -> String {
    text.replace("\\N", "\n")
        .replace("\\n", "\n")
        .replace("\\h", "\u{a0}")
}

/// Plain text to ASS: line breaks become `\N`.
pub(crate) fn plain_to_ass(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\n', "\\N")
}

/// The visible text of an event, without tags or drawings.
pub(crate) fn plain_text(event: &Event) -> String {
    let mut drawing = false;
    let mut text = String::new();
    for segment in event.materialize() {
        for effect in &segment.effects {
            if let Effect::Drawing(Drawing::Mode(scale)) = effect {
                drawing = *scale > 0;
            }
        }
        if !drawing {
            text.push_str(&segment.text);
        }
    }
    ass_to_plain(&text)
}

/// Events that are shown, in document order. Commented-out events only exist in ASS.
pub(crate) fn dialogue(document: &Document) -> impl Iterator<Item = &Event> {
    document
        .events()
        .iter()
        .filter(|event| event.kind == EventKind::Dialogue)
}

/// Inline markup that HTML-like formats (SRT, WebVTT) can express.
#[derive(Debug, Clone, PartialEq)]
enum Markup {
    Bold,
    Italic,
    Underline,
    Strike,
    Colour(Colour),
}

impl Markup {
    fn open(&self, sink: &mut String) {
        match self {
            Markup::Bold => sink.push_str("<b>"),
            Markup::Italic => sink.push_str("<i>"),
            Markup::Underline => sink.push_str("<u>"),
            Markup::Strike => sink.push_str("<s>"),
            Markup::Colour(colour) => {
                sink.push_str("<font color=\"");
                sink.push_str(&colour.to_html());
                sink.push_str("\">");
            }
        }
    }

    fn close(&self) -> &'static str {
        match self {
            Markup::Bold => "</b>",
            Markup::Italic => "</i>",
            Markup::Underline => "</u>",
            Markup::Strike => "</s>",
            Markup::Colour(_) => "</font>",
        }
    }

    fn wanted(style: &StyleDelta, colours: bool) -> Vec<Markup> {
        let mut wanted = vec![];
        if style.is_bold() {
            wanted.push(Markup::Bold);
        }
        if style.italic == Some(true) {
            wanted.push(Markup::Italic);
        }
        if style.underline == Some(true) {
            wanted.push(Markup::Underline);
        }
        if style.strike_out == Some(true) {
            wanted.push(Markup::Strike);
        }
        if let (true, Some(colour)) = (colours, style.primary_colour) {
            wanted.push(Markup::Colour(colour));
        }
        wanted
    }
}

/// How [`write_markup`] writes text.
pub(crate) struct MarkupOptions {
    /// Write `<font color>` for primary colour overrides.
    pub colours: bool,

    /// Escape `&`, `<` and `>` as entities.
    pub escape: bool,
}

/// Write segments as HTML-like markup. `before_segment` is called before each segment's
/// text and may write into the output (WebVTT uses it for karaoke timestamps).
pub(crate) fn write_markup<F>(
    segments: &[TextSegment],
    options: &MarkupOptions,
    mut before_segment: F,
) -> String
where
    F: FnMut(&TextSegment, &mut String),
{
    let mut output = String::new();
    let mut open: Vec<Markup> = vec![];
    let mut drawing = false;

    for segment in segments {
        for effect in &segment.effects {
            if let Effect::Drawing(Drawing::Mode(scale)) = effect {
                drawing = *scale > 0;
            }
        }
        before_segment(segment, &mut output);
        if drawing || segment.text.is_empty() {
            continue;
        }

        let wanted = Markup::wanted(&segment.style, options.colours);
        let keep = open
            .iter()
            .take_while(|markup| wanted.contains(markup))
            .count();
        while open.len() > keep {
            if let Some(markup) = open.pop() {
                output.push_str(markup.close());
            }
        }
        for markup in wanted {
            if !open.contains(&markup) {
                markup.open(&mut output);
                open.push(markup);
            }
        }

        let text = ass_to_plain(&segment.text);
        if options.escape {
            output.push_str(&escape_entities(&text));
        } else {
            output.push_str(&text);
        }
    }

    while let Some(markup) = open.pop() {
        output.push_str(markup.close());
    }

    output
}

pub(crate) fn escape_entities(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

pub(crate) fn unescape_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&nbsp;", "\u{a0}")
        .replace("&lrm;", "\u{200e}")
        .replace("&rlm;", "\u{200f}")
        .replace("&amp;", "&")
}

/// Builds segments from HTML-like markup: text is collected under the style in force, and a
/// new segment starts whenever the style changes or an effect is added.
#[derive(Default)]
pub(crate) struct MarkupReader {
    segments: Vec<TextSegment>,
    text: String,
    style: StyleDelta,
    effects: Vec<Effect>,
}

impl MarkupReader {
    fn flush(&mut self) {
        if self.text.is_empty() && self.effects.is_empty() {
            return;
        }
        self.segments.push(TextSegment {
            text: plain_to_ass(&std::mem::take(&mut self.text)),
            style: self.style.clone(),
            effects: std::mem::take(&mut self.effects),
        });
    }

    pub fn push_text(&mut self, text: &str) {
        self.text.push_str(text);
    }

    /// Change the style for the text that follows.
    pub fn restyle<F>(&mut self, change: F)
    where
        F: FnOnce(&mut StyleDelta),
    {
        let mut style = self.style.clone();
        change(&mut style);
        if style != self.style {
            if !self.text.is_empty() {
                self.flush();
            }
            self.style = style;
        }
    }

    /// Attach an effect to the text that follows.
    pub fn push_effect(&mut self, effect: Effect) {
        if !self.text.is_empty() {
            self.flush();
        }
        self.effects.push(effect);
    }

    /// Apply one of the basic HTML-like tags (`b`, `i`, `u`, `s`). Returns false if `name`
    /// is not one of them.
    pub fn apply_basic_tag(&mut self, name: &str, closing: bool) -> bool {
        match name {
            "b" => self.restyle(|style| {
                style.bold = (!closing).then_some(FontWeight::BoldToggle(true));
            }),
            "i" => self.restyle(|style| style.italic = (!closing).then_some(true)),
            "u" => self.restyle(|style| style.underline = (!closing).then_some(true)),
            "s" => self.restyle(|style| style.strike_out = (!closing).then_some(true)),
            _ => return false,
        }
        true
    }

    pub fn finish(mut self) -> Vec<TextSegment> {
        self.flush();
        self.segments
    }
}

/// Karaoke syllables from absolute word timestamps, for formats that time words inline
/// (WebVTT, enhanced LRC). The first syllable runs from the start of the event to the first
/// timestamp, the last one to the end of the event. A syllable without text lends its time
/// to the next one.
pub(crate) struct WordTiming {
    durations: Vec<i64>,
    syllable: usize,
    pending: Option<i64>,
}

impl WordTiming {
    pub fn new(start: i64, times: &[i64], end: i64) -> Self {
        let mut boundaries = Vec::with_capacity(times.len() + 2);
        boundaries.push(start);
        boundaries.extend_from_slice(times);
        boundaries.push(end);
        let durations: Vec<i64> = boundaries
            .windows(2)
            .map(|pair| pair[1].saturating_sub(pair[0]).clamp(0, i64::from(i32::MAX)))
            .collect();

        let pending = if times.is_empty() {
            None
        } else {
            durations.first().copied()
        };
        Self {
            durations,
            syllable: 0,
            pending,
        }
    }

    /// A word timestamp was passed.
    pub fn mark(&mut self) {
        self.syllable += 1;
        let duration = self.durations.get(self.syllable).copied().unwrap_or_default();
        self.pending = Some(self.pending.unwrap_or_default().saturating_add(duration));
    }

    /// The karaoke effect to put before text that follows, if a syllable starts here.
    pub fn take(&mut self) -> Option<Effect> {
        self.pending.take().map(|duration_ms| {
            Effect::Karaoke(Karaoke {
                duration_ms,
                mode: KaraokeMode::Fill,
            })
        })
    }
}

/// Colours by name, for `<font color="red">`.
pub(crate) fn named_colour(name: &str) -> Option<Colour> {
    let (red, green, blue) = match name.to_ascii_lowercase().as_str() {
        "white" => (255, 255, 255),
        "black" => (0, 0, 0),
        "red" => (255, 0, 0),
        "lime" => (0, 255, 0),
        "green" => (0, 128, 0),
        "blue" => (0, 0, 255),
        "yellow" => (255, 255, 0),
        "cyan" | "aqua" => (0, 255, 255),
        "magenta" | "fuchsia" => (255, 0, 255),
        "silver" => (192, 192, 192),
        "gray" | "grey" => (128, 128, 128),
        _ => return None,
    };
    Some(Colour { red, green, blue })
}

#[cfg(test)]
mod tests {
    use assert_matches2::assert_matches;

    use super::*;
    use crate::tags;

    #[test]
    fn format_lookup() -> Result<(), Error> {
        assert_eq!(Format::from_name("webvtt")?, Format::WebVtt);
        assert_eq!(Format::from_name("VTT")?, Format::WebVtt);
        assert_eq!(Format::from_extension(".ssa")?, Format::Ass);
        assert_eq!(Format::from_path(Path::new("movie.en.srt"))?, Format::Srt);
        assert_eq!("microdvd".parse::<Format>()?, Format::MicroDvd);
        assert_matches!(Format::from_name("ttml"), Err(Error::UnknownFormat(name)));
        assert_eq!(name, "ttml");
        assert_matches!(
            Format::from_path(Path::new("no_extension")),
            Err(Error::UnknownFormat(_))
        );
        Ok(())
    }

    #[test]
    fn block_splitting() {
        let blocks = blocks("a\nb\n\n\n c \r\n\r\nd");
        let shape: Vec<(usize, usize)> = blocks
            .iter()
            .map(|block| (block.line, block.lines.len()))
            .collect();
        assert_eq!(shape, vec![(1, 2), (5, 1), (7, 1)]);
    }

    #[test]
    fn time_helpers() {
        assert_eq!(clock(3_723_045), (1, 2, 3, 45));
        assert_eq!(clock(-5), (0, 0, 0, 0));
        assert_eq!(fraction_ms("5"), Some(500));
        assert_eq!(fraction_ms("05"), Some(50));
        assert_eq!(fraction_ms("1234"), Some(123));

        assert_eq!(clock_ms(1, 2, 3, 45), Some(3_723_045));
        assert_eq!(clock_ms(100_000, 0, 0, 0), Some(MAX_TIME_MS));
        assert_eq!(clock_ms(100_000, 0, 0, 1), None);
        assert_eq!(clock_ms(9_999_999_999_999_999, 0, 0, 0), None);
        assert_eq!(clock_ms(i64::MAX, 59, 59, 999), None);
    }

    #[test]
    fn word_timing_saturates() {
        let mut timing = WordTiming::new(0, &[MAX_TIME_MS], MAX_TIME_MS);
        assert_matches!(timing.take(), Some(Effect::Karaoke(first)));
        assert_eq!(first.duration_ms, i64::from(i32::MAX));
        timing.mark();
        assert_matches!(timing.take(), Some(Effect::Karaoke(second)));
        assert_eq!(second.duration_ms, 0);
    }

    #[test]
    fn markup_nesting() {
        let segments = tags::parse_tags(r"{\b1}bold {\i1}both{\b0} italic{\i0} plain");
        let options = MarkupOptions {
            colours: false,
            escape: false,
        };
        assert_eq!(
            write_markup(&segments, &options, |_, _| {}),
            "<b>bold <i>both</i></b><i> italic</i> plain"
        );
    }

    #[test]
    fn markup_reader() {
        let mut reader = MarkupReader::default();
        reader.push_text("a ");
        reader.apply_basic_tag("b", false);
        reader.push_text("b\nc");
        reader.apply_basic_tag("b", true);
        reader.push_text(" d");
        let segments = reader.finish();
        assert_eq!(tags::serialize_tags(&segments), r"a {\b1}b\Nc{\b} d");
    }

    #[test]
    fn invalid_utf8() {
        let result = parse_bytes(
            b"1\n00:00:01,000 --> 00:00:02,000\nab\xffc\n",
            Format::Srt,
            &ParseOptions::default(),
        );
        assert!(!result.ok);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].code, ErrorCode::InvalidEncoding);
        assert_eq!((result.errors[0].line, result.errors[0].column), (3, 3));
        assert_eq!(result.document.events()[0].text(), "ab\u{fffd}c");
    }

    #[test]
    fn byte_order_mark() {
        let result = parse_bytes(
            b"\xef\xbb\xbf[00:01.00]hi\n",
            Format::Lrc,
            &ParseOptions::default(),
        );
        assert!(result.ok);
        assert_eq!(result.document.events()[0].text(), "hi");
    }
}

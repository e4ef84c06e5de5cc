//! Functions for parsing ASS override tags into [`TextSegment`]s.

use std::ops::Range;

use crate::diagnostics::{Diagnostics, ErrorCode};

use super::lexer::Cursor;
use super::{
    Animation, AnimationInterval, Clip, ClipDrawing, ClipRectangle, Colour, ComplexFade, Drawing,
    Effect, Fade, FontSize, FontWeight, Karaoke, KaraokeMode, Milliseconds, Move, MoveTiming,
    Position, Reset, SimpleFade, StyleDelta, StyleField, TextSegment, Transparency, registry,
};

/// How deeply `\t` tags may be nested inside each other. Deeper animations are kept as
/// unknown tags.
pub const MAX_ANIMATION_DEPTH: usize = 32;

/// Karaoke tags without a duration last one second, like in libass.
const DEFAULT_KARAOKE_CENTISECONDS: f64 = 100.0;

/// Parse raw event text into segments, discarding diagnostics.
#[must_use]
pub fn parse_tags(text: &str) -> Vec<TextSegment> {
    parse_tags_with(text, &mut Diagnostics::ignore())
}

/// Parse raw event text into segments.
///
/// This never fails. Tags that cannot be interpreted are kept as [`Effect::Unknown`], so that
/// serializing the result gives back the same text. An unclosed tag block is reported as
/// [`ErrorCode::UnclosedTag`] and recovered from as follows: if its last tag is a simple
/// toggle or numeric tag directly followed by text (like `{\b1text`), the tags are applied
/// and the rest becomes text; otherwise the whole remainder, brace included, is literal text.
pub fn parse_tags_with(text: &str, diagnostics: &mut Diagnostics) -> Vec<TextSegment> {
    let mut builder = SegmentBuilder::default();
    let mut cursor = Cursor::new(text);

    while !cursor.is_at_end() {
        let Some(open) = cursor.find("{\\") else {
            builder.push_text(cursor.rest());
            break;
        };

        builder.push_text(cursor.slice(cursor.offset(), open));
        cursor.advance_to(open);

        let mut context = Context {
            diagnostics: &mut *diagnostics,
            line: cursor.line(),
            column: cursor.column(),
        };

        if let Some(close) = cursor.find("}") {
            builder.end_text();
            let block = cursor.slice(open + 1, close);
            parse_tag_block(block, &mut builder.style, &mut builder.effects, 0, &mut context);
            cursor.advance_to(close + 1);
        } else {
            context.diagnostics.report(
                ErrorCode::UnclosedTag,
                context.line,
                context.column,
                "override tag block is never closed",
            );
            recover_unclosed(cursor.rest(), &mut builder, &mut context);
            break;
        }
    }

    builder.finish()
}

/// Remove every `{...}` block from `text`, leaving only the literal text. An unclosed block
/// is left in place.
#[must_use]
pub fn strip_tags(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut cursor = Cursor::new(text);

    while let Some(open) = cursor.find("{") {
        result.push_str(cursor.slice(cursor.offset(), open));
        cursor.advance_to(open);
        let Some(close) = cursor.find("}") else {
            break;
        };
        cursor.advance_to(close + 1);
    }

    result.push_str(cursor.rest());
    result
}

/// Where the tag block currently being parsed starts, for diagnostics.
struct Context<'d> {
    diagnostics: &'d mut Diagnostics,
    line: usize,
    column: usize,
}

impl Context<'_> {
    fn report(&mut self, code: ErrorCode, message: String) {
        self.diagnostics
            .report(code, self.line, self.column, message);
    }
}

/// Accumulates segments. Text is buffered until the next tag block, so that adjacent blocks
/// merge into a single segment boundary.
#[derive(Default)]
struct SegmentBuilder {
    segments: Vec<TextSegment>,
    text: String,
    style: StyleDelta,
    effects: Vec<Effect>,
}

impl SegmentBuilder {
    fn push_text(&mut self, text: &str) {
        self.text.push_str(text);
    }

    /// Close the buffered text run, if there is one.
    fn end_text(&mut self) {
        if self.text.is_empty() {
            return;
        }

        let text = std::mem::take(&mut self.text);
        self.emit(text);
    }

    fn emit(&mut self, text: String) {
        // A block that changed nothing does not start a new segment.
        if self.effects.is_empty() {
            if let Some(last) = self.segments.last_mut() {
                if last.style == self.style {
                    last.text.push_str(&text);
                    return;
                }
            }
        }

        self.segments.push(TextSegment {
            text,
            style: self.style.clone(),
            effects: std::mem::take(&mut self.effects),
        });
    }

    fn finish(mut self) -> Vec<TextSegment> {
        if self.text.is_empty() {
            // Tags after the last text still produce a (textless) segment.
            let previous_style = self.segments.last().map(|segment| &segment.style);
            let style_changed = match previous_style {
                Some(previous) => *previous != self.style,
                None => !self.style.is_empty(),
            };
            if !self.effects.is_empty() || style_changed {
                self.segments.push(TextSegment {
                    text: String::new(),
                    style: self.style.clone(),
                    effects: std::mem::take(&mut self.effects),
                });
            }
        } else {
            self.end_text();
        }

        self.segments
    }
}

fn recover_unclosed(rest: &str, builder: &mut SegmentBuilder, context: &mut Context) {
    // `rest` starts with the opening brace
    let block = rest.get(1..).unwrap_or_default();
    let tokens = split_tokens(block);

    let recovered = tokens.split_last().and_then(|(last, init)| {
        let last_token = &block[last.clone()];
        simple_prefix_length(last_token)
            .filter(|length| *length < last_token.len())
            .map(|length| (init, last.start..last.start + length))
    });

    match recovered {
        Some((init, last)) => {
            builder.end_text();
            for range in init.iter().cloned().chain(std::iter::once(last.clone())) {
                parse_tag(
                    &block[range],
                    &mut builder.style,
                    &mut builder.effects,
                    0,
                    context,
                );
            }
            builder.push_text(&block[last.end..]);
        }
        None => builder.push_text(rest),
    }
}

/// If `token` starts with a complete toggle or numeric tag, return that tag's length.
fn simple_prefix_length(token: &str) -> Option<usize> {
    let leading_space = token.len() - token.trim_start().len();
    let trimmed = &token[leading_space..];

    let name = SIMPLE_TAGS
        .iter()
        .find(|name| trimmed.starts_with(**name))?;
    let arg = &trimmed[name.len()..];

    let arg_length = match *name {
        "i" | "u" | "s" => arg.starts_with(['0', '1']).then_some(1)?,
        "b" => arg.find(|char: char| !char.is_ascii_digit()).unwrap_or(arg.len()),
        "fs" | "fsp" | "fscx" | "fscy" | "frx" | "fry" | "frz" | "fr" | "k" | "K" | "kf"
        | "ko" | "p" | "pbo" => numeric_prefix_length(arg),
        _ => 0,
    };

    (arg_length > 0).then_some(leading_space + name.len() + arg_length)
}

/// Length of the `[+-]digits[.digits]` number at the start of `text`, or 0 if there is none.
fn numeric_prefix_length(text: &str) -> usize {
    let bytes = text.as_bytes();
    let mut index = usize::from(matches!(bytes.first(), Some(b'+' | b'-')));

    let digits_start = index;
    while bytes.get(index).is_some_and(u8::is_ascii_digit) {
        index += 1;
    }
    if index == digits_start {
        return 0;
    }

    if bytes.get(index) == Some(&b'.') {
        let fraction_start = index + 1;
        let mut fraction_end = fraction_start;
        while bytes.get(fraction_end).is_some_and(u8::is_ascii_digit) {
            fraction_end += 1;
        }
        if fraction_end > fraction_start {
            index = fraction_end;
        }
    }

    index
}

/// Parse the contents of one tag block (or the tag list of a `\t`).
fn parse_tag_block(
    block: &str,
    style: &mut StyleDelta,
    effects: &mut Vec<Effect>,
    depth: usize,
    context: &mut Context,
) {
    for range in split_tokens(block) {
        parse_tag(&block[range], style, effects, depth, context);
    }
}

/// Split a tag block into the byte ranges of its tags, each without the leading backslash.
/// Backslashes inside parentheses do not start a new tag, so that the tags inside `\t(...)`
/// stay together; parentheses are counted so that `\t(\clip(...))` works too. Text before
/// the first backslash is a comment and is ignored.
fn split_tokens(block: &str) -> Vec<Range<usize>> {
    let mut tokens = vec![];
    let mut depth = 0_usize;
    let mut token_start: Option<usize> = None;

    for (byte_index, next_char) in block.char_indices() {
        match next_char {
            '\\' if depth == 0 => {
                if let Some(start) = token_start.replace(byte_index + 1) {
                    tokens.push(start..byte_index);
                }
            }
            '(' if token_start.is_some() => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }

    if let Some(start) = token_start {
        tokens.push(start..block.len());
    }

    tokens.retain(|range| !block[range.clone()].trim().is_empty());
    tokens
}

fn parse_tag(
    token: &str,
    style: &mut StyleDelta,
    effects: &mut Vec<Effect>,
    depth: usize,
    context: &mut Context,
) {
    let twa = TagWithArguments::new(token);

    match parse_builtin(&twa, style, effects, depth, context) {
        Builtin::Applied => {}
        Builtin::KeepVerbatim => effects.push(Effect::Unknown(token.to_owned())),
        Builtin::Invalid => {
            let effect = registry::parse_registered(twa.name(), twa.after_name())
                .unwrap_or_else(|| Effect::Unknown(token.to_owned()));
            effects.push(effect);
        }
    }
}

enum Builtin {
    Applied,

    /// Not a valid built-in tag; ask the registry.
    Invalid,

    /// Recognised as a built-in tag but unusable; keep as an unknown tag without asking the
    /// registry.
    KeepVerbatim,
}

impl From<Option<()>> for Builtin {
    fn from(option: Option<()>) -> Self {
        match option {
            Some(()) => Builtin::Applied,
            None => Builtin::Invalid,
        }
    }
}

/// Built-in tags that take their argument directly after the name, in matching order
/// (`fscx` must be tried before `fs`, and so on).
const SIMPLE_TAGS: &[&str] = &[
    "alpha", "1c", "2c", "3c", "4c", "1a", "2a", "3a", "4a", "c", "fscx", "fscy", "fsp", "fs",
    "fn", "frx", "fry", "frz", "fr", "kf", "ko", "k", "K", "pbo", "p", "b", "i", "u", "s", "r",
];

/// Built-in tags with parenthesised arguments.
const COMPLEX_TAGS: &[&str] = &["iclip", "clip", "move", "pos", "org", "fade", "fad", "t"];

/// Whether `name` is claimed by the built-in tag grammar.
#[must_use]
pub fn is_builtin_tag(name: &str) -> bool {
    SIMPLE_TAGS
        .iter()
        .chain(COMPLEX_TAGS)
        .any(|builtin| *builtin == name)
}

#[allow(clippy::too_many_lines)]
fn parse_builtin(
    twa: &TagWithArguments,
    style: &mut StyleDelta,
    effects: &mut Vec<Effect>,
    depth: usize,
    context: &mut Context,
) -> Builtin {
    if let Some(args) = twa.complex("iclip") {
        return parse_clip(args, true).map(|clip| effects.push(Effect::Clip(clip))).into();
    }
    if let Some(args) = twa.complex("clip") {
        return parse_clip(args, false).map(|clip| effects.push(Effect::Clip(clip))).into();
    }
    if let Some(args) = twa.complex("move") {
        return parse_move(args).map(|mv| effects.push(Effect::Move(mv))).into();
    }
    if let Some(args) = twa.complex("pos") {
        return position_args(args)
            .map(|position| effects.push(Effect::Position(position)))
            .into();
    }
    if let Some(args) = twa.complex("org") {
        return position_args(args)
            .map(|position| effects.push(Effect::Origin(position)))
            .into();
    }
    if let Some(args) = twa.complex("fade").or_else(|| twa.complex("fad")) {
        return parse_fade(args).map(|fade| effects.push(Effect::Fade(fade))).into();
    }
    if let Some(args) = twa.complex("t") {
        if depth + 1 > MAX_ANIMATION_DEPTH {
            context.report(
                ErrorCode::UnclosedTag,
                format!("\\t nested more than {MAX_ANIMATION_DEPTH} levels deep"),
            );
            return Builtin::KeepVerbatim;
        }
        return parse_animation(args, depth + 1, context)
            .map(|animation| effects.push(Effect::Animate(Box::new(animation))))
            .into();
    }

    let Some((name, arg)) = twa.simple() else {
        return Builtin::Invalid;
    };

    // Inside `\t`, there is no way to express "animate back to the style's value"
    if arg.is_empty() && depth > 0 && !matches!(name, "k" | "K" | "kf" | "ko" | "p" | "pbo" | "r")
    {
        return Builtin::KeepVerbatim;
    }

    match name {
        "alpha" => match transparency_arg(arg) {
            Arg::Reset => {
                for field in [
                    StyleField::PrimaryTransparency,
                    StyleField::SecondaryTransparency,
                    StyleField::OutlineTransparency,
                    StyleField::BackTransparency,
                ] {
                    style.clear(field);
                }
                Builtin::Applied
            }
            Arg::Value(transparency) => {
                style.primary_transparency = Some(transparency);
                style.secondary_transparency = Some(transparency);
                style.outline_transparency = Some(transparency);
                style.back_transparency = Some(transparency);
                Builtin::Applied
            }
            Arg::Invalid => invalid_colour(twa, context),
            Arg::Unrelated => Builtin::Invalid,
        },
        "1c" | "c" => apply_colour(&mut style.primary_colour, arg, twa, context),
        "2c" => apply_colour(&mut style.secondary_colour, arg, twa, context),
        "3c" => apply_colour(&mut style.outline_colour, arg, twa, context),
        "4c" => apply_colour(&mut style.back_colour, arg, twa, context),
        "1a" => apply_transparency(&mut style.primary_transparency, arg, twa, context),
        "2a" => apply_transparency(&mut style.secondary_transparency, arg, twa, context),
        "3a" => apply_transparency(&mut style.outline_transparency, arg, twa, context),
        "4a" => apply_transparency(&mut style.back_transparency, arg, twa, context),
        "fscx" => apply_number(&mut style.scale_x, arg),
        "fscy" => apply_number(&mut style.scale_y, arg),
        "fsp" => apply_number(&mut style.spacing, arg),
        "frx" => apply_number(&mut style.rotation_x, arg),
        "fry" => apply_number(&mut style.rotation_y, arg),
        "frz" | "fr" => apply_number(&mut style.rotation_z, arg),
        "fs" => {
            if arg.is_empty() {
                style.font_size = None;
                return Builtin::Applied;
            }
            // Only the first character is checked. `\fs+10` increases the font size by 10,
            // whereas `\fs10` sets it to 10.
            parse_number(arg)
                .map(|value| {
                    style.font_size = Some(if arg.starts_with(['+', '-']) {
                        FontSize::Delta(value)
                    } else {
                        FontSize::Set(value)
                    });
                })
                .into()
        }
        "fn" => {
            style.font_name = (!arg.is_empty()).then(|| arg.to_owned());
            Builtin::Applied
        }
        "kf" | "K" => parse_karaoke(arg, KaraokeMode::Fade, effects),
        "ko" => parse_karaoke(arg, KaraokeMode::Outline, effects),
        "k" => parse_karaoke(arg, KaraokeMode::Fill, effects),
        "pbo" => {
            let offset = if arg.is_empty() {
                Some(0.0)
            } else {
                parse_number(arg)
            };
            offset
                .map(|offset| effects.push(Effect::Drawing(Drawing::BaselineOffset(offset))))
                .into()
        }
        "p" => {
            let scale = if arg.is_empty() {
                Some(0)
            } else {
                parse_int(arg)
            };
            scale
                .map(|scale| effects.push(Effect::Drawing(Drawing::Mode(scale))))
                .into()
        }
        "b" => {
            let weight = match arg {
                "" => None,
                "0" => Some(FontWeight::BoldToggle(false)),
                "1" => Some(FontWeight::BoldToggle(true)),
                _ => match arg.parse::<u32>() {
                    Ok(weight) if weight >= 100 => Some(FontWeight::Numeric(weight)),
                    _ => return Builtin::Invalid,
                },
            };
            style.bold = weight;
            Builtin::Applied
        }
        "i" => apply_toggle(&mut style.italic, arg),
        "u" => apply_toggle(&mut style.underline, arg),
        "s" => apply_toggle(&mut style.strike_out, arg),
        "r" => {
            // clear previous overrides
            *style = StyleDelta::empty();
            effects.push(Effect::Reset(if arg.is_empty() {
                Reset::Reset
            } else {
                Reset::ResetToStyle(arg.to_owned())
            }));
            Builtin::Applied
        }
        _ => Builtin::Invalid,
    }
}

fn invalid_colour(twa: &TagWithArguments, context: &mut Context) -> Builtin {
    context.report(
        ErrorCode::InvalidColor,
        format!("invalid colour value in \\{}", twa.token),
    );
    Builtin::KeepVerbatim
}

fn apply_colour(
    field: &mut Option<Colour>,
    arg: &str,
    twa: &TagWithArguments,
    context: &mut Context,
) -> Builtin {
    match hex_arg(arg) {
        Arg::Reset => *field = None,
        Arg::Value(value) => *field = Some(Colour::from_bgr_packed(value)),
        Arg::Invalid => return invalid_colour(twa, context),
        Arg::Unrelated => return Builtin::Invalid,
    }
    Builtin::Applied
}

fn apply_transparency(
    field: &mut Option<Transparency>,
    arg: &str,
    twa: &TagWithArguments,
    context: &mut Context,
) -> Builtin {
    match transparency_arg(arg) {
        Arg::Reset => *field = None,
        Arg::Value(value) => *field = Some(value),
        Arg::Invalid => return invalid_colour(twa, context),
        Arg::Unrelated => return Builtin::Invalid,
    }
    Builtin::Applied
}

fn apply_number(field: &mut Option<f64>, arg: &str) -> Builtin {
    if arg.is_empty() {
        *field = None;
        return Builtin::Applied;
    }
    parse_number(arg).map(|value| *field = Some(value)).into()
}

fn apply_toggle(field: &mut Option<bool>, arg: &str) -> Builtin {
    *field = match arg {
        "" => None,
        "0" => Some(false),
        "1" => Some(true),
        _ => return Builtin::Invalid,
    };
    Builtin::Applied
}

/// Durations are kept within the `i32` range so that summing a line's syllables onto a start
/// time cannot overflow.
#[allow(clippy::cast_possible_truncation)]
fn karaoke_ms(centiseconds: f64) -> i64 {
    (centiseconds * 10.0)
        .round()
        .clamp(f64::from(i32::MIN), f64::from(i32::MAX)) as i64
}

fn parse_karaoke(arg: &str, mode: KaraokeMode, effects: &mut Vec<Effect>) -> Builtin {
    let centiseconds = if arg.is_empty() {
        Some(DEFAULT_KARAOKE_CENTISECONDS)
    } else {
        parse_number(arg)
    };

    centiseconds
        .map(|centiseconds| {
            effects.push(Effect::Karaoke(Karaoke {
                duration_ms: karaoke_ms(centiseconds),
                mode,
            }));
        })
        .into()
}

fn parse_clip(args: &[&str], inverse: bool) -> Option<Clip> {
    match args {
        [x1, y1, x2, y2] => {
            let rect = ClipRectangle {
                x1: parse_number(x1)?,
                y1: parse_number(y1)?,
                x2: parse_number(x2)?,
                y2: parse_number(y2)?,
            };
            Some(if inverse {
                Clip::InverseRectangle(rect)
            } else {
                Clip::Rectangle(rect)
            })
        }
        [commands] => Some(vector_clip(None, commands, inverse)),
        [scale, commands] => Some(vector_clip(Some(parse_int(scale)?), commands, inverse)),
        _ => None,
    }
}

fn vector_clip(scale: Option<i32>, commands: &str, inverse: bool) -> Clip {
    let drawing = ClipDrawing {
        scale,
        commands: commands.to_owned(),
    };
    if inverse {
        Clip::InverseVector(drawing)
    } else {
        Clip::Vector(drawing)
    }
}

fn parse_move(args: &[&str]) -> Option<Move> {
    let (positions, timing) = match args {
        [x1, y1, x2, y2] => ([x1, y1, x2, y2], None),
        [x1, y1, x2, y2, t1, t2] => (
            [x1, y1, x2, y2],
            Some(MoveTiming {
                start_time: Milliseconds(parse_int(t1)?),
                end_time: Milliseconds(parse_int(t2)?),
            }),
        ),
        _ => return None,
    };

    Some(Move {
        initial_position: Position {
            x: parse_number(positions[0])?,
            y: parse_number(positions[1])?,
        },
        final_position: Position {
            x: parse_number(positions[2])?,
            y: parse_number(positions[3])?,
        },
        timing,
    })
}

fn position_args(args: &[&str]) -> Option<Position> {
    match args {
        [x, y] => Some(Position {
            x: parse_number(x)?,
            y: parse_number(y)?,
        }),
        _ => None,
    }
}

fn parse_fade(args: &[&str]) -> Option<Fade> {
    let values = args
        .iter()
        .map(|arg| parse_int(arg))
        .collect::<Option<Vec<i32>>>()?;

    match values.as_slice() {
        [fade_in, fade_out] => Some(Fade::Simple(SimpleFade {
            fade_in_duration: Milliseconds(*fade_in),
            fade_out_duration: Milliseconds(*fade_out),
        })),
        [a1, a2, a3, t1, t2, t3, t4] => Some(Fade::Complex(ComplexFade {
            transparency_before: *a1,
            transparency_main: *a2,
            transparency_after: *a3,
            fade_in_start: Milliseconds(*t1),
            fade_in_end: Milliseconds(*t2),
            fade_out_start: Milliseconds(*t3),
            fade_out_end: Milliseconds(*t4),
        })),
        _ => None,
    }
}

fn parse_animation(args: &[&str], depth: usize, context: &mut Context) -> Option<Animation> {
    let (tags, rest) = args.split_last()?;
    if !tags.starts_with('\\') {
        return None;
    }

    let (interval, acceleration) = match rest {
        [] => (None, None),
        [accel] => (None, Some(parse_number(accel)?)),
        [t1, t2] => (Some(animation_interval(t1, t2)?), None),
        [t1, t2, accel] => (
            Some(animation_interval(t1, t2)?),
            Some(parse_number(accel)?),
        ),
        _ => return None,
    };

    let mut animation = Animation {
        interval,
        acceleration,
        ..Animation::default()
    };
    parse_tag_block(
        tags,
        &mut animation.style,
        &mut animation.effects,
        depth,
        context,
    );

    Some(animation)
}

fn animation_interval(t1: &str, t2: &str) -> Option<AnimationInterval> {
    Some(AnimationInterval {
        start: Milliseconds(parse_int(t1)?),
        end: Milliseconds(parse_int(t2)?),
    })
}

/// Outcome of interpreting a colour-like argument.
enum Arg<T> {
    /// Empty argument: reset to the style's value.
    Reset,
    Value(T),

    /// Looks like a colour, but is not a valid one.
    Invalid,

    /// Does not look like a colour at all (so this is probably a different tag).
    Unrelated,
}

/// Parse `&HBBGGRR&`-style hex arguments. The `&` and `H` decorations are optional, like in
/// libass, but the digits must be valid hex and fit into 32 bits.
fn hex_arg(arg: &str) -> Arg<u32> {
    if arg.is_empty() {
        return Arg::Reset;
    }
    if !arg.starts_with(['&', 'H', 'h']) && !arg.starts_with(|char: char| char.is_ascii_hexdigit())
    {
        return Arg::Unrelated;
    }

    let digits = arg.trim_start_matches('&');
    let digits = digits
        .strip_prefix(['H', 'h'])
        .unwrap_or(digits)
        .trim_end_matches('&');

    if digits.is_empty() || digits.len() > 8 || !digits.chars().all(|char| char.is_ascii_hexdigit())
    {
        return Arg::Invalid;
    }

    match u32::from_str_radix(digits, 16) {
        Ok(value) => Arg::Value(value),
        Err(_) => Arg::Invalid,
    }
}

fn transparency_arg(arg: &str) -> Arg<Transparency> {
    match hex_arg(arg) {
        #[allow(clippy::cast_possible_truncation)]
        Arg::Value(value) => Arg::Value(Transparency((value & 0xff) as u8)),
        Arg::Reset => Arg::Reset,
        Arg::Invalid => Arg::Invalid,
        Arg::Unrelated => Arg::Unrelated,
    }
}

/// Parse a finite decimal number, with optional sign.
#[must_use]
pub(crate) fn parse_number(arg: &str) -> Option<f64> {
    let arg = arg.trim();
    let unsigned = arg.strip_prefix('+').unwrap_or(arg);
    if unsigned.is_empty() {
        return None;
    }

    fast_float2::parse::<f64, _>(unsigned)
        .ok()
        .filter(|value| value.is_finite())
}

#[must_use]
pub(crate) fn parse_int(arg: &str) -> Option<i32> {
    arg.trim().parse::<i32>().ok()
}

/// One tag, split into its name part and arguments.
struct TagWithArguments<'a> {
    /// The whole tag as written, without the leading backslash.
    token: &'a str,

    /// The tag with leading spaces removed.
    trimmed: &'a str,

    /// Everything before the first opening parenthesis. Contains the name and, for simple
    /// tags, the argument.
    first_part: &'a str,

    /// Arguments between the outermost parentheses, if the tag has a well-formed
    /// parenthesised part.
    paren_args: Option<Vec<&'a str>>,
    has_paren: bool,
}

impl<'a> TagWithArguments<'a> {
    fn new(token: &'a str) -> Self {
        // Skip spaces between the backslash and the actual tag name
        let trimmed = token.trim_start_matches([' ', '\t']);
        let paren_pos = trimmed.find('(');
        let first_part = &trimmed[0..paren_pos.unwrap_or(trimmed.len())];

        let paren_args = paren_pos.and_then(|paren_pos| {
            let after = trimmed[paren_pos + 1..].trim_end();
            after.strip_suffix(')').map(parse_paren_args)
        });

        Self {
            token,
            trimmed,
            first_part,
            paren_args,
            has_paren: paren_pos.is_some(),
        }
    }

    /// The arguments, if this is the complex tag `tag_name`.
    fn complex(&self, tag_name: &str) -> Option<&[&'a str]> {
        if self.first_part.trim_end() == tag_name {
            self.paren_args.as_deref()
        } else {
            None
        }
    }

    /// The matching simple tag name and its argument.
    fn simple(&self) -> Option<(&'static str, &'a str)> {
        if self.has_paren {
            return None;
        }

        SIMPLE_TAGS
            .iter()
            .find(|name| self.first_part.starts_with(**name))
            .map(|name| (*name, self.first_part[name.len()..].trim()))
    }

    /// The leading alphabetic run, which is what the registry is keyed by.
    fn name(&self) -> &'a str {
        let end = self
            .trimmed
            .find(|char: char| !char.is_ascii_alphabetic())
            .unwrap_or(self.trimmed.len());
        &self.trimmed[..end]
    }

    fn after_name(&self) -> &'a str {
        &self.trimmed[self.name().len()..]
    }
}

/// Split the inside of a parenthesised tag into its arguments. Once an argument starts with a
/// backslash, the rest is one single argument, regardless of commas (`\t(0,100,\fs1,2)`).
/// Commas inside nested parentheses do not split either.
fn parse_paren_args(paren_args: &str) -> Vec<&str> {
    let mut arguments = vec![];
    if paren_args.trim().is_empty() {
        return arguments;
    }

    let mut state = ParenArgsParseState::Before;
    let mut arg_start_bytes = 0;
    let mut depth = 0_usize;

    for (byte_index, next_char) in paren_args.char_indices() {
        state = match state {
            ParenArgsParseState::Before | ParenArgsParseState::GenericArgument
                if next_char == '\\' =>
            {
                ParenArgsParseState::BackslashArgument
            }
            ParenArgsParseState::Before | ParenArgsParseState::GenericArgument => match next_char {
                '(' => {
                    depth += 1;
                    ParenArgsParseState::GenericArgument
                }
                ')' => {
                    depth = depth.saturating_sub(1);
                    ParenArgsParseState::GenericArgument
                }
                ',' if depth == 0 => {
                    arguments.push(paren_args[arg_start_bytes..byte_index].trim());
                    arg_start_bytes = byte_index + 1;
                    ParenArgsParseState::Before
                }
                // Skip spaces
                ' ' | '\t' if matches!(state, ParenArgsParseState::Before) => {
                    ParenArgsParseState::Before
                }
                _ => ParenArgsParseState::GenericArgument,
            },
            // Consume the rest of the argument, disregarding commas
            ParenArgsParseState::BackslashArgument => ParenArgsParseState::BackslashArgument,
        }
    }

    arguments.push(paren_args[arg_start_bytes..].trim());
    arguments
}

#[derive(Clone, Copy)]
enum ParenArgsParseState {
    Before,
    GenericArgument,
    BackslashArgument,
}

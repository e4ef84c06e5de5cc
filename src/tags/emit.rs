//! Writing segments and effects back out as ASS override tags.

use std::fmt::{self, Write};

use super::{
    Animation, Clip, ClipDrawing, ClipRectangle, Colour, ComplexFade, Drawing, Effect, Fade,
    FontSize, FontWeight, KaraokeMode, Milliseconds, Move, Position, Reset, SimpleFade,
    StyleDelta, StyleField, TextSegment, Transparency, registry,
};

pub trait EmitValue {
    fn emit_value<W>(&self, sink: &mut W) -> fmt::Result
    where
        W: fmt::Write;
}

pub trait EmitTag {
    fn emit_tag<W>(&self, sink: &mut W) -> fmt::Result
    where
        W: fmt::Write;
}

/// Serialize segments into raw event text.
///
/// Each segment is written as a tag block followed by its text. The block contains the style
/// fields that changed relative to the previous segment (a field that became unset is written
/// as its bare tag name, which resets it), then the segment's effects. If the segment contains
/// a reset, the effects up to the reset come first, since the reset discards any style
/// override before it. Segments that need no tags get no block.
#[must_use]
pub fn serialize_tags(segments: &[TextSegment]) -> String {
    Serialized(segments).to_string()
}

struct Serialized<'a>(&'a [TextSegment]);

impl fmt::Display for Serialized<'_> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        emit_segments(formatter, self.0)
    }
}

pub fn emit_segments<W>(sink: &mut W, segments: &[TextSegment]) -> fmt::Result
where
    W: fmt::Write,
{
    let empty = StyleDelta::empty();
    let mut previous = &empty;
    let mut block = String::new();

    for segment in segments {
        block.clear();
        emit_block(&mut block, &segment.style, previous, &segment.effects)?;

        if !block.is_empty() {
            sink.write_char('{')?;
            sink.write_str(&block)?;
            sink.write_char('}')?;
        }
        sink.write_str(&segment.text)?;

        previous = &segment.style;
    }

    Ok(())
}

/// Write the tags that turn `baseline` into `style` and introduce `effects`.
fn emit_block<W>(
    sink: &mut W,
    style: &StyleDelta,
    baseline: &StyleDelta,
    effects: &[Effect],
) -> fmt::Result
where
    W: fmt::Write,
{
    let empty = StyleDelta::empty();
    let last_reset = effects
        .iter()
        .rposition(|effect| matches!(effect, Effect::Reset(_)));

    let (before_style, after_style, baseline) = match last_reset {
        Some(index) => (&effects[..=index], &effects[index + 1..], &empty),
        None => (&effects[..0], effects, baseline),
    };

    for effect in before_style {
        effect.emit_tag(sink)?;
    }
    for field in style.changed_fields(baseline) {
        style.emit_field(sink, field)?;
    }
    for effect in after_style {
        effect.emit_tag(sink)?;
    }

    Ok(())
}

/// Write `\<name><value>`, or just `\<name>` if there is no value.
pub(crate) fn value_or_reset<W, V>(sink: &mut W, tag_name: &str, value: Option<&V>) -> fmt::Result
where
    W: fmt::Write,
    V: EmitValue,
{
    sink.write_str("\\")?;
    sink.write_str(tag_name)?;
    if let Some(value) = value {
        value.emit_value(sink)?;
    }

    Ok(())
}

pub fn simple_tag<W, V>(sink: &mut W, tag_name: &str, value: &V) -> fmt::Result
where
    W: fmt::Write,
    V: EmitValue,
{
    sink.write_str("\\")?;
    sink.write_str(tag_name)?;
    value.emit_value(sink)
}

/// Behaves like `simple_tag`, but inserts parentheses around the argument.
pub fn complex_tag<W, V>(sink: &mut W, tag_name: &str, value: &V) -> fmt::Result
where
    W: fmt::Write,
    V: EmitValue,
{
    sink.write_str("\\")?;
    sink.write_str(tag_name)?;
    sink.write_str("(")?;
    value.emit_value(sink)?;
    sink.write_str(")")
}

impl StyleDelta {
    /// The tag that sets `field` to its value in this delta, like `\fs40`.
    #[must_use]
    pub fn field_tag(&self, field: StyleField) -> String {
        let mut tag = String::new();
        // Writing into a `String` does not fail.
        let _: fmt::Result = self.emit_field(&mut tag, field);
        tag
    }
}

impl fmt::Display for Effect {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.emit_tag(formatter)
    }
}

impl EmitTag for Effect {
    fn emit_tag<W>(&self, sink: &mut W) -> fmt::Result
    where
        W: fmt::Write,
    {
        match self {
            Effect::Karaoke(karaoke) => {
                let name = match karaoke.mode {
                    KaraokeMode::Fill => "k",
                    KaraokeMode::Fade => "kf",
                    KaraokeMode::Outline => "ko",
                };
                #[allow(clippy::cast_precision_loss)]
                let centiseconds = karaoke.duration_ms as f64 / 10.0;
                simple_tag(sink, name, &centiseconds)
            }
            Effect::Fade(Fade::Simple(fade)) => complex_tag(sink, "fad", fade),
            Effect::Fade(Fade::Complex(fade)) => complex_tag(sink, "fade", fade),
            Effect::Move(mv) => complex_tag(sink, "move", mv),
            Effect::Position(position) => complex_tag(sink, "pos", position),
            Effect::Origin(position) => complex_tag(sink, "org", position),
            Effect::Clip(clip) => match clip {
                Clip::Rectangle(rect) => complex_tag(sink, "clip", rect),
                Clip::InverseRectangle(rect) => complex_tag(sink, "iclip", rect),
                Clip::Vector(drawing) => complex_tag(sink, "clip", drawing),
                Clip::InverseVector(drawing) => complex_tag(sink, "iclip", drawing),
            },
            Effect::Drawing(Drawing::Mode(scale)) => simple_tag(sink, "p", scale),
            Effect::Drawing(Drawing::BaselineOffset(offset)) => simple_tag(sink, "pbo", offset),
            Effect::Animate(animation) => complex_tag(sink, "t", animation.as_ref()),
            Effect::Reset(Reset::Reset) => sink.write_str("\\r"),
            Effect::Reset(Reset::ResetToStyle(name)) => simple_tag(sink, "r", name),
            Effect::Tagged(tagged) => {
                simple_tag(sink, &tagged.tag, &registry::serialize_registered(tagged))
            }
            Effect::Unknown(token) => {
                sink.write_str("\\")?;
                sink.write_str(token)
            }
        }
    }
}

impl EmitValue for bool {
    fn emit_value<W>(&self, sink: &mut W) -> fmt::Result
    where
        W: fmt::Write,
    {
        sink.write_str(if *self { "1" } else { "0" })
    }
}

impl EmitValue for f64 {
    fn emit_value<W>(&self, sink: &mut W) -> fmt::Result
    where
        W: fmt::Write,
    {
        write!(sink, "{}", *self)
    }
}

impl EmitValue for i32 {
    fn emit_value<W>(&self, sink: &mut W) -> fmt::Result
    where
        W: fmt::Write,
    {
        write!(sink, "{}", *self)
    }
}

impl EmitValue for String {
    fn emit_value<W>(&self, sink: &mut W) -> fmt::Result
    where
        W: fmt::Write,
    {
        sink.write_str(self)
    }
}

impl EmitValue for Milliseconds {
    fn emit_value<W>(&self, sink: &mut W) -> fmt::Result
    where
        W: fmt::Write,
    {
        self.0.emit_value(sink)
    }
}

impl EmitValue for FontWeight {
    fn emit_value<W>(&self, sink: &mut W) -> fmt::Result
    where
        W: fmt::Write,
    {
        match self {
            FontWeight::BoldToggle(toggle) => toggle.emit_value(sink),
            FontWeight::Numeric(weight) => write!(sink, "{weight}"),
        }
    }
}

impl EmitValue for FontSize {
    fn emit_value<W>(&self, sink: &mut W) -> fmt::Result
    where
        W: fmt::Write,
    {
        match self {
            FontSize::Set(size) => size.emit_value(sink),
            FontSize::Delta(delta) if *delta >= 0.0 => write!(sink, "+{delta}"),
            FontSize::Delta(delta) => delta.emit_value(sink),
        }
    }
}

impl EmitValue for Colour {
    fn emit_value<W>(&self, sink: &mut W) -> fmt::Result
    where
        W: fmt::Write,
    {
        write!(
            sink,
            "&H{:02X}{:02X}{:02X}&",
            self.blue, self.green, self.red
        )
    }
}

impl EmitValue for Transparency {
    fn emit_value<W>(&self, sink: &mut W) -> fmt::Result
    where
        W: fmt::Write,
    {
        write!(sink, "&H{:02X}&", self.0)
    }
}

impl EmitValue for Position {
    fn emit_value<W>(&self, sink: &mut W) -> fmt::Result
    where
        W: fmt::Write,
    {
        write!(sink, "{},{}", self.x, self.y)
    }
}

impl EmitValue for Move {
    fn emit_value<W>(&self, sink: &mut W) -> fmt::Result
    where
        W: fmt::Write,
    {
        self.initial_position.emit_value(sink)?;
        sink.write_char(',')?;
        self.final_position.emit_value(sink)?;
        if let Some(timing) = &self.timing {
            write!(sink, ",{},{}", timing.start_time.0, timing.end_time.0)?;
        }

        Ok(())
    }
}

impl EmitValue for SimpleFade {
    fn emit_value<W>(&self, sink: &mut W) -> fmt::Result
    where
        W: fmt::Write,
    {
        write!(
            sink,
            "{},{}",
            self.fade_in_duration.0, self.fade_out_duration.0
        )
    }
}

impl EmitValue for ComplexFade {
    fn emit_value<W>(&self, sink: &mut W) -> fmt::Result
    where
        W: fmt::Write,
    {
        write!(
            sink,
            "{},{},{},{},{},{},{}",
            self.transparency_before,
            self.transparency_main,
            self.transparency_after,
            self.fade_in_start.0,
            self.fade_in_end.0,
            self.fade_out_start.0,
            self.fade_out_end.0
        )
    }
}

impl EmitValue for ClipRectangle {
    fn emit_value<W>(&self, sink: &mut W) -> fmt::Result
    where
        W: fmt::Write,
    {
        write!(sink, "{},{},{},{}", self.x1, self.y1, self.x2, self.y2)
    }
}

impl EmitValue for ClipDrawing {
    fn emit_value<W>(&self, sink: &mut W) -> fmt::Result
    where
        W: fmt::Write,
    {
        if let Some(scale) = self.scale {
            write!(sink, "{scale},")?;
        }
        sink.write_str(&self.commands)
    }
}

impl EmitValue for Animation {
    fn emit_value<W>(&self, sink: &mut W) -> fmt::Result
    where
        W: fmt::Write,
    {
        if let Some(interval) = &self.interval {
            write!(sink, "{},{},", interval.start.0, interval.end.0)?;
        }
        if let Some(acceleration) = self.acceleration {
            acceleration.emit_value(sink)?;
            sink.write_char(',')?;
        }
        emit_block(sink, &self.style, &StyleDelta::empty(), &self.effects)
    }
}

#[cfg(test)]
mod tests {
    use rand::{Rng, SeedableRng};

    use super::super::parse::parse_tags;
    use super::super::{EffectParams, Karaoke, TaggedEffect};
    use super::*;

    /// Parsing the serialization of parsed text must give the same segments again.
    fn assert_fixed_point(text: &str) {
        let parsed = parse_tags(text);
        let serialized = serialize_tags(&parsed);
        let reparsed = parse_tags(&serialized);
        assert_eq!(parsed, reparsed, "{text:?} was serialized as {serialized:?}");
    }

    #[test]
    fn simple_helpers() -> Result<(), fmt::Error> {
        let mut string = String::new();

        simple_tag(&mut string, "blub", &123)?;
        complex_tag(&mut string, "blubblub", &Position { x: 1.5, y: -2.0 })?;
        value_or_reset::<_, f64>(&mut string, "fs", None)?;

        assert_eq!(string, "\\blub123\\blubblub(1.5,-2)\\fs");

        Ok(())
    }

    #[test]
    fn segments() {
        let segments = vec![
            TextSegment::new("Hello "),
            TextSegment::new("world").with_style(StyleDelta {
                bold: Some(FontWeight::BoldToggle(true)),
                ..StyleDelta::default()
            }),
            TextSegment::new("!").with_effect(Effect::Karaoke(Karaoke {
                duration_ms: 120,
                mode: KaraokeMode::Outline,
            })),
        ];
        assert_eq!(serialize_tags(&segments), r"Hello {\b1}world{\b\ko12}!");
    }

    #[test]
    fn values() {
        let style = StyleDelta {
            font_size: Some(FontSize::Delta(-2.0)),
            primary_colour: Some(Colour {
                red: 0x12,
                green: 0x34,
                blue: 0x56,
            }),
            back_transparency: Some(Transparency(0x0a)),
            ..StyleDelta::default()
        };
        assert_eq!(
            serialize_tags(&[TextSegment::new("x").with_style(style)]),
            r"{\fs-2\1c&H563412&\4a&H0A&}x"
        );
        assert_eq!(
            serialize_tags(&[TextSegment::new("").with_style(StyleDelta {
                font_size: Some(FontSize::Delta(3.0)),
                ..StyleDelta::default()
            })]),
            r"{\fs+3}"
        );
    }

    #[test]
    fn reset_comes_before_style() {
        let segments = parse_tags(r"{\b1}a{\i1\r\u1}b");
        assert_eq!(serialize_tags(&segments), r"{\b1}a{\r\u1}b");
    }

    #[test]
    fn effect_tokens() {
        let cases = [
            r"\fad(100,200)",
            r"\fade(255,0,255,0,100,200,300)",
            r"\move(0,0,10.5,10,100,50)",
            r"\pos(100,200)",
            r"\org(1,2)",
            r"\clip(0,0,100,50)",
            r"\iclip(2,m 0 0 l 10 0 10 10)",
            r"\p1",
            r"\pbo-5",
            r"\t(0,500,0.5,\fs40\blur2)",
            r"\t(\b1)",
            r"\rSign",
            r"\kf25",
            r"\an8",
            r"\xyzzy(1,2)",
        ];
        for case in cases {
            let text = format!("{{{case}}}x");
            let segments = parse_tags(&text);
            assert_eq!(segments[0].effects.len(), 1, "{case}");
            assert_eq!(segments[0].effects[0].to_string(), case);
            assert_eq!(serialize_tags(&segments), text);
        }
    }

    #[test]
    fn tagged_fallback() {
        let effect = Effect::Tagged(TaggedEffect {
            tag: "notregistered".to_owned(),
            effect_type: "whatever".to_owned(),
            params: EffectParams::Numbers(vec![1.0, 2.0]),
        });
        assert_eq!(effect.to_string(), r"\notregistered(1,2)");
    }

    #[test]
    fn unknown_tag_survives() {
        let text = r"{\foo}text";
        assert_eq!(serialize_tags(&parse_tags(text)), text);
    }

    #[test]
    fn field_tags() {
        let style = StyleDelta {
            italic: Some(true),
            ..StyleDelta::default()
        };
        assert_eq!(style.field_tag(StyleField::Italic), r"\i1");
        assert_eq!(style.field_tag(StyleField::Bold), r"\b");
    }

    #[test]
    fn fixed_points() {
        for text in [
            "",
            "plain",
            r"{\b1}Hello {\i1}world",
            r"{\k50}Hel{\k30}lo",
            r"{\b1\fs20}a{\b\fs}b",
            r"{\b1}a{\r\i1}b{\rSign}c{\b1}",
            r"{\fnArial\fs+3\c&H0000FF&\alpha&H80&\3a&H00&}x",
            r"{\pos(1,2)\t(0,100,\fs40\t(\b1))}x{\xyz}y",
            r"{\b1text",
            r"Hi {\pos(1,2)",
            r"{comment}{\i1}x{}",
            r"{\p1}m 0 0 l 1 1{\p0}text",
            r"{\fs1.25\frz-5\fscx120\fsp2}x",
            r"a{\b1}b{\b1}c",
            r"{\c&HZZ&}x",
        ] {
            assert_fixed_point(text);
        }
    }

    #[test]
    fn random_fixed_points() {
        const PIECES: &[&str] = &[
            "a",
            "Hello",
            " ",
            "{",
            "}",
            "\\N",
            r"{\b1}",
            r"{\b0}",
            r"{\b}",
            r"{\i1\u1}",
            r"{\s1}",
            r"{\fs20}",
            r"{\fs+2}",
            r"{\fnComic Sans}",
            r"{\c&H00FF00&}",
            r"{\1a&H80&}",
            r"{\alpha&HFF&}",
            r"{\k20}",
            r"{\kf35}",
            r"{\ko}",
            r"{\r}",
            r"{\rAlt}",
            r"{\pos(10,20)}",
            r"{\move(1,2,3,4)}",
            r"{\fad(100,200)}",
            r"{\t(\frz30)}",
            r"{\t(0,200,\c&H0000FF&)}",
            r"{\clip(1,2,3,4)}",
            r"{\p1}",
            r"{\p0}",
            r"{\blur2}",
            r"{\an7}",
            r"{\unknown}",
            r"{\b2}",
            r"{\c&Hbad&}",
            r"{\fscx50\frx10}",
            r"{\b1",
            r"{\fs",
        ];

        let mut rng = rand_pcg::Pcg32::seed_from_u64(0x4a11);
        for _ in 0..500 {
            let length = rng.random_range(0..12);
            let text: String = (0..length)
                .map(|_| PIECES[rng.random_range(0..PIECES.len())])
                .collect();
            assert_fixed_point(&text);
        }
    }
}

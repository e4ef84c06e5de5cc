//! ASS override tags, and the segment representation of event text they produce.
//!
//! Raw event text like `Hello {\b1\k50}world` is turned into a sequence of [`TextSegment`]s by
//! [`parse_tags`]; each segment holds a run of literal text, the [`StyleDelta`] (sparse
//! override of the event's style) in force over that run, and the [`Effect`]s introduced by
//! the tag block right before it. [`serialize_tags`] does the reverse.

use std::fmt;

use crate::subtitle;

pub mod emit;
pub mod lexer;
pub mod parse;
pub mod registry;

pub use emit::serialize_tags;
pub use parse::{parse_tags, parse_tags_with, strip_tags};
pub use registry::{EffectHandler, get_effect_handler, register_effect};

/// A maximal run of literal text sharing one inline style delta and one list of effects.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TextSegment {
    pub text: String,

    /// Accumulated overrides in force over `text`. Fields that are `None` are inherited from
    /// the event's style.
    pub style: StyleDelta,

    /// Effects introduced by the tag block(s) immediately preceding `text`, in source order.
    pub effects: Vec<Effect>,
}

impl TextSegment {
    #[must_use]
    pub fn new<S>(text: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_style(mut self, style: StyleDelta) -> Self {
        self.style = style;
        self
    }

    #[must_use]
    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    /// The karaoke timing of this segment, if it starts a syllable.
    #[must_use]
    pub fn karaoke(&self) -> Option<&Karaoke> {
        self.effects.iter().find_map(|effect| match effect {
            Effect::Karaoke(karaoke) => Some(karaoke),
            _ => None,
        })
    }

    /// The last reset in this segment's tag block, if any.
    #[must_use]
    pub fn reset(&self) -> Option<&Reset> {
        self.effects.iter().rev().find_map(|effect| match effect {
            Effect::Reset(reset) => Some(reset),
            _ => None,
        })
    }
}

macro_rules! style_fields {
    ($($variant:ident => $field:ident, $tag:literal;)*) => {
        /// Names one field of a [`StyleDelta`].
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum StyleField {
            $($variant,)*
        }

        impl StyleField {
            pub const ALL: &'static [StyleField] = &[$(StyleField::$variant,)*];

            /// The override tag this field is written as.
            #[must_use]
            pub fn tag_name(self) -> &'static str {
                match self {
                    $(StyleField::$variant => $tag,)*
                }
            }
        }

        impl StyleDelta {
            #[must_use]
            pub fn is_set(&self, field: StyleField) -> bool {
                match field {
                    $(StyleField::$variant => self.$field.is_some(),)*
                }
            }

            #[must_use]
            pub fn differs_in(&self, other: &StyleDelta, field: StyleField) -> bool {
                match field {
                    $(StyleField::$variant => self.$field != other.$field,)*
                }
            }

            pub fn clear(&mut self, field: StyleField) {
                match field {
                    $(StyleField::$variant => self.$field = None,)*
                }
            }

            /// Take the value of `field` from `other`, if `other` has it set.
            pub fn copy_field(&mut self, other: &StyleDelta, field: StyleField) {
                match field {
                    $(StyleField::$variant => {
                        if other.$field.is_some() {
                            self.$field.clone_from(&other.$field);
                        }
                    })*
                }
            }

            /// Write the tag for `field`: its value if set, or the bare tag name (which resets
            /// the field to the style's value) if not.
            pub(crate) fn emit_field<W>(&self, sink: &mut W, field: StyleField) -> fmt::Result
            where
                W: fmt::Write,
            {
                match field {
                    $(StyleField::$variant => emit::value_or_reset(sink, $tag, self.$field.as_ref()),)*
                }
            }
        }
    };
}

/// A sparse override of a [`subtitle::Style`]'s fields.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StyleDelta {
    pub font_name: Option<String>,
    pub font_size: Option<FontSize>,
    pub bold: Option<FontWeight>,
    pub italic: Option<bool>,
    pub underline: Option<bool>,
    pub strike_out: Option<bool>,

    /// Percent, like the style's scale.
    pub scale_x: Option<f64>,
    pub scale_y: Option<f64>,
    pub spacing: Option<f64>,

    /// Degrees.
    pub rotation_x: Option<f64>,
    pub rotation_y: Option<f64>,
    pub rotation_z: Option<f64>,

    pub primary_colour: Option<Colour>,
    pub secondary_colour: Option<Colour>,
    pub outline_colour: Option<Colour>,
    pub back_colour: Option<Colour>,

    pub primary_transparency: Option<Transparency>,
    pub secondary_transparency: Option<Transparency>,
    pub outline_transparency: Option<Transparency>,
    pub back_transparency: Option<Transparency>,
}

style_fields! {
    FontName => font_name, "fn";
    FontSize => font_size, "fs";
    Bold => bold, "b";
    Italic => italic, "i";
    Underline => underline, "u";
    StrikeOut => strike_out, "s";
    ScaleX => scale_x, "fscx";
    ScaleY => scale_y, "fscy";
    Spacing => spacing, "fsp";
    RotationX => rotation_x, "frx";
    RotationY => rotation_y, "fry";
    RotationZ => rotation_z, "frz";
    PrimaryColour => primary_colour, "1c";
    SecondaryColour => secondary_colour, "2c";
    OutlineColour => outline_colour, "3c";
    BackColour => back_colour, "4c";
    PrimaryTransparency => primary_transparency, "1a";
    SecondaryTransparency => secondary_transparency, "2a";
    OutlineTransparency => outline_transparency, "3a";
    BackTransparency => back_transparency, "4a";
}

impl StyleDelta {
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        StyleField::ALL.iter().all(|field| !self.is_set(*field))
    }

    /// Overwrite fields of `self` with all fields that are set in `other` (last writer wins).
    pub fn override_from(&mut self, other: &StyleDelta) {
        for field in StyleField::ALL {
            self.copy_field(other, *field);
        }
    }

    /// Iterate over the fields in which `self` and `other` differ.
    pub fn changed_fields<'a>(&'a self, other: &'a StyleDelta) -> impl Iterator<Item = StyleField> + 'a {
        StyleField::ALL
            .iter()
            .copied()
            .filter(move |field| self.differs_in(other, *field))
    }

    /// A delta that sets the line-level decorations and primary colour of `style`, for
    /// targets that cannot reference styles but can express these inline. Values equal to the
    /// defaults a plain-text target would assume anyway are left unset.
    #[must_use]
    pub fn inline_basics_of(style: &subtitle::Style) -> Self {
        let default = subtitle::Style::default();
        Self {
            bold: style.bold.then_some(FontWeight::BoldToggle(true)),
            italic: style.italic.then_some(true),
            underline: style.underline.then_some(true),
            strike_out: style.strike_out.then_some(true),
            primary_colour: (style.primary_colour.rgb() != default.primary_colour.rgb())
                .then(|| Colour::from(style.primary_colour)),
            ..Self::default()
        }
    }

    /// Whether the bold override, if any, resolves to a bold weight.
    #[must_use]
    pub fn is_bold(&self) -> bool {
        self.bold.is_some_and(FontWeight::is_bold)
    }
}

/// An inline colour override. Inline colours carry no transparency; that is set separately
/// through [`Transparency`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Colour {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl Colour {
    /// Interpret a number in the `0xBBGGRR` layout used by `\c` tags.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_bgr_packed(packed: u32) -> Self {
        Self {
            red: (packed & 0xff) as u8,
            green: ((packed >> 8) & 0xff) as u8,
            blue: ((packed >> 16) & 0xff) as u8,
        }
    }

    /// `#RRGGBB`, as used by HTML-like formats.
    #[must_use]
    pub fn to_html(self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.red, self.green, self.blue)
    }

    /// Parse `#RRGGBB` or `RRGGBB`.
    #[must_use]
    pub fn from_html(html: &str) -> Option<Self> {
        let hex = html.trim().trim_start_matches('#');
        if hex.len() != 6 {
            return None;
        }
        let packed = u32::from_str_radix(hex, 16).ok()?;
        Some(Self::from_bgr_packed(packed).swapped())
    }

    fn swapped(self) -> Self {
        Self {
            red: self.blue,
            green: self.green,
            blue: self.red,
        }
    }
}

impl From<subtitle::Colour> for Colour {
    fn from(colour: subtitle::Colour) -> Self {
        Self {
            red: colour.red,
            green: colour.green,
            blue: colour.blue,
        }
    }
}

/// 255 means fully transparent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Transparency(pub u8);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontWeight {
    /// `\b0` or `\b1`
    BoldToggle(bool),

    /// `\b100` through `\b900`
    Numeric(u32),
}

impl FontWeight {
    #[must_use]
    pub fn is_bold(self) -> bool {
        match self {
            FontWeight::BoldToggle(toggle) => toggle,
            FontWeight::Numeric(weight) => weight >= 600,
        }
    }
}

/// `\fs20` sets the size; `\fs+2` and `\fs-2` adjust the style's size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FontSize {
    Set(f64),
    Delta(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Milliseconds(pub i32);

/// Anything introduced by a tag block that is not a plain style override.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Karaoke(Karaoke),
    Fade(Fade),
    Move(Move),
    Position(Position),
    Origin(Position),
    Clip(Clip),
    Drawing(Drawing),
    Animate(Box<Animation>),
    Reset(Reset),

    /// An effect produced by a handler from the effect registry.
    Tagged(TaggedEffect),

    /// A tag nothing recognised, kept verbatim (without its leading backslash) so it can be
    /// written back out unchanged.
    Unknown(String),
}

impl Effect {
    /// The effect type name, as used in loss reports and by the registry.
    #[must_use]
    pub fn effect_type(&self) -> &str {
        match self {
            Effect::Karaoke(_) => "karaoke",
            Effect::Fade(Fade::Simple(_)) => "fade",
            Effect::Fade(Fade::Complex(_)) => "fade-complex",
            Effect::Move(_) => "move",
            Effect::Position(_) => "position",
            Effect::Origin(_) => "origin",
            Effect::Clip(_) => "clip",
            Effect::Drawing(_) => "drawing",
            Effect::Animate(_) => "animate",
            Effect::Reset(_) => "reset",
            Effect::Tagged(tagged) => &tagged.effect_type,
            Effect::Unknown(_) => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Karaoke {
    pub duration_ms: i64,
    pub mode: KaraokeMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KaraokeMode {
    /// `\k`: the syllable is filled instantly.
    Fill,

    /// `\kf` or `\K`: the fill sweeps from left to right.
    Fade,

    /// `\ko`: the outline appears instantly.
    Outline,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Fade {
    /// Maps to `\fad`.
    Simple(SimpleFade),

    /// Maps to `\fade`.
    Complex(ComplexFade),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimpleFade {
    pub fade_in_duration: Milliseconds,
    pub fade_out_duration: Milliseconds,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComplexFade {
    pub transparency_before: i32,
    pub transparency_main: i32,
    pub transparency_after: i32,
    pub fade_in_start: Milliseconds,
    pub fade_in_end: Milliseconds,
    pub fade_out_start: Milliseconds,
    pub fade_out_end: Milliseconds,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Move {
    pub initial_position: Position,
    pub final_position: Position,
    pub timing: Option<MoveTiming>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MoveTiming {
    pub start_time: Milliseconds,
    pub end_time: Milliseconds,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Clip {
    Rectangle(ClipRectangle),
    InverseRectangle(ClipRectangle),
    Vector(ClipDrawing),
    InverseVector(ClipDrawing),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClipRectangle {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipDrawing {
    pub scale: Option<i32>,
    pub commands: String,
}

/// Drawing mode switches. While the mode is non-zero, segment text holds vector drawing
/// commands rather than dialogue.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Drawing {
    /// `\p<scale>`; 0 ends drawing mode.
    Mode(i32),

    /// `\pbo<offset>`
    BaselineOffset(f64),
}

/// `\t([t1,t2,][accel,]tags)`. The animated tags are parsed into their own style delta and
/// effect list; effects may themselves be animations.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Animation {
    pub interval: Option<AnimationInterval>,
    pub acceleration: Option<f64>,
    pub style: StyleDelta,
    pub effects: Vec<Effect>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnimationInterval {
    pub start: Milliseconds,
    pub end: Milliseconds,
}

/// `\r` switches back to the event's style, `\r<name>` to a named one. The name is recorded
/// as written; resolving it is up to the consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reset {
    Reset,
    ResetToStyle(String),
}

/// The typed result of a registry handler.
#[derive(Debug, Clone, PartialEq)]
pub struct TaggedEffect {
    /// The tag name the effect was written with, e.g. `xbord`.
    pub tag: String,

    /// The effect type the handler declares, e.g. `border`.
    pub effect_type: String,
    pub params: EffectParams,
}

/// Parameter payload for registry-handled effects.
#[derive(Debug, Clone, PartialEq)]
pub enum EffectParams {
    /// The tag was written without an argument, which resets it to the style's value.
    None,
    Integer(i64),
    Number(f64),
    Numbers(Vec<f64>),
    Text(String),
}

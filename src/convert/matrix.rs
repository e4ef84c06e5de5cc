//! Which features each format can represent.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::formats::Format;
use crate::tags::{Effect, Reset, StyleField};

/// A category of subtitle construct that a format may or may not be able to express.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Feature {
    Bold,
    Italic,
    Underline,
    Strikeout,
    Color,

    /// Font face, size, scale, spacing and rotation.
    Typography,
    Position,
    Karaoke,
    Animation,
    Drawing,
    Clip,

    /// Blur, border, shadow, shear and fades.
    Effects,
    Styles,
    Layers,
    Ruby,
    Voice,
    Regions,
    Comments,
    Fonts,

    /// Sections of the source format that no reader understood and that only the source
    /// format's writer can put back.
    Sections,
    UnknownTags,
}

impl Feature {
    pub const ALL: &'static [Feature] = &[
        Feature::Bold,
        Feature::Italic,
        Feature::Underline,
        Feature::Strikeout,
        Feature::Color,
        Feature::Typography,
        Feature::Position,
        Feature::Karaoke,
        Feature::Animation,
        Feature::Drawing,
        Feature::Clip,
        Feature::Effects,
        Feature::Styles,
        Feature::Layers,
        Feature::Ruby,
        Feature::Voice,
        Feature::Regions,
        Feature::Comments,
        Feature::Fonts,
        Feature::Sections,
        Feature::UnknownTags,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Feature::Bold => "bold",
            Feature::Italic => "italic",
            Feature::Underline => "underline",
            Feature::Strikeout => "strikeout",
            Feature::Color => "color",
            Feature::Typography => "typography",
            Feature::Position => "position",
            Feature::Karaoke => "karaoke",
            Feature::Animation => "animation",
            Feature::Drawing => "drawing",
            Feature::Clip => "clip",
            Feature::Effects => "effects",
            Feature::Styles => "styles",
            Feature::Layers => "layers",
            Feature::Ruby => "ruby",
            Feature::Voice => "voice",
            Feature::Regions => "regions",
            Feature::Comments => "comments",
            Feature::Fonts => "fonts",
            Feature::Sections => "sections",
            Feature::UnknownTags => "unknown-tags",
        }
    }

    /// The feature an inline style override belongs to.
    #[must_use]
    pub fn of_style_field(field: StyleField) -> Self {
        match field {
            StyleField::Bold => Feature::Bold,
            StyleField::Italic => Feature::Italic,
            StyleField::Underline => Feature::Underline,
            StyleField::StrikeOut => Feature::Strikeout,
            StyleField::PrimaryColour
            | StyleField::SecondaryColour
            | StyleField::OutlineColour
            | StyleField::BackColour
            | StyleField::PrimaryTransparency
            | StyleField::SecondaryTransparency
            | StyleField::OutlineTransparency
            | StyleField::BackTransparency => Feature::Color,
            StyleField::FontName
            | StyleField::FontSize
            | StyleField::ScaleX
            | StyleField::ScaleY
            | StyleField::Spacing
            | StyleField::RotationX
            | StyleField::RotationY
            | StyleField::RotationZ => Feature::Typography,
        }
    }

    /// The feature an effect belongs to. A plain `\r` belongs to none: it only undoes inline
    /// overrides, which every target can do by not writing them.
    #[must_use]
    pub fn of_effect(effect: &Effect) -> Option<Self> {
        let feature = match effect {
            Effect::Karaoke(_) => Feature::Karaoke,
            Effect::Fade(_) => Feature::Effects,
            Effect::Move(_) | Effect::Position(_) | Effect::Origin(_) => Feature::Position,
            Effect::Clip(_) => Feature::Clip,
            Effect::Drawing(_) => Feature::Drawing,
            Effect::Animate(_) => Feature::Animation,
            Effect::Reset(Reset::Reset) => return None,
            Effect::Reset(Reset::ResetToStyle(_)) => Feature::Styles,
            Effect::Tagged(tagged) => match tagged.effect_type.as_str() {
                "alignment" => Feature::Position,
                "wrap-style" | "encoding" => Feature::Typography,
                "karaoke-onset" => Feature::Karaoke,
                "blur" | "border" | "shadow" | "shear" => Feature::Effects,
                _ => Feature::UnknownTags,
            },
            Effect::Unknown(_) => Feature::UnknownTags,
        };
        Some(feature)
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// How well a format supports a feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Support {
    Full,

    /// Kept, but the writer can only approximate it.
    Partial,
    None,
}

impl Support {
    /// Whether the construct survives conversion at all.
    #[must_use]
    pub fn keeps(self) -> bool {
        !matches!(self, Support::None)
    }
}

/// Look up the support matrix.
#[must_use]
pub fn support(format: Format, feature: Feature) -> Support {
    use Feature as F;

    match format {
        Format::Ass => match feature {
            F::Ruby | F::Regions => Support::None,
            _ => Support::Full,
        },
        Format::Srt => match feature {
            F::Bold | F::Italic | F::Underline | F::Strikeout | F::Color => Support::Full,
            _ => Support::None,
        },
        Format::WebVtt => match feature {
            F::Bold | F::Italic | F::Underline | F::Ruby | F::Voice | F::Regions | F::Comments => {
                Support::Full
            }
            F::Position | F::Karaoke => Support::Partial,
            _ => Support::None,
        },
        Format::Sbv => Support::None,
        Format::Lrc => match feature {
            F::Karaoke => Support::Partial,
            _ => Support::None,
        },
        Format::MicroDvd => match feature {
            F::Bold | F::Italic | F::Underline | F::Strikeout | F::Color => Support::Partial,
            _ => Support::None,
        },
    }
}

/// Whether extra sections stored under `key` can be written back by `format`. ASS keeps
/// unknown sections under their bracketed header, WebVTT keeps its `STYLE` blocks.
#[must_use]
pub fn writes_section(format: Format, key: &str) -> bool {
    match format {
        Format::Ass => key.starts_with('['),
        Format::WebVtt => key == "STYLE",
        Format::Srt | Format::Sbv | Format::Lrc | Format::MicroDvd => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tags::{EffectParams, Position, TaggedEffect};

    #[test]
    fn matrix() {
        assert_eq!(support(Format::Srt, Feature::Position), Support::None);
        assert_eq!(support(Format::Srt, Feature::Bold), Support::Full);
        assert_eq!(support(Format::WebVtt, Feature::Position), Support::Partial);
        assert_eq!(support(Format::Ass, Feature::Regions), Support::None);
        assert_eq!(support(Format::Ass, Feature::Animation), Support::Full);
        assert!(Feature::ALL.iter().all(|feature| !support(Format::Sbv, *feature).keeps()));
    }

    #[test]
    fn effect_features() {
        let alignment = Effect::Tagged(TaggedEffect {
            tag: "an".to_owned(),
            effect_type: "alignment".to_owned(),
            params: EffectParams::Integer(8),
        });
        assert_eq!(Feature::of_effect(&alignment), Some(Feature::Position));
        assert_eq!(
            Feature::of_effect(&Effect::Origin(Position { x: 1.0, y: 2.0 })),
            Some(Feature::Position)
        );
        assert_eq!(Feature::of_effect(&Effect::Reset(Reset::Reset)), None);
        assert_eq!(
            Feature::of_effect(&Effect::Unknown("xyz".to_owned())),
            Some(Feature::UnknownTags)
        );
        assert_eq!(Feature::of_style_field(StyleField::ScaleX), Feature::Typography);
        assert_eq!(Feature::UnknownTags.to_string(), "unknown-tags");
    }
}

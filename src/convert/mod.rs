//! Conversion of a [`Document`] into a target format that may not be able to represent all of
//! it.
//!
//! Every event is lowered against the target's row of the support [`matrix`]: constructs the
//! target cannot express are removed (or, for karaoke, turned into separate events), and each
//! removal is recorded as a [`LostFeature`]. Losing a feature is never an error.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::diagnostics::Diagnostic;
use crate::formats::Format;
use crate::subtitle::Document;

mod lower;
pub mod matrix;

pub use matrix::{Feature, Support, support};

/// What to do with a construct the target cannot represent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnsupportedHandling {
    #[default]
    Drop,

    /// Drop it, and keep its tag text in a comment next to the event if the target has
    /// comments.
    EmitAsComment,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KaraokeHandling {
    /// Keep karaoke timing if the target supports it.
    #[default]
    Preserve,

    /// Turn every syllable into an event of its own, timed by the karaoke durations.
    Explode,

    /// Always remove karaoke timing.
    Strip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PositioningHandling {
    /// Keep `\pos`, `\move`, `\org` and alignment overrides if the target supports them.
    #[default]
    Preserve,

    /// Always remove them.
    Strip,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertOptions {
    pub unsupported: UnsupportedHandling,
    pub karaoke: KaraokeHandling,
    pub positioning: PositioningHandling,

    /// Whether to collect [`LostFeature`]s. Handling is applied either way.
    pub report_loss: bool,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            unsupported: UnsupportedHandling::default(),
            karaoke: KaraokeHandling::default(),
            positioning: PositioningHandling::default(),
            report_loss: true,
        }
    }
}

/// One construct that did not survive conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LostFeature {
    /// Index of the source event the construct belonged to, or `None` for document-level
    /// constructs like embedded fonts.
    pub event_index: Option<usize>,
    pub feature: Feature,

    /// The discarded construct as written in the source, like `\pos(100,200)`.
    pub construct: String,
    pub description: String,
}

impl fmt::Display for LostFeature {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.event_index {
            Some(index) => write!(formatter, "event {index}: {}", self.description),
            None => write!(formatter, "document: {}", self.description),
        }
    }
}

#[derive(Debug)]
pub struct Conversion {
    /// The serialized target document.
    pub output: String,

    /// The lowered document `output` was written from.
    pub document: Document,

    /// Per-event losses in event order, then document-level losses.
    pub lost_features: Vec<LostFeature>,

    /// Problems found in the source while converting, like references to missing styles.
    pub diagnostics: Vec<Diagnostic>,
}

/// Convert `document` for writing as `target`. The input document is not modified.
#[must_use]
pub fn convert(document: &Document, target: Format, options: &ConvertOptions) -> Conversion {
    let mut lowering = lower::Lowering::new(document, target, options);
    for (index, event) in document.events().iter().enumerate() {
        lowering.lower_event(index, event);
    }
    lowering.lower_document();

    let (lowered, lost_features, diagnostics) = lowering.finish();
    log::debug!(
        "converted {} events to {target} ({} events out, {} losses)",
        document.events().len(),
        lowered.events().len(),
        lost_features.len()
    );

    Conversion {
        output: target.serialize(&lowered),
        document: lowered,
        lost_features,
        diagnostics,
    }
}

#[cfg(test)]
mod tests {
    use assert_matches2::assert_matches;

    use super::*;
    use crate::diagnostics::ErrorCode;
    use crate::subtitle::{Attachment, AttachmentKind, Event, EventKind, Style};
    use crate::tags::FontWeight;

    fn document_with(texts: &[&str]) -> Document {
        let mut document = Document::default();
        for (index, text) in texts.iter().enumerate() {
            let start = i64::try_from(index).unwrap_or_default() * 2000;
            document.push_event(Event::new(*text).timed(start, start + 1000));
        }
        document
    }

    #[test]
    fn position_to_srt() {
        let document = document_with(&[r"{\pos(100,200)}Hello"]);
        let conversion = convert(&document, Format::Srt, &ConvertOptions::default());

        assert_eq!(conversion.lost_features.len(), 1);
        let lost = &conversion.lost_features[0];
        assert_eq!(lost.event_index, Some(0));
        assert_eq!(lost.feature, Feature::Position);
        assert_eq!(lost.construct, r"\pos(100,200)");
        assert!(lost.description.contains(r"\pos(100,200)"));

        assert_eq!(conversion.output, "1\n00:00:00,000 --> 00:00:01,000\nHello\n");
        assert!(conversion.diagnostics.is_empty());
    }

    #[test]
    fn supported_tags_are_kept() {
        let document = document_with(&[r"{\pos(100,200)\b1}Hello"]);
        let conversion = convert(&document, Format::Ass, &ConvertOptions::default());
        assert!(conversion.lost_features.is_empty());

        let event = &conversion.document.events()[0];
        assert!(!event.is_dirty());
        assert_eq!(event.id(), document.events()[0].id());
        assert!(conversion.output.contains(r",{\pos(100,200)\b1}Hello"));
    }

    #[test]
    fn report_loss_disabled() {
        let document = document_with(&[r"{\pos(100,200)}Hello"]);
        let options = ConvertOptions {
            report_loss: false,
            ..ConvertOptions::default()
        };
        let conversion = convert(&document, Format::Srt, &options);
        assert!(conversion.lost_features.is_empty());
        assert_eq!(conversion.document.events()[0].text(), "Hello");
    }

    #[test]
    fn loss_order() {
        let document = document_with(&[r"{\blur2}a{\fad(10,20)}b", r"{\frz10}c"]);
        let conversion = convert(&document, Format::Srt, &ConvertOptions::default());
        let constructs: Vec<(Option<usize>, &str)> = conversion
            .lost_features
            .iter()
            .map(|lost| (lost.event_index, lost.construct.as_str()))
            .collect();
        assert_eq!(
            constructs,
            vec![
                (Some(0), r"\blur2"),
                (Some(0), r"\fad(10,20)"),
                (Some(1), r"\frz10"),
            ]
        );
    }

    #[test]
    fn accumulated_style_reported_once() {
        let document = document_with(&[r"{\fs40}a{\b1}b{\i1}c"]);
        let conversion = convert(&document, Format::Srt, &ConvertOptions::default());
        assert_eq!(conversion.lost_features.len(), 1);
        assert_eq!(conversion.lost_features[0].construct, r"\fs40");
        assert_eq!(
            conversion.document.events()[0].text(),
            r"a{\b1}b{\i1}c"
        );
    }

    #[test]
    fn karaoke_explode() {
        let mut document = Document::default();
        let parent = document.push_event(Event::new(r"{\k50}Hel{\k30}lo").timed(1000, 3000));
        let options = ConvertOptions {
            karaoke: KaraokeHandling::Explode,
            ..ConvertOptions::default()
        };
        let conversion = convert(&document, Format::Srt, &options);
        assert!(conversion.lost_features.is_empty());

        let events = conversion.document.events();
        assert_eq!(events.len(), 2);
        assert_eq!((events[0].start, events[0].end), (1000, 1500));
        assert_eq!((events[1].start, events[1].end), (1500, 1800));
        assert_eq!(events[0].text(), "Hel");
        assert_eq!(events[1].text(), "lo");
        assert!(events.iter().all(|event| event.id() != parent));
        assert_ne!(events[0].id(), events[1].id());

        assert_eq!(
            conversion.output,
            "1\n00:00:01,000 --> 00:00:01,500\nHel\n\n2\n00:00:01,500 --> 00:00:01,800\nlo\n"
        );
    }

    #[test]
    fn karaoke_explode_keeps_leading_text() {
        let document = document_with(&[r"{\b1}x {\k20}a{\k20}b"]);
        let options = ConvertOptions {
            karaoke: KaraokeHandling::Explode,
            ..ConvertOptions::default()
        };
        let conversion = convert(&document, Format::Ass, &options);
        let events = conversion.document.events();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].text(), r"{\b1}x a");
        assert_eq!(events[1].text(), r"{\b1}b");
        assert_eq!((events[1].start, events[1].end), (200, 400));
    }

    #[test]
    fn karaoke_explode_drops_onset() {
        let document = document_with(&[r"{\kt20\k50}a{\k30}b"]);
        let options = ConvertOptions {
            karaoke: KaraokeHandling::Explode,
            ..ConvertOptions::default()
        };
        let conversion = convert(&document, Format::Ass, &options);

        assert_matches!(conversion.lost_features.as_slice(), [lost]);
        assert_eq!(lost.feature, Feature::Karaoke);
        assert_eq!(lost.event_index, Some(0));
        assert!(lost.construct.starts_with(r"\kt"), "{}", lost.construct);

        let texts: Vec<String> = conversion
            .document
            .events()
            .iter()
            .map(|event| event.text().into_owned())
            .collect();
        assert_eq!(texts, vec!["a".to_owned(), "b".to_owned()]);
    }

    #[test]
    fn karaoke_explode_stays_inside_the_event() {
        let mut document = Document::default();
        document.push_event(
            Event::new(r"{\k-50}a{\k30}b{\k99999999999999999999}c").timed(1000, 2000),
        );
        let options = ConvertOptions {
            karaoke: KaraokeHandling::Explode,
            ..ConvertOptions::default()
        };
        let conversion = convert(&document, Format::Srt, &options);

        let times: Vec<(i64, i64)> = conversion
            .document
            .events()
            .iter()
            .map(|event| (event.start, event.end))
            .collect();
        assert_eq!(times, vec![(1000, 1000), (1000, 1300), (1300, 2000)]);
    }

    #[test]
    fn huge_karaoke_is_written_without_overflow() {
        let mut document = Document::default();
        document.push_event(
            Event::new(r"{\k99999999999999999999}a{\k10}b").timed(i64::MAX - 10, i64::MAX),
        );
        document.push_event(Event::new(r"{\k99999999999999999999}a{\k10}b").timed(0, 1000));

        let to_vtt = convert(&document, Format::WebVtt, &ConvertOptions::default());
        assert!(to_vtt.output.contains("a<596:31:23.647>b"), "{}", to_vtt.output);

        let to_lrc = convert(&document, Format::Lrc, &ConvertOptions::default());
        assert!(to_lrc.output.contains("a<"));

        let options = ConvertOptions {
            karaoke: KaraokeHandling::Explode,
            ..ConvertOptions::default()
        };
        let exploded = convert(&document, Format::Srt, &options);
        assert_eq!(exploded.document.events().len(), 4);
        assert!(
            exploded
                .document
                .events()
                .iter()
                .all(|event| event.start <= event.end)
        );
    }

    #[test]
    fn karaoke_strip() {
        let document = document_with(&[r"{\k50}Hel{\k30}lo"]);
        let options = ConvertOptions {
            karaoke: KaraokeHandling::Strip,
            ..ConvertOptions::default()
        };
        let conversion = convert(&document, Format::Ass, &options);
        let constructs: Vec<&str> = conversion
            .lost_features
            .iter()
            .map(|lost| lost.construct.as_str())
            .collect();
        assert_eq!(constructs, vec![r"\k50", r"\k30"]);
        assert_eq!(conversion.document.events()[0].text(), "Hello");
    }

    #[test]
    fn karaoke_preserved_where_supported() {
        let document = document_with(&[r"{\k50}Hel{\k30}lo"]);
        let to_vtt = convert(&document, Format::WebVtt, &ConvertOptions::default());
        assert!(to_vtt.lost_features.is_empty());
        assert!(to_vtt.output.contains("Hel<00:00:00.500>lo"));

        let to_srt = convert(&document, Format::Srt, &ConvertOptions::default());
        assert_eq!(to_srt.lost_features.len(), 2);
        assert!(to_srt
            .lost_features
            .iter()
            .all(|lost| lost.feature == Feature::Karaoke));
    }

    #[test]
    fn positioning_strip() {
        let document = document_with(&[r"{\an8\pos(1,2)}Top"]);
        let options = ConvertOptions {
            positioning: PositioningHandling::Strip,
            ..ConvertOptions::default()
        };
        let conversion = convert(&document, Format::Ass, &options);
        assert_eq!(conversion.lost_features.len(), 2);
        assert_eq!(conversion.document.events()[0].text(), "Top");
    }

    #[test]
    fn emit_as_comment() {
        let document = document_with(&[r"{\fad(100,200)}Hi"]);
        let options = ConvertOptions {
            unsupported: UnsupportedHandling::EmitAsComment,
            ..ConvertOptions::default()
        };
        let conversion = convert(&document, Format::WebVtt, &options);
        assert_eq!(conversion.lost_features.len(), 1);

        let event_id = conversion.document.events()[0].id();
        assert_eq!(conversion.document.comments.len(), 1);
        let comment = &conversion.document.comments[0];
        assert_eq!(comment.anchor, Some(event_id));
        assert!(comment.text.contains(r"\fad(100,200)"));
        assert!(conversion.output.contains(r"NOTE"));

        // SRT has no comments, so this behaves like dropping.
        let to_srt = convert(&document, Format::Srt, &options);
        assert!(to_srt.document.comments.is_empty());
    }

    #[test]
    fn styles_folded_inline() {
        let mut document = Document::default();
        document.insert_style(Style {
            name: "Thoughts".to_owned(),
            italic: true,
            ..Style::default()
        });
        let mut event = Event::new("hmm").timed(0, 1000);
        event.style = "Thoughts".to_owned();
        document.push_event(event);

        let conversion = convert(&document, Format::Srt, &ConvertOptions::default());
        assert_eq!(conversion.lost_features.len(), 1);
        assert_eq!(conversion.lost_features[0].feature, Feature::Styles);
        assert!(conversion.output.contains("<i>hmm</i>"));
    }

    #[test]
    fn named_reset_switches_folded_style() {
        let mut document = Document::default();
        document.insert_style(Style {
            name: "Loud".to_owned(),
            bold: true,
            ..Style::default()
        });
        document.push_event(Event::new(r"calm {\rLoud}LOUD").timed(0, 1000));

        let conversion = convert(&document, Format::Srt, &ConvertOptions::default());
        let features: Vec<Feature> = conversion
            .lost_features
            .iter()
            .map(|lost| lost.feature)
            .collect();
        assert_eq!(features, vec![Feature::Styles]);
        assert!(conversion.output.contains("calm <b>LOUD</b>"));

        let segments = conversion.document.events()[0].materialize();
        assert_matches!(segments[1].style.bold, Some(FontWeight::BoldToggle(true)));
    }

    #[test]
    fn unknown_style_warning() {
        let mut document = Document::default();
        let mut event = Event::new("text").timed(0, 1000);
        event.style = "Missing".to_owned();
        document.push_event(Event::new("first").timed(0, 500));
        document.push_event(event);

        let conversion = convert(&document, Format::Srt, &ConvertOptions::default());
        assert_eq!(conversion.diagnostics.len(), 1);
        let diagnostic = &conversion.diagnostics[0];
        assert_eq!(diagnostic.code, ErrorCode::UnknownStyle);
        assert_eq!(diagnostic.line, 2);
        assert_eq!(conversion.document.events().len(), 2);
    }

    #[test]
    fn layers_and_actors() {
        let mut document = Document::default();
        let mut event = Event::new("sign").timed(0, 1000);
        event.layer = 2;
        event.actor = "Narrator".to_owned();
        document.push_event(event);

        let to_srt = convert(&document, Format::Srt, &ConvertOptions::default());
        let features: Vec<Feature> = to_srt.lost_features.iter().map(|lost| lost.feature).collect();
        assert_eq!(features, vec![Feature::Layers, Feature::Voice]);

        let to_vtt = convert(&document, Format::WebVtt, &ConvertOptions::default());
        assert_eq!(to_vtt.lost_features.len(), 1);
        assert!(to_vtt.output.contains("<v Narrator>sign"));
    }

    #[test]
    fn comment_events() {
        let mut document = Document::default();
        let mut note = Event::new("check timing").timed(0, 0);
        note.kind = EventKind::Comment;
        document.push_event(note);
        document.push_event(Event::new("line").timed(0, 1000));

        let to_vtt = convert(&document, Format::WebVtt, &ConvertOptions::default());
        assert!(to_vtt.lost_features.is_empty());
        assert_eq!(to_vtt.document.events().len(), 1);
        assert_eq!(to_vtt.document.comments.len(), 1);
        assert_eq!(
            to_vtt.document.comments[0].anchor,
            Some(to_vtt.document.events()[0].id())
        );

        let to_srt = convert(&document, Format::Srt, &ConvertOptions::default());
        assert_eq!(to_srt.lost_features.len(), 1);
        assert_eq!(to_srt.lost_features[0].feature, Feature::Comments);
        assert_eq!(to_srt.lost_features[0].event_index, Some(0));

        let to_ass = convert(&document, Format::Ass, &ConvertOptions::default());
        assert_eq!(to_ass.document.events()[0].kind, EventKind::Comment);
    }

    #[test]
    fn document_level_losses_come_last() {
        let mut document = document_with(&[r"{\blur1}x"]);
        document.attachments.push(Attachment {
            kind: AttachmentKind::Font,
            filename: "font.ttf".to_owned(),
            data: vec![1, 2, 3],
        });
        document
            .extra_sections
            .insert("[Aegisub Project Garbage]".to_owned(), vec!["Video File: a.mkv".to_owned()]);

        let conversion = convert(&document, Format::Srt, &ConvertOptions::default());
        let entries: Vec<(Option<usize>, Feature)> = conversion
            .lost_features
            .iter()
            .map(|lost| (lost.event_index, lost.feature))
            .collect();
        assert_eq!(
            entries,
            vec![
                (Some(0), Feature::Effects),
                (None, Feature::Fonts),
                (None, Feature::Sections),
            ]
        );
        assert!(conversion.document.attachments.is_empty());
    }

    #[test]
    fn unknown_tags() {
        let document = document_with(&[r"{\xyz}a"]);
        let conversion = convert(&document, Format::WebVtt, &ConvertOptions::default());
        assert_eq!(conversion.lost_features.len(), 1);
        assert_eq!(conversion.lost_features[0].feature, Feature::UnknownTags);

        let to_ass = convert(&document, Format::Ass, &ConvertOptions::default());
        assert!(to_ass.lost_features.is_empty());
    }

    #[test]
    fn drawings_are_dropped_with_their_commands() {
        let document = document_with(&[r"{\p1}m 0 0 l 10 0 10 10{\p0}after"]);
        let conversion = convert(&document, Format::Srt, &ConvertOptions::default());
        let constructs: Vec<&str> = conversion
            .lost_features
            .iter()
            .map(|lost| lost.construct.as_str())
            .collect();
        assert_eq!(constructs, vec![r"\p1", r"\p0"]);
        assert_eq!(conversion.document.events()[0].text(), "after");
    }

    #[test]
    fn input_is_not_modified() {
        let document = document_with(&[r"{\pos(1,2)}x"]);
        let before = document.events()[0].clone();
        let _conversion = convert(&document, Format::Sbv, &ConvertOptions::default());
        assert_eq!(document.events()[0], before);
        assert!(!document.events()[0].is_dirty());
    }

    #[test]
    fn animation_is_dropped_whole() {
        let document = document_with(&[r"{\t(0,500,\fs80\blur3)}grow"]);
        let conversion = convert(&document, Format::WebVtt, &ConvertOptions::default());
        assert_eq!(conversion.lost_features.len(), 1);
        assert_eq!(conversion.lost_features[0].feature, Feature::Animation);
        assert_matches!(
            conversion.document.events()[0].materialize()[0].effects.as_slice(),
            []
        );
    }
}

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::diagnostics::{Diagnostic, Diagnostics, ErrorCode, ErrorPolicy};
use crate::formats::Format;
use crate::subtitle::{
    Comment, DEFAULT_STYLE_NAME, Document, Event, EventId, EventKind, EventText, Style,
};
use crate::tags::{self, Drawing, Effect, Reset, StyleDelta, StyleField, TextSegment};

use super::matrix::{self, Feature, Support};
use super::{
    ConvertOptions, KaraokeHandling, LostFeature, PositioningHandling, UnsupportedHandling,
};

/// Working state of one conversion.
pub(super) struct Lowering<'a> {
    source: &'a Document,
    target: Format,
    options: &'a ConvertOptions,

    output: Document,
    lost: Vec<LostFeature>,
    diagnostics: Diagnostics,

    /// Text of commented-out events waiting for the next event to anchor to.
    pending_comments: Vec<String>,

    /// Source events that were replaced by exploded karaoke events, mapped to the first
    /// replacement.
    replaced: HashMap<EventId, EventId>,
}

impl<'a> Lowering<'a> {
    pub(super) fn new(source: &'a Document, target: Format, options: &'a ConvertOptions) -> Self {
        Self {
            source,
            target,
            options,
            output: source.clone_without_events(),
            lost: vec![],
            diagnostics: Diagnostics::new(ErrorPolicy::Collect),
            pending_comments: vec![],
            replaced: HashMap::new(),
        }
    }

    pub(super) fn finish(self) -> (Document, Vec<LostFeature>, Vec<Diagnostic>) {
        (self.output, self.lost, self.diagnostics.into_vec())
    }

    fn supports(&self, feature: Feature) -> Support {
        matrix::support(self.target, feature)
    }

    /// Record that `construct` did not make it into the output.
    fn lose(&mut self, event_index: Option<usize>, feature: Feature, construct: String) {
        let description = format!(
            "{construct} dropped: {} cannot represent {feature}",
            self.target
        );
        match event_index {
            Some(index) => log::warn!("event {index}: {description}"),
            None => log::warn!("{description}"),
        }

        if self.options.report_loss {
            self.lost.push(LostFeature {
                event_index,
                feature,
                construct,
                description,
            });
        }
    }

    /// Like [`Lowering::lose`], also remembering the construct for a comment next to the
    /// event.
    fn discard(
        &mut self,
        event_index: usize,
        feature: Feature,
        construct: String,
        discarded: &mut Vec<String>,
    ) {
        if self.options.unsupported == UnsupportedHandling::EmitAsComment {
            discarded.push(construct.clone());
        }
        self.lose(Some(event_index), feature, construct);
    }

    pub(super) fn lower_event(&mut self, index: usize, event: &Event) {
        let source = self.source;
        let fallback = Style::default();
        let style = if let Some(style) = source.style(&event.style) {
            style
        } else {
            self.diagnostics.report(
                ErrorCode::UnknownStyle,
                index + 1,
                1,
                format!("event {index} references unknown style {:?}", event.style),
            );
            source.style(DEFAULT_STYLE_NAME).unwrap_or(&fallback)
        };

        // Only ASS has commented-out events; elsewhere they become free-standing comments.
        if event.kind == EventKind::Comment && self.target != Format::Ass {
            let text = tags::strip_tags(&event.text());
            if self.supports(Feature::Comments).keeps() {
                self.pending_comments.push(text);
            } else {
                self.lose(Some(index), Feature::Comments, format!("comment {text:?}"));
            }
            return;
        }

        let mut discarded = vec![];
        let mut lowered = event.clone();

        if event.layer != 0 && !self.supports(Feature::Layers).keeps() {
            self.discard(index, Feature::Layers, format!("layer {}", event.layer), &mut discarded);
            lowered.layer = 0;
        }
        if !event.actor.is_empty() && !self.supports(Feature::Voice).keeps() {
            let construct = format!("actor {:?}", event.actor);
            self.discard(index, Feature::Voice, construct, &mut discarded);
            lowered.actor.clear();
        }
        if !event.effect.is_empty() && !self.supports(Feature::Effects).keeps() {
            let construct = format!("effect {:?}", event.effect);
            self.discard(index, Feature::Effects, construct, &mut discarded);
            lowered.effect.clear();
        }

        let fold_styles = !self.supports(Feature::Styles).keeps();
        if fold_styles && !style.is_default_looking() {
            let construct = format!("style {:?}", style.name);
            self.discard(index, Feature::Styles, construct, &mut discarded);
        }

        let mut parse_diagnostics = Diagnostics::new(ErrorPolicy::Collect);
        let segments = match event.text_state() {
            EventText::Clean { raw, .. } => tags::parse_tags_with(raw, &mut parse_diagnostics),
            EventText::Dirty { segments } => segments.clone(),
        };
        self.diagnostics.absorb(parse_diagnostics, index);

        let base = fold_styles.then_some(style);
        let segments_out = self.lower_segments(index, base, &segments, &mut discarded);

        let explode = self.options.karaoke == KaraokeHandling::Explode
            && segments_out.iter().any(|segment| segment.karaoke().is_some());

        let first_id = if explode {
            self.explode(&lowered, segments_out)
        } else {
            if segments_out != segments {
                lowered.set_segments(segments_out);
            }
            let id = lowered.id();
            self.output.push_event_keeping_id(lowered);
            Some(id)
        };

        if let Some(id) = first_id {
            if id != event.id() {
                self.replaced.insert(event.id(), id);
            }
            for text in self.pending_comments.drain(..) {
                self.output.comments.push(Comment {
                    text,
                    anchor: Some(id),
                });
            }
            if !discarded.is_empty() && self.supports(Feature::Comments).keeps() {
                self.output.comments.push(Comment {
                    text: format!("unsupported: {}", discarded.join(" ")),
                    anchor: Some(id),
                });
            }
        }
    }

    /// Remove everything the target cannot represent from `segments`. If `base` is given,
    /// the target has no styles and the inline-expressible parts of `base` are folded into
    /// every segment.
    fn lower_segments(
        &mut self,
        index: usize,
        base: Option<&Style>,
        segments: &[TextSegment],
        discarded: &mut Vec<String>,
    ) -> Vec<TextSegment> {
        let source = self.source;
        let mut folded = base.map(StyleDelta::inline_basics_of).unwrap_or_default();
        let mut previous = StyleDelta::empty();
        let mut drawing = false;
        let mut result: Vec<TextSegment> = Vec::with_capacity(segments.len());

        for segment in segments {
            let mut effects = Vec::with_capacity(segment.effects.len());
            for effect in &segment.effects {
                match effect {
                    Effect::Reset(reset) => {
                        if let Some(style) = base {
                            let target = match reset {
                                Reset::Reset => style,
                                Reset::ResetToStyle(name) => source.style(name).unwrap_or(style),
                            };
                            folded = StyleDelta::inline_basics_of(target);
                        }
                    }
                    Effect::Drawing(Drawing::Mode(scale)) => drawing = *scale > 0,
                    _ => {}
                }

                if self.keep_effect(index, effect, discarded) {
                    effects.push(effect.clone());
                }
            }

            let mut style = folded.clone();
            style.override_from(&segment.style);

            let mut kept = style.clone();
            for field in StyleField::ALL.iter().copied() {
                let feature = Feature::of_style_field(field);
                if !style.is_set(field) || self.supports(feature).keeps() {
                    continue;
                }
                if style.differs_in(&previous, field) {
                    self.discard(index, feature, style.field_tag(field), discarded);
                }
                kept.clear(field);
            }
            previous = style;

            let text = if drawing && !self.supports(Feature::Drawing).keeps() {
                String::new()
            } else {
                segment.text.clone()
            };

            push_merged(
                &mut result,
                TextSegment {
                    text,
                    style: kept,
                    effects,
                },
            );
        }

        result
    }

    fn keep_effect(&mut self, index: usize, effect: &Effect, discarded: &mut Vec<String>) -> bool {
        let Some(feature) = Feature::of_effect(effect) else {
            return self.supports(Feature::Styles).keeps();
        };

        let forced_out = match feature {
            // Exploded events are timed by syllable durations alone, so other karaoke tags
            // like `\kt` have nothing left to apply to.
            Feature::Karaoke => match self.options.karaoke {
                KaraokeHandling::Explode if matches!(effect, Effect::Karaoke(_)) => return true,
                KaraokeHandling::Explode | KaraokeHandling::Strip => true,
                KaraokeHandling::Preserve => false,
            },
            Feature::Position => self.options.positioning == PositioningHandling::Strip,
            _ => false,
        };

        if !forced_out && self.supports(feature).keeps() {
            return true;
        }

        self.discard(index, feature, effect.to_string(), discarded);
        false
    }

    /// Replace `parent` with one event per karaoke syllable. Text before the first syllable
    /// belongs to the first one. Returns the id of the first new event.
    fn explode(&mut self, parent: &Event, segments: Vec<TextSegment>) -> Option<EventId> {
        let mut syllables: Vec<(i64, Vec<TextSegment>)> = vec![];
        let mut leading = vec![];

        for mut segment in segments {
            let duration = segment.karaoke().map(|karaoke| karaoke.duration_ms.max(0));
            segment
                .effects
                .retain(|effect| Feature::of_effect(effect) != Some(Feature::Karaoke));

            match (duration, syllables.last_mut()) {
                (Some(duration), _) => {
                    let mut group = std::mem::take(&mut leading);
                    push_merged(&mut group, segment);
                    syllables.push((duration, group));
                }
                (None, Some((_, group))) => push_merged(group, segment),
                (None, None) => push_merged(&mut leading, segment),
            }
        }

        log::debug!(
            "exploding event {} into {} karaoke events",
            parent.id(),
            syllables.len()
        );

        let mut first_id = None;
        let mut elapsed: i64 = 0;
        for (duration, group) in syllables {
            let start = parent.start.saturating_add(elapsed).min(parent.end).max(parent.start);
            let end = start.saturating_add(duration).min(parent.end).max(start);
            elapsed = elapsed.saturating_add(duration);

            let mut syllable = parent.clone().timed(start, end);
            syllable.set_segments(group);
            let id = self.output.push_event(syllable);
            first_id.get_or_insert(id);
        }

        first_id
    }

    /// Drop document-level data the target has no place for.
    pub(super) fn lower_document(&mut self) {
        let leftover = std::mem::take(&mut self.pending_comments);
        self.output
            .comments
            .extend(leftover.into_iter().map(Comment::new));

        for comment in &mut self.output.comments {
            if let Some(anchor) = comment.anchor.and_then(|anchor| self.replaced.get(&anchor)) {
                comment.anchor = Some(*anchor);
            }
        }

        if !self.supports(Feature::Comments).keeps() {
            for comment in std::mem::take(&mut self.output.comments) {
                self.lose(None, Feature::Comments, format!("comment {:?}", comment.text));
            }
        }

        if !self.supports(Feature::Fonts).keeps() {
            for attachment in std::mem::take(&mut self.output.attachments) {
                self.lose(None, Feature::Fonts, format!("attachment {}", attachment.filename));
            }
        }

        if !self.supports(Feature::Regions).keeps() {
            for region in std::mem::take(&mut self.output.regions) {
                self.lose(None, Feature::Regions, format!("region {}", region.id));
            }
        }

        let target = self.target;
        let (kept, dropped): (IndexMap<_, _>, IndexMap<_, _>) =
            std::mem::take(&mut self.output.extra_sections)
                .into_iter()
                .partition(|(key, _)| matrix::writes_section(target, key));
        self.output.extra_sections = kept;
        for (key, _) in dropped {
            self.lose(None, Feature::Sections, format!("section {key}"));
        }
    }
}

/// Append `segment`, merging it into the previous one if it introduces nothing new.
fn push_merged(segments: &mut Vec<TextSegment>, segment: TextSegment) {
    if let Some(last) = segments.last_mut() {
        if segment.effects.is_empty() && segment.style == last.style {
            last.text.push_str(&segment.text);
            return;
        }
    }
    segments.push(segment);
}

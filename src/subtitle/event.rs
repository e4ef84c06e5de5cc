use std::borrow::Cow;
use std::fmt;

use once_cell::unsync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::diagnostics::Diagnostics;
use crate::tags::{self, TextSegment};

use super::Margins;

/// Stable identity of an event within one document. Ids are allocated by the document's
/// [`IdAllocator`] and never reused, so they survive reordering, insertion and deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventId(u64);

impl EventId {
    /// The id of an event that has not been added to a document yet.
    pub const UNASSIGNED: EventId = EventId(0);

    #[must_use]
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "#{}", self.0)
    }
}

/// Hands out increasing event ids, starting at 1 unless seeded otherwise.
#[derive(Debug, Clone)]
pub struct IdAllocator {
    next: u64,
}

impl IdAllocator {
    /// An allocator whose first id is `first`, for deterministic ids in tests and when
    /// merging documents. 0 is reserved for [`EventId::UNASSIGNED`] and is skipped.
    #[must_use]
    pub fn seeded(first: u64) -> Self {
        Self {
            next: first.max(1),
        }
    }

    pub fn allocate(&mut self) -> EventId {
        let id = EventId(self.next);
        self.next += 1;
        id
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::seeded(1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EventKind {
    #[default]
    Dialogue,

    /// Commented-out events are kept but not displayed.
    Comment,
}

/// The text of an event, in one of two states.
///
/// A freshly parsed event is `Clean`: its raw text is authoritative and is written back out
/// byte for byte. Segments are parsed from it lazily, on first access, and cached. Reading
/// the segments does not change the state.
///
/// Once the segments have been edited the event becomes `Dirty`: the segments are
/// authoritative and the raw text is regenerated from them on output.
#[derive(Debug, Clone)]
pub enum EventText {
    Clean {
        raw: String,
        cache: OnceCell<Vec<TextSegment>>,
    },
    Dirty {
        segments: Vec<TextSegment>,
    },
}

impl EventText {
    #[must_use]
    pub fn clean(raw: String) -> Self {
        Self::Clean {
            raw,
            cache: OnceCell::new(),
        }
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        matches!(self, Self::Dirty { .. })
    }
}

impl PartialEq for EventText {
    /// Two texts are equal if they produce the same output, regardless of state.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Clean { raw: left, .. }, Self::Clean { raw: right, .. }) => left == right,
            (Self::Dirty { segments: left }, Self::Dirty { segments: right }) => left == right,
            _ => false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    id: EventId,
    pub kind: EventKind,

    /// The time in milliseconds when this event first appears.
    pub start: i64,

    /// The time in milliseconds when this event disappears.
    pub end: i64,

    /// Elements on layers with higher numbers are shown above those on layers
    /// with lower numbers.
    pub layer: i32,

    /// Name of the style used for this event.
    pub style: String,

    /// ASS calls this “Name”, WebVTT has voice spans for it.
    pub actor: String,

    /// Margins of 0 mean the style's margins are used.
    pub margins: Margins,

    /// Legacy whole-event effect like `Banner;...`.
    pub effect: String,

    text: EventText,
}

impl Event {
    /// A dialogue event with the given raw text, using the default style. It has no id until
    /// it is added to a document.
    #[must_use]
    pub fn new<S>(raw_text: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            id: EventId::UNASSIGNED,
            kind: EventKind::Dialogue,
            start: 0,
            end: 0,
            layer: 0,
            style: super::DEFAULT_STYLE_NAME.to_owned(),
            actor: String::new(),
            margins: Margins::default(),
            effect: String::new(),
            text: EventText::clean(raw_text.into()),
        }
    }

    #[must_use]
    pub fn timed(mut self, start: i64, end: i64) -> Self {
        self.start = start;
        self.end = end;
        self
    }

    #[must_use]
    pub fn id(&self) -> EventId {
        self.id
    }

    pub(crate) fn set_id(&mut self, id: EventId) {
        self.id = id;
    }

    #[must_use]
    pub fn duration(&self) -> i64 {
        self.end.saturating_sub(self.start)
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.text.is_dirty()
    }

    #[must_use]
    pub fn text_state(&self) -> &EventText {
        &self.text
    }

    /// The raw text of this event: the original text while it is clean, or the text
    /// generated from its segments once it is dirty.
    #[must_use]
    pub fn text(&self) -> Cow<'_, str> {
        match &self.text {
            EventText::Clean { raw, .. } => Cow::Borrowed(raw),
            EventText::Dirty { segments } => Cow::Owned(tags::serialize_tags(segments)),
        }
    }

    /// Replace the raw text. The event becomes clean again.
    pub fn set_text<S>(&mut self, raw_text: S)
    where
        S: Into<String>,
    {
        self.text = EventText::clean(raw_text.into());
    }

    /// The segments of this event's text, parsing and caching them on first access.
    pub fn materialize(&self) -> &[TextSegment] {
        match &self.text {
            EventText::Clean { raw, cache } => cache.get_or_init(|| {
                log::debug!("materializing segments of event {}", self.id);
                tags::parse_tags(raw)
            }),
            EventText::Dirty { segments } => segments,
        }
    }

    /// Like [`Event::materialize`], reporting problems found in the text on first parse.
    pub fn materialize_with(&self, diagnostics: &mut Diagnostics) -> &[TextSegment] {
        match &self.text {
            EventText::Clean { raw, cache } => cache.get_or_init(|| {
                log::debug!("materializing segments of event {}", self.id);
                tags::parse_tags_with(raw, diagnostics)
            }),
            EventText::Dirty { segments } => segments,
        }
    }

    /// Mutable access to the segments. This makes the event dirty, since the caller may
    /// change them.
    pub fn segments_mut(&mut self) -> &mut Vec<TextSegment> {
        self.mark_dirty();
        let EventText::Dirty { segments } = &mut self.text else {
            unreachable!("mark_dirty leaves the event dirty");
        };
        segments
    }

    /// Replace the segments, making the event dirty.
    pub fn set_segments(&mut self, segments: Vec<TextSegment>) {
        self.text = EventText::Dirty { segments };
    }

    /// Switch to the dirty state, materializing segments if needed. Output will be
    /// regenerated from the segments from now on.
    pub fn mark_dirty(&mut self) {
        if let EventText::Clean { raw, cache } = &mut self.text {
            let segments = cache.take().unwrap_or_else(|| tags::parse_tags(raw));
            self.text = EventText::Dirty { segments };
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches2::assert_matches;

    use crate::diagnostics::{ErrorCode, ErrorPolicy};

    use super::*;

    #[test]
    fn reading_keeps_event_clean() {
        let event = Event::new(r"{\b1}Hello {\xyz}world");
        assert_eq!(event.materialize().len(), 2);
        assert!(!event.is_dirty());
        assert_eq!(event.text(), r"{\b1}Hello {\xyz}world");
    }

    #[test]
    fn editing_makes_event_dirty() {
        let mut event = Event::new(r"{\i1}Hello");
        event.segments_mut()[0].text = "Goodbye".to_owned();
        assert!(event.is_dirty());
        assert_eq!(event.text(), r"{\i1}Goodbye");

        event.set_text("plain");
        assert!(!event.is_dirty());
        assert_eq!(event.materialize()[0].text, "plain");
    }

    #[test]
    fn editing_after_reading_uses_cached_segments() {
        let mut event = Event::new(r"{\b1}bold{\b0} plain");
        assert_eq!(event.materialize().len(), 2);
        assert!(!event.is_dirty());

        let segments = event.segments_mut();
        assert_eq!(segments.len(), 2);
        segments.pop();
        assert!(event.is_dirty());
        assert_eq!(event.text(), r"{\b1}bold");
    }

    #[test]
    fn mark_dirty_regenerates() {
        let mut event = Event::new(r"{\b1 }x");
        event.mark_dirty();
        assert_matches!(event.text_state(), EventText::Dirty { segments });
        assert_eq!(segments.len(), 1);
    }

    #[test]
    fn diagnostics_on_first_parse() {
        let event = Event::new(r"Hi {\b1");
        let mut diagnostics = Diagnostics::new(ErrorPolicy::Collect);
        event.materialize_with(&mut diagnostics);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics.iter().next().map(|diagnostic| diagnostic.code),
            Some(ErrorCode::UnclosedTag)
        );

        // Cached now, so nothing is reported twice.
        event.materialize_with(&mut diagnostics);
        assert_eq!(diagnostics.len(), 1);
    }

    #[test]
    fn allocator() {
        let mut allocator = IdAllocator::default();
        assert_eq!(allocator.allocate().get(), 1);
        assert_eq!(allocator.allocate().get(), 2);
        assert_eq!(IdAllocator::seeded(0).allocate().get(), 1);
        assert_eq!(EventId::UNASSIGNED.to_string(), "#0");
    }
}

//! The format-independent subtitle document: script metadata, named styles, an ordered list of
//! events, and the side data (comments, attachments, regions, unknown sections) that some
//! formats carry.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

mod event;
pub(crate) mod uu;

pub use event::{Event, EventId, EventKind, EventText, IdAllocator};

/// Name of the style every document is created with, and the one events fall back to when
/// the style they reference does not exist.
pub const DEFAULT_STYLE_NAME: &str = "Default";

#[derive(Debug, Clone)]
pub struct Document {
    pub script_info: ScriptInfo,

    /// Keyed by [`Style::name`]; insertion order is the order styles are written in.
    styles: IndexMap<String, Style>,
    events: Vec<Event>,

    pub comments: Vec<Comment>,
    pub attachments: Vec<Attachment>,
    pub regions: Vec<Region>,

    /// Sections no reader understood, stored verbatim under their header so they can be
    /// written back out by the format they came from.
    pub extra_sections: IndexMap<String, Vec<String>>,

    ids: IdAllocator,
}

impl Document {
    /// A document with no styles at all, not even the default one.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            script_info: ScriptInfo::default(),
            styles: IndexMap::new(),
            events: vec![],
            comments: vec![],
            attachments: vec![],
            regions: vec![],
            extra_sections: IndexMap::new(),
            ids: IdAllocator::default(),
        }
    }

    /// Use `allocator` for all event ids handed out from now on.
    #[must_use]
    pub fn with_id_allocator(mut self, allocator: IdAllocator) -> Self {
        self.ids = allocator;
        self
    }

    #[must_use]
    pub fn styles(&self) -> &IndexMap<String, Style> {
        &self.styles
    }

    #[must_use]
    pub fn style(&self, name: &str) -> Option<&Style> {
        self.styles.get(name)
    }

    pub fn style_mut(&mut self, name: &str) -> Option<&mut Style> {
        self.styles.get_mut(name)
    }

    /// Insert or replace the style with the same name. A replaced style keeps its position.
    pub fn insert_style(&mut self, style: Style) -> Option<Style> {
        self.styles.insert(style.name.clone(), style)
    }

    pub fn remove_style(&mut self, name: &str) -> Option<Style> {
        self.styles.shift_remove(name)
    }

    /// Rename a style in place, keeping its position. Events referencing the old name are not
    /// touched. Returns false if `old` does not exist or `new` is already taken.
    pub fn rename_style(&mut self, old: &str, new: &str) -> bool {
        if self.styles.contains_key(new) {
            return false;
        }

        let Some((index, _, mut style)) = self.styles.shift_remove_full(old) else {
            return false;
        };
        new.clone_into(&mut style.name);
        self.styles.shift_insert(index, new.to_owned(), style);
        true
    }

    /// The style `event` references. Events whose style does not exist fall back to the
    /// default style, if the document has one.
    #[must_use]
    pub fn style_for(&self, event: &Event) -> Option<&Style> {
        self.styles
            .get(&event.style)
            .or_else(|| self.styles.get(DEFAULT_STYLE_NAME))
    }

    #[must_use]
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Mutable access to the events. This is a slice so that events cannot be added without
    /// going through [`Document::push_event`], which assigns ids.
    pub fn events_mut(&mut self) -> &mut [Event] {
        &mut self.events
    }

    #[must_use]
    pub fn event(&self, id: EventId) -> Option<&Event> {
        self.events.iter().find(|event| event.id() == id)
    }

    pub fn event_mut(&mut self, id: EventId) -> Option<&mut Event> {
        self.events.iter_mut().find(|event| event.id() == id)
    }

    #[must_use]
    pub fn position_of(&self, id: EventId) -> Option<usize> {
        self.events.iter().position(|event| event.id() == id)
    }

    /// Append `event`, giving it a fresh id (any id it had is replaced).
    pub fn push_event(&mut self, mut event: Event) -> EventId {
        let id = self.ids.allocate();
        event.set_id(id);
        self.events.push(event);
        id
    }

    /// Insert `event` at `index` with a fresh id.
    ///
    /// # Panics
    /// Panics if `index > events().len()`.
    pub fn insert_event(&mut self, index: usize, mut event: Event) -> EventId {
        let id = self.ids.allocate();
        event.set_id(id);
        self.events.insert(index, event);
        id
    }

    /// Remove the event with the given id. Its id is never handed out again.
    pub fn remove_event(&mut self, id: EventId) -> Option<Event> {
        let index = self.position_of(id)?;
        Some(self.events.remove(index))
    }

    /// Insert a copy of the event with the given id right after it, under a fresh id.
    pub fn duplicate_event(&mut self, id: EventId) -> Option<EventId> {
        let index = self.position_of(id)?;
        let copy = self.events[index].clone();
        Some(self.insert_event(index + 1, copy))
    }

    /// Append an event that already carries an id from this document's allocator.
    pub(crate) fn push_event_keeping_id(&mut self, event: Event) {
        self.events.push(event);
    }

    /// A copy of this document without any events, sharing the id allocator state so that
    /// ids allocated from the copy never collide with ids in `self`.
    pub(crate) fn clone_without_events(&self) -> Self {
        Self {
            script_info: self.script_info.clone(),
            styles: self.styles.clone(),
            events: vec![],
            comments: self.comments.clone(),
            attachments: self.attachments.clone(),
            regions: self.regions.clone(),
            extra_sections: self.extra_sections.clone(),
            ids: self.ids.clone(),
        }
    }
}

impl Default for Document {
    /// An empty document containing only the default style.
    fn default() -> Self {
        let mut document = Self::empty();
        document.insert_style(Style::default());
        document
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScriptInfo {
    pub title: String,

    /// ASS calls this “Original Script”.
    pub author: String,

    pub playback_resolution: Resolution,
    pub wrap_style: WrapStyle,
    pub scaled_border_and_shadow: bool,

    /// All other `Key: Value` pairs, in source order.
    pub extra_info: IndexMap<String, String>,
}

impl Default for ScriptInfo {
    fn default() -> Self {
        Self {
            title: String::new(),
            author: String::new(),
            playback_resolution: Resolution::default(),
            wrap_style: WrapStyle::SmartEven,
            scaled_border_and_shadow: true,
            extra_info: IndexMap::new(),
        }
    }
}

/// Element- or style-specific left, right, and vertical margins
/// in pixels, corresponding to ASS `MarginL` etc.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Margins {
    pub left: i32,
    pub right: i32,
    pub vertical: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub x: i32,
    pub y: i32,
}

impl Default for Resolution {
    fn default() -> Self {
        // This is not the default libass uses (which is 384x288),
        // but it seems like a reasonable default for a modern age.
        Self { x: 1920, y: 1080 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Colour {
    pub red: u8,
    pub green: u8,
    pub blue: u8,

    /// How transparent this colour is. 255 means fully transparent.
    /// Corresponds to what libass confusingly calls “alpha”.
    pub transparency: u8,
}

impl Colour {
    pub const WHITE: Self = Self::opaque(255, 255, 255);
    pub const BLACK: Self = Self::opaque(0, 0, 0);
    pub const RED: Self = Self::opaque(255, 0, 0);

    #[must_use]
    pub const fn opaque(red: u8, green: u8, blue: u8) -> Self {
        Self {
            red,
            green,
            blue,
            transparency: 0,
        }
    }

    /// Converts a 32-bit packed `0xRRGGBBTT` colour into a `Colour`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn unpack(packed: u32) -> Self {
        Self {
            red: ((packed & 0xff00_0000) >> 24) as u8,
            green: ((packed & 0x00ff_0000) >> 16) as u8,
            blue: ((packed & 0x0000_ff00) >> 8) as u8,
            transparency: (packed & 0x0000_00ff) as u8,
        }
    }

    /// Converts a colour into its 32-bit packed `0xRRGGBBTT` value.
    #[must_use]
    pub fn pack(&self) -> u32 {
        u32::from(self.red) << 24
            | u32::from(self.green) << 16
            | u32::from(self.blue) << 8
            | u32::from(self.transparency)
    }

    /// The colour without its transparency, as `0xRRGGBB`.
    #[must_use]
    pub fn rgb(&self) -> u32 {
        self.pack() >> 8
    }

    /// Parse a style colour as it appears in ASS style lines: `&HTTBBGGRR`, with the
    /// transparency byte optional. Like libass, plain decimal numbers are accepted too.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_ass(value: &str) -> Option<Self> {
        let value = value.trim();
        let packed = match value
            .strip_prefix("&H")
            .or_else(|| value.strip_prefix("&h"))
        {
            Some(hex) => u32::from_str_radix(hex.trim_end_matches('&'), 16).ok()?,
            None => u32::try_from(value.parse::<i64>().ok()?).ok()?,
        };

        Some(Self {
            red: (packed & 0xff) as u8,
            green: ((packed >> 8) & 0xff) as u8,
            blue: ((packed >> 16) & 0xff) as u8,
            transparency: ((packed >> 24) & 0xff) as u8,
        })
    }

    #[must_use]
    pub fn to_ass(&self) -> String {
        format!(
            "&H{:02X}{:02X}{:02X}{:02X}",
            self.transparency, self.blue, self.green, self.red
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Alignment {
    pub vertical: VerticalAlignment,
    pub horizontal: HorizontalAlignment,
}

impl Alignment {
    /// Interpret a numpad-style alignment number, as used in ASS styles and the `\an` tag.
    #[must_use]
    pub fn from_an(an: i32) -> Option<Self> {
        if !(1..=9).contains(&an) {
            return None;
        }
        let vertical = match (an - 1).div_euclid(3) {
            0 => VerticalAlignment::Sub,
            1 => VerticalAlignment::Center,
            2 => VerticalAlignment::Top,
            _ => return None,
        };
        let horizontal = match (an - 1).rem_euclid(3) {
            0 => HorizontalAlignment::Left,
            1 => HorizontalAlignment::Center,
            _ => HorizontalAlignment::Right,
        };

        Some(Self {
            vertical,
            horizontal,
        })
    }

    /// Interpret an SSA alignment number: 1-3 for subtitles, plus 4 for the top row and
    /// plus 8 for the middle row.
    #[must_use]
    pub fn from_legacy(a: i32) -> Option<Self> {
        match a {
            1..=3 => Self::from_an(a),
            5..=7 => Self::from_an(a + 2),
            9..=11 => Self::from_an(a - 5),
            _ => None,
        }
    }

    /// Convert to a number to be used in the `\an` formatting tag.
    #[must_use]
    pub fn as_an(&self) -> i32 {
        let row = match self.vertical {
            VerticalAlignment::Sub => 0,
            VerticalAlignment::Center => 3,
            VerticalAlignment::Top => 6,
        };
        let column = match self.horizontal {
            HorizontalAlignment::Left => 1,
            HorizontalAlignment::Center => 2,
            HorizontalAlignment::Right => 3,
        };
        row + column
    }
}

impl Default for Alignment {
    fn default() -> Self {
        Self {
            vertical: VerticalAlignment::Sub,
            horizontal: HorizontalAlignment::Center,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VerticalAlignment {
    Sub,
    Center,
    Top,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HorizontalAlignment {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BorderStyle {
    /// Normal border style, with outline and shadow.
    Outline = 1,

    /// What happens when you click “Opaque Box” in Aegisub.
    OpaqueBox = 3,
}

impl From<i32> for BorderStyle {
    fn from(value: i32) -> Self {
        match value {
            // libass treats its own style 4 mostly like an opaque box
            3 | 4 => Self::OpaqueBox,
            _ => Self::Outline,
        }
    }
}

/// See http://www.tcax.org/docs/ass-specs.htm
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WrapStyle {
    SmartEven = 0,
    EndOfLine = 1,
    None = 2,
    SmartLower = 3,
}

impl From<i32> for WrapStyle {
    fn from(value: i32) -> Self {
        match value {
            1 => Self::EndOfLine,
            2 => Self::None,
            3 => Self::SmartLower,
            _ => Self::SmartEven,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Style {
    pub name: String,
    pub font_name: String,
    pub font_size: f64,

    pub primary_colour: Colour,
    pub secondary_colour: Colour,
    pub outline_colour: Colour,
    pub back_colour: Colour,

    pub bold: bool,
    pub italic: bool,
    pub underline: bool,
    pub strike_out: bool,

    /// Percent; 100 is unscaled.
    pub scale_x: f64,
    pub scale_y: f64,
    pub spacing: f64,

    /// Degrees, around the z axis.
    pub angle: f64,

    /// Not expressible in ASS style lines, only through `\fax`/`\fay`. Kept so that formats
    /// with style-level shear do not have to bake it into every event.
    pub shear: f64,

    pub border_style: BorderStyle,
    pub outline: f64,
    pub shadow: f64,

    pub alignment: Alignment,
    pub margins: Margins,

    /// “Windows font charset number”
    /// `-1` = autodetect, Aegisub's default seems to be `1`
    pub encoding: i32,
}

impl Default for Style {
    fn default() -> Self {
        Self {
            name: DEFAULT_STYLE_NAME.to_owned(),
            font_name: "Arial".to_owned(),
            font_size: 48.0,
            primary_colour: Colour::WHITE,
            secondary_colour: Colour::RED,
            outline_colour: Colour::BLACK,
            back_colour: Colour::BLACK,
            bold: false,
            italic: false,
            underline: false,
            strike_out: false,
            scale_x: 100.0,
            scale_y: 100.0,
            spacing: 0.0,
            angle: 0.0,
            shear: 0.0,
            border_style: BorderStyle::Outline,
            outline: 2.0,
            shadow: 2.0,
            alignment: Alignment::default(),
            margins: Margins {
                left: 10,
                right: 10,
                vertical: 10,
            },
            encoding: 1,
        }
    }
}

impl Style {
    /// Whether this style looks any different from the default style, regardless of its name.
    #[must_use]
    pub fn is_default_looking(&self) -> bool {
        let default = Style {
            name: self.name.clone(),
            ..Style::default()
        };
        *self == default
    }
}

/// A free-standing comment. Formats that keep comments next to events (WebVTT `NOTE` blocks,
/// ASS `;` lines inside `[Events]`) record the event that follows as the anchor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comment {
    pub text: String,
    pub anchor: Option<EventId>,
}

impl Comment {
    #[must_use]
    pub fn new<S>(text: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            text: text.into(),
            anchor: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttachmentKind {
    Font,
    Graphic,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub kind: AttachmentKind,
    pub filename: String,

    /// The decoded attachment contents.
    pub data: Vec<u8>,
}

/// A WebVTT region definition. `settings` are the `key:value` lines after the `REGION` line,
/// kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub id: String,
    pub settings: Vec<String>,
}

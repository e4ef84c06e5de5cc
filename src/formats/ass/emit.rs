//! Writing `.ass` files. Sections are written in the order Aegisub uses, separated by
//! blank lines.

use crate::subtitle::{
    AttachmentKind, BorderStyle, Document, Event, EventId, EventKind, Style, WrapStyle, uu,
};

use super::{EVENT_FORMAT, SCRIPT_TYPE, STYLE_FORMAT};

pub(super) fn emit(document: &Document) -> String {
    let mut sections = vec![script_info(document), styles(document)];
    sections.extend(attachments(document, AttachmentKind::Font, "[Fonts]", "fontname"));
    sections.extend(attachments(document, AttachmentKind::Graphic, "[Graphics]", "filename"));
    sections.push(events(document));

    // Sections read from other formats (like WebVTT `STYLE` blocks) have no bracketed header
    // and no meaning here.
    sections.extend(
        document
            .extra_sections
            .iter()
            .filter(|(header, _)| header.starts_with('['))
            .map(|(header, lines)| section(header, lines.iter().cloned())),
    );

    sections.join("\n")
}

/// A header and its lines, ending in a newline.
fn section<I>(header: &str, lines: I) -> String
where
    I: IntoIterator<Item = String>,
{
    let mut all = vec![header.to_owned()];
    all.extend(lines);
    all.push(String::new());
    all.join("\n")
}

/// Comments that are not written next to an event.
fn is_free_comment(document: &Document, anchor: Option<EventId>) -> bool {
    anchor.is_none_or(|id| document.event(id).is_none())
}

fn script_info(document: &Document) -> String {
    let info = &document.script_info;
    let mut lines: Vec<String> = document
        .comments
        .iter()
        .filter(|comment| is_free_comment(document, comment.anchor))
        .map(|comment| format!("; {}", comment.text))
        .collect();

    if !info.title.is_empty() {
        lines.push(format!("Title: {}", info.title));
    }
    if !info.author.is_empty() {
        lines.push(format!("Original Script: {}", info.author));
    }
    lines.push(format!(
        "{SCRIPT_TYPE}: {}",
        info.extra_info
            .get(SCRIPT_TYPE)
            .map_or("v4.00+", String::as_str)
    ));
    lines.push(format!("WrapStyle: {}", wrap_style_number(info.wrap_style)));
    lines.push(format!(
        "ScaledBorderAndShadow: {}",
        if info.scaled_border_and_shadow { "yes" } else { "no" }
    ));
    lines.extend(
        info.extra_info
            .iter()
            .filter(|(key, _)| *key != SCRIPT_TYPE)
            .map(|(key, value)| format!("{key}: {value}")),
    );
    lines.push(format!("PlayResX: {}", info.playback_resolution.x));
    lines.push(format!("PlayResY: {}", info.playback_resolution.y));

    section("[Script Info]", lines)
}

fn styles(document: &Document) -> String {
    let mut lines = vec![format!("Format: {}", STYLE_FORMAT.join(", "))];
    lines.extend(document.styles().values().map(style_line));
    section("[V4+ Styles]", lines)
}

fn style_line(style: &Style) -> String {
    let fields = [
        style.name.clone(),
        style.font_name.clone(),
        style.font_size.to_string(),
        style.primary_colour.to_ass(),
        style.secondary_colour.to_ass(),
        style.outline_colour.to_ass(),
        style.back_colour.to_ass(),
        flag(style.bold),
        flag(style.italic),
        flag(style.underline),
        flag(style.strike_out),
        style.scale_x.to_string(),
        style.scale_y.to_string(),
        style.spacing.to_string(),
        style.angle.to_string(),
        border_style_number(style.border_style).to_string(),
        style.outline.to_string(),
        style.shadow.to_string(),
        style.alignment.as_an().to_string(),
        style.margins.left.to_string(),
        style.margins.right.to_string(),
        style.margins.vertical.to_string(),
        style.encoding.to_string(),
    ];
    format!("Style: {}", fields.join(","))
}

fn attachments(
    document: &Document,
    kind: AttachmentKind,
    header: &str,
    key: &str,
) -> Option<String> {
    let mut lines = vec![];
    for attachment in document
        .attachments
        .iter()
        .filter(|attachment| attachment.kind == kind)
    {
        lines.push(format!("{key}: {}", attachment.filename));
        lines.extend(uu::encode_lines(&attachment.data));
    }
    (!lines.is_empty()).then(|| section(header, lines))
}

fn events(document: &Document) -> String {
    let mut lines = vec![format!("Format: {}", EVENT_FORMAT.join(", "))];
    for event in document.events() {
        lines.extend(
            document
                .comments
                .iter()
                .filter(|comment| comment.anchor == Some(event.id()))
                .map(|comment| format!("; {}", comment.text)),
        );
        lines.push(event_line(event));
    }
    section("[Events]", lines)
}

fn event_line(event: &Event) -> String {
    let kind = match event.kind {
        EventKind::Dialogue => "Dialogue",
        EventKind::Comment => "Comment",
    };
    format!(
        "{kind}: {},{},{},{},{},{},{},{},{},{}",
        event.layer,
        timecode(event.start),
        timecode(event.end),
        event.style,
        event.actor,
        event.margins.left,
        event.margins.right,
        event.margins.vertical,
        event.effect,
        event.text()
    )
}

/// `H:MM:SS.CC`, rounded to centiseconds.
fn timecode(ms: i64) -> String {
    let centiseconds = ms.max(0).saturating_add(5) / 10;
    format!(
        "{}:{:02}:{:02}.{:02}",
        centiseconds / 360_000,
        centiseconds / 6000 % 60,
        centiseconds / 100 % 60,
        centiseconds % 100
    )
}

fn flag(value: bool) -> String {
    if value { "-1" } else { "0" }.to_owned()
}

fn border_style_number(border_style: BorderStyle) -> i32 {
    match border_style {
        BorderStyle::Outline => 1,
        BorderStyle::OpaqueBox => 3,
    }
}

fn wrap_style_number(wrap_style: WrapStyle) -> i32 {
    match wrap_style {
        WrapStyle::SmartEven => 0,
        WrapStyle::EndOfLine => 1,
        WrapStyle::None => 2,
        WrapStyle::SmartLower => 3,
    }
}

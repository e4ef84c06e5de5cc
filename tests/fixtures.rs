//! Reading and writing the files in `test_files/`.

use assert_matches2::assert_matches;

use henkan::{ErrorCode, ErrorPolicy, EventKind, Format, ParseOptions};

const ROUNDTRIP_ASS: &str = include_str!("../test_files/roundtrip.ass");
const TEN_EVENTS_ASS: &str = include_str!("../test_files/ten_events.ass");

fn init_logging() {
    env_logger::builder().is_test(true).try_init().ok();
}

#[test]
fn ass_is_written_back_unchanged() {
    init_logging();
    let result = Format::Ass.parse(ROUNDTRIP_ASS, &ParseOptions::default());
    assert!(result.ok);
    assert!(result.warnings.is_empty());

    let document = &result.document;
    assert_eq!(document.events().len(), 5);
    assert_eq!(document.styles().len(), 2);
    assert_eq!(document.script_info.title, "henkan fixture");
    assert_eq!(document.events()[2].kind, EventKind::Comment);

    assert_eq!(Format::Ass.serialize(document), ROUNDTRIP_ASS);
}

#[test]
fn reading_segments_keeps_the_text() {
    init_logging();
    let result = Format::Ass.parse(ROUNDTRIP_ASS, &ParseOptions::default());
    for event in result.document.events() {
        let _segments = event.materialize();
        assert!(!event.is_dirty());
    }
    assert_eq!(Format::Ass.serialize(&result.document), ROUNDTRIP_ASS);
}

#[test]
fn edited_event_is_regenerated() {
    init_logging();
    let mut result = Format::Ass.parse(ROUNDTRIP_ASS, &ParseOptions::default());
    let event = &mut result.document.events_mut()[1];
    event.segments_mut()[0].text = "Goodbye".to_owned();
    assert!(event.is_dirty());

    let output = Format::Ass.serialize(&result.document);
    assert!(output.contains(r",Alice,0,0,0,,{\i1}Goodbye{\i0}, world!\NSecond line"));
    assert_ne!(output, ROUNDTRIP_ASS);
}

#[test]
fn malformed_event_is_collected() {
    init_logging();
    let result = Format::Ass.parse(TEN_EVENTS_ASS, &ParseOptions::default());

    assert!(!result.ok);
    assert_eq!(result.document.events().len(), 9);
    assert_matches!(result.errors.as_slice(), [error]);
    assert_eq!(error.code, ErrorCode::MalformedEvent);
    assert_eq!(error.line, 16);
    assert!(result.warnings.is_empty());
}

#[test]
fn malformed_event_is_skipped() {
    init_logging();
    let options = ParseOptions {
        on_error: ErrorPolicy::Skip,
        ..ParseOptions::default()
    };
    let result = Format::Ass.parse(TEN_EVENTS_ASS, &options);

    assert!(result.ok);
    assert!(result.errors.is_empty());
    assert_eq!(result.document.events().len(), 9);
    let texts: Vec<String> = result
        .document
        .events()
        .iter()
        .map(|event| event.text().into_owned())
        .collect();
    assert_eq!(texts[3..5], ["four".to_owned(), "six".to_owned()]);
}

#[test]
fn bytes_with_bom_and_bad_utf8() {
    init_logging();
    let mut bytes = b"\xef\xbb\xbf1\n00:00:01,000 --> 00:00:02,000\nok\xff\n".to_vec();
    let result = henkan::parse_bytes(&bytes, Format::Srt, &ParseOptions::default());
    assert_matches!(result.errors.as_slice(), [error]);
    assert_eq!(error.code, ErrorCode::InvalidEncoding);
    assert_eq!((error.line, error.column), (3, 3));
    assert_eq!(result.document.events().len(), 1);

    bytes.truncate(bytes.len() - 2);
    bytes.push(b'\n');
    let result = henkan::parse_bytes(&bytes, Format::Srt, &ParseOptions::default());
    assert!(result.ok);
    assert_eq!(result.document.events()[0].text(), "ok");
}

#[test]
fn timestamps_past_the_limit_are_invalid() {
    init_logging();
    let inputs = [
        (
            Format::Srt,
            "1\n9999999999999999:00:00,000 --> 00:00:01,000\nx\n",
        ),
        (
            Format::Ass,
            "[Events]\nDialogue: 0,9999999999999999:00:00.00,0:00:01.00,Default,,0,0,0,,x\n",
        ),
        (
            Format::WebVtt,
            "WEBVTT\n\n9999999999999999:00:00.000 --> 00:00:01.000\nx\n",
        ),
        (Format::Sbv, "9999999999999999:00:00.000,0:00:01.000\nx\n"),
        (Format::Lrc, "[99999999999999999:00.00]x\n"),
    ];

    for (format, input) in inputs {
        let result = format.parse(input, &ParseOptions::default());
        assert!(result.document.events().is_empty(), "{format}");
        assert!(
            result
                .errors
                .iter()
                .any(|error| error.code == ErrorCode::InvalidTimestamp),
            "{format}: {:?}",
            result.errors
        );
    }
}

//! YouTube SubViewer (`.sbv`): a timing line `H:MM:SS.mmm,H:MM:SS.mmm` followed by plain
//! text lines.

use crate::diagnostics::ErrorCode;
use crate::subtitle::{Document, Event};
use crate::tags::{self, TextSegment};

use super::{
    ParseOptions, ParseResult, SubtitleFormat, blocks, clock, clock_ms, dialogue, fraction_ms, plain_text,
    plain_to_ass,
};

pub struct Sbv;

impl SubtitleFormat for Sbv {
    fn parse(&self, input: &str, options: &ParseOptions) -> ParseResult {
        let mut diagnostics = options.diagnostics();
        let mut document = Document::default();

        for block in blocks(input) {
            let timing = block.lines[0];
            if !timing.contains(',') {
                diagnostics.report(
                    ErrorCode::MalformedEvent,
                    block.line,
                    1,
                    format!("expected a timing line, found {timing:?}"),
                );
                continue;
            }

            let Some((start, end)) = parse_timing(timing) else {
                diagnostics.report(
                    ErrorCode::InvalidTimestamp,
                    block.line,
                    1,
                    format!("invalid timing line {timing:?}"),
                );
                continue;
            };

            let text = plain_to_ass(&block.lines[1..].join("\n"));
            let segments = [TextSegment::new(text)];
            document.push_event(Event::new(tags::serialize_tags(&segments)).timed(start, end));
        }

        ParseResult::new(document, diagnostics)
    }

    fn serialize(&self, document: &Document) -> String {
        let entries: Vec<String> = dialogue(document)
            .map(|event| {
                format!(
                    "{},{}\n{}\n",
                    timestamp(event.start),
                    timestamp(event.end),
                    plain_text(event)
                )
            })
            .collect();
        entries.join("\n")
    }
}

fn parse_time(text: &str) -> Option<i64> {
    let (clock_part, fraction) = text.trim().split_once('.')?;
    let mut parts = clock_part.split(':').rev();
    let seconds: i64 = parts.next()?.parse().ok()?;
    let minutes: i64 = parts.next()?.parse().ok()?;
    let hours: i64 = match parts.next() {
        Some(hours) => hours.parse().ok()?,
        None => 0,
    };
    if parts.next().is_some() || minutes >= 60 || seconds >= 60 || seconds < 0 || minutes < 0 {
        return None;
    }
    clock_ms(hours, minutes, seconds, fraction_ms(fraction)?)
}

fn parse_timing(line: &str) -> Option<(i64, i64)> {
    let (start, end) = line.split_once(',')?;
    Some((parse_time(start)?, parse_time(end)?))
}

fn timestamp(ms: i64) -> String {
    let (hours, minutes, seconds, ms) = clock(ms);
    format!("{hours}:{minutes:02}:{seconds:02}.{ms:03}")
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "0:00:01.000,0:00:02.500\nHello\nworld\n\n\
                          1:02:03.040,1:02:04.000\nsecond\n";

    #[test]
    fn read() {
        let result = Sbv.parse(SAMPLE, &ParseOptions::default());
        assert!(result.ok);
        let events = result.document.events();
        assert_eq!(events.len(), 2);
        assert_eq!((events[0].start, events[0].end), (1000, 2500));
        assert_eq!(events[0].text(), r"Hello\Nworld");
        assert_eq!(events[1].start, 3_723_040);
    }

    #[test]
    fn write() {
        let result = Sbv.parse(SAMPLE, &ParseOptions::default());
        assert_eq!(Sbv.serialize(&result.document), SAMPLE);
    }

    #[test]
    fn tags_are_not_written() {
        let mut document = Document::default();
        document.push_event(Event::new(r"{\b1}bold{\p1}m 0 0 l 1 1{\p0}!").timed(0, 1000));
        assert_eq!(Sbv.serialize(&document), "0:00:00.000,0:00:01.000\nbold!\n");
    }

    #[test]
    fn recovery() {
        let input = "nonsense\n\n0:00:01.000,0:00:xx.000\nbad\n\n0:00:05.000,0:00:06.000\nok\n";
        let result = Sbv.parse(input, &ParseOptions::default());
        let codes: Vec<(ErrorCode, usize)> = result
            .errors
            .iter()
            .map(|error| (error.code, error.line))
            .collect();
        assert_eq!(
            codes,
            vec![(ErrorCode::MalformedEvent, 1), (ErrorCode::InvalidTimestamp, 3)]
        );
        assert_eq!(result.document.events().len(), 1);
        assert_eq!(result.document.events()[0].text(), "ok");
    }
}

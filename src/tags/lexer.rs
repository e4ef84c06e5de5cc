//! A position cursor over a text buffer.
//!
//! This is deliberately not a tokenizer: it hands out characters and borrowed slices and keeps
//! track of where it is, so that the tag parser and every format reader can scan their input
//! without allocating, while still reporting line/column positions in diagnostics.

/// Byte-offset cursor with line/column tracking. Lines and columns are 1-based; the column
/// counts characters.
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    text: &'a str,
    offset: usize,
    line: usize,
    column: usize,
}

impl<'a> Cursor<'a> {
    #[must_use]
    pub fn new(text: &'a str) -> Self {
        Self {
            text,
            offset: 0,
            line: 1,
            column: 1,
        }
    }

    /// The character under the cursor, if any.
    #[must_use]
    pub fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    /// Whether the remaining input starts with `pattern`.
    #[must_use]
    pub fn starts_with(&self, pattern: &str) -> bool {
        self.rest().starts_with(pattern)
    }

    /// Move past the current character and return it. Moving past a line feed starts a new
    /// line.
    pub fn advance(&mut self) -> Option<char> {
        let next_char = self.peek()?;
        self.offset += next_char.len_utf8();

        if next_char == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }

        Some(next_char)
    }

    /// Advance until the byte offset `target` is reached (or the input ends).
    pub fn advance_to(&mut self, target: usize) {
        while self.offset < target && self.advance().is_some() {}
    }

    #[must_use]
    pub fn is_at_end(&self) -> bool {
        self.offset >= self.text.len()
    }

    #[must_use]
    pub fn offset(&self) -> usize {
        self.offset
    }

    #[must_use]
    pub fn line(&self) -> usize {
        self.line
    }

    #[must_use]
    pub fn column(&self) -> usize {
        self.column
    }

    /// The `[start, end)` byte range of the underlying buffer. Out-of-range or non-boundary
    /// offsets are clamped to an empty slice rather than panicking.
    #[must_use]
    pub fn slice(&self, start: usize, end: usize) -> &'a str {
        let end = end.min(self.text.len());
        if start >= end {
            return "";
        }
        self.text.get(start..end).unwrap_or("")
    }

    /// Everything from the cursor to the end of input.
    #[must_use]
    pub fn rest(&self) -> &'a str {
        self.text.get(self.offset..).unwrap_or("")
    }

    /// Absolute byte offset of the next occurrence of `pattern` at or after the cursor.
    #[must_use]
    pub fn find(&self, pattern: &str) -> Option<usize> {
        self.rest()
            .find(pattern)
            .map(|relative| self.offset + relative)
    }

    /// Consume one line and return its 1-based number together with its contents, without
    /// the line terminator (`\n` or `\r\n`).
    pub fn next_line(&mut self) -> Option<(usize, &'a str)> {
        if self.is_at_end() {
            return None;
        }

        let line_number = self.line;
        let start = self.offset;
        let (content_end, next_start) = match self.find("\n") {
            Some(newline) => (newline, newline + 1),
            None => (self.text.len(), self.text.len()),
        };
        let mut line = self.slice(start, content_end);
        if let Some(stripped) = line.strip_suffix('\r') {
            line = stripped;
        }

        self.advance_to(next_start);
        Some((line_number, line))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_tracks_lines() {
        let mut cursor = Cursor::new("a\nbä");
        assert_eq!(cursor.peek(), Some('a'));
        assert_eq!(cursor.advance(), Some('a'));
        assert_eq!((cursor.line(), cursor.column()), (1, 2));
        assert_eq!(cursor.advance(), Some('\n'));
        assert_eq!((cursor.line(), cursor.column()), (2, 1));
        cursor.advance();
        assert_eq!(cursor.advance(), Some('ä'));
        assert_eq!(cursor.offset(), 5);
        assert!(cursor.is_at_end());
        assert_eq!(cursor.advance(), None);
    }

    #[test]
    fn slices_are_bounded() {
        let cursor = Cursor::new("{\\b1}x");
        assert_eq!(cursor.slice(1, 4), "\\b1");
        assert_eq!(cursor.slice(4, 100), "}x");
        assert_eq!(cursor.slice(5, 2), "");
        assert_eq!(cursor.find("}"), Some(4));
        assert!(cursor.starts_with("{\\"));
    }

    #[test]
    fn lines() {
        let mut cursor = Cursor::new("one\r\ntwo\n\nfour");
        assert_eq!(cursor.next_line(), Some((1, "one")));
        assert_eq!(cursor.next_line(), Some((2, "two")));
        assert_eq!(cursor.next_line(), Some((3, "")));
        assert_eq!(cursor.next_line(), Some((4, "four")));
        assert_eq!(cursor.next_line(), None);
    }
}

//! Error and warning collection for readers, the tag engine and the converter.
//!
//! Nothing in this crate aborts on a single malformed construct. Instead, the offending
//! construct is recovered from (each call site documents how) and a [`Diagnostic`] is handed
//! to a [`Diagnostics`] sink, which either drops it or keeps it depending on the configured
//! [`ErrorPolicy`].

use std::fmt;

use serde::{Deserialize, Serialize};

/// Closed set of diagnostic codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidTimestamp,
    UnclosedTag,
    UnknownStyle,
    MalformedEvent,
    InvalidColor,
    InvalidSection,
    MissingField,
    InvalidEncoding,
    DuplicateStyle,
    DuplicateId,
}

impl ErrorCode {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::InvalidTimestamp => "INVALID_TIMESTAMP",
            ErrorCode::UnclosedTag => "UNCLOSED_TAG",
            ErrorCode::UnknownStyle => "UNKNOWN_STYLE",
            ErrorCode::MalformedEvent => "MALFORMED_EVENT",
            ErrorCode::InvalidColor => "INVALID_COLOR",
            ErrorCode::InvalidSection => "INVALID_SECTION",
            ErrorCode::MissingField => "MISSING_FIELD",
            ErrorCode::InvalidEncoding => "INVALID_ENCODING",
            ErrorCode::DuplicateStyle => "DUPLICATE_STYLE",
            ErrorCode::DuplicateId => "DUPLICATE_ID",
        }
    }

    /// The severity a diagnostic with this code has outside of strict mode.
    ///
    /// Warnings describe constructs that were recovered without losing anything the user
    /// wrote (an unclosed tag becomes literal text, an unknown style falls back to defaults).
    /// Errors describe content that had to be thrown away or replaced.
    #[must_use]
    pub fn default_severity(self) -> Severity {
        match self {
            ErrorCode::UnclosedTag
            | ErrorCode::UnknownStyle
            | ErrorCode::InvalidColor
            | ErrorCode::DuplicateStyle => Severity::Warning,
            ErrorCode::InvalidTimestamp
            | ErrorCode::MalformedEvent
            | ErrorCode::InvalidSection
            | ErrorCode::MissingField
            | ErrorCode::InvalidEncoding
            | ErrorCode::DuplicateId => Severity::Error,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// What to do with a diagnostic once the construct causing it has been recovered from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPolicy {
    /// Recover and forget about it.
    Skip,

    /// Recover and keep the diagnostic in the result.
    #[default]
    Collect,
}

/// One located problem. Lines and columns are 1-based; column counts characters, not bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub code: ErrorCode,
    pub severity: Severity,
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
        };
        write!(
            formatter,
            "{kind}[{}] {}:{}: {}",
            self.code, self.line, self.column, self.message
        )
    }
}

/// Sink that diagnostics are reported into.
#[derive(Debug, Clone, Default)]
pub struct Diagnostics {
    policy: ErrorPolicy,
    strict: bool,
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    #[must_use]
    pub fn new(policy: ErrorPolicy) -> Self {
        Self {
            policy,
            strict: false,
            entries: vec![],
        }
    }

    /// A sink that collects everything regardless of `policy` and treats warnings as errors.
    #[must_use]
    pub fn strict() -> Self {
        Self {
            policy: ErrorPolicy::Collect,
            strict: true,
            entries: vec![],
        }
    }

    /// A sink that drops everything. Used where a caller did not ask for diagnostics.
    #[must_use]
    pub fn ignore() -> Self {
        Self::new(ErrorPolicy::Skip)
    }

    #[must_use]
    pub fn is_strict(&self) -> bool {
        self.strict
    }

    pub fn report<M>(&mut self, code: ErrorCode, line: usize, column: usize, message: M)
    where
        M: Into<String>,
    {
        if self.policy == ErrorPolicy::Skip && !self.strict {
            return;
        }

        let severity = if self.strict {
            Severity::Error
        } else {
            code.default_severity()
        };

        let diagnostic = Diagnostic {
            code,
            severity,
            line,
            column,
            message: message.into(),
        };
        log::warn!("{diagnostic}");
        self.entries.push(diagnostic);
    }

    /// Append diagnostics collected by another sink, shifting their line numbers by
    /// `line_offset`. Used when a nested scan (like the text of one event) reports positions
    /// relative to its own start.
    pub fn absorb(&mut self, other: Diagnostics, line_offset: usize) {
        for mut diagnostic in other.entries {
            diagnostic.line += line_offset;
            self.entries.push(diagnostic);
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries
            .iter()
            .filter(|diagnostic| diagnostic.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries
            .iter()
            .filter(|diagnostic| diagnostic.severity == Severity::Warning)
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.entries
    }

    /// Split into `(errors, warnings)`, preserving report order within each.
    #[must_use]
    pub fn into_parts(self) -> (Vec<Diagnostic>, Vec<Diagnostic>) {
        self.entries
            .into_iter()
            .partition(|diagnostic| diagnostic.severity == Severity::Error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skip_drops_everything() {
        let mut diagnostics = Diagnostics::new(ErrorPolicy::Skip);
        diagnostics.report(ErrorCode::MalformedEvent, 3, 1, "bad line");
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn collect_keeps_severity() {
        let mut diagnostics = Diagnostics::new(ErrorPolicy::Collect);
        diagnostics.report(ErrorCode::MalformedEvent, 3, 1, "bad line");
        diagnostics.report(ErrorCode::UnclosedTag, 4, 7, "no closing brace");
        assert_eq!(diagnostics.errors().count(), 1);
        assert_eq!(diagnostics.warnings().count(), 1);

        let (errors, warnings) = diagnostics.into_parts();
        assert_eq!(errors[0].code, ErrorCode::MalformedEvent);
        assert_eq!(warnings[0].line, 4);
    }

    #[test]
    fn strict_promotes_warnings() {
        let mut diagnostics = Diagnostics::strict();
        diagnostics.report(ErrorCode::DuplicateStyle, 1, 1, "Default");
        assert_eq!(diagnostics.errors().count(), 1);
    }

    #[test]
    fn absorb_shifts_lines() {
        let mut inner = Diagnostics::new(ErrorPolicy::Collect);
        inner.report(ErrorCode::UnclosedTag, 1, 5, "x");
        let mut outer = Diagnostics::new(ErrorPolicy::Collect);
        outer.absorb(inner, 9);
        assert_eq!(outer.iter().next().map(|diagnostic| diagnostic.line), Some(10));
    }

    #[test]
    fn display() {
        let diagnostic = Diagnostic {
            code: ErrorCode::InvalidColor,
            severity: Severity::Warning,
            line: 2,
            column: 4,
            message: "not hex".to_owned(),
        };
        assert_eq!(diagnostic.to_string(), "warning[INVALID_COLOR] 2:4: not hex");
    }
}

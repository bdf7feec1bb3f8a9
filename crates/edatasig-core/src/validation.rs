#![forbid(unsafe_code)]

//! Accumulated result of validating a document against the eData schema.

/// Severity of a single schema finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// Error text and warning text, kept as two separate streams.
///
/// The document format is valid exactly when the error text is empty;
/// warnings never block further processing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationOutcome {
    errors: Vec<String>,
    warnings: Vec<String>,
}

impl ValidationOutcome {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one finding in the stream matching its severity.
    pub fn push(&mut self, severity: Severity, message: impl Into<String>) {
        match severity {
            Severity::Error => self.errors.push(message.into()),
            Severity::Warning => self.warnings.push(message.into()),
        }
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.push(Severity::Error, message);
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.push(Severity::Warning, message);
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// All error messages joined into one text block.
    pub fn error_text(&self) -> String {
        self.errors.join(" ")
    }

    /// All warning messages joined into one text block.
    pub fn warning_text(&self) -> String {
        self.warnings.join(" ")
    }

    /// Convert into `Err(SchemaValidationFailed)` when any error was recorded.
    pub fn into_result(self) -> crate::Result<Self> {
        if self.is_valid() {
            Ok(self)
        } else {
            Err(crate::Error::SchemaValidationFailed {
                errors: self.error_text(),
                warnings: self.warning_text(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warnings_do_not_invalidate() {
        let mut outcome = ValidationOutcome::new();
        outcome.warning("no schema information for element 'x'");
        assert!(outcome.is_valid());
        assert!(outcome.error_text().is_empty());
        assert!(!outcome.warning_text().is_empty());
        assert!(outcome.into_result().is_ok());
    }

    #[test]
    fn test_errors_are_kept_separate() {
        let mut outcome = ValidationOutcome::new();
        outcome.error("first");
        outcome.warning("note");
        outcome.error("second");
        assert!(!outcome.is_valid());
        assert_eq!(outcome.error_text(), "first second");
        assert_eq!(outcome.warning_text(), "note");
        match outcome.into_result() {
            Err(crate::Error::SchemaValidationFailed { errors, warnings }) => {
                assert_eq!(errors, "first second");
                assert_eq!(warnings, "note");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}

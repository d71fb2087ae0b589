//! Solver progress lines and error-sentinel classification.

/// Substring a solver prints when the run hit a fatal condition.
pub const ERROR_SENTINEL: &str = "--Babel-Brain-Low-Error";

/// Kind of a solver output line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressKind {
    /// Ordinary progress text.
    Info,
    /// Line carrying the error sentinel.
    Error,
}

/// One line of solver output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    /// Classification of the line.
    pub kind: ProgressKind,
    /// Line text without the trailing newline.
    pub line: String,
}

impl ProgressEvent {
    /// Build an event from a raw line, classifying it.
    pub fn from_line(line: impl Into<String>) -> Self {
        let line = line.into();
        let kind = classify_line(&line);
        Self { kind, line }
    }

    /// Returns true if the line marks a failed run.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.kind == ProgressKind::Error
    }
}

/// Classify a solver output line.
///
/// All sentinel matching goes through here.
#[must_use]
pub fn classify_line(line: &str) -> ProgressKind {
    if line.contains(ERROR_SENTINEL) {
        ProgressKind::Error
    } else {
        ProgressKind::Info
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_plain_line() {
        assert_eq!(classify_line("Step 120 of 800"), ProgressKind::Info);
        assert_eq!(classify_line(""), ProgressKind::Info);
    }

    #[test]
    fn test_classify_sentinel_anywhere() {
        assert_eq!(
            classify_line("GPU out of memory --Babel-Brain-Low-Error"),
            ProgressKind::Error
        );
        assert_eq!(
            classify_line("--Babel-Brain-Low-Error: traceback follows"),
            ProgressKind::Error
        );
    }

    #[test]
    fn test_partial_sentinel_is_info() {
        assert_eq!(classify_line("--Babel-Brain-Low"), ProgressKind::Info);
    }

    #[test]
    fn test_event_from_line() {
        let event = ProgressEvent::from_line("x --Babel-Brain-Low-Error");
        assert!(event.is_error());
        assert_eq!(event.line, "x --Babel-Brain-Low-Error");
    }
}

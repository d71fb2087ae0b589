//! Messages from a background run to the presenter thread.

use babel_core::ProgressEvent;

use crate::orchestrator::RunOutcome;

/// Messages sent by [`crate::RunTask`] worker threads.
#[derive(Debug)]
pub enum RunMessage {
    /// One solver output line.
    Progress(ProgressEvent),

    /// The run finished; carries the outcome. Always the last message on
    /// success.
    Complete(Box<RunOutcome>),

    /// The run could not be carried out (start failure, missing bundles).
    Error(String),
}

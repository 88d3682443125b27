use thiserror::Error;

/// Error kinds surfaced by the scheduler, scanner, ledger and detector.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("transcode failed ({operation}): {stderr_excerpt}")]
    TranscodeFailed {
        operation: String,
        stderr_excerpt: String,
    },

    #[error("integrity failed: {0}")]
    IntegrityFailed(String),

    #[error("cancelled: {0}")]
    Cancelled(String),

    #[error("transient error: {0}")]
    Transient(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[cfg(feature = "postgres")]
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl CoreError {
    /// Error messages are truncated to 4 KiB before being persisted in the
    /// Job Ledger.
    pub fn truncated_message(&self) -> String {
        const MAX: usize = 4096;
        let msg = self.to_string();
        if msg.len() <= MAX {
            msg
        } else {
            // `stderr_excerpt` can carry non-ASCII transcoder output, so find
            // the last char boundary at or before MAX rather than slicing
            // mid-codepoint.
            let cutoff = msg
                .char_indices()
                .map(|(i, c)| i + c.len_utf8())
                .take_while(|&end| end <= MAX)
                .last()
                .unwrap_or(0);
            msg[..cutoff].to_string()
        }
    }

    /// Whether this error kind should be treated as retryable by a caller
    /// driving retries itself (the scheduler never auto-retries, but the
    /// detector/scanner use this to decide whether to keep counting an
    /// error against the scan's error tally vs. aborting).
    pub fn is_transient(&self) -> bool {
        matches!(self, CoreError::Transient(_))
    }
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;

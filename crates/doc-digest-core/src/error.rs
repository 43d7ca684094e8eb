//! Typed errors for the model-facing parts of the pipeline.
//!
//! Store and configuration errors use `anyhow`; failures that callers need
//! to match on (a model call, a reduction level) are enumerated here.

/// A failed completion call.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ModelError {
    /// The completion provider is not configured.
    #[error("completion provider is disabled")]
    Disabled,

    /// Transport-level failure (connection, timeout, TLS).
    #[error("request failed: {0}")]
    Request(String),

    /// The provider answered with a non-success HTTP status.
    #[error("provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body did not have the expected shape.
    #[error("malformed response: {0}")]
    Malformed(String),

    /// The provider answered successfully but with no text.
    #[error("empty response")]
    Empty,
}

/// A failed hierarchical reduction.
#[derive(Debug, thiserror::Error)]
pub enum ReduceError {
    /// Group size below 2 or final-group limit below 1 would never converge.
    #[error("invalid reduce options: {0}")]
    InvalidOptions(String),

    /// The single summarization call for a set that fits one group failed.
    #[error("summary call failed: {0}")]
    Summarize(#[source] ModelError),

    /// The final merge of group summaries failed.
    ///
    /// `partials` holds the group summaries, in document order, so the
    /// caller can still present something.
    #[error("final merge of {} group summaries failed: {source}", partials.len())]
    FinalMerge {
        partials: Vec<String>,
        #[source]
        source: ModelError,
    },
}

impl ReduceError {
    /// Raw concatenation of the group summaries, when a final merge failed.
    pub fn fallback_text(&self) -> Option<String> {
        match self {
            ReduceError::FinalMerge { partials, .. } if !partials.is_empty() => {
                Some(partials.join(crate::reduce::SEPARATOR))
            }
            _ => None,
        }
    }
}

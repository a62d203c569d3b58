//! # Error Taxonomy
//!
//! Every failure a client command can produce falls into one of four buckets:
//!
//! - [`CommandError::Protocol`]: malformed command or arguments. Reported
//!   inline, connection stays open.
//! - [`CommandError::Busy`]: the shared graph lock was unavailable. Reported
//!   inline with no server-side retry; the client decides whether to retry.
//! - [`CommandError::InvalidGraph`]: an algorithmic precondition was violated
//!   (MST on fewer than 2 vertices, metric with no prior MST). Inline.
//! - [`CommandError::Transport`]: socket read/write failure or disconnect.
//!   Closes that connection only.
//!
//! Bind/listen failures are the single fatal case and are surfaced as
//! `anyhow` errors from [`Server::bind`](crate::server::Server::bind) so the
//! process aborts before any worker starts.

use thiserror::Error;

/// Failure of a single client command. All variants except [`Transport`]
/// are recovered locally by writing an error line to the client.
///
/// [`Transport`]: CommandError::Transport
#[derive(Debug, Error)]
pub enum CommandError {
    /// Malformed command or arguments.
    #[error("{0}")]
    Protocol(String),

    /// The shared graph is locked by another connection.
    #[error("Graph is currently in use by another client. Please try again later.")]
    Busy,

    /// An algorithmic precondition does not hold for the current state.
    #[error("{0}")]
    InvalidGraph(String),

    /// I/O failure on the client socket; tears down the connection.
    #[error("connection error: {0}")]
    Transport(#[from] std::io::Error),
}

impl CommandError {
    /// Whether this error ends the connection instead of being reported inline.
    pub fn is_fatal(&self) -> bool {
        matches!(self, CommandError::Transport(_))
    }
}

/// Errors from the MST engine itself, independent of any connection.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MstError {
    #[error("graph must have at least 2 vertices for MST")]
    TooFewVertices,

    #[error("unknown MST algorithm: {0}")]
    UnknownAlgorithm(String),
}

impl From<MstError> for CommandError {
    fn from(err: MstError) -> Self {
        match err {
            MstError::TooFewVertices => CommandError::InvalidGraph(err.to_string()),
            MstError::UnknownAlgorithm(_) => CommandError::Protocol(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transport_errors_are_fatal() {
        assert!(CommandError::from(std::io::Error::other("boom")).is_fatal());
        assert!(!CommandError::Busy.is_fatal());
        assert!(!CommandError::Protocol("bad".into()).is_fatal());
        assert!(!CommandError::InvalidGraph("empty".into()).is_fatal());
    }

    #[test]
    fn mst_errors_map_to_command_taxonomy() {
        assert!(matches!(
            CommandError::from(MstError::TooFewVertices),
            CommandError::InvalidGraph(_)
        ));
        assert!(matches!(
            CommandError::from(MstError::UnknownAlgorithm("dijkstra".into())),
            CommandError::Protocol(_)
        ));
    }
}

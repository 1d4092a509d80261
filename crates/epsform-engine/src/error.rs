//! Error type for the worker session.

use thiserror::Error;

/// Errors surfaced by the worker session.
#[derive(Debug, Error)]
pub enum EngineError {
    /// I/O failure talking to the worker process.
    #[error("worker i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The worker closed its output stream.
    #[error("worker process closed the connection")]
    Closed,

    /// The worker reported a division by zero.
    ///
    /// Distinguished from [`EngineError::Engine`] because speculative
    /// substitution searches treat it as "try the next candidate".
    #[error("division by zero in worker")]
    DivisionByZero,

    /// Any other error reported by the worker.
    #[error("worker error: {0}")]
    Engine(String),

    /// The worker's response did not match the protocol.
    #[error("protocol violation: {0}")]
    Protocol(String),
}

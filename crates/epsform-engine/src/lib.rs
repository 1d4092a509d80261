//! # epsform-engine
//!
//! Client proxy for the external exact-arithmetic worker.
//!
//! All rational-function arithmetic in epsform is performed by a long-lived
//! worker process addressed through a line-based textual protocol on its
//! standard I/O. This crate provides:
//! - [`Engine`]: the worker session, owning the process and a name arena
//! - [`Expr`]: an opaque handle to an engine-resident scalar expression
//! - [`Matrix`]: an opaque handle to an engine-resident matrix
//!
//! Handles are reference counted; the engine-side value is freed when the
//! last handle is dropped. Every operation is a blocking round trip, so a
//! hung worker hangs the caller — there is no timeout.

pub mod error;
pub mod expr;
pub mod matrix;
pub mod session;

pub use error::EngineError;
pub use expr::Expr;
pub use matrix::Matrix;
pub use session::Engine;

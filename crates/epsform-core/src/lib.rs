//! # epsform-core
//!
//! Reduction of first-order linear differential systems
//! dF/dx = M(x,ε)F to canonical ε-form, where every singularity is a
//! simple pole and every residue is proportional to ε.
//!
//! The system is held in a block lower-triangular layout with one active
//! diagonal block under reduction. Reduction proceeds through
//! [`System::fuchsify`], [`System::normalize`] and [`System::factor_ep`]
//! for the active block, and [`System::left_fuchsify`] for its coupling to
//! the blocks already reduced. Every applied transformation is recorded in
//! a [`queue::TransformationQueue`] for deterministic replay and export.
//!
//! All exact arithmetic is delegated to the external worker process behind
//! [`epsform_engine`].

pub mod blocks;
pub mod echelon;
pub mod eigen;
pub mod error;
pub mod fraction;
pub mod jordan;
pub mod point;
pub mod queue;
pub mod system;

pub use eigen::{Eigen, EigenvalueSet};
pub use error::{Error, Result};
pub use fraction::Fraction;
pub use point::SingPoint;
pub use queue::{Transformation, TransformationQueue};
pub use system::{PoincareRank, System, SystemConfig};

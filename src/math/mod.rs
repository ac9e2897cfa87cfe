//! Numerical utilities: curvature, covariance inversion and sample summaries.

pub mod hessian;
pub mod linalg;
pub mod stats;

pub use hessian::*;
pub use linalg::*;
pub use stats::*;

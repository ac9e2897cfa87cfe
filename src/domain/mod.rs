//! Domain types used throughout the fitting pipeline.
//!
//! This module defines:
//!
//! - observed data (`FitData`, `YStd`)
//! - engine and wrapper configuration (`MlConfig`, `BootstrapConfig`, `BayesianConfig`, `WrapperOptions`)
//! - fit outputs (`FitTable`, `FitRow`, `FitQuality`)

pub mod types;

pub use types::*;

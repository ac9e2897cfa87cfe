//! Model wrappers.
//!
//! A wrapper owns a user model plus the bookkeeping that maps a flat vector
//! of unfixed parameters onto the model's arguments, so that fitting code can
//! stay generic over [`FitModel`].

pub mod args;
pub mod function;
pub mod model;
pub mod param;
pub mod vector;
pub mod wrapper;

pub use args::*;
pub use function::*;
pub use model::*;
pub use param::FitParameter;
pub use vector::*;
pub use wrapper::*;

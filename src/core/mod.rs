//! Core abstractions shared across the converter
//!
//! - `error`: structured error type naming the offending keys
//! - `traits`: parameter container and reparameterization contracts

pub mod error;
pub mod traits;

pub use error::{ConvertError, MismatchKind, Result, ResultExt};
pub use traits::{is_embedding_key, Reparameterize, StateDict};

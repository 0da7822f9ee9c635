//! The `utils` module provides the pieces shared by every other module of
//! `trackcast`: the crate-wide error type and the logging bootstrap.

pub mod error;
pub mod logging;

pub use error::{CancelReason, Error, Result};

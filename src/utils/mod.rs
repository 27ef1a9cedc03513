//! The `utils` module holds the pieces shared by every layer of `solarlink`:
//! the error types and the tracing setup.

pub mod error;
pub mod logging;

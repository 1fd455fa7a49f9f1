pub mod error;
pub mod time_value;
pub mod types;

#[cfg(feature = "correction")]
pub mod correction;

#[cfg(feature = "extras")]
pub mod extras;

#[cfg(feature = "schedule")]
pub mod schedule;

#[cfg(feature = "summary")]
pub mod summary;

pub use error::AmortizaError;
pub use types::*;

/// Standard result type for all amortiza operations
pub type AmortizaResult<T> = Result<T, AmortizaError>;

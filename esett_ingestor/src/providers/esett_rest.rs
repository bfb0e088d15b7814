//! eSett Open Data REST provider.

pub mod params;
pub mod provider;
pub mod retry;

pub use provider::{EsettProvider, EsettSettings};
pub use retry::RetryPolicy;

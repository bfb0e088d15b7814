//! Upstream side of the series cache: the eSett data model, the per-series
//! codec and the paginated REST provider.

pub mod codec;
pub mod models;
pub mod providers;

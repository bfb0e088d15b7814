pub mod range;
pub mod row;
pub mod series;
pub mod timeframe;
pub mod zone;

//! The datasets this crate knows how to fetch, and the (series, zone) key.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{timeframe::TimeFrame, zone::Zone};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown series `{0}` (expected production, consumption or prices)")]
pub struct UnknownSeriesError(pub String);

/// An upstream dataset with a fixed row schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Series {
    /// Hourly production per generation source.
    Production,
    /// Hourly consumption per metering type.
    Consumption,
    /// Hourly imbalance and regulation prices.
    Prices,
}

impl Series {
    pub const ALL: [Series; 3] = [Series::Production, Series::Consumption, Series::Prices];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Series::Production => "production",
            Series::Consumption => "consumption",
            Series::Prices => "prices",
        }
    }

    /// Native publication granularity. Every series is hourly today.
    pub const fn granularity(&self) -> TimeFrame {
        TimeFrame::hour()
    }

    /// eSett open-data endpoint path for this dataset.
    pub const fn dataset_path(&self) -> &'static str {
        match self {
            Series::Production => "/EXP16/Volumes",
            Series::Consumption => "/EXP15/Consumption",
            Series::Prices => "/EXP14/Prices",
        }
    }
}

impl fmt::Display for Series {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Series {
    type Err = UnknownSeriesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Series::ALL
            .into_iter()
            .find(|series| series.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownSeriesError(s.to_string()))
    }
}

/// The unit of caching and fetch coordination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct SeriesKey {
    pub series: Series,
    pub zone: Zone,
}

impl SeriesKey {
    pub const fn new(series: Series, zone: Zone) -> Self {
        Self { series, zone }
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.series, self.zone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!("Production".parse::<Series>().unwrap(), Series::Production);
        assert_eq!(" prices ".parse::<Series>().unwrap(), Series::Prices);
        assert!("load_profile".parse::<Series>().is_err());
    }

    #[test]
    fn key_display() {
        let key = SeriesKey::new(Series::Consumption, Zone::Fi);
        assert_eq!(key.to_string(), "consumption/FI");
    }
}

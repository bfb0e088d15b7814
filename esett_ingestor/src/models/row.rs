//! Normalized, vendor-agnostic rows.
//!
//! A [`Row`] is the canonical output of the codec and the unit the cache
//! stores. Rows are identified by (series, zone, time); the series is implied
//! by which [`RowValues`] variant the row carries.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{
    series::{Series, SeriesKey},
    zone::Zone,
};

/// One hourly record for one zone.
///
/// Serializes flat: `{"time": ..., "zone": ..., <series fields>}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Row {
    /// Bucket start (UTC), aligned to the series' granularity.
    pub time: DateTime<Utc>,
    pub zone: Zone,
    #[serde(flatten)]
    pub values: RowValues,
}

impl Row {
    pub fn series(&self) -> Series {
        self.values.series()
    }

    pub fn key(&self) -> SeriesKey {
        SeriesKey::new(self.series(), self.zone)
    }
}

/// Series-specific measurements. Volumes are MWh, prices EUR/MWh, as published.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RowValues {
    Production(ProductionValues),
    Consumption(ConsumptionValues),
    Prices(PriceValues),
}

impl RowValues {
    pub fn series(&self) -> Series {
        match self {
            RowValues::Production(_) => Series::Production,
            RowValues::Consumption(_) => Series::Consumption,
            RowValues::Prices(_) => Series::Prices,
        }
    }
}

/// Production per generation source.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProductionValues {
    pub total: Option<f64>,
    pub hydro: Option<f64>,
    pub wind: Option<f64>,
    pub wind_offshore: Option<f64>,
    pub solar: Option<f64>,
    pub nuclear: Option<f64>,
    pub thermal: Option<f64>,
    pub energy_storage: Option<f64>,
    pub other: Option<f64>,
}

/// Consumption per metering type.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConsumptionValues {
    pub total: Option<f64>,
    pub metered: Option<f64>,
    pub profiled: Option<f64>,
    pub flex: Option<f64>,
}

/// Imbalance settlement and regulation prices.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PriceValues {
    pub up_reg_price: Option<f64>,
    pub down_reg_price: Option<f64>,
    pub imbl_purchase_price: Option<f64>,
    pub imbl_sales_price: Option<f64>,
    pub imbl_spot_difference_price: Option<f64>,
    pub incentivising_component: Option<f64>,
    pub main_dir_reg_power_per_mba: Option<f64>,
    pub value_of_avoided_activation: Option<f64>,
    pub up_reg_price_frr_a: Option<f64>,
    pub down_reg_price_frr_a: Option<f64>,
}

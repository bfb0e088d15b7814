//! Insertable/Queryable helper structs used by the SQLite store.
//!
//! Conversions between these records and the domain [`Row`] live here so the
//! store itself only deals in diesel queries.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use esett_ingestor::models::{
    range::TimeRange,
    row::{ConsumptionValues, PriceValues, ProductionValues, Row, RowValues},
    zone::Zone,
};

use crate::{
    schema::{consumption, covered_interval, imbalance_price, production},
    store::StoreError,
    tz::{parse_ts_to_utc, to_rfc3339_millis},
};

#[derive(Debug, Clone, Insertable, AsChangeset, Queryable, Selectable)]
#[diesel(table_name = production, primary_key(zone, time), treat_none_as_null = true)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub(crate) struct ProductionRecord {
    pub(crate) zone: String,
    pub(crate) time: String, // RFC3339 UTC, millis
    pub(crate) total: Option<f64>,
    pub(crate) hydro: Option<f64>,
    pub(crate) wind: Option<f64>,
    pub(crate) wind_offshore: Option<f64>,
    pub(crate) solar: Option<f64>,
    pub(crate) nuclear: Option<f64>,
    pub(crate) thermal: Option<f64>,
    pub(crate) energy_storage: Option<f64>,
    pub(crate) other: Option<f64>,
}

#[derive(Debug, Clone, Insertable, AsChangeset, Queryable, Selectable)]
#[diesel(table_name = consumption, primary_key(zone, time), treat_none_as_null = true)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub(crate) struct ConsumptionRecord {
    pub(crate) zone: String,
    pub(crate) time: String,
    pub(crate) total: Option<f64>,
    pub(crate) metered: Option<f64>,
    pub(crate) profiled: Option<f64>,
    pub(crate) flex: Option<f64>,
}

#[derive(Debug, Clone, Insertable, AsChangeset, Queryable, Selectable)]
#[diesel(table_name = imbalance_price, primary_key(zone, time), treat_none_as_null = true)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub(crate) struct PriceRecord {
    pub(crate) zone: String,
    pub(crate) time: String,
    pub(crate) up_reg_price: Option<f64>,
    pub(crate) down_reg_price: Option<f64>,
    pub(crate) imbl_purchase_price: Option<f64>,
    pub(crate) imbl_sales_price: Option<f64>,
    pub(crate) imbl_spot_difference_price: Option<f64>,
    pub(crate) incentivising_component: Option<f64>,
    pub(crate) main_dir_reg_power_per_mba: Option<f64>,
    pub(crate) value_of_avoided_activation: Option<f64>,
    pub(crate) up_reg_price_frr_a: Option<f64>,
    pub(crate) down_reg_price_frr_a: Option<f64>,
}

#[derive(Debug, Clone, Insertable, Queryable, Selectable)]
#[diesel(table_name = covered_interval, check_for_backend(diesel::sqlite::Sqlite))]
pub(crate) struct CoveredIntervalRecord {
    pub(crate) series: String,
    pub(crate) zone: String,
    pub(crate) start_ts: String,
    pub(crate) end_ts: String,
}

/// A row ready for one of the three series tables.
#[derive(Debug, Clone)]
pub(crate) enum SeriesRecord {
    Production(ProductionRecord),
    Consumption(ConsumptionRecord),
    Price(PriceRecord),
}

impl From<&Row> for SeriesRecord {
    fn from(row: &Row) -> Self {
        let zone = row.zone.as_str().to_string();
        let time = to_rfc3339_millis(row.time);
        match &row.values {
            RowValues::Production(v) => SeriesRecord::Production(ProductionRecord {
                zone,
                time,
                total: v.total,
                hydro: v.hydro,
                wind: v.wind,
                wind_offshore: v.wind_offshore,
                solar: v.solar,
                nuclear: v.nuclear,
                thermal: v.thermal,
                energy_storage: v.energy_storage,
                other: v.other,
            }),
            RowValues::Consumption(v) => SeriesRecord::Consumption(ConsumptionRecord {
                zone,
                time,
                total: v.total,
                metered: v.metered,
                profiled: v.profiled,
                flex: v.flex,
            }),
            RowValues::Prices(v) => SeriesRecord::Price(PriceRecord {
                zone,
                time,
                up_reg_price: v.up_reg_price,
                down_reg_price: v.down_reg_price,
                imbl_purchase_price: v.imbl_purchase_price,
                imbl_sales_price: v.imbl_sales_price,
                imbl_spot_difference_price: v.imbl_spot_difference_price,
                incentivising_component: v.incentivising_component,
                main_dir_reg_power_per_mba: v.main_dir_reg_power_per_mba,
                value_of_avoided_activation: v.value_of_avoided_activation,
                up_reg_price_frr_a: v.up_reg_price_frr_a,
                down_reg_price_frr_a: v.down_reg_price_frr_a,
            }),
        }
    }
}

pub(crate) fn decode_time(text: &str) -> Result<DateTime<Utc>, StoreError> {
    parse_ts_to_utc(text).map_err(|e| StoreError::Corrupt {
        message: format!("{e:#}"),
    })
}

fn decode_zone(text: &str) -> Result<Zone, StoreError> {
    text.parse().map_err(|e| StoreError::Corrupt {
        message: format!("{e}"),
    })
}

impl TryFrom<ProductionRecord> for Row {
    type Error = StoreError;

    fn try_from(r: ProductionRecord) -> Result<Self, Self::Error> {
        Ok(Row {
            time: decode_time(&r.time)?,
            zone: decode_zone(&r.zone)?,
            values: RowValues::Production(ProductionValues {
                total: r.total,
                hydro: r.hydro,
                wind: r.wind,
                wind_offshore: r.wind_offshore,
                solar: r.solar,
                nuclear: r.nuclear,
                thermal: r.thermal,
                energy_storage: r.energy_storage,
                other: r.other,
            }),
        })
    }
}

impl TryFrom<ConsumptionRecord> for Row {
    type Error = StoreError;

    fn try_from(r: ConsumptionRecord) -> Result<Self, Self::Error> {
        Ok(Row {
            time: decode_time(&r.time)?,
            zone: decode_zone(&r.zone)?,
            values: RowValues::Consumption(ConsumptionValues {
                total: r.total,
                metered: r.metered,
                profiled: r.profiled,
                flex: r.flex,
            }),
        })
    }
}

impl TryFrom<PriceRecord> for Row {
    type Error = StoreError;

    fn try_from(r: PriceRecord) -> Result<Self, Self::Error> {
        Ok(Row {
            time: decode_time(&r.time)?,
            zone: decode_zone(&r.zone)?,
            values: RowValues::Prices(PriceValues {
                up_reg_price: r.up_reg_price,
                down_reg_price: r.down_reg_price,
                imbl_purchase_price: r.imbl_purchase_price,
                imbl_sales_price: r.imbl_sales_price,
                imbl_spot_difference_price: r.imbl_spot_difference_price,
                incentivising_component: r.incentivising_component,
                main_dir_reg_power_per_mba: r.main_dir_reg_power_per_mba,
                value_of_avoided_activation: r.value_of_avoided_activation,
                up_reg_price_frr_a: r.up_reg_price_frr_a,
                down_reg_price_frr_a: r.down_reg_price_frr_a,
            }),
        })
    }
}

impl TryFrom<CoveredIntervalRecord> for TimeRange {
    type Error = StoreError;

    fn try_from(r: CoveredIntervalRecord) -> Result<Self, Self::Error> {
        let start = decode_time(&r.start_ts)?;
        let end = decode_time(&r.end_ts)?;
        TimeRange::new(start, end).map_err(|e| StoreError::Corrupt {
            message: e.to_string(),
        })
    }
}

//! Decoding of raw eSett JSON records into [`Row`]s.
//!
//! Each series has one decode function. Upstream uses camelCase keys and
//! RFC 3339 `timestampUTC` strings; rows use snake_case fields and
//! `DateTime<Utc>`. A record is rejected when its timestamp is missing,
//! malformed or off the hour grid, when a required value key is absent, or
//! when a value is neither a number nor `null`.

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::models::{
    row::{ConsumptionValues, PriceValues, ProductionValues, Row, RowValues},
    series::Series,
    timeframe::TimeFrame,
    zone::Zone,
};

/// One JSON object as returned by the upstream API.
pub type RawRecord = Map<String, Value>;

const TIMESTAMP_KEY: &str = "timestampUTC";

/// Why a raw record could not become a [`Row`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CodecError {
    #[error("missing required field `{field}`")]
    MissingField { field: &'static str },

    #[error("field `{field}` is not numeric: {value}")]
    NotNumeric { field: &'static str, value: String },

    #[error("unparseable timestamp `{value}`: {reason}")]
    BadTimestamp { value: String, reason: String },

    #[error("timestamp {ts} is not aligned to {granularity} buckets")]
    Misaligned {
        ts: DateTime<Utc>,
        granularity: TimeFrame,
    },
}

/// Decode one upstream record for `series` in `zone`.
pub fn decode(series: Series, zone: Zone, raw: &RawRecord) -> Result<Row, CodecError> {
    let time = timestamp(raw, series.granularity())?;
    let values = match series {
        Series::Production => RowValues::Production(decode_production(raw)?),
        Series::Consumption => RowValues::Consumption(decode_consumption(raw)?),
        Series::Prices => RowValues::Prices(decode_prices(raw)?),
    };
    Ok(Row { time, zone, values })
}

fn decode_production(raw: &RawRecord) -> Result<ProductionValues, CodecError> {
    Ok(ProductionValues {
        total: required(raw, "total")?,
        hydro: optional(raw, "hydro")?,
        wind: optional(raw, "wind")?,
        wind_offshore: optional(raw, "windOffshore")?,
        solar: optional(raw, "solar")?,
        nuclear: optional(raw, "nuclear")?,
        thermal: optional(raw, "thermal")?,
        energy_storage: optional(raw, "energyStorage")?,
        other: optional(raw, "other")?,
    })
}

fn decode_consumption(raw: &RawRecord) -> Result<ConsumptionValues, CodecError> {
    Ok(ConsumptionValues {
        total: required(raw, "total")?,
        metered: optional(raw, "metered")?,
        profiled: optional(raw, "profiled")?,
        flex: optional(raw, "flex")?,
    })
}

fn decode_prices(raw: &RawRecord) -> Result<PriceValues, CodecError> {
    Ok(PriceValues {
        up_reg_price: required(raw, "upRegPrice")?,
        down_reg_price: required(raw, "downRegPrice")?,
        imbl_purchase_price: optional(raw, "imblPurchasePrice")?,
        imbl_sales_price: optional(raw, "imblSalesPrice")?,
        imbl_spot_difference_price: optional(raw, "imblSpotDifferencePrice")?,
        incentivising_component: optional(raw, "incentivisingComponent")?,
        main_dir_reg_power_per_mba: optional(raw, "mainDirRegPowerPerMBA")?,
        value_of_avoided_activation: optional(raw, "valueOfAvoidedActivation")?,
        up_reg_price_frr_a: optional(raw, "upRegPriceFrrA")?,
        down_reg_price_frr_a: optional(raw, "downRegPriceFrrA")?,
    })
}

fn timestamp(raw: &RawRecord, granularity: TimeFrame) -> Result<DateTime<Utc>, CodecError> {
    let value = match raw.get(TIMESTAMP_KEY) {
        Some(Value::String(s)) => s,
        Some(other) => {
            return Err(CodecError::BadTimestamp {
                value: other.to_string(),
                reason: "expected a string".into(),
            });
        }
        None => {
            return Err(CodecError::MissingField {
                field: TIMESTAMP_KEY,
            });
        }
    };

    let ts = DateTime::parse_from_rfc3339(value)
        .map_err(|e| CodecError::BadTimestamp {
            value: value.clone(),
            reason: e.to_string(),
        })?
        .with_timezone(&Utc);

    if !granularity.is_aligned(ts) {
        return Err(CodecError::Misaligned { ts, granularity });
    }
    Ok(ts)
}

fn required(raw: &RawRecord, field: &'static str) -> Result<Option<f64>, CodecError> {
    if !raw.contains_key(field) {
        return Err(CodecError::MissingField { field });
    }
    optional(raw, field)
}

fn optional(raw: &RawRecord, field: &'static str) -> Result<Option<f64>, CodecError> {
    match raw.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n.as_f64().map(Some).ok_or_else(|| CodecError::NotNumeric {
            field,
            value: n.to_string(),
        }),
        Some(other) => Err(CodecError::NotNumeric {
            field,
            value: other.to_string(),
        }),
    }
}

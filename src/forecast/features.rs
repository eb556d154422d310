use super::{FeatureRecord, HistoricalSale, MAX_HISTORY};
use crate::errors::{ForecastError, ForecastResult};
use chrono::NaiveDate;
use smallvec::SmallVec;
use std::collections::HashMap;

/// Downloadable template: header plus one example row.
pub const CSV_TEMPLATE: &str = "month,avg_temp_taipei,epidemic_index,gt_flu,gt_cold,gt_immunity,gt_competitor_total,has_bundle_promo,bundle_discount_rate,bundle_start_date,bundle_duration_days,has_bulk_promo,bulk_discount_rate,season_event_tag,historical_m1_month,historical_m1_qty,historical_m2_month,historical_m2_qty,historical_m3_month,historical_m3_qty
2025-11,18.5,45.2,62,55,48,120,true,0.30,2025-11-05,14,false,0,,2025-08,668,2025-09,316,2025-10,904";

impl FeatureRecord {
    /// Check the invariants a record must hold before it reaches a prompt.
    pub fn validate(&self) -> ForecastResult<()> {
        check_month("month", &self.month)?;
        check_rate("bundle_discount_rate", self.bundle_discount_rate)?;
        check_rate("bulk_discount_rate", self.bulk_discount_rate)?;

        if !self.bundle_start_date.is_empty()
            && NaiveDate::parse_from_str(&self.bundle_start_date, "%Y-%m-%d").is_err()
        {
            return Err(ForecastError::Validation(format!(
                "bundle_start_date must be YYYY-MM-DD, got {:?}",
                self.bundle_start_date
            )));
        }

        if self.historical_sales.len() > MAX_HISTORY {
            return Err(ForecastError::Validation(format!(
                "at most {MAX_HISTORY} historical months allowed, got {}",
                self.historical_sales.len()
            )));
        }
        for sale in &self.historical_sales {
            check_month("historical_sales.month", &sale.month)?;
        }

        Ok(())
    }
}

fn check_month(field: &str, value: &str) -> ForecastResult<()> {
    let well_formed = value.len() == 7
        && NaiveDate::parse_from_str(&format!("{value}-01"), "%Y-%m-%d").is_ok();
    if well_formed {
        Ok(())
    } else {
        Err(ForecastError::Validation(format!("{field} must be YYYY-MM, got {value:?}")))
    }
}

fn check_rate(field: &str, rate: f64) -> ForecastResult<()> {
    if rate.is_finite() && (0.0..=1.0).contains(&rate) {
        Ok(())
    } else {
        Err(ForecastError::Validation(format!("{field} must lie in [0, 1], got {rate}")))
    }
}

/// Parse an uploaded feature table: one header row, then the data row.
/// Rows past the first data row are ignored.
pub fn parse_feature_csv(text: &str) -> ForecastResult<FeatureRecord> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.trim().as_bytes());

    let headers = reader.headers()?.clone();
    let values = match reader.records().next() {
        Some(record) => record?,
        None => {
            return Err(ForecastError::Validation(
                "CSV must have a header row and at least one data row.".into(),
            ))
        }
    };

    let row: HashMap<&str, &str> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| (h, values.get(i).unwrap_or("")))
        .collect();
    let cell = |key: &str| row.get(key).copied().unwrap_or("");

    let mut historical_sales: SmallVec<[HistoricalSale; MAX_HISTORY]> = SmallVec::new();
    for i in 1..=MAX_HISTORY {
        let month_key = format!("historical_m{i}_month");
        let qty_key = format!("historical_m{i}_qty");
        let (month, qty) = (cell(&month_key), cell(&qty_key));
        if month.is_empty() || qty.is_empty() {
            continue;
        }
        historical_sales.push(HistoricalSale {
            month: month.to_string(),
            qty: parse_required_whole(&qty_key, qty)?,
        });
    }

    let month = cell("month");
    if month.is_empty() {
        return Err(ForecastError::Validation("missing required column: month".into()));
    }

    let record = FeatureRecord {
        month: month.to_string(),
        avg_temp_taipei: parse_required("avg_temp_taipei", cell("avg_temp_taipei"))?,
        epidemic_index: parse_required("epidemic_index", cell("epidemic_index"))?,
        gt_flu: parse_required_whole("gt_flu", cell("gt_flu"))?,
        gt_cold: parse_required_whole("gt_cold", cell("gt_cold"))?,
        gt_immunity: parse_required_whole("gt_immunity", cell("gt_immunity"))?,
        gt_competitor_total: parse_required("gt_competitor_total", cell("gt_competitor_total"))?,
        has_bundle_promo: parse_flag(cell("has_bundle_promo")),
        bundle_discount_rate: parse_or_zero(cell("bundle_discount_rate")),
        bundle_start_date: cell("bundle_start_date").to_string(),
        bundle_duration_days: parse_whole(cell("bundle_duration_days"))
            .and_then(|d| u32::try_from(d).ok())
            .unwrap_or(0),
        has_bulk_promo: parse_flag(cell("has_bulk_promo")),
        bulk_discount_rate: parse_or_zero(cell("bulk_discount_rate")),
        season_event_tag: cell("season_event_tag").to_string(),
        historical_sales,
    };

    record.validate()?;
    Ok(record)
}

fn parse_required<T: std::str::FromStr>(key: &str, raw: &str) -> ForecastResult<T> {
    if raw.is_empty() {
        return Err(ForecastError::Validation(format!("missing required column: {key}")));
    }
    raw.parse::<T>()
        .map_err(|_| ForecastError::Validation(format!("invalid value for {key}: {raw:?}")))
}

/// Whole-number cell. A decimal such as `62.0` or `62.7` truncates toward
/// zero, the way spreadsheet exports usually need.
fn parse_whole(raw: &str) -> Option<i64> {
    raw.parse::<i64>().ok().or_else(|| {
        raw.parse::<f64>()
            .ok()
            .filter(|v| v.is_finite() && v.abs() < i64::MAX as f64)
            .map(|v| v.trunc() as i64)
    })
}

fn parse_required_whole<T: TryFrom<i64>>(key: &str, raw: &str) -> ForecastResult<T> {
    if raw.is_empty() {
        return Err(ForecastError::Validation(format!("missing required column: {key}")));
    }
    parse_whole(raw)
        .and_then(|v| T::try_from(v).ok())
        .ok_or_else(|| ForecastError::Validation(format!("invalid value for {key}: {raw:?}")))
}

#[inline]
fn parse_or_zero<T: std::str::FromStr + Default>(raw: &str) -> T {
    raw.parse::<T>().unwrap_or_default()
}

#[inline]
fn parse_flag(raw: &str) -> bool {
    raw.eq_ignore_ascii_case("true")
}

use chrono::DateTime;

use crate::{QuotaSummary, TokenStatus, UsageRecord};

/// Micro-units per displayed currency unit.
pub const QUOTA_PER_UNIT: i64 = 500_000;

pub const UNLIMITED: &str = "unlimited";
pub const NEVER_EXPIRES: &str = "never expires";

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// `quota / 500000` rounded half away from zero to two decimals.
///
/// Computed on integers widened to `i128`, so every `i64` input is exact.
pub fn format_quota(quota: Option<i64>) -> String {
    const PER_CENT: u128 = (QUOTA_PER_UNIT / 100) as u128;
    let value = i128::from(quota.unwrap_or(0));
    let cents = (value.unsigned_abs() + PER_CENT / 2) / PER_CENT;
    let sign = if value < 0 && cents > 0 { "-" } else { "" };
    format!("{}{}.{:02}", sign, cents / 100, cents % 100)
}

pub fn format_limit(quota: Option<i64>, unlimited: bool) -> String {
    if unlimited {
        UNLIMITED.to_string()
    } else {
        format_quota(quota)
    }
}

/// Raw `used / total * 100`, unclamped. `None` when the total is zero or missing.
pub fn usage_percent(used: Option<i64>, total: Option<i64>) -> Option<f64> {
    let total = total.filter(|t| *t != 0)?;
    Some(used.unwrap_or(0) as f64 / total as f64 * 100.0)
}

pub fn bar_width(percent: f64) -> f64 {
    percent.clamp(0.0, 100.0)
}

pub fn format_percent(percent: f64) -> String {
    format!("{:.1}", percent)
}

pub fn format_epoch_millis(millis: i64) -> String {
    match DateTime::from_timestamp_millis(millis) {
        Some(dt) => dt.format(TIME_FORMAT).to_string(),
        None => format!("invalid time ({millis})"),
    }
}

/// `expired_time` arrives in milliseconds; 0 and negatives mean no expiry.
pub fn format_expired_time(expired_time: Option<i64>) -> String {
    match expired_time {
        Some(ms) if ms > 0 => format_epoch_millis(ms),
        _ => NEVER_EXPIRES.to_string(),
    }
}

/// Ledger timestamps arrive in seconds.
pub fn format_created_at(created_at: i64) -> String {
    format_epoch_millis(created_at.saturating_mul(1000))
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UsageGauge {
    pub percent: f64,
    pub width: f64,
}

impl UsageGauge {
    pub fn text(&self) -> String {
        format!("{}%", format_percent(self.percent))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuotaDisplay {
    pub status: TokenStatus,
    pub total: String,
    pub used: String,
    pub remain: String,
    pub expires: String,
    pub gauge: Option<UsageGauge>,
}

impl QuotaDisplay {
    pub fn from_summary(summary: &QuotaSummary) -> Self {
        let gauge = if summary.unlimited_quota {
            None
        } else {
            usage_percent(summary.used_quota, summary.total_quota).map(|percent| UsageGauge {
                percent,
                width: bar_width(percent),
            })
        };
        Self {
            status: summary.status,
            total: format_limit(summary.total_quota, summary.unlimited_quota),
            used: format_quota(summary.used_quota),
            remain: format_limit(summary.remain_quota, summary.unlimited_quota),
            expires: format_expired_time(summary.expired_time),
            gauge,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UsageRow {
    pub time: String,
    pub model: String,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub cost: String,
}

impl From<&UsageRecord> for UsageRow {
    fn from(record: &UsageRecord) -> Self {
        Self {
            time: format_created_at(record.created_at),
            model: record.model_name.clone(),
            prompt_tokens: record.prompt_tokens,
            completion_tokens: record.completion_tokens,
            cost: format_quota(record.quota),
        }
    }
}

use axum::{http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};

/// `{status: "success", message, data}` with HTTP 200.
pub fn success<T: Serialize>(data: T, message: &str) -> Json<Value> {
    Json(json!({
        "status": "success",
        "message": message,
        "data": data,
    }))
}

/// Success envelope without a payload, e.g. after a delete.
pub fn message_only(message: &str) -> Json<Value> {
    Json(json!({
        "status": "success",
        "message": message,
        "data": null,
    }))
}

/// Success envelope with HTTP 201.
pub fn created<T: Serialize>(data: T, message: &str) -> (StatusCode, Json<Value>) {
    (StatusCode::CREATED, success(data, message))
}

/// Timestamps in resource views are `YYYY-MM-DD HH:MM:SS` (UTC).
pub fn format_timestamp(value: Option<DateTime<Utc>>) -> Option<String> {
    value.map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
}

/// Two decimals with thousands separators: `1500.0` becomes `"1,500.00"`.
pub fn format_amount(value: f64) -> String {
    let fixed = format!("{:.2}", value.abs());
    let (whole, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if value < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!("{}{}.{}", sign, grouped, cents)
}

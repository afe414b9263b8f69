use chrono::{DateTime, Datelike, FixedOffset, NaiveDateTime, SecondsFormat, TimeZone, Timelike, Utc};
use serde_json::{Map, Value};

pub const SOURCE_DT_KEY: &str = "日期時間";
pub const SOURCE_DT_FORMAT: &str = "%Y/%m/%d %H:%M:%S";
pub const DETECTED_AT_KEY: &str = "detectedAtUtc";

pub const FIELD_MAP: &[(&str, &str)] = &[
    ("PM25", "pm_25"),
    ("NMHC", "nmhc"),
    ("THC", "thc"),
    ("CH4", "ch4"),
    ("SO2", "so2"),
    ("O3", "o3"),
    ("NOX", "nox"),
    ("NO", "no"),
    ("CO", "co"),
    ("CO2", "co2"),
];

pub const REQUIRED_FIELDS: &[&str] = &[
    DETECTED_AT_KEY,
    "pm_25",
    "nmhc",
    "thc",
    "ch4",
    "so2",
    "o3",
    "nox",
    "no",
    "co",
    "co2",
];

#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub station_time_local: DateTime<FixedOffset>,
    pub detected_at_utc: String,
    pub measurements: Map<String, Value>,
}

impl Reading {
    pub fn payload(&self) -> Map<String, Value> {
        let mut payload = Map::new();
        payload.insert(
            DETECTED_AT_KEY.to_string(),
            Value::String(self.detected_at_utc.clone()),
        );
        for (field, value) in &self.measurements {
            payload.insert(field.clone(), value.clone());
        }
        payload
    }
}

pub fn target_hour(now: DateTime<Utc>, feed_offset: FixedOffset) -> DateTime<FixedOffset> {
    let local = now.with_timezone(&feed_offset);
    let top_of_hour = local
        .with_minute(0)
        .and_then(|dt| dt.with_second(0))
        .and_then(|dt| dt.with_nanosecond(0))
        .unwrap_or(local);
    top_of_hour - chrono::Duration::hours(1)
}

pub fn select_hour(records: &[Value], target: DateTime<FixedOffset>) -> Option<Reading> {
    records.iter().find_map(|record| {
        let object = record.as_object()?;
        let raw = object.get(SOURCE_DT_KEY)?.as_str()?;
        let local = parse_station_time(raw, *target.offset())?;

        if (local.year(), local.month(), local.day(), local.hour())
            == (target.year(), target.month(), target.day(), target.hour())
        {
            Some(build_reading(object, local))
        } else {
            None
        }
    })
}

pub fn format_detected_at<Tz: TimeZone>(dt: DateTime<Tz>) -> String {
    dt.with_timezone(&Utc)
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn normalize_detected_at(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(format_detected_at(dt));
    }

    // The storage api also lists naive timestamps; those are UTC.
    NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| format_detected_at(naive.and_utc()))
}

pub fn coerce_value(raw: &Value) -> Value {
    match raw {
        Value::Null => Value::Null,
        Value::Number(number) => Value::Number(number.clone()),
        Value::String(text) => {
            let trimmed = text.trim();
            if trimmed.is_empty() {
                return Value::Null;
            }
            if matches!(
                trimmed.to_ascii_lowercase().as_str(),
                "na" | "nan" | "null" | "none"
            ) {
                return Value::Null;
            }
            trimmed
                .parse::<f64>()
                .ok()
                .and_then(serde_json::Number::from_f64)
                .map(Value::Number)
                .unwrap_or(Value::Null)
        }
        _ => Value::Null,
    }
}

fn parse_station_time(raw: &str, offset: FixedOffset) -> Option<DateTime<FixedOffset>> {
    let naive = NaiveDateTime::parse_from_str(raw.trim(), SOURCE_DT_FORMAT).ok()?;
    offset.from_local_datetime(&naive).single()
}

fn build_reading(record: &Map<String, Value>, station_time_local: DateTime<FixedOffset>) -> Reading {
    let mut measurements = Map::new();
    for (source_key, field) in FIELD_MAP {
        let value = record
            .get(*source_key)
            .map(coerce_value)
            .unwrap_or(Value::Null);
        measurements.insert((*field).to_string(), value);
    }

    Reading {
        detected_at_utc: format_detected_at(station_time_local),
        station_time_local,
        measurements,
    }
}

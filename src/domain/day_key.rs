use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::HashSet;

/// Object fields that may carry a day, checked in order.
const DAY_FIELDS: [&str; 4] = ["date", "day", "diary_date", "created_at"];

/// A day as the backend may list it: a bare string or an object with a date-like field.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RawDay {
    Plain(String),
    Record(serde_json::Map<String, serde_json::Value>),
    Other(serde_json::Value),
}

impl RawDay {
    pub fn normalize(&self) -> Option<NaiveDate> {
        match self {
            Self::Plain(value) => parse_day_prefix(value),
            Self::Record(fields) => DAY_FIELDS
                .iter()
                .filter_map(|key| fields.get(*key))
                .filter_map(serde_json::Value::as_str)
                .find_map(parse_day_prefix),
            Self::Other(_) => None,
        }
    }
}

/// Reads the leading `YYYY-MM-DD` of a date or timestamp string as written.
/// The offset of a timestamp is ignored so the calendar day never shifts.
pub fn parse_day_prefix(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    let prefix = value.get(..10)?;
    if value.len() > 10 && !value[10..].starts_with(['T', 't', ' ']) {
        return None;
    }
    NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok()
}

pub fn to_iso(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Normalizes every raw day, dropping unrecognized shapes and duplicates.
/// First-seen order is kept.
pub fn normalize_days(raw: &[RawDay]) -> Vec<NaiveDate> {
    let mut seen = HashSet::new();
    raw.iter()
        .filter_map(RawDay::normalize)
        .filter(|day| seen.insert(*day))
        .collect()
}

/// Decodes a days listing payload. Anything but an array yields no days.
pub fn raw_days_from_payload(payload: serde_json::Value) -> Vec<RawDay> {
    match payload {
        serde_json::Value::Array(items) => items
            .into_iter()
            .map(|item| serde_json::from_value(item).unwrap_or(RawDay::Other(serde_json::Value::Null)))
            .collect(),
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn raw(value: serde_json::Value) -> RawDay {
        serde_json::from_value(value).expect("raw day decodes")
    }

    #[test]
    fn recognized_shapes_normalize_to_the_same_day() {
        let expected = NaiveDate::from_ymd_opt(2024, 5, 3);
        assert_eq!(raw(json!("2024-05-03")).normalize(), expected);
        assert_eq!(raw(json!({"date": "2024-05-03T00:00:00Z"})).normalize(), expected);
        assert_eq!(raw(json!({"day": "2024-05-03"})).normalize(), expected);
        assert_eq!(raw(json!({"diary_date": "2024-05-03"})).normalize(), expected);
        assert_eq!(
            raw(json!({"created_at": "2024-05-03T23:59:00-08:00"})).normalize(),
            expected
        );
    }

    #[test]
    fn unrecognized_shapes_are_dropped() {
        assert_eq!(raw(json!({"when": "2024-05-03"})).normalize(), None);
        assert_eq!(raw(json!({"date": 20240503})).normalize(), None);
        assert_eq!(raw(json!(42)).normalize(), None);
        assert_eq!(raw(json!("yesterday")).normalize(), None);
        assert_eq!(raw(json!("2024-05-03junk")).normalize(), None);
        assert_eq!(raw(json!("2024-02-30")).normalize(), None);
    }

    #[test]
    fn first_recognized_field_wins() {
        let day = raw(json!({"date": null, "day": "2024-05-04", "created_at": "2024-05-01"}));
        assert_eq!(day.normalize(), NaiveDate::from_ymd_opt(2024, 5, 4));
    }

    #[test]
    fn payload_normalization_dedupes_and_keeps_order() {
        let payload = json!([
            "2024-05-02",
            {"date": "2024-05-01T10:00:00Z"},
            {"day": "2024-05-02"},
            {"unknown": true},
            null
        ]);
        let days = normalize_days(&raw_days_from_payload(payload));
        assert_eq!(
            days.into_iter().map(to_iso).collect::<Vec<_>>(),
            vec!["2024-05-02".to_string(), "2024-05-01".to_string()]
        );
        assert!(raw_days_from_payload(json!({"days": []})).is_empty());
    }

    proptest! {
        #[test]
        fn any_valid_date_survives_every_shape(
            year in 1970i32..2100,
            month in 1u32..=12,
            day in 1u32..=28,
            field in 0usize..DAY_FIELDS.len()
        ) {
            let date = NaiveDate::from_ymd_opt(year, month, day).expect("valid date");
            let iso = to_iso(date);
            prop_assert_eq!(RawDay::Plain(iso.clone()).normalize(), Some(date));

            let mut fields = serde_json::Map::new();
            fields.insert(DAY_FIELDS[field].to_string(), json!(format!("{iso}T12:00:00Z")));
            prop_assert_eq!(RawDay::Record(fields).normalize(), Some(date));
        }
    }
}

//! Conversions between model values and their column representations.

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};

use super::error::{StoreError, StoreResult};
use crate::model::{Metadata, UnknownTagError, VersionNumber};

/// RFC 3339, UTC, fixed microsecond precision. Fixed width keeps stored
/// timestamps lexically sortable.
pub fn encode_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_timestamp(value: &str) -> StoreResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|source| StoreError::InvalidTimestamp {
            value: value.to_string(),
            source,
        })
}

pub fn encode_metadata(metadata: &Metadata) -> StoreResult<String> {
    Ok(serde_json::to_string(metadata)?)
}

/// An empty column reads as an empty map.
pub fn decode_metadata(value: &str) -> StoreResult<Metadata> {
    if value.trim().is_empty() {
        return Ok(Metadata::new());
    }
    Ok(serde_json::from_str(value)?)
}

/// Parse a status tag, reporting the offending row on failure.
pub fn decode_tag<T>(table: &'static str, id: &str, tag: &str) -> StoreResult<T>
where
    T: FromStr<Err = UnknownTagError>,
{
    tag.parse().map_err(|err: UnknownTagError| StoreError::CorruptedRow {
        table,
        id: id.to_string(),
        reason: err.to_string(),
    })
}

pub fn decode_version_number(id: &str, value: i64) -> StoreResult<VersionNumber> {
    VersionNumber::new(value).map_err(|err| StoreError::CorruptedRow {
        table: "versions",
        id: id.to_string(),
        reason: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{now, EntityStatus};
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_timestamp_format() {
        let ts = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 5).unwrap();
        assert_eq!(encode_timestamp(&ts), "2024-03-01T12:30:05.000000Z");

        let current = now();
        assert_eq!(decode_timestamp(&encode_timestamp(&current)).unwrap(), current);
    }

    #[test]
    fn test_timestamps_sort_lexically() {
        let early = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let late = early + chrono::Duration::microseconds(1);
        assert!(encode_timestamp(&early) < encode_timestamp(&late));
    }

    #[test]
    fn test_bad_timestamp() {
        let err = decode_timestamp("yesterday").unwrap_err();
        assert!(matches!(err, StoreError::InvalidTimestamp { .. }));
    }

    #[test]
    fn test_metadata_columns() {
        let mut metadata = Metadata::new();
        metadata.insert("rows".into(), json!(5000));
        metadata.insert("tags".into(), json!(["raw", "v1"]));

        let text = encode_metadata(&metadata).unwrap();
        assert_eq!(decode_metadata(&text).unwrap(), metadata);
        assert!(decode_metadata("").unwrap().is_empty());
        assert!(decode_metadata("not json").is_err());
    }

    #[test]
    fn test_unknown_status_is_corruption() {
        let err = decode_tag::<EntityStatus>("files", "f1", "ARCHIVED").unwrap_err();
        assert!(matches!(err, StoreError::CorruptedRow { table: "files", .. }));
        assert!(decode_version_number("v1", 0).is_err());
    }
}

//! Epoch-seconds timestamp encoding shared by the order and fill DTOs.
//!
//! Wire encoding is a single JSON number: whole seconds plus fractional
//! nanoseconds, e.g. `1700000000.123456789`. Decoding: `seconds = floor(x)`,
//! `nanos = round((x - seconds) * 1e9)`. Encoding is the exact inverse, so a
//! value round-trips to nanosecond precision.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EpochSeconds(pub DateTime<Utc>);

impl EpochSeconds {
    pub fn now() -> Self {
        Self(Utc::now())
    }

    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    pub fn into_datetime(self) -> DateTime<Utc> {
        self.0
    }
}

impl From<DateTime<Utc>> for EpochSeconds {
    fn from(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }
}

impl From<EpochSeconds> for DateTime<Utc> {
    fn from(e: EpochSeconds) -> Self {
        e.0
    }
}

impl Serialize for EpochSeconds {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let nanos = self.0.timestamp_subsec_nanos();
        let secs = self.0.timestamp();
        let value = secs as f64 + (nanos as f64) / 1_000_000_000f64;
        serializer.serialize_f64(value)
    }
}

impl<'de> Deserialize<'de> for EpochSeconds {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = f64::deserialize(deserializer)?;
        let seconds = value.floor();
        let nanos = ((value - seconds) * 1_000_000_000f64).round() as u32;
        let dt = Utc
            .timestamp_opt(seconds as i64, nanos)
            .single()
            .ok_or_else(|| serde::de::Error::custom("epoch seconds out of range"))?;
        Ok(EpochSeconds(dt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_to_nanosecond_precision() {
        let original = 1_700_000_123.456_789_012_f64;
        let json = serde_json::to_string(&original).unwrap();
        let decoded: EpochSeconds = serde_json::from_str(&json).unwrap();
        let reencoded: f64 = serde_json::from_str(&serde_json::to_string(&decoded).unwrap()).unwrap();
        assert!((original - reencoded).abs() < 1e-6);
    }

    #[test]
    fn whole_seconds_round_trip_exactly() {
        let dt = Utc.timestamp_opt(1_700_000_000, 0).single().unwrap();
        let e = EpochSeconds(dt);
        let json = serde_json::to_string(&e).unwrap();
        assert_eq!(json, "1700000000.0");
        let decoded: EpochSeconds = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.0, dt);
    }
}

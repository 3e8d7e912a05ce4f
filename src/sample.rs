//! Location sample types, fix validation, and acceptance clocks.

use serde::{Deserialize, Serialize};

/// Store-assigned sample identifier. Monotonic, never reused.
pub type SampleId = u64;

/// Inclusive latitude bounds in degrees.
pub const LATITUDE_RANGE: std::ops::RangeInclusive<f64> = -90.0..=90.0;

/// Inclusive longitude bounds in degrees.
pub const LONGITUDE_RANGE: std::ops::RangeInclusive<f64> = -180.0..=180.0;

/// Label format used when rendering sample times for history listings.
pub const HISTORY_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One geolocation measurement as returned by the acquisition provider.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Fix {
    pub latitude: f64,
    pub longitude: f64,
    /// Horizontal accuracy estimate in meters, passed through unmodified.
    pub precision: f64,
}

impl Fix {
    #[must_use]
    pub fn new(latitude: f64, longitude: f64, precision: f64) -> Self {
        Self {
            latitude,
            longitude,
            precision,
        }
    }

    /// Check that the fix is a finite, in-range coordinate pair with a
    /// non-negative precision.
    pub fn validate(&self) -> Result<(), FixRejection> {
        if !self.latitude.is_finite() {
            return Err(FixRejection::NonFiniteLatitude);
        }
        if !self.longitude.is_finite() {
            return Err(FixRejection::NonFiniteLongitude);
        }
        if !self.precision.is_finite() {
            return Err(FixRejection::NonFinitePrecision);
        }
        if !LATITUDE_RANGE.contains(&self.latitude) {
            return Err(FixRejection::LatitudeOutOfRange(self.latitude));
        }
        if !LONGITUDE_RANGE.contains(&self.longitude) {
            return Err(FixRejection::LongitudeOutOfRange(self.longitude));
        }
        if self.precision < 0.0 {
            return Err(FixRejection::NegativePrecision(self.precision));
        }
        Ok(())
    }

    /// Validate the fix and stamp it with the acceptance time.
    pub fn accept(self, timestamp_ms: i64) -> Result<NewSample, FixRejection> {
        self.validate()?;
        Ok(NewSample {
            latitude: self.latitude,
            longitude: self.longitude,
            precision: self.precision,
            timestamp_ms,
        })
    }
}

/// Why a fix was discarded before reaching the store.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum FixRejection {
    #[error("latitude is not finite")]
    NonFiniteLatitude,
    #[error("longitude is not finite")]
    NonFiniteLongitude,
    #[error("precision is not finite")]
    NonFinitePrecision,
    #[error("latitude {0} outside -90..=90")]
    LatitudeOutOfRange(f64),
    #[error("longitude {0} outside -180..=180")]
    LongitudeOutOfRange(f64),
    #[error("precision {0} is negative")]
    NegativePrecision(f64),
}

/// A validated, time-stamped fix that has not been assigned an id yet.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NewSample {
    pub latitude: f64,
    pub longitude: f64,
    pub precision: f64,
    /// Milliseconds since the Unix epoch, assigned when the fix was accepted.
    pub timestamp_ms: i64,
}

impl NewSample {
    #[must_use]
    pub fn with_id(self, id: SampleId) -> LocationSample {
        LocationSample {
            id,
            latitude: self.latitude,
            longitude: self.longitude,
            precision: self.precision,
            timestamp_ms: self.timestamp_ms,
        }
    }
}

/// A stored location sample. Immutable once written.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationSample {
    pub id: SampleId,
    pub latitude: f64,
    pub longitude: f64,
    pub precision: f64,
    pub timestamp_ms: i64,
}

impl LocationSample {
    /// Render the acceptance time in the local timezone, e.g.
    /// `2024-05-01 14:03:22`. Returns `None` for out-of-range timestamps.
    #[must_use]
    pub fn local_time_label(&self) -> Option<String> {
        let utc = chrono::DateTime::from_timestamp_millis(self.timestamp_ms)?;
        Some(
            utc.with_timezone(&chrono::Local)
                .format(HISTORY_TIME_FORMAT)
                .to_string(),
        )
    }
}

/// Source of acceptance timestamps for the collection loop.
pub trait Clock: Send + Sync + 'static {
    /// Current time in milliseconds since the Unix epoch.
    fn now_millis(&self) -> i64;
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        now_epoch_millis()
    }
}

/// Milliseconds since the Unix epoch; 0 if the system clock is before it.
#[must_use]
pub fn now_epoch_millis() -> i64 {
    match std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH) {
        Ok(duration) => i64::try_from(duration.as_millis()).unwrap_or(i64::MAX),
        Err(_) => 0,
    }
}

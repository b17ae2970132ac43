//! Time-of-day brightness targets
//!
//! The expected image brightness for "now" comes either from fixed clock
//! bands or, when a location is configured, from the real position of the
//! sun for today's date.

mod sun;

pub use sun::{SunCrossing, SunTimes};

use crate::brightness::BrightnessBucket;
use chrono::{DateTime, FixedOffset, Local, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Geographic position in decimal degrees (east and north positive).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, String> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(format!("latitude {latitude} is outside -90..90"));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(format!("longitude {longitude} is outside -180..180"));
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }
}

impl FromStr for Location {
    type Err = String;

    /// Parse `LAT:LON`, e.g. `51.48:-0.01`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (lat, lon) = s
            .split_once(':')
            .ok_or_else(|| format!("invalid location '{s}' (expected LAT:LON)"))?;
        let latitude = lat
            .trim()
            .parse::<f64>()
            .map_err(|_| format!("invalid latitude '{lat}'"))?;
        let longitude = lon
            .trim()
            .parse::<f64>()
            .map_err(|_| format!("invalid longitude '{lon}'"))?;
        Location::new(latitude, longitude)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}:{:.4}", self.latitude, self.longitude)
    }
}

/// `[time]` section of the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeSettings {
    /// Prefer wallpapers whose brightness fits the time of day
    pub fit_time: bool,
    /// Hour at which dawn starts
    pub dawn_start: u32,
    /// Hour at which day starts
    pub day_start: u32,
    /// Hour at which dusk starts
    pub dusk_start: u32,
    /// Hour at which night starts
    pub night_start: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
}

impl Default for TimeSettings {
    fn default() -> Self {
        Self {
            fit_time: false,
            dawn_start: 9,
            day_start: 12,
            dusk_start: 18,
            night_start: 21,
            latitude: None,
            longitude: None,
        }
    }
}

impl TimeSettings {
    /// Configured location, if both coordinates are present and valid.
    pub fn location(&self) -> Option<Location> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Location::new(lat, lon).ok(),
            _ => None,
        }
    }

    pub fn set_location(&mut self, location: Location) {
        self.latitude = Some(location.latitude);
        self.longitude = Some(location.longitude);
    }

    /// Which rule decides the target right now.
    pub fn mode(&self) -> TargetMode {
        if self.location().is_some() {
            TargetMode::Geo
        } else {
            TargetMode::Clock
        }
    }

    /// Bucket expected during the given local hour (0-23).
    pub fn clock_bucket(&self, hour: u32) -> BrightnessBucket {
        if hour >= self.day_start && hour < self.dusk_start {
            BrightnessBucket::Bright
        } else if hour >= self.night_start || hour < self.dawn_start {
            BrightnessBucket::Dark
        } else {
            BrightnessBucket::Medium
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetMode {
    Clock,
    Geo,
    /// Set on the command line
    Explicit,
}

impl fmt::Display for TargetMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetMode::Clock => f.write_str("clock"),
            TargetMode::Geo => f.write_str("sun position"),
            TargetMode::Explicit => f.write_str("explicit"),
        }
    }
}

/// Brightness bucket that fits `now`.
///
/// Geo mode supersedes the clock bands whenever a location is configured.
pub fn target_bucket<Tz: TimeZone>(now: &DateTime<Tz>, settings: &TimeSettings) -> BrightnessBucket {
    match settings.location() {
        Some(location) => {
            let sun = SunTimes::for_date(now.date_naive(), location);
            sun.bucket_at(now.with_timezone(&Utc))
        }
        None => settings.clock_bucket(now.hour()),
    }
}

/// Target for the current local time.
pub fn current_target(settings: &TimeSettings) -> BrightnessBucket {
    target_bucket(&local_now(), settings)
}

pub fn local_now() -> DateTime<FixedOffset> {
    Local::now().fixed_offset()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(rfc3339: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(rfc3339).expect("valid timestamp")
    }

    #[test]
    fn test_clock_bands() {
        let settings = TimeSettings::default();
        assert_eq!(settings.clock_bucket(0), BrightnessBucket::Dark);
        assert_eq!(settings.clock_bucket(8), BrightnessBucket::Dark);
        assert_eq!(settings.clock_bucket(9), BrightnessBucket::Medium);
        assert_eq!(settings.clock_bucket(11), BrightnessBucket::Medium);
        assert_eq!(settings.clock_bucket(12), BrightnessBucket::Bright);
        assert_eq!(settings.clock_bucket(17), BrightnessBucket::Bright);
        assert_eq!(settings.clock_bucket(18), BrightnessBucket::Medium);
        assert_eq!(settings.clock_bucket(20), BrightnessBucket::Medium);
        assert_eq!(settings.clock_bucket(21), BrightnessBucket::Dark);
        assert_eq!(settings.clock_bucket(23), BrightnessBucket::Dark);
    }

    #[test]
    fn test_clock_mode_uses_local_hour() {
        let settings = TimeSettings::default();
        assert_eq!(
            target_bucket(&at("2024-06-21T13:00:00+02:00"), &settings),
            BrightnessBucket::Bright
        );
        assert_eq!(
            target_bucket(&at("2024-06-21T22:15:00-05:00"), &settings),
            BrightnessBucket::Dark
        );
    }

    #[test]
    fn test_geo_mode_supersedes_clock() {
        let mut settings = TimeSettings::default();
        settings.set_location(Location::new(52.37, 4.90).expect("valid"));
        assert_eq!(settings.mode(), TargetMode::Geo);

        // 21:30 local is "night" on the clock but still twilight in June.
        assert_eq!(
            target_bucket(&at("2024-06-21T22:30:00+02:00"), &settings),
            BrightnessBucket::Medium
        );
        assert_eq!(
            target_bucket(&at("2024-06-21T23:30:00+02:00"), &settings),
            BrightnessBucket::Dark
        );
        // 09:00 local is "dawn" on the clock but broad daylight.
        assert_eq!(
            target_bucket(&at("2024-06-21T09:00:00+02:00"), &settings),
            BrightnessBucket::Bright
        );
    }

    #[test]
    fn test_location_parsing() {
        let loc: Location = "51.48:-0.01".parse().expect("valid");
        assert_eq!(loc.latitude, 51.48);
        assert_eq!(loc.longitude, -0.01);

        let origin: Location = "0:0".parse().expect("zero is a valid coordinate");
        assert_eq!(origin.latitude, 0.0);

        assert!("51.48".parse::<Location>().is_err());
        assert!("north:east".parse::<Location>().is_err());
        assert!("91:0".parse::<Location>().is_err());
        assert!("0:181".parse::<Location>().is_err());
    }

    #[test]
    fn test_incomplete_location_falls_back_to_clock() {
        let settings = TimeSettings {
            latitude: Some(52.0),
            ..TimeSettings::default()
        };
        assert_eq!(settings.location(), None);
        assert_eq!(settings.mode(), TargetMode::Clock);
    }
}

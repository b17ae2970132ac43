//! Sunrise, sunset and civil twilight for a date and location.
//!
//! Uses the NOAA simplified sunrise equation, which is good to within a
//! couple of minutes outside the polar circles. That is plenty for picking
//! a wallpaper.

use super::Location;
use crate::brightness::BrightnessBucket;
use chrono::{DateTime, Datelike, NaiveDate, TimeZone, Utc};

/// Solar altitude at sunrise/sunset (refraction plus solar disc radius).
const HORIZON_ALTITUDE: f64 = -0.833;
/// Solar altitude bounding civil twilight.
const CIVIL_ALTITUDE: f64 = -6.0;

const J2000: f64 = 2_451_545.0;
const UNIX_EPOCH_JULIAN: f64 = 2_440_587.5;
/// Days from 0001-01-01 (CE day 1) to 1970-01-01.
const CE_DAYS_TO_UNIX_EPOCH: i64 = 719_163;
const EARTH_OBLIQUITY: f64 = 23.4397;

/// When the sun passes a given altitude on one date.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SunCrossing {
    Times {
        rise: DateTime<Utc>,
        set: DateTime<Utc>,
    },
    /// The sun stays above the altitude all day (midnight sun).
    AlwaysAbove,
    /// The sun never reaches the altitude (polar night).
    AlwaysBelow,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SunTimes {
    /// Sunrise and sunset.
    pub daylight: SunCrossing,
    /// Start and end of civil twilight.
    pub civil: SunCrossing,
}

impl SunTimes {
    pub fn for_date(date: NaiveDate, location: Location) -> Self {
        Self {
            daylight: crossing(date, location, HORIZON_ALTITUDE),
            civil: crossing(date, location, CIVIL_ALTITUDE),
        }
    }

    /// Bright strictly between sunrise and sunset, dark outside civil
    /// twilight, medium in between.
    pub fn bucket_at(&self, now: DateTime<Utc>) -> BrightnessBucket {
        let daytime = match self.daylight {
            SunCrossing::Times { rise, set } => rise < now && now < set,
            SunCrossing::AlwaysAbove => true,
            SunCrossing::AlwaysBelow => false,
        };
        if daytime {
            return BrightnessBucket::Bright;
        }

        match self.civil {
            SunCrossing::Times { rise, set } if now < rise || now > set => BrightnessBucket::Dark,
            SunCrossing::Times { .. } => BrightnessBucket::Medium,
            SunCrossing::AlwaysAbove => BrightnessBucket::Medium,
            SunCrossing::AlwaysBelow => BrightnessBucket::Dark,
        }
    }
}

fn crossing(date: NaiveDate, location: Location, altitude: f64) -> SunCrossing {
    let days = i64::from(date.num_days_from_ce()) - CE_DAYS_TO_UNIX_EPOCH;
    let n = days as f64 + UNIX_EPOCH_JULIAN + 0.5 - J2000 + 0.0008;

    // Mean solar noon
    let j_star = n - location.longitude / 360.0;
    let mean_anomaly = (357.5291 + 0.985_600_28 * j_star).rem_euclid(360.0);
    let m = mean_anomaly.to_radians();
    let center = 1.9148 * m.sin() + 0.0200 * (2.0 * m).sin() + 0.0003 * (3.0 * m).sin();
    let ecliptic_longitude = (mean_anomaly + center + 180.0 + 102.9372).rem_euclid(360.0);
    let lambda = ecliptic_longitude.to_radians();
    let transit = J2000 + j_star + 0.0053 * m.sin() - 0.0069 * (2.0 * lambda).sin();

    let sin_declination = lambda.sin() * EARTH_OBLIQUITY.to_radians().sin();
    let cos_declination = sin_declination.asin().cos();
    let phi = location.latitude.to_radians();
    let cos_hour_angle = (altitude.to_radians().sin() - phi.sin() * sin_declination)
        / (phi.cos() * cos_declination);

    if cos_hour_angle > 1.0 {
        return SunCrossing::AlwaysBelow;
    }
    if cos_hour_angle < -1.0 || !cos_hour_angle.is_finite() {
        return SunCrossing::AlwaysAbove;
    }

    let half_day = cos_hour_angle.acos().to_degrees() / 360.0;
    match (
        julian_to_utc(transit - half_day),
        julian_to_utc(transit + half_day),
    ) {
        (Some(rise), Some(set)) => SunCrossing::Times { rise, set },
        _ => SunCrossing::AlwaysBelow,
    }
}

fn julian_to_utc(julian: f64) -> Option<DateTime<Utc>> {
    let seconds = ((julian - UNIX_EPOCH_JULIAN) * 86_400.0).round() as i64;
    Utc.timestamp_opt(seconds, 0).single()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0)
            .single()
            .expect("valid time")
    }

    fn assert_close(actual: DateTime<Utc>, expected: DateTime<Utc>) {
        let diff = (actual - expected).num_minutes().abs();
        assert!(diff <= 5, "{actual} is {diff} minutes from {expected}");
    }

    fn amsterdam() -> Location {
        Location::new(52.37, 4.90).expect("valid")
    }

    fn tromso() -> Location {
        Location::new(69.65, 18.96).expect("valid")
    }

    #[test]
    fn midsummer_amsterdam() {
        let sun = SunTimes::for_date(date(2024, 6, 21), amsterdam());
        match sun.daylight {
            SunCrossing::Times { rise, set } => {
                assert_close(rise, utc(2024, 6, 21, 3, 19));
                assert_close(set, utc(2024, 6, 21, 20, 7));
            }
            other => panic!("expected sunrise and sunset, got {other:?}"),
        }
        match sun.civil {
            SunCrossing::Times { rise, set } => {
                assert_close(rise, utc(2024, 6, 21, 2, 29));
                assert_close(set, utc(2024, 6, 21, 20, 57));
            }
            other => panic!("expected civil twilight, got {other:?}"),
        }
    }

    #[test]
    fn buckets_across_a_day() {
        let sun = SunTimes::for_date(date(2024, 6, 21), amsterdam());
        assert_eq!(sun.bucket_at(utc(2024, 6, 21, 1, 0)), BrightnessBucket::Dark);
        assert_eq!(sun.bucket_at(utc(2024, 6, 21, 2, 50)), BrightnessBucket::Medium);
        assert_eq!(sun.bucket_at(utc(2024, 6, 21, 12, 0)), BrightnessBucket::Bright);
        assert_eq!(sun.bucket_at(utc(2024, 6, 21, 20, 30)), BrightnessBucket::Medium);
        assert_eq!(sun.bucket_at(utc(2024, 6, 21, 22, 0)), BrightnessBucket::Dark);
    }

    #[test]
    fn midnight_sun_is_always_day() {
        let sun = SunTimes::for_date(date(2024, 6, 21), tromso());
        assert_eq!(sun.daylight, SunCrossing::AlwaysAbove);
        assert_eq!(sun.bucket_at(utc(2024, 6, 21, 23, 0)), BrightnessBucket::Bright);
    }

    #[test]
    fn polar_night_keeps_civil_twilight() {
        let sun = SunTimes::for_date(date(2024, 12, 21), tromso());
        assert_eq!(sun.daylight, SunCrossing::AlwaysBelow);
        assert!(matches!(sun.civil, SunCrossing::Times { .. }));
        assert_eq!(sun.bucket_at(utc(2024, 12, 21, 10, 30)), BrightnessBucket::Medium);
        assert_eq!(sun.bucket_at(utc(2024, 12, 21, 16, 0)), BrightnessBucket::Dark);
    }
}

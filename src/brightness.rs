//! Brightness buckets shared by images and times of day.
//!
//! Images are classified from the kurtosis of their tonal histogram: a
//! peaked histogram (high kurtosis) means a mostly dark picture, a flat one
//! (negative kurtosis) a bright picture.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Below this kurtosis an image is bright.
pub const KURTOSIS_LOW: f64 = 0.0;
/// Above this kurtosis an image is dark.
pub const KURTOSIS_HIGH: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BrightnessBucket {
    Dark = 0,
    Medium = 1,
    Bright = 2,
}

impl BrightnessBucket {
    pub const ALL: [BrightnessBucket; 3] = [
        BrightnessBucket::Dark,
        BrightnessBucket::Medium,
        BrightnessBucket::Bright,
    ];

    /// Stored integer value (0 = dark, 1 = medium, 2 = bright).
    pub fn as_i64(self) -> i64 {
        self as i64
    }

    pub fn from_i64(value: i64) -> Option<Self> {
        match value {
            0 => Some(BrightnessBucket::Dark),
            1 => Some(BrightnessBucket::Medium),
            2 => Some(BrightnessBucket::Bright),
            _ => None,
        }
    }

    /// Whether an unoverridden image with this kurtosis is eligible when
    /// this bucket is the time-of-day target.
    ///
    /// The twilight band is open on both ends, so kurtosis values sitting
    /// exactly on a threshold classify as medium but are not picked for
    /// twilight.
    pub fn admits_kurtosis(self, kurtosis: f64) -> bool {
        match self {
            BrightnessBucket::Bright => kurtosis < KURTOSIS_LOW,
            BrightnessBucket::Dark => kurtosis > KURTOSIS_HIGH,
            BrightnessBucket::Medium => KURTOSIS_LOW < kurtosis && kurtosis < KURTOSIS_HIGH,
        }
    }

    /// Name used for the time of day this bucket stands for.
    pub fn period_name(self) -> &'static str {
        match self {
            BrightnessBucket::Dark => "night",
            BrightnessBucket::Medium => "twilight",
            BrightnessBucket::Bright => "day",
        }
    }
}

impl fmt::Display for BrightnessBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BrightnessBucket::Dark => "dark",
            BrightnessBucket::Medium => "medium",
            BrightnessBucket::Bright => "bright",
        };
        f.write_str(name)
    }
}

impl FromStr for BrightnessBucket {
    type Err = String;

    /// Accepts the numeric value or a bucket/period name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "0" | "dark" | "night" => Ok(BrightnessBucket::Dark),
            "1" | "medium" | "twilight" => Ok(BrightnessBucket::Medium),
            "2" | "bright" | "day" => Ok(BrightnessBucket::Bright),
            other => Err(format!(
                "invalid brightness '{other}' (expected 0/dark, 1/medium or 2/bright)"
            )),
        }
    }
}

/// Map a kurtosis score to its brightness bucket.
pub fn classify(kurtosis: f64) -> BrightnessBucket {
    if kurtosis < KURTOSIS_LOW {
        BrightnessBucket::Bright
    } else if kurtosis > KURTOSIS_HIGH {
        BrightnessBucket::Dark
    } else {
        BrightnessBucket::Medium
    }
}

/// Bucket an image actually counts as: the user override wins.
pub fn effective_bucket(
    kurtosis: Option<f64>,
    defined: Option<BrightnessBucket>,
) -> Option<BrightnessBucket> {
    defined.or_else(|| kurtosis.map(classify))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_follows_inverse_thresholds() {
        assert_eq!(classify(-1.0), BrightnessBucket::Bright);
        assert_eq!(classify(-0.0001), BrightnessBucket::Bright);
        assert_eq!(classify(1.0), BrightnessBucket::Medium);
        assert_eq!(classify(2.0001), BrightnessBucket::Dark);
        assert_eq!(classify(5.0), BrightnessBucket::Dark);
    }

    #[test]
    fn thresholds_themselves_are_medium() {
        assert_eq!(classify(0.0), BrightnessBucket::Medium);
        assert_eq!(classify(2.0), BrightnessBucket::Medium);
    }

    #[test]
    fn admits_kurtosis_matches_classify_off_the_boundaries() {
        for k in [-3.5, -0.2, 0.4, 1.9, 2.3, 9.0] {
            let bucket = classify(k);
            for candidate in BrightnessBucket::ALL {
                assert_eq!(candidate.admits_kurtosis(k), candidate == bucket, "k = {k}");
            }
        }
    }

    #[test]
    fn twilight_excludes_exact_thresholds() {
        assert!(!BrightnessBucket::Medium.admits_kurtosis(0.0));
        assert!(!BrightnessBucket::Medium.admits_kurtosis(2.0));
        assert!(!BrightnessBucket::Bright.admits_kurtosis(0.0));
        assert!(!BrightnessBucket::Dark.admits_kurtosis(2.0));
    }

    #[test]
    fn override_takes_precedence() {
        assert_eq!(
            effective_bucket(Some(5.0), Some(BrightnessBucket::Bright)),
            Some(BrightnessBucket::Bright)
        );
        assert_eq!(effective_bucket(Some(5.0), None), Some(BrightnessBucket::Dark));
        assert_eq!(effective_bucket(None, None), None);
    }

    #[test]
    fn parse_and_roundtrip_integer_values() {
        assert_eq!("2".parse::<BrightnessBucket>(), Ok(BrightnessBucket::Bright));
        assert_eq!("Night".parse::<BrightnessBucket>(), Ok(BrightnessBucket::Dark));
        assert!("3".parse::<BrightnessBucket>().is_err());
        for bucket in BrightnessBucket::ALL {
            assert_eq!(BrightnessBucket::from_i64(bucket.as_i64()), Some(bucket));
        }
        assert_eq!(BrightnessBucket::from_i64(7), None);
    }
}

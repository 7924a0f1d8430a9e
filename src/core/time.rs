//! Time coordinates for attribute reads and writes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Time at which a value is read or authored.
///
/// `Default` addresses the attribute's untimed default value; it is what
/// uniform attributes always use.
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub enum TimeCode {
    #[default]
    Default,
    Time(f64),
}

impl TimeCode {
    pub const fn is_default(&self) -> bool {
        matches!(self, TimeCode::Default)
    }

    pub const fn value(&self) -> Option<f64> {
        match self {
            TimeCode::Default => None,
            TimeCode::Time(t) => Some(*t),
        }
    }
}

impl From<f64> for TimeCode {
    fn from(t: f64) -> Self {
        TimeCode::Time(t)
    }
}

impl From<Option<f64>> for TimeCode {
    fn from(t: Option<f64>) -> Self {
        t.map_or(TimeCode::Default, TimeCode::Time)
    }
}

impl fmt::Display for TimeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeCode::Default => f.write_str("default"),
            TimeCode::Time(t) => write!(f, "{t}"),
        }
    }
}

/// How values between authored time samples are resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum InterpolationMode {
    /// Hold the earlier sample.
    Held,
    /// Interpolate floating-point values; other kinds hold.
    #[default]
    Linear,
}

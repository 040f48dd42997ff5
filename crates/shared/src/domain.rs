use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_CHANNEL_COUNT: u32 = 4;
pub const MAX_CHANNEL_COUNT: u32 = 1024;
pub const DEFAULT_CONTROLLER_NAME: &str = "gpio-fake";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    #[default]
    Normal,
    Inversed,
}

impl Polarity {
    pub fn as_str(self) -> &'static str {
        match self {
            Polarity::Normal => "normal",
            Polarity::Inversed => "inversed",
        }
    }
}

impl fmt::Display for Polarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown polarity '{0}', expected 'normal' or 'inversed'")]
pub struct ParsePolarityError(pub String);

impl FromStr for Polarity {
    type Err = ParsePolarityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("normal") {
            Ok(Polarity::Normal)
        } else if s.eq_ignore_ascii_case("inversed") || s.eq_ignore_ascii_case("inverted") {
            Ok(Polarity::Inversed)
        } else {
            Err(ParsePolarityError(s.to_string()))
        }
    }
}

/// Duty and period of one PWM cycle, in nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Waveform {
    pub duty_ns: u64,
    pub period_ns: u64,
}

impl Waveform {
    /// Returns `None` unless `0 <= duty_ns <= period_ns` and `period_ns > 0`.
    pub fn checked(duty_ns: i64, period_ns: i64) -> Option<Self> {
        if duty_ns < 0 || period_ns <= 0 || duty_ns > period_ns {
            return None;
        }

        Some(Self {
            duty_ns: duty_ns.unsigned_abs(),
            period_ns: period_ns.unsigned_abs(),
        })
    }
}

/// Full target state for an atomic `apply` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub duty_ns: i64,
    pub period_ns: i64,
    #[serde(default)]
    pub polarity: Polarity,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelState {
    pub index: u32,
    pub requested: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub duty_ns: u64,
    pub period_ns: u64,
    pub polarity: Polarity,
    pub enabled: bool,
    pub configured: bool,
}

impl ChannelState {
    pub fn new(index: u32) -> Self {
        Self {
            index,
            requested: false,
            label: None,
            duty_ns: 0,
            period_ns: 0,
            polarity: Polarity::Normal,
            enabled: false,
            configured: false,
        }
    }

    pub fn is_default(&self) -> bool {
        *self == Self::new(self.index)
    }

    pub fn waveform(&self) -> Option<Waveform> {
        self.configured.then_some(Waveform {
            duty_ns: self.duty_ns,
            period_ns: self.period_ns,
        })
    }

    pub fn duty_ratio(&self) -> Option<f64> {
        self.waveform()
            .map(|wf| wf.duty_ns as f64 / wf.period_ns as f64)
    }
}

impl fmt::Display for ChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "pin:{};requested:{};configured:{};duty_ns:{},period_ns:{};polarity:{};enable:{}",
            self.index,
            u8::from(self.requested),
            u8::from(self.configured),
            self.duty_ns,
            self.period_ns,
            self.polarity,
            u8::from(self.enabled),
        )?;
        if let Some(label) = &self.label {
            write!(f, ";label:{label}")?;
        }
        Ok(())
    }
}

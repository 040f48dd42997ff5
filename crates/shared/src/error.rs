use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    OutOfRange,
    AlreadyRequested,
    NotRequested,
    NotConfigured,
    InvalidTiming,
    PolarityChangeWhileEnabled,
    ZeroChannels,
    TooManyChannels,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::OutOfRange => "out_of_range",
            ErrorKind::AlreadyRequested => "already_requested",
            ErrorKind::NotRequested => "not_requested",
            ErrorKind::NotConfigured => "not_configured",
            ErrorKind::InvalidTiming => "invalid_timing",
            ErrorKind::PolarityChangeWhileEnabled => "polarity_change_while_enabled",
            ErrorKind::ZeroChannels => "zero_channels",
            ErrorKind::TooManyChannels => "too_many_channels",
        }
    }

    /// Process exit code used by `pwmctl`. 1 and 2 are left to generic and usage failures.
    pub fn exit_code(self) -> u8 {
        match self {
            ErrorKind::ZeroChannels | ErrorKind::TooManyChannels => 1,
            ErrorKind::OutOfRange => 3,
            ErrorKind::AlreadyRequested => 4,
            ErrorKind::NotRequested => 5,
            ErrorKind::NotConfigured => 6,
            ErrorKind::InvalidTiming => 7,
            ErrorKind::PolarityChangeWhileEnabled => 8,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PwmError {
    #[error("channel {index} is out of range (controller has {channel_count} channels)")]
    OutOfRange { index: u32, channel_count: u32 },
    #[error("channel {index} is already requested")]
    AlreadyRequested { index: u32 },
    #[error("channel {index} has not been requested")]
    NotRequested { index: u32 },
    #[error("channel {index} has not been configured")]
    NotConfigured { index: u32 },
    #[error(
        "invalid timing for channel {index}: duty_ns={duty_ns} period_ns={period_ns} \
         (expected 0 <= duty_ns <= period_ns and period_ns > 0)"
    )]
    InvalidTiming {
        index: u32,
        duty_ns: i64,
        period_ns: i64,
    },
    #[error("cannot change polarity of channel {index} while it is enabled")]
    PolarityChangeWhileEnabled { index: u32 },
    #[error("a PWM controller needs at least one channel")]
    ZeroChannels,
    #[error("a PWM controller supports at most {max} channels, {requested} requested")]
    TooManyChannels { requested: u32, max: u32 },
}

impl PwmError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PwmError::OutOfRange { .. } => ErrorKind::OutOfRange,
            PwmError::AlreadyRequested { .. } => ErrorKind::AlreadyRequested,
            PwmError::NotRequested { .. } => ErrorKind::NotRequested,
            PwmError::NotConfigured { .. } => ErrorKind::NotConfigured,
            PwmError::InvalidTiming { .. } => ErrorKind::InvalidTiming,
            PwmError::PolarityChangeWhileEnabled { .. } => ErrorKind::PolarityChangeWhileEnabled,
            PwmError::ZeroChannels => ErrorKind::ZeroChannels,
            PwmError::TooManyChannels { .. } => ErrorKind::TooManyChannels,
        }
    }

    pub fn channel(&self) -> Option<u32> {
        match *self {
            PwmError::OutOfRange { index, .. }
            | PwmError::AlreadyRequested { index }
            | PwmError::NotRequested { index }
            | PwmError::NotConfigured { index }
            | PwmError::InvalidTiming { index, .. }
            | PwmError::PolarityChangeWhileEnabled { index } => Some(index),
            PwmError::ZeroChannels | PwmError::TooManyChannels { .. } => None,
        }
    }
}

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    domain::{ChannelConfig, Polarity},
    error::{ErrorKind, PwmError},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum Operation {
    Request {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        label: Option<String>,
    },
    Free,
    Configure {
        duty_ns: i64,
        period_ns: i64,
    },
    SetPolarity {
        polarity: Polarity,
    },
    Enable,
    Disable,
    Apply {
        config: ChannelConfig,
    },
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Request { .. } => f.write_str("request:1"),
            Operation::Free => f.write_str("request:0"),
            Operation::Configure { duty_ns, period_ns } => {
                write!(f, "duty_ns:{duty_ns},period_ns:{period_ns}")
            }
            Operation::SetPolarity { polarity } => write!(f, "polarity:{polarity}"),
            Operation::Enable => f.write_str("enable:1"),
            Operation::Disable => f.write_str("enable:0"),
            Operation::Apply { config } => write!(
                f,
                "duty_ns:{},period_ns:{},polarity:{},enable:{}",
                config.duty_ns,
                config.period_ns,
                config.polarity,
                u8::from(config.enabled)
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "error", rename_all = "snake_case")]
pub enum Outcome {
    Ok,
    Err(ErrorKind),
}

impl Outcome {
    pub fn is_ok(self) -> bool {
        matches!(self, Outcome::Ok)
    }
}

impl<T> From<&Result<T, PwmError>> for Outcome {
    fn from(value: &Result<T, PwmError>) -> Self {
        match value {
            Ok(_) => Outcome::Ok,
            Err(err) => Outcome::Err(err.kind()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub seq: u64,
    pub channel_index: u32,
    pub operation: Operation,
    pub outcome: Outcome,
}

impl fmt::Display for EventRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pin:{};{}", self.channel_index, self.operation)?;
        if let Outcome::Err(kind) = self.outcome {
            write!(f, ";error:{kind}")?;
        }
        Ok(())
    }
}

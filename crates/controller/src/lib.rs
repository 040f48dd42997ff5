//! In-memory model of a multi-channel PWM controller.
//!
//! Every operation validates the target channel completely before touching
//! it, so a failed call never leaves a channel half-updated. Successful and
//! failed calls alike are appended to an event log that tests can drain.

use std::{
    mem,
    ops::Range,
    sync::{Mutex, MutexGuard, PoisonError},
};

use shared::{
    domain::{
        ChannelConfig, ChannelState, Polarity, Waveform, DEFAULT_CHANNEL_COUNT,
        DEFAULT_CONTROLLER_NAME, MAX_CHANNEL_COUNT,
    },
    error::PwmError,
    protocol::{EventRecord, Operation, Outcome},
};
use tracing::{debug, info, warn};

struct Inner {
    channels: Vec<ChannelState>,
    events: Vec<EventRecord>,
    next_seq: u64,
}

impl Inner {
    fn record(
        &mut self,
        channel_index: u32,
        operation: Operation,
        result: &Result<(), PwmError>,
    ) -> EventRecord {
        let event = EventRecord {
            seq: self.next_seq,
            channel_index,
            operation,
            outcome: Outcome::from(result),
        };
        self.next_seq += 1;
        self.events.push(event.clone());
        event
    }
}

/// A fake PWM chip with a fixed number of channels.
///
/// One mutex guards the channel array and the event log together, which
/// makes every operation linearizable and gives the log a total order.
/// Share it between threads with `Arc`.
pub struct PwmController {
    name: String,
    channel_count: u32,
    inner: Mutex<Inner>,
}

impl PwmController {
    pub fn new(channel_count: u32) -> Result<Self, PwmError> {
        Self::with_name(DEFAULT_CONTROLLER_NAME, channel_count)
    }

    pub fn with_name(name: impl Into<String>, channel_count: u32) -> Result<Self, PwmError> {
        if channel_count == 0 {
            return Err(PwmError::ZeroChannels);
        }
        if channel_count > MAX_CHANNEL_COUNT {
            return Err(PwmError::TooManyChannels {
                requested: channel_count,
                max: MAX_CHANNEL_COUNT,
            });
        }
        Ok(Self::build(name.into(), channel_count))
    }

    fn build(name: String, channel_count: u32) -> Self {
        let channels = (0..channel_count).map(ChannelState::new).collect();
        info!(controller = %name, channel_count, "probed");
        Self {
            name,
            channel_count,
            inner: Mutex::new(Inner {
                channels,
                events: Vec::new(),
                next_seq: 0,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn channel_count(&self) -> u32 {
        self.channel_count
    }

    /// Every valid channel index, in order.
    pub fn channels(&self) -> Range<u32> {
        0..self.channel_count
    }

    /// Claims a free channel. Fails with `AlreadyRequested` if another
    /// caller holds it.
    pub fn request(&self, index: u32) -> Result<(), PwmError> {
        self.claim(index, None)
    }

    /// Like [`PwmController::request`], recording who holds the channel.
    pub fn request_labeled(&self, index: u32, label: impl Into<String>) -> Result<(), PwmError> {
        self.claim(index, Some(label.into()))
    }

    fn claim(&self, index: u32, label: Option<String>) -> Result<(), PwmError> {
        let operation = Operation::Request {
            label: label.clone(),
        };
        self.execute(index, operation, |channel| {
            if channel.requested {
                return Err(PwmError::AlreadyRequested { index });
            }
            channel.requested = true;
            channel.label = label;
            Ok(())
        })
    }

    /// Releases a channel and resets it to its power-on state.
    pub fn free(&self, index: u32) -> Result<(), PwmError> {
        self.execute(index, Operation::Free, |channel| {
            require_requested(channel)?;
            if channel.enabled {
                debug!(channel = index, "disabling channel before release");
            }
            *channel = ChannelState::new(index);
            Ok(())
        })
    }

    /// Sets duty and period. Allowed while the channel is enabled; the new
    /// values take effect immediately.
    pub fn configure(&self, index: u32, duty_ns: i64, period_ns: i64) -> Result<(), PwmError> {
        let operation = Operation::Configure { duty_ns, period_ns };
        self.execute(index, operation, |channel| {
            require_requested(channel)?;
            let waveform = checked_waveform(index, duty_ns, period_ns)?;
            channel.duty_ns = waveform.duty_ns;
            channel.period_ns = waveform.period_ns;
            channel.configured = true;
            Ok(())
        })
    }

    /// Rejected with `PolarityChangeWhileEnabled` while the output is on,
    /// even when the polarity would not change.
    pub fn set_polarity(&self, index: u32, polarity: Polarity) -> Result<(), PwmError> {
        self.execute(index, Operation::SetPolarity { polarity }, |channel| {
            require_requested(channel)?;
            if channel.enabled {
                return Err(PwmError::PolarityChangeWhileEnabled { index });
            }
            channel.polarity = polarity;
            Ok(())
        })
    }

    pub fn enable(&self, index: u32) -> Result<(), PwmError> {
        self.execute(index, Operation::Enable, |channel| {
            require_requested(channel)?;
            if !channel.configured {
                return Err(PwmError::NotConfigured { index });
            }
            channel.enabled = true;
            Ok(())
        })
    }

    pub fn disable(&self, index: u32) -> Result<(), PwmError> {
        self.execute(index, Operation::Disable, |channel| {
            require_requested(channel)?;
            channel.enabled = false;
            Ok(())
        })
    }

    /// Applies timing, polarity and enable state in one step.
    ///
    /// The polarity may only differ from the current one while the channel
    /// is disabled. On success the channel counts as configured.
    pub fn apply(&self, index: u32, config: &ChannelConfig) -> Result<(), PwmError> {
        let config = *config;
        self.execute(index, Operation::Apply { config }, |channel| {
            require_requested(channel)?;
            let waveform = checked_waveform(index, config.duty_ns, config.period_ns)?;
            if channel.enabled && channel.polarity != config.polarity {
                return Err(PwmError::PolarityChangeWhileEnabled { index });
            }
            channel.duty_ns = waveform.duty_ns;
            channel.period_ns = waveform.period_ns;
            channel.polarity = config.polarity;
            channel.configured = true;
            channel.enabled = config.enabled;
            Ok(())
        })
    }

    pub fn snapshot(&self, index: u32) -> Result<ChannelState, PwmError> {
        self.lock()
            .channels
            .get(index as usize)
            .cloned()
            .ok_or(PwmError::OutOfRange {
                index,
                channel_count: self.channel_count,
            })
    }

    pub fn snapshot_all(&self) -> Vec<ChannelState> {
        self.lock().channels.clone()
    }

    /// Copy of the event log, leaving it in place.
    pub fn events(&self) -> Vec<EventRecord> {
        self.lock().events.clone()
    }

    /// Takes the event log in the order operations were applied.
    pub fn drain_events(&self) -> Vec<EventRecord> {
        mem::take(&mut self.lock().events)
    }

    fn execute<F>(&self, index: u32, operation: Operation, apply: F) -> Result<(), PwmError>
    where
        F: FnOnce(&mut ChannelState) -> Result<(), PwmError>,
    {
        let mut inner = self.lock();
        let result = match inner.channels.get_mut(index as usize) {
            Some(channel) => apply(channel),
            None => Err(PwmError::OutOfRange {
                index,
                channel_count: self.channel_count,
            }),
        };
        let event = inner.record(index, operation, &result);

        // Logged under the lock so that log lines come out in `seq` order.
        match &result {
            Ok(()) => info!(controller = %self.name, seq = event.seq, "{event}"),
            Err(err) => warn!(controller = %self.name, seq = event.seq, error = %err, "{event}"),
        }
        result
    }

    // Validation always precedes mutation, so a poisoned guard still holds
    // consistent state.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for PwmController {
    fn default() -> Self {
        Self::build(DEFAULT_CONTROLLER_NAME.to_string(), DEFAULT_CHANNEL_COUNT)
    }
}

impl Drop for PwmController {
    fn drop(&mut self) {
        info!(controller = %self.name, "removed");
    }
}

fn require_requested(channel: &ChannelState) -> Result<(), PwmError> {
    if channel.requested {
        Ok(())
    } else {
        Err(PwmError::NotRequested {
            index: channel.index,
        })
    }
}

fn checked_waveform(index: u32, duty_ns: i64, period_ns: i64) -> Result<Waveform, PwmError> {
    Waveform::checked(duty_ns, period_ns).ok_or(PwmError::InvalidTiming {
        index,
        duty_ns,
        period_ns,
    })
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;

/// Publish-on-change orchestration between the device store and the transport
use log::{debug, info, warn};
use thiserror::Error;

use crate::decoder::{decode, DecodeError};
use crate::models::{DevicePath, DeviceState, RawObservation};
use crate::state::DeviceStore;
use crate::topics::{self, Message};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PublishError {
    #[error("publish to {topic} failed: {message}")]
    Transport { topic: String, message: String },
}

/// Outbound side of the message bus
///
/// Implementations must not block; delivery and reconnects are their concern.
pub trait Publisher {
    fn publish(&self, topic: &str, payload: &str, retained: bool) -> Result<(), PublishError>;
}

/// Why a changed device produced no state message
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SkipReason {
    #[error("device has no address yet")]
    MissingAddress,

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("failed to serialize payload: {0}")]
    Serialize(String),

    #[error(transparent)]
    Publish(#[from] PublishError),
}

impl From<serde_json::Error> for SkipReason {
    fn from(err: serde_json::Error) -> Self {
        SkipReason::Serialize(err.to_string())
    }
}

/// What `handle_observation` did with one observation
#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing observable changed
    Unchanged,
    /// Changed, but no manufacturer payload has been seen yet
    AwaitingPayload,
    /// State was published, preceded by discovery and availability if `announced`
    Published { announced: bool },
    /// Changed, but this cycle's publish was abandoned
    Skipped(SkipReason),
}

/// Owns the device table and turns observations into MQTT messages
pub struct Bridge<P> {
    publisher: P,
    store: DeviceStore,
    pressure_offset: f64,
}

impl<P: Publisher> Bridge<P> {
    pub fn new(publisher: P, pressure_offset: f64) -> Self {
        Bridge {
            publisher,
            store: DeviceStore::new(),
            pressure_offset,
        }
    }

    #[cfg(test)]
    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    pub fn store(&self) -> &DeviceStore {
        &self.store
    }

    /// Merge one observation and publish whatever it changed
    ///
    /// Errors are scoped to this device and this cycle: they are logged and
    /// reported in the returned outcome, never propagated.
    pub fn handle_observation(
        &mut self,
        path: &DevicePath,
        observation: RawObservation,
    ) -> Outcome {
        let merge = self.store.merge(path, observation);
        if merge.is_new_device {
            debug!("Tracking new device {}", path);
        }
        if !merge.changed {
            return Outcome::Unchanged;
        }

        match self.publish_state(path, &merge.state) {
            Ok(outcome) => outcome,
            Err(reason) => {
                warn!("Skipping publish for {}: {}", path, reason);
                Outcome::Skipped(reason)
            }
        }
    }

    fn publish_state(
        &mut self,
        path: &DevicePath,
        state: &DeviceState,
    ) -> Result<Outcome, SkipReason> {
        let Some(payload) = state.last_payload.as_deref() else {
            return Ok(Outcome::AwaitingPayload);
        };
        let id = state.identity().ok_or(SkipReason::MissingAddress)?;

        // Decode before publishing anything so a bad payload leaves no partial announcement
        let mut measurement = decode(payload, self.pressure_offset)?;
        measurement.signal_strength = state.signal_strength;
        debug!("Decoded {} (mac {}): {:?}", id, measurement.mac, measurement);
        let state_message = topics::state_message(&id, &measurement)?;

        let announce = !state.ever_published;
        if announce {
            let name = state.name.as_deref().unwrap_or(id.as_str());
            let mut messages = topics::discovery_messages(&id, name)?;
            messages.push(topics::availability_message(&id));
            for message in &messages {
                self.send(message)?;
            }
        }

        self.send(&state_message)?;
        if announce {
            self.store.mark_published(path);
        }

        Ok(Outcome::Published { announced: announce })
    }

    fn send(&self, message: &Message) -> Result<(), PublishError> {
        info!(
            "Publish {:?} {}{}",
            message.topic,
            message.payload,
            if message.retained { " retain" } else { "" }
        );
        self.publisher
            .publish(&message.topic, &message.payload, message.retained)
    }
}

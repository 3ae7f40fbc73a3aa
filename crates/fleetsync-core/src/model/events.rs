// ── Printer event domain types ──
//
// Raw telegrams arrive as `{printerId, event, payload}`. They are parsed
// into a `PrinterMessage` over the fixed slot label set before they touch
// the cache, so the cache only ever stores well-formed slots.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{AsRefStr, Display, EnumString};

use super::ids::PrinterId;
use crate::error::CoreError;

/// Bulk fields stripped from `history` payloads before storage.
pub const PRUNED_HISTORY_FIELDS: [&str; 3] = ["logs", "temps", "messages"];

/// Slot label of a printer's aggregated event state.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString, Display, AsRefStr,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum SlotLabel {
    Current,
    History,
    Timelapse,
    Event,
    Plugin,
}

/// One stored slot: the payload and when it was received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSlot {
    pub payload: Value,
    pub received_at: DateTime<Utc>,
}

impl EventSlot {
    pub fn now(payload: Value) -> Self {
        Self {
            payload,
            received_at: Utc::now(),
        }
    }
}

/// Last known event state of one printer.
///
/// `event` and `plugin` are keyed by event type / plugin name so that
/// concurrent subtypes never clobber each other.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrinterEventsCacheDto {
    pub current: Option<EventSlot>,
    pub history: Option<EventSlot>,
    pub timelapse: Option<EventSlot>,
    pub event: BTreeMap<String, EventSlot>,
    pub plugin: BTreeMap<String, EventSlot>,
}

impl PrinterEventsCacheDto {
    /// Store one parsed message into its slot.
    pub fn apply(&mut self, message: PrinterMessage) {
        match message {
            PrinterMessage::Current(payload) => self.current = Some(EventSlot::now(payload)),
            PrinterMessage::History(payload) => {
                self.history = Some(EventSlot::now(prune_history_payload(payload)));
            }
            PrinterMessage::Timelapse(payload) => self.timelapse = Some(EventSlot::now(payload)),
            PrinterMessage::Event {
                event_type,
                payload,
            } => {
                self.event.insert(event_type, EventSlot::now(payload));
            }
            PrinterMessage::Plugin { plugin, payload } => {
                self.plugin.insert(plugin, EventSlot::now(payload));
            }
        }
    }
}

// ── Wire shapes ──────────────────────────────────────────────────────

/// One telegram from a printer's live connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrinterTelegram {
    pub printer_id: PrinterId,
    pub event: String,
    #[serde(default)]
    pub payload: Value,
}

impl PrinterTelegram {
    pub fn new(printer_id: impl Into<PrinterId>, event: &str, payload: Value) -> Self {
        Self {
            printer_id: printer_id.into(),
            event: event.to_owned(),
            payload,
        }
    }
}

/// Fleet-wide notice that printers were deregistered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrintersDeleted {
    pub printer_ids: Vec<PrinterId>,
}

// ── Parsed messages ──────────────────────────────────────────────────

/// A telegram payload resolved against the fixed slot label set.
#[derive(Debug, Clone, PartialEq)]
pub enum PrinterMessage {
    Current(Value),
    History(Value),
    Timelapse(Value),
    /// `payload.type` names the subtype; `payload.payload` is stored.
    Event { event_type: String, payload: Value },
    /// `payload.plugin` names the plugin; the whole payload is stored.
    Plugin { plugin: String, payload: Value },
}

impl PrinterMessage {
    /// The value that ends up stored in the slot.
    pub fn payload(&self) -> &Value {
        match self {
            Self::Current(payload)
            | Self::History(payload)
            | Self::Timelapse(payload)
            | Self::Event { payload, .. }
            | Self::Plugin { payload, .. } => payload,
        }
    }

    pub fn label(&self) -> SlotLabel {
        match self {
            Self::Current(_) => SlotLabel::Current,
            Self::History(_) => SlotLabel::History,
            Self::Timelapse(_) => SlotLabel::Timelapse,
            Self::Event { .. } => SlotLabel::Event,
            Self::Plugin { .. } => SlotLabel::Plugin,
        }
    }
}

impl TryFrom<PrinterTelegram> for PrinterMessage {
    type Error = CoreError;

    fn try_from(telegram: PrinterTelegram) -> Result<Self, Self::Error> {
        let label: SlotLabel = telegram.event.parse().map_err(|_| {
            CoreError::validation("event", format!("unknown slot label '{}'", telegram.event))
        })?;

        let mut payload = telegram.payload;
        Ok(match label {
            SlotLabel::Current => Self::Current(payload),
            SlotLabel::History => Self::History(prune_history_payload(payload)),
            SlotLabel::Timelapse => Self::Timelapse(payload),
            SlotLabel::Event => {
                let event_type = payload
                    .get("type")
                    .and_then(Value::as_str)
                    .ok_or_else(|| CoreError::validation("payload.type", "missing event type"))?
                    .to_owned();
                let inner = payload
                    .get_mut("payload")
                    .map(Value::take)
                    .unwrap_or(Value::Null);
                Self::Event {
                    event_type,
                    payload: inner,
                }
            }
            SlotLabel::Plugin => {
                let plugin = payload
                    .get("plugin")
                    .and_then(Value::as_str)
                    .ok_or_else(|| CoreError::validation("payload.plugin", "missing plugin name"))?
                    .to_owned();
                Self::Plugin { plugin, payload }
            }
        })
    }
}

/// Strip bulk fields from a `history` payload.
pub fn prune_history_payload(mut payload: Value) -> Value {
    if let Some(object) = payload.as_object_mut() {
        for field in PRUNED_HISTORY_FIELDS {
            object.remove(field);
        }
    }
    payload
}

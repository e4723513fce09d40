//! Device message model.
//!
//! A message is a small flat mapping from string keys to scalar values,
//! exchanged with the watch over the app-message channel.

use std::collections::BTreeMap;

use happymac_weather::WeatherSample;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;

/// Message keys shared with the watchface.
pub mod keys {
    pub const THEME: &str = "theme";
    pub const WEATHER_ENABLED: &str = "WEATHER_ENABLED";
    pub const WEATHER_SHOW_TEMP: &str = "WEATHER_SHOW_TEMP";
    pub const WEATHER_TEMP_UNIT: &str = "WEATHER_TEMP_UNIT";
    pub const WEATHER_REQUEST: &str = "WEATHER_REQUEST";
    pub const WEATHER_TEMP: &str = "WEATHER_TEMP";
    pub const WEATHER_CODE: &str = "WEATHER_CODE";
}

/// A message value.
///
/// The device only sends scalars, but a field of any other JSON shape lands
/// in `Other` so it can be ignored on its own instead of failing the whole
/// message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageValue {
    Bool(bool),
    Int(i64),
    Str(String),
    Other(Value),
}

impl From<bool> for MessageValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for MessageValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for MessageValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<&str> for MessageValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for MessageValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

/// A keyed message to or from the device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppMessage(BTreeMap<String, MessageValue>);

impl AppMessage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: &str, value: impl Into<MessageValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: &str, value: impl Into<MessageValue>) {
        self.0.insert(key.to_string(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&MessageValue> {
        self.0.get(key)
    }

    /// Integer view of a field. Booleans read as 0/1, the way the watch
    /// packs them.
    pub fn get_int(&self, key: &str) -> Option<i64> {
        match self.get(key)? {
            MessageValue::Int(v) => Some(*v),
            MessageValue::Bool(b) => Some(i64::from(*b)),
            MessageValue::Str(_) | MessageValue::Other(_) => None,
        }
    }

    /// Boolean view of a field. Integers read as non-zero = true.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.get(key)? {
            MessageValue::Bool(b) => Some(*b),
            MessageValue::Int(v) => Some(*v != 0),
            MessageValue::Str(_) | MessageValue::Other(_) => None,
        }
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        match self.get(key)? {
            MessageValue::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<WeatherSample> for AppMessage {
    fn from(sample: WeatherSample) -> Self {
        AppMessage::new()
            .with(keys::WEATHER_TEMP, sample.temperature)
            .with(keys::WEATHER_CODE, sample.weather_code)
    }
}

/// Outbound channel to the device.
///
/// Sending never blocks: the channel queues and delivers on its own.
pub trait MessageSink: Send + Sync {
    fn send(&self, message: AppMessage);
}

impl MessageSink for UnboundedSender<AppMessage> {
    fn send(&self, message: AppMessage) {
        if UnboundedSender::send(self, message).is_err() {
            tracing::warn!("Device channel closed, dropping outbound message");
        }
    }
}

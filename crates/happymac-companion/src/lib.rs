//! Companion-side bridge for the HappyMac watchface.
//!
//! Syncs settings chosen on the configuration screen to the watch, merges
//! settings the watch sends back, and answers weather requests with the
//! current conditions at the host's position.

pub mod bridge;
pub mod companion;
pub mod host;
pub mod message;
pub mod router;
pub mod settings;

pub use bridge::{ConfigViewer, ConfigurationBridge};
pub use companion::{geolocator_from_config, Companion};
pub use host::{HostChannel, HostCommand, HostEvent};
pub use message::{keys, AppMessage, MessageSink, MessageValue};
pub use router::{settings_update, Dispatch, MessageRouter, WeatherRelay};
pub use settings::{
    SettingKey, SettingValue, Settings, SettingsStore, SettingsUpdate, Theme, SETTINGS_STORE_KEY,
};

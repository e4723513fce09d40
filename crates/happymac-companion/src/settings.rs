//! Canonical watchface settings shared by the configuration screen and the
//! device.

use std::sync::Arc;

use happymac_core::{KeyValueStore, KeyValueStoreExt};
use happymac_weather::TemperatureUnit;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::message::{keys, AppMessage, MessageValue};

/// Key of the settings record in the host store.
pub const SETTINGS_STORE_KEY: &str = "settings";

/// Watchface colour theme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "i64", try_from = "i64")]
pub enum Theme {
    #[default]
    Light,
    Dark,
    Color,
}

impl Theme {
    pub const ALL: [Theme; 3] = [Theme::Light, Theme::Dark, Theme::Color];

    pub fn code(self) -> i64 {
        match self {
            Theme::Light => 0,
            Theme::Dark => 1,
            Theme::Color => 2,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Theme::Light => "Light",
            Theme::Dark => "Dark",
            Theme::Color => "Color",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unknown theme code {0}")]
pub struct UnknownTheme(pub i64);

impl TryFrom<i64> for Theme {
    type Error = UnknownTheme;

    fn try_from(code: i64) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(Theme::Light),
            1 => Ok(Theme::Dark),
            2 => Ok(Theme::Color),
            other => Err(UnknownTheme(other)),
        }
    }
}

impl From<Theme> for i64 {
    fn from(theme: Theme) -> Self {
        theme.code()
    }
}

/// Full settings state. Field names on the wire match the message keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    #[serde(rename = "theme")]
    pub theme: Theme,
    #[serde(rename = "WEATHER_ENABLED")]
    pub weather_enabled: bool,
    #[serde(rename = "WEATHER_SHOW_TEMP")]
    pub weather_show_temp: bool,
    #[serde(rename = "WEATHER_TEMP_UNIT")]
    pub weather_temp_unit: TemperatureUnit,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            theme: Theme::Light,
            weather_enabled: true,
            weather_show_temp: true,
            weather_temp_unit: TemperatureUnit::Celsius,
        }
    }
}

/// The fixed set of setting keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingKey {
    Theme,
    WeatherEnabled,
    WeatherShowTemp,
    WeatherTempUnit,
}

impl SettingKey {
    pub const ALL: [SettingKey; 4] = [
        SettingKey::Theme,
        SettingKey::WeatherEnabled,
        SettingKey::WeatherShowTemp,
        SettingKey::WeatherTempUnit,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SettingKey::Theme => keys::THEME,
            SettingKey::WeatherEnabled => keys::WEATHER_ENABLED,
            SettingKey::WeatherShowTemp => keys::WEATHER_SHOW_TEMP,
            SettingKey::WeatherTempUnit => keys::WEATHER_TEMP_UNIT,
        }
    }

    /// Look up a key by its message name; unknown names are `None`.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.as_str() == name)
    }
}

/// A typed setting value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingValue {
    Theme(Theme),
    Bool(bool),
    Unit(TemperatureUnit),
}

impl From<SettingValue> for MessageValue {
    fn from(value: SettingValue) -> Self {
        match value {
            SettingValue::Theme(theme) => MessageValue::Int(theme.code()),
            SettingValue::Bool(b) => MessageValue::Bool(b),
            SettingValue::Unit(unit) => MessageValue::Str(unit.label().to_string()),
        }
    }
}

/// A partial settings change. Absent fields are left untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SettingsUpdate {
    pub theme: Option<Theme>,
    pub weather_enabled: Option<bool>,
    pub weather_show_temp: Option<bool>,
    pub weather_temp_unit: Option<TemperatureUnit>,
}

impl SettingsUpdate {
    pub fn is_empty(&self) -> bool {
        self.theme.is_none()
            && self.weather_enabled.is_none()
            && self.weather_show_temp.is_none()
            && self.weather_temp_unit.is_none()
    }

    fn apply_to(&self, settings: &mut Settings) {
        if let Some(theme) = self.theme {
            settings.theme = theme;
        }
        if let Some(enabled) = self.weather_enabled {
            settings.weather_enabled = enabled;
        }
        if let Some(show) = self.weather_show_temp {
            settings.weather_show_temp = show;
        }
        if let Some(unit) = self.weather_temp_unit {
            settings.weather_temp_unit = unit;
        }
    }

    /// Device message carrying only the fields present in this update.
    pub fn to_message(&self) -> AppMessage {
        let mut message = AppMessage::new();
        if let Some(theme) = self.theme {
            message.insert(keys::THEME, SettingValue::Theme(theme));
        }
        if let Some(enabled) = self.weather_enabled {
            message.insert(keys::WEATHER_ENABLED, SettingValue::Bool(enabled));
        }
        if let Some(show) = self.weather_show_temp {
            message.insert(keys::WEATHER_SHOW_TEMP, SettingValue::Bool(show));
        }
        if let Some(unit) = self.weather_temp_unit {
            message.insert(keys::WEATHER_TEMP_UNIT, SettingValue::Unit(unit));
        }
        message
    }
}

/// Single source of truth for settings.
///
/// Callers validate; the store merges and persists the full state through
/// the host store on every `set_many`.
pub struct SettingsStore {
    current: RwLock<Settings>,
    store: Arc<dyn KeyValueStore>,
}

impl SettingsStore {
    /// Start from the built-in defaults, overlaid with whatever the host
    /// store already holds.
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        let current = match store.get_json::<Settings>(SETTINGS_STORE_KEY) {
            Ok(Some(saved)) => {
                tracing::debug!("Loaded saved settings: {:?}", saved);
                saved
            }
            Ok(None) => Settings::default(),
            Err(e) => {
                tracing::warn!("Ignoring unreadable saved settings: {}", e);
                Settings::default()
            }
        };

        Self {
            current: RwLock::new(current),
            store,
        }
    }

    /// Merge `partial` into the current settings.
    pub fn set_many(&self, partial: SettingsUpdate) {
        let snapshot = {
            let mut current = self.current.write();
            partial.apply_to(&mut current);
            *current
        };

        tracing::info!("Settings updated: {:?}", partial);
        if let Err(e) = self.store.set_json(SETTINGS_STORE_KEY, &snapshot) {
            tracing::warn!("Failed to persist settings: {}", e);
        }
    }

    pub fn get(&self, key: SettingKey) -> SettingValue {
        let current = self.current.read();
        match key {
            SettingKey::Theme => SettingValue::Theme(current.theme),
            SettingKey::WeatherEnabled => SettingValue::Bool(current.weather_enabled),
            SettingKey::WeatherShowTemp => SettingValue::Bool(current.weather_show_temp),
            SettingKey::WeatherTempUnit => SettingValue::Unit(current.weather_temp_unit),
        }
    }

    pub fn snapshot(&self) -> Settings {
        *self.current.read()
    }
}

impl std::fmt::Debug for SettingsStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsStore")
            .field("current", &*self.current.read())
            .finish_non_exhaustive()
    }
}

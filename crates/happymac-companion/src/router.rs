//! Inbound device message dispatch and the weather relay.

use std::sync::Arc;

use happymac_weather::{
    GeolocationResolver, TemperatureUnit, WeatherProvider, WeatherSample,
};
use tokio::task::JoinHandle;

use crate::message::{keys, AppMessage, MessageSink};
use crate::settings::{SettingKey, SettingsStore, SettingsUpdate, Theme};

/// Resolve a position, fetch current conditions, send them to the device.
///
/// Every failure along the chain is logged and ends the chain quietly.
pub struct WeatherRelay {
    resolver: GeolocationResolver,
    provider: WeatherProvider,
    sink: Arc<dyn MessageSink>,
}

impl WeatherRelay {
    pub fn new(
        resolver: GeolocationResolver,
        provider: WeatherProvider,
        sink: Arc<dyn MessageSink>,
    ) -> Self {
        Self {
            resolver,
            provider,
            sink,
        }
    }

    /// Run one relay for a `WEATHER_REQUEST` unit code. Returns the sample
    /// that was sent, if any.
    pub async fn relay(&self, request_code: i64) -> Option<WeatherSample> {
        let unit = TemperatureUnit::from_request_code(request_code);

        let Some(position) = self.resolver.resolve().await else {
            tracing::info!("No position available, skipping weather update");
            return None;
        };

        match self.provider.fetch(&position, unit).await {
            Ok(sample) => {
                self.sink.send(AppMessage::from(sample));
                Some(sample)
            }
            Err(e) => {
                tracing::warn!("Weather fetch failed: {}", e);
                None
            }
        }
    }
}

impl std::fmt::Debug for WeatherRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WeatherRelay")
            .field("resolver", &self.resolver)
            .field("provider", &self.provider)
            .finish_non_exhaustive()
    }
}

/// What a single inbound message set in motion.
#[derive(Debug, Default)]
pub struct Dispatch {
    /// Settings merged from the message, if any field was usable
    pub settings: Option<SettingsUpdate>,
    /// The spawned weather relay, if the message requested one
    pub weather: Option<JoinHandle<Option<WeatherSample>>>,
}

/// Sole entry point for device-originated messages.
///
/// Each field is handled on its own, so one message can both update
/// settings and request weather. Weather relays are spawned and never
/// deduplicated; the last one to finish is what the device sees.
#[derive(Debug, Clone)]
pub struct MessageRouter {
    settings: Arc<SettingsStore>,
    relay: Arc<WeatherRelay>,
}

impl MessageRouter {
    pub fn new(settings: Arc<SettingsStore>, relay: Arc<WeatherRelay>) -> Self {
        Self { settings, relay }
    }

    pub fn handle(&self, message: &AppMessage) -> Dispatch {
        for key in message.keys() {
            if key != keys::WEATHER_REQUEST && SettingKey::from_name(key).is_none() {
                tracing::debug!("Ignoring unknown message key {}", key);
            }
        }

        let mut dispatch = Dispatch::default();

        let update = settings_update(message);
        if !update.is_empty() {
            self.settings.set_many(update);
            dispatch.settings = Some(update);
        }

        if message.contains_key(keys::WEATHER_REQUEST) {
            match message.get_int(keys::WEATHER_REQUEST) {
                Some(code) => dispatch.weather = self.spawn_weather(code),
                None => tracing::debug!("Ignoring non-numeric WEATHER_REQUEST"),
            }
        }

        dispatch
    }

    /// Run the weather relay inline.
    pub async fn request_weather(&self, request_code: i64) -> Option<WeatherSample> {
        self.relay.relay(request_code).await
    }

    fn spawn_weather(&self, request_code: i64) -> Option<JoinHandle<Option<WeatherSample>>> {
        let handle = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(e) => {
                tracing::error!("No async runtime for weather request: {}", e);
                return None;
            }
        };

        let relay = self.relay.clone();
        Some(handle.spawn(async move { relay.relay(request_code).await }))
    }
}

/// Extract the well-typed settings fields of a device message.
pub fn settings_update(message: &AppMessage) -> SettingsUpdate {
    let mut update = SettingsUpdate::default();

    for key in SettingKey::ALL {
        let name = key.as_str();
        if !message.contains_key(name) {
            continue;
        }

        let accepted = match key {
            SettingKey::Theme => {
                update.theme = message
                    .get_int(name)
                    .and_then(|code| Theme::try_from(code).ok());
                update.theme.is_some()
            }
            SettingKey::WeatherEnabled => {
                update.weather_enabled = message.get_bool(name);
                update.weather_enabled.is_some()
            }
            SettingKey::WeatherShowTemp => {
                update.weather_show_temp = message.get_bool(name);
                update.weather_show_temp.is_some()
            }
            SettingKey::WeatherTempUnit => {
                update.weather_temp_unit =
                    message.get_str(name).and_then(TemperatureUnit::from_label);
                update.weather_temp_unit.is_some()
            }
        };

        if !accepted {
            tracing::debug!("Ignoring ill-typed value for {}: {:?}", name, message.get(name));
        }
    }

    update
}

#[cfg(test)]
mod tests {
    use super::*;
    use happymac_core::MemoryStore;
    use happymac_weather::{PositionCache, UnavailableGeolocator};

    fn router() -> (MessageRouter, Arc<SettingsStore>) {
        let kv = Arc::new(MemoryStore::new());
        let settings = Arc::new(SettingsStore::new(kv.clone()));
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel::<AppMessage>();
        let resolver =
            GeolocationResolver::new(Arc::new(UnavailableGeolocator), PositionCache::new(kv));
        let provider = WeatherProvider::with_base_url("http://127.0.0.1:9").unwrap();
        let relay = Arc::new(WeatherRelay::new(resolver, provider, Arc::new(tx)));
        (MessageRouter::new(settings.clone(), relay), settings)
    }

    #[test]
    fn test_settings_update_extraction() {
        let message = AppMessage::new()
            .with(keys::THEME, 2)
            .with(keys::WEATHER_ENABLED, 0)
            .with(keys::WEATHER_SHOW_TEMP, true)
            .with(keys::WEATHER_TEMP_UNIT, "F");
        let update = settings_update(&message);
        assert_eq!(update.theme, Some(Theme::Color));
        assert_eq!(update.weather_enabled, Some(false));
        assert_eq!(update.weather_show_temp, Some(true));
        assert_eq!(update.weather_temp_unit, Some(TemperatureUnit::Fahrenheit));
    }

    #[test]
    fn test_ill_typed_fields_ignored() {
        let message = AppMessage::new()
            .with(keys::THEME, 7)
            .with(keys::WEATHER_ENABLED, "yes")
            .with(keys::WEATHER_TEMP_UNIT, "K");
        assert!(settings_update(&message).is_empty());
    }

    #[test]
    fn test_theme_message_updates_store() {
        let (router, settings) = router();
        let dispatch = router.handle(&AppMessage::new().with(keys::THEME, 1));
        assert_eq!(dispatch.settings.and_then(|u| u.theme), Some(Theme::Dark));
        assert!(dispatch.weather.is_none());
        assert_eq!(settings.snapshot().theme, Theme::Dark);
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let (router, settings) = router();
        let dispatch = router.handle(&AppMessage::new().with("BATTERY", 80));
        assert!(dispatch.settings.is_none());
        assert!(dispatch.weather.is_none());
        assert_eq!(settings.snapshot(), Default::default());
    }

    #[test]
    fn test_weather_request_without_runtime_is_dropped() {
        let (router, _settings) = router();
        let dispatch = router.handle(&AppMessage::new().with(keys::WEATHER_REQUEST, 1));
        assert!(dispatch.weather.is_none());
    }

    #[test]
    fn test_odd_fields_do_not_block_valid_ones() {
        let (router, settings) = router();
        let message: AppMessage = serde_json::from_str(
            r#"{"theme": 1, "BATTERY": 0.5, "WEATHER_ENABLED": null, "WEATHER_SHOW_TEMP": [true]}"#,
        )
        .unwrap();

        let dispatch = router.handle(&message);

        let update = dispatch.settings.unwrap();
        assert_eq!(update.theme, Some(Theme::Dark));
        assert_eq!(update.weather_enabled, None);
        assert_eq!(update.weather_show_temp, None);
        let snapshot = settings.snapshot();
        assert_eq!(snapshot.theme, Theme::Dark);
        assert!(snapshot.weather_enabled);
        assert!(snapshot.weather_show_temp);
    }

    #[tokio::test]
    async fn test_non_numeric_weather_request_is_dropped() {
        let (router, _settings) = router();
        for value in [r#""1""#, "1.5", "null"] {
            let message: AppMessage =
                serde_json::from_str(&format!(r#"{{"WEATHER_REQUEST": {}}}"#, value)).unwrap();
            let dispatch = router.handle(&message);
            assert!(dispatch.weather.is_none(), "{}", value);
        }
    }

    #[tokio::test]
    async fn test_unusual_request_codes_still_spawn() {
        let (router, _settings) = router();
        for code in [7, -1, 2] {
            let dispatch = router.handle(&AppMessage::new().with(keys::WEATHER_REQUEST, code));
            assert!(dispatch.weather.is_some(), "{}", code);
        }
        let dispatch = router.handle(&AppMessage::new().with(keys::WEATHER_REQUEST, true));
        assert!(dispatch.weather.is_some());
    }

    #[tokio::test]
    async fn test_weather_request_without_position_sends_nothing() {
        let (router, _settings) = router();
        let dispatch = router.handle(&AppMessage::new().with(keys::WEATHER_REQUEST, 0));
        let outcome = dispatch.weather.unwrap().await.unwrap();
        assert!(outcome.is_none());
    }
}

//! Wiring: builds the components from configuration and feeds host events
//! to them.

use std::sync::Arc;
use std::time::Duration;

use happymac_core::{AppError, Config, ConfigError, KeyValueStore, LocationConfig, LocationMode};
use happymac_weather::{
    FixedGeolocator, GeolocationResolver, Geolocator, IpGeolocator, PositionCache,
    PositionOptions, UnavailableGeolocator, WeatherProvider,
};

use crate::bridge::ConfigurationBridge;
use crate::host::{HostChannel, HostEvent};
use crate::router::{Dispatch, MessageRouter, WeatherRelay};
use crate::settings::SettingsStore;

/// The assembled companion.
#[derive(Debug)]
pub struct Companion {
    settings: Arc<SettingsStore>,
    bridge: ConfigurationBridge,
    router: MessageRouter,
}

impl Companion {
    /// Build every component from `config`, persisting through `store` and
    /// talking to the host through `channel`.
    pub fn from_config(
        config: &Config,
        store: Arc<dyn KeyValueStore>,
        channel: HostChannel,
    ) -> Result<Self, AppError> {
        let geolocator = geolocator_from_config(&config.location)?;
        let provider = WeatherProvider::with_base_url(&config.weather.base_url)
            .map_err(|e| anyhow::Error::new(e).context("Failed to create weather client"))?;
        let options = PositionOptions {
            timeout: Duration::from_secs(config.location.timeout_secs),
            maximum_age: Duration::from_secs(config.location.maximum_age_secs),
        };

        Ok(Self::assemble(
            store,
            geolocator,
            provider,
            options,
            channel,
            config.configuration.weather_options,
        ))
    }

    /// Build from already constructed collaborators.
    pub fn assemble(
        store: Arc<dyn KeyValueStore>,
        geolocator: Arc<dyn Geolocator>,
        provider: WeatherProvider,
        options: PositionOptions,
        channel: HostChannel,
        weather_options: bool,
    ) -> Self {
        let settings = Arc::new(SettingsStore::new(store.clone()));
        let channel = Arc::new(channel);

        let resolver =
            GeolocationResolver::with_options(geolocator, PositionCache::new(store), options);
        let relay = Arc::new(WeatherRelay::new(resolver, provider, channel.clone()));
        let router = MessageRouter::new(settings.clone(), relay);
        let bridge = ConfigurationBridge::new(settings.clone(), channel.clone(), channel)
            .with_weather_options(weather_options);

        Self {
            settings,
            bridge,
            router,
        }
    }

    pub fn settings(&self) -> &Arc<SettingsStore> {
        &self.settings
    }

    pub fn router(&self) -> &MessageRouter {
        &self.router
    }

    /// Handle one host event to completion. Weather relays it starts keep
    /// running in the background; their handle is returned.
    pub fn handle_event(&self, event: HostEvent) -> Option<Dispatch> {
        match event {
            HostEvent::Ready => {
                tracing::info!("Host ready, settings: {:?}", self.settings.snapshot());
                None
            }
            HostEvent::AppMessage { payload } => Some(self.router.handle(&payload)),
            HostEvent::ShowConfiguration => {
                self.bridge.open();
                None
            }
            HostEvent::WebviewClosed { response } => {
                self.bridge.on_closed(response.as_deref());
                None
            }
        }
    }
}

/// Pick the live position source for `config`.
pub fn geolocator_from_config(config: &LocationConfig) -> Result<Arc<dyn Geolocator>, AppError> {
    let geolocator: Arc<dyn Geolocator> = match config.mode {
        LocationMode::Fixed => match (config.latitude, config.longitude) {
            (Some(lat), Some(lon)) => Arc::new(FixedGeolocator::new(lat, lon)),
            _ => {
                return Err(ConfigError::Invalid(
                    "fixed location needs latitude and longitude".to_string(),
                )
                .into())
            }
        },
        LocationMode::Ip => Arc::new(
            IpGeolocator::new(config.lookup_url.clone())
                .map_err(|e| anyhow::Error::new(e).context("Failed to create IP geolocator"))?,
        ),
        LocationMode::Disabled => Arc::new(UnavailableGeolocator),
    };

    tracing::info!("Using {:?} location source", config.mode);
    Ok(geolocator)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::HostCommand;
    use crate::message::{keys, AppMessage};
    use crate::settings::Theme;
    use happymac_core::MemoryStore;

    #[test]
    fn test_fixed_mode_requires_coordinates() {
        let config = LocationConfig {
            mode: LocationMode::Fixed,
            ..Default::default()
        };
        let err = geolocator_from_config(&config).err().unwrap();
        assert!(matches!(err, AppError::Config(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_device_message_with_null_field_still_applies_theme() {
        let (tx, _rx) = tokio::sync::mpsc::unbounded_channel();
        let mut config = Config::default();
        config.location.mode = LocationMode::Disabled;
        let companion =
            Companion::from_config(&config, Arc::new(MemoryStore::new()), HostChannel::new(tx))
                .unwrap();

        let event: HostEvent = serde_json::from_str(
            r#"{"event":"appmessage","payload":{"theme":2,"WEATHER_ENABLED":null}}"#,
        )
        .unwrap();
        let dispatch = companion.handle_event(event).unwrap();

        assert_eq!(dispatch.settings.and_then(|u| u.theme), Some(Theme::Color));
        assert_eq!(companion.settings().snapshot().theme, Theme::Color);
        assert!(companion.settings().snapshot().weather_enabled);
    }

    #[test]
    fn test_configuration_events_round_trip() {
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let mut config = Config::default();
        config.location.mode = LocationMode::Disabled;
        let companion =
            Companion::from_config(&config, Arc::new(MemoryStore::new()), HostChannel::new(tx))
                .unwrap();

        companion.handle_event(HostEvent::ShowConfiguration);
        assert!(matches!(rx.try_recv().unwrap(), HostCommand::OpenUrl { .. }));

        companion.handle_event(HostEvent::WebviewClosed {
            response: Some("%7B%22theme%22%3A2%7D".into()),
        });
        assert_eq!(companion.settings().snapshot().theme, Theme::Color);
        assert_eq!(
            rx.try_recv().unwrap(),
            HostCommand::SendAppMessage {
                payload: AppMessage::new().with(keys::THEME, 2)
            }
        );
    }
}

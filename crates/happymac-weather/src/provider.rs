//! Open-Meteo current-conditions client.

use reqwest::Client;
use serde::Deserialize;
use tracing::instrument;

use crate::types::{round_temperature, Position, TemperatureUnit, WeatherError, WeatherSample};

const FORECAST_PATH: &str = "/v1/forecast";

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    current_weather: Option<CurrentWeatherBlock>,
}

#[derive(Debug, Deserialize)]
struct CurrentWeatherBlock {
    temperature: Option<f64>,
    weathercode: Option<f64>,
}

/// Fetches one current-conditions sample per call.
///
/// No retries and no request timeout; callers decide what to do with a
/// failure (the relay logs and drops it).
#[derive(Debug, Clone)]
pub struct WeatherProvider {
    client: Client,
    base_url: String,
}

impl WeatherProvider {
    /// Point the client at another Open-Meteo compatible host.
    pub fn with_base_url(base_url: &str) -> Result<Self, WeatherError> {
        let client = Client::builder().build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Fetch current conditions at `position` in `unit`.
    #[instrument(skip(self), level = "debug")]
    pub async fn fetch(
        &self,
        position: &Position,
        unit: TemperatureUnit,
    ) -> Result<WeatherSample, WeatherError> {
        let url = format!("{}{}", self.base_url, FORECAST_PATH);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("latitude", position.latitude.to_string()),
                ("longitude", position.longitude.to_string()),
                ("temperature_unit", unit.as_query().to_string()),
                ("current_weather", "true".to_string()),
                ("timezone", "auto".to_string()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(WeatherError::Status(status.as_u16()));
        }

        let body = response.text().await?;
        let sample = parse_current_weather(&body)?;

        tracing::debug!(
            "Weather: {} {} ({})",
            sample.temperature,
            unit.label(),
            sample.condition().description()
        );
        Ok(sample)
    }
}

/// Extract a sample from a forecast response body.
pub fn parse_current_weather(body: &str) -> Result<WeatherSample, WeatherError> {
    let parsed: ForecastResponse =
        serde_json::from_str(body).map_err(|e| WeatherError::Parse(e.to_string()))?;

    let current = parsed
        .current_weather
        .ok_or(WeatherError::MissingCurrentWeather)?;

    let (temperature, code) = match (current.temperature, current.weathercode) {
        (Some(temperature), Some(code)) if temperature.is_finite() => (temperature, code),
        _ => {
            return Err(WeatherError::Parse(
                "current_weather lacks temperature or weathercode".to_string(),
            ))
        }
    };

    // WMO codes are small integers
    if code.fract() != 0.0 || !(f64::from(i32::MIN)..=f64::from(i32::MAX)).contains(&code) {
        return Err(WeatherError::Parse(format!(
            "weathercode {} is not a WMO code",
            code
        )));
    }

    Ok(WeatherSample {
        temperature: round_temperature(temperature),
        weather_code: code as i32,
    })
}

//! Integration tests for the weather provider and IP geolocator using wiremock.

use std::time::Duration;

use happymac_weather::{
    Geolocator, IpGeolocator, LocationError, Position, PositionOptions, TemperatureUnit,
    WeatherError, WeatherProvider, WeatherSample,
};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn berlin() -> Position {
    Position::now(52.52, 13.41)
}

#[tokio::test]
async fn test_fetch_sends_expected_query() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/forecast"))
        .and(query_param("latitude", "52.52"))
        .and(query_param("longitude", "13.41"))
        .and(query_param("temperature_unit", "celsius"))
        .and(query_param("current_weather", "true"))
        .and(query_param("timezone", "auto"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "current_weather": { "temperature": 19.6, "weathercode": 3 }
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let provider = WeatherProvider::with_base_url(&mock_server.uri()).unwrap();
    let sample = provider
        .fetch(&berlin(), TemperatureUnit::Celsius)
        .await
        .unwrap();

    assert_eq!(
        sample,
        WeatherSample {
            temperature: 20,
            weather_code: 3
        }
    );
}

#[tokio::test]
async fn test_fetch_fahrenheit_for_request_code_one() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/forecast"))
        .and(query_param("temperature_unit", "fahrenheit"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "current_weather": { "temperature": 67.3, "weathercode": 0 }
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let provider = WeatherProvider::with_base_url(&mock_server.uri()).unwrap();
    let sample = provider
        .fetch(&berlin(), TemperatureUnit::from_request_code(1))
        .await
        .unwrap();

    assert_eq!(sample.temperature, 67);
    assert_eq!(sample.weather_code, 0);
}

#[tokio::test]
async fn test_fetch_server_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/forecast"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&mock_server)
        .await;

    let provider = WeatherProvider::with_base_url(&mock_server.uri()).unwrap();
    let result = provider.fetch(&berlin(), TemperatureUnit::Celsius).await;

    assert!(matches!(result, Err(WeatherError::Status(503))));
}

#[tokio::test]
async fn test_fetch_garbage_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/forecast"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&mock_server)
        .await;

    let provider = WeatherProvider::with_base_url(&mock_server.uri()).unwrap();
    let result = provider.fetch(&berlin(), TemperatureUnit::Celsius).await;

    assert!(matches!(result, Err(WeatherError::Parse(_))));
}

#[tokio::test]
async fn test_fetch_unreachable_host() {
    // Nothing listens on port 9 locally
    let provider = WeatherProvider::with_base_url("http://127.0.0.1:9").unwrap();
    let result = provider.fetch(&berlin(), TemperatureUnit::Celsius).await;

    assert!(matches!(result, Err(WeatherError::Network(_))));
}

#[tokio::test]
async fn test_ip_geolocator_success_and_reuse() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "success",
            "lat": 48.85,
            "lon": 2.35
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let geo = IpGeolocator::new(format!("{}/json", mock_server.uri())).unwrap();
    let options = PositionOptions::default();

    let first = geo.current_position(options).await.unwrap();
    assert_eq!((first.latitude, first.longitude), (48.85, 2.35));

    // Within maximum_age: served without a second lookup
    let second = geo.current_position(options).await.unwrap();
    assert_eq!(second.timestamp, first.timestamp);
}

#[tokio::test]
async fn test_ip_geolocator_zero_max_age_looks_up_again() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "success",
            "lat": 48.85,
            "lon": 2.35
        })))
        .expect(2)
        .mount(&mock_server)
        .await;

    let geo = IpGeolocator::new(format!("{}/json", mock_server.uri())).unwrap();
    let options = PositionOptions {
        timeout: Duration::from_secs(15),
        maximum_age: Duration::ZERO,
    };

    geo.current_position(options).await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    geo.current_position(options).await.unwrap();
}

#[tokio::test]
async fn test_ip_geolocator_reported_failure() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "status": "fail",
            "message": "private range"
        })))
        .mount(&mock_server)
        .await;

    let geo = IpGeolocator::new(format!("{}/json", mock_server.uri())).unwrap();
    let result = geo.current_position(PositionOptions::default()).await;

    assert!(
        matches!(&result, Err(LocationError::Other(message)) if message == "private range"),
        "unexpected result: {:?}",
        result
    );
}

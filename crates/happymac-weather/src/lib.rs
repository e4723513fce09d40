//! Weather relay building blocks for the HappyMac companion
//!
//! Resolves the host's position (live, or the last cached fix) and fetches
//! current conditions from the Open-Meteo API.

pub mod cache;
pub mod location;
pub mod provider;
pub mod types;

pub use cache::{PositionCache, CACHED_POSITION_KEY};
pub use location::{
    FixedGeolocator, GeolocationResolver, Geolocator, IpGeolocator, UnavailableGeolocator,
};
pub use provider::{parse_current_weather, WeatherProvider};
pub use types::*;

use crate::error::{ConfigurationError, LookupError};
use crate::models::{WeatherFact, WeatherLocation};
use crate::traits::WeatherLookup;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};

pub const DEFAULT_OPENWEATHER_URL: &str = "https://api.openweathermap.org/data/2.5/weather";

#[derive(Debug, Deserialize)]
struct CurrentWeather {
    name: Option<String>,
    main: MainReadings,
    #[serde(default)]
    weather: Vec<Condition>,
    #[serde(default)]
    wind: Wind,
}

#[derive(Debug, Deserialize)]
struct MainReadings {
    temp: f64,
    humidity: f64,
    pressure: f64,
}

#[derive(Debug, Deserialize)]
struct Condition {
    description: String,
}

#[derive(Debug, Default, Deserialize)]
struct Wind {
    #[serde(default)]
    speed: f64,
    #[serde(default)]
    deg: f64,
}

/// Current-weather lookups against OpenWeather, metric units.
#[derive(Debug, Clone)]
pub struct OpenWeatherClient {
    endpoint: String,
    api_key: String,
    client: Client,
    timeout_ms: u64,
}

impl OpenWeatherClient {
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Result<Self, ConfigurationError> {
        Self::with_endpoint(DEFAULT_OPENWEATHER_URL, api_key, timeout)
    }

    pub fn with_endpoint(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ConfigurationError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ConfigurationError::Invalid {
                key: "OPENWEATHER_API_KEY".to_string(),
                details: "api key is empty".to_string(),
            });
        }

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| ConfigurationError::HttpClient(error.to_string()))?;

        Ok(Self {
            endpoint: endpoint.into(),
            api_key,
            client,
            timeout_ms: timeout.as_millis() as u64,
        })
    }

    fn query_params(&self, location: &WeatherLocation) -> Vec<(&'static str, String)> {
        let mut params = vec![("units", "metric".to_string()), ("appid", self.api_key.clone())];
        match location {
            WeatherLocation::City(name) => params.push(("q", name.clone())),
            WeatherLocation::Coordinates { lat, lon } => {
                params.push(("lat", lat.to_string()));
                params.push(("lon", lon.to_string()));
            }
        }
        params
    }
}

fn parse_current_weather(body: &str, location: &WeatherLocation) -> Result<WeatherFact, LookupError> {
    let parsed: CurrentWeather = serde_json::from_str(body)
        .map_err(|error| LookupError::Unavailable(format!("unexpected response: {error}")))?;

    Ok(WeatherFact {
        location: parsed
            .name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| location.to_string()),
        temperature: parsed.main.temp,
        humidity: parsed.main.humidity,
        pressure: parsed.main.pressure,
        description: parsed
            .weather
            .into_iter()
            .next()
            .map(|condition| condition.description)
            .unwrap_or_else(|| "no description".to_string()),
        wind_speed: parsed.wind.speed,
        wind_direction: parsed.wind.deg,
    })
}

#[async_trait]
impl WeatherLookup for OpenWeatherClient {
    #[instrument(skip(self, location), fields(location = %location))]
    async fn lookup(&self, location: &WeatherLocation) -> Result<WeatherFact, LookupError> {
        debug!("requesting current weather");

        let response = self
            .client
            .get(&self.endpoint)
            .query(&self.query_params(location))
            .send()
            .await
            .map_err(|error| {
                if error.is_timeout() {
                    LookupError::TimedOut {
                        timeout_ms: self.timeout_ms,
                    }
                } else {
                    LookupError::Unavailable(error.to_string())
                }
            })?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(LookupError::NotFound(location.to_string())),
            status if !status.is_success() => Err(LookupError::Unavailable(format!(
                "openweather returned {status}"
            ))),
            _ => {
                let body = response
                    .text()
                    .await
                    .map_err(|error| LookupError::Unavailable(error.to_string()))?;
                parse_current_weather(&body, location)
            }
        }
    }
}

/// Stand-in used when no API key is configured; every lookup is unavailable.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledWeather;

#[async_trait]
impl WeatherLookup for DisabledWeather {
    async fn lookup(&self, _location: &WeatherLocation) -> Result<WeatherFact, LookupError> {
        Err(LookupError::Unavailable(
            "OPENWEATHER_API_KEY is not set".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LONDON: &str = r#"{
        "name": "London",
        "main": {"temp": 11.8, "humidity": 76, "pressure": 1009},
        "weather": [{"description": "overcast clouds"}],
        "wind": {"speed": 5.2, "deg": 250}
    }"#;

    #[test]
    fn empty_api_key_is_rejected() {
        let error = OpenWeatherClient::new("  ", Duration::from_secs(1)).unwrap_err();
        assert!(matches!(error, ConfigurationError::Invalid { .. }));
    }

    #[test]
    fn city_and_coordinate_params() {
        let client = OpenWeatherClient::new("key", Duration::from_secs(1)).unwrap();

        let params = client.query_params(&WeatherLocation::City("Paris".to_string()));
        assert!(params.contains(&("q", "Paris".to_string())));
        assert!(params.contains(&("units", "metric".to_string())));

        let params = client.query_params(&WeatherLocation::Coordinates { lat: 1.5, lon: -2.0 });
        assert!(params.contains(&("lat", "1.5".to_string())));
        assert!(params.contains(&("lon", "-2".to_string())));
    }

    #[test]
    fn response_maps_to_fact() {
        let fact =
            parse_current_weather(LONDON, &WeatherLocation::City("london".to_string())).unwrap();
        assert_eq!(fact.location, "London");
        assert_eq!(fact.temperature, 11.8);
        assert_eq!(fact.humidity, 76.0);
        assert_eq!(fact.pressure, 1009.0);
        assert_eq!(fact.description, "overcast clouds");
        assert_eq!(fact.wind_speed, 5.2);
        assert_eq!(fact.wind_direction, 250.0);
    }

    #[tokio::test]
    async fn disabled_lookup_is_unavailable() {
        let error = DisabledWeather
            .lookup(&WeatherLocation::City("Paris".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(error, LookupError::Unavailable(_)));
    }

    #[test]
    fn missing_readings_are_unavailable() {
        let error =
            parse_current_weather(r#"{"name":"X"}"#, &WeatherLocation::City("x".to_string()))
                .unwrap_err();
        assert!(matches!(error, LookupError::Unavailable(_)));
    }
}

use crate::error::ConfigurationError;
use crate::models::{WeatherFact, WeatherLocation};
use regex::Regex;

const TRAILING_TIME_WORDS: [&str; 6] = ["right now", "today", "tomorrow", "tonight", "now", "please"];

/// Pulls the place a weather question is about out of free text.
#[derive(Debug, Clone)]
pub struct LocationExtractor {
    coordinates: Regex,
    place: Regex,
    trailing_punctuation: Regex,
}

impl LocationExtractor {
    pub fn new() -> Result<Self, ConfigurationError> {
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|error| ConfigurationError::Invalid {
                key: "location pattern".to_string(),
                details: error.to_string(),
            })
        };

        Ok(Self {
            coordinates: compile(
                r"(?:^|[^\d.])(-?\d{1,2}(?:\.\d+)?)\s*,\s*(-?\d{1,3}(?:\.\d+)?)(?:$|[^\d.])",
            )?,
            place: compile(r"^.*\b(?:in|for|at)\s+([a-z][a-z\s'\-]*)$")?,
            trailing_punctuation: compile(r"[?!.,;:]+$")?,
        })
    }

    pub fn extract(&self, query: &str) -> Option<WeatherLocation> {
        if let Some(captures) = self.coordinates.captures(query) {
            let lat = captures.get(1)?.as_str().parse::<f64>().ok()?;
            let lon = captures.get(2)?.as_str().parse::<f64>().ok()?;
            if (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon) {
                return Some(WeatherLocation::Coordinates { lat, lon });
            }
        }

        let lowered = query.trim().to_lowercase();
        let lowered = self.trailing_punctuation.replace(&lowered, "");
        let place = self.place.captures(&lowered)?.get(1)?.as_str().trim().to_string();
        let place = strip_time_words(&place);

        if place.is_empty() {
            None
        } else {
            Some(WeatherLocation::City(title_case(&place)))
        }
    }
}

fn strip_time_words(place: &str) -> String {
    let mut trimmed = place.trim().to_string();
    loop {
        let before = trimmed.len();
        for word in TRAILING_TIME_WORDS {
            if let Some(rest) = trimmed.strip_suffix(word) {
                if rest.is_empty() || rest.ends_with(' ') {
                    trimmed = rest.trim_end().to_string();
                }
            }
        }
        if trimmed.len() == before {
            return trimmed;
        }
    }
}

fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn compass_point(degrees: f64) -> &'static str {
    const POINTS: [&str; 8] = ["N", "NE", "E", "SE", "S", "SW", "W", "NW"];
    let normalized = degrees.rem_euclid(360.0);
    let sector = ((normalized + 22.5) / 45.0).floor() as usize % POINTS.len();
    POINTS[sector]
}

/// Weather answers are rendered from the structured fact, never generated,
/// so every number in the answer is the one the service reported.
pub fn format_weather_answer(fact: &WeatherFact) -> String {
    format!(
        "Current weather in {}: {}. Temperature {:.1}°C, humidity {:.0}%, pressure {:.0} hPa. \
         Wind {:.1} m/s from {:.0}° ({}).",
        fact.location,
        fact.description,
        fact.temperature,
        fact.humidity,
        fact.pressure,
        fact.wind_speed,
        fact.wind_direction,
        compass_point(fact.wind_direction)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn city(query: &str) -> Option<String> {
        match LocationExtractor::new().unwrap().extract(query) {
            Some(WeatherLocation::City(name)) => Some(name),
            _ => None,
        }
    }

    #[test]
    fn extracts_city_after_in_or_for() {
        assert_eq!(city("What's the weather in London?").as_deref(), Some("London"));
        assert_eq!(city("Temperature in New York").as_deref(), Some("New York"));
        assert_eq!(city("Is it raining in Tokyo?").as_deref(), Some("Tokyo"));
        assert_eq!(city("Weather forecast for Paris").as_deref(), Some("Paris"));
        assert_eq!(city("weather in Berlin today!").as_deref(), Some("Berlin"));
    }

    #[test]
    fn missing_city_yields_none() {
        assert_eq!(city("what is the weather"), None);
        assert_eq!(city("forecast?"), None);
    }

    #[test]
    fn coordinates_are_recognised() {
        let extractor = LocationExtractor::new().unwrap();
        assert_eq!(
            extractor.extract("weather at 51.5, -0.12"),
            Some(WeatherLocation::Coordinates { lat: 51.5, lon: -0.12 })
        );
        assert_eq!(
            extractor.extract("temperature at 40.7,-74.0 now"),
            Some(WeatherLocation::Coordinates { lat: 40.7, lon: -74.0 })
        );
    }

    #[test]
    fn coordinates_are_not_read_from_inside_longer_numbers() {
        let extractor = LocationExtractor::new().unwrap();
        assert_eq!(extractor.extract("weather at 123.4, 45"), None);
        assert_eq!(extractor.extract("weather at 12.5, 1234"), None);
    }

    #[test]
    fn compass_points_wrap() {
        assert_eq!(compass_point(0.0), "N");
        assert_eq!(compass_point(350.0), "N");
        assert_eq!(compass_point(225.0), "SW");
        assert_eq!(compass_point(-90.0), "W");
    }

    #[test]
    fn answer_contains_every_reported_value() {
        let fact = WeatherFact {
            location: "London".to_string(),
            temperature: 12.34,
            humidity: 81.0,
            pressure: 1012.0,
            description: "light rain".to_string(),
            wind_speed: 4.1,
            wind_direction: 230.0,
        };

        let answer = format_weather_answer(&fact);
        assert!(answer.contains("London"));
        assert!(answer.contains("light rain"));
        assert!(answer.contains("12.3°C"));
        assert!(answer.contains("81%"));
        assert!(answer.contains("1012 hPa"));
        assert!(answer.contains("4.1 m/s"));
        assert!(answer.contains("(SW)"));
    }
}

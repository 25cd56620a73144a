pub mod ollama;
pub mod openweather;

pub use ollama::{OllamaEmbedder, OllamaGenerator};
pub use openweather::{DisabledWeather, OpenWeatherClient};

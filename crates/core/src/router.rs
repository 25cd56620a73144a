use crate::models::RouteLabel;

/// Any of these, matched case-insensitively as substrings, sends a query to
/// the weather route.
pub const WEATHER_KEYWORDS: [&str; 5] = ["weather", "temperature", "rain", "forecast", "climate"];

pub fn classify(query: &str) -> RouteLabel {
    let lowered = query.to_lowercase();
    if WEATHER_KEYWORDS
        .iter()
        .any(|keyword| lowered.contains(keyword))
    {
        RouteLabel::Weather
    } else {
        RouteLabel::Rag
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_keyword_routes_to_weather_in_any_case() {
        for keyword in WEATHER_KEYWORDS {
            assert_eq!(classify(keyword), RouteLabel::Weather);
            assert_eq!(classify(&keyword.to_uppercase()), RouteLabel::Weather);
            assert_eq!(
                classify(&format!("Tell me the {keyword} tomorrow")),
                RouteLabel::Weather
            );
        }
    }

    #[test]
    fn substring_matches_count() {
        assert_eq!(classify("Is it RAINING in Tokyo?"), RouteLabel::Weather);
        assert_eq!(classify("What's the weather in London?"), RouteLabel::Weather);
        assert_eq!(classify("climatology report"), RouteLabel::Weather);
    }

    #[test]
    fn everything_else_routes_to_rag() {
        assert_eq!(classify(""), RouteLabel::Rag);
        assert_eq!(classify("What is this document about?"), RouteLabel::Rag);
        assert_eq!(classify("Summarize the main points"), RouteLabel::Rag);
        assert_eq!(classify("wind speed in Paris"), RouteLabel::Rag);
    }
}

//! Background context handed to the answer provider with each question.

pub mod persona;
pub mod weather;

pub use weather::{MockWeatherSource, OpenWeatherClient, WeatherReport, WeatherSource};

use std::sync::Arc;

const WEATHER_KEYWORDS: &[&str] = &[
    "weather",
    "rain",
    "sun",
    "cold",
    "hot",
    "wind",
    "temperature",
];

/// Rough topic of a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    Weather,
    General,
}

pub fn classify(query: &str) -> QueryKind {
    let lower = query.to_lowercase();
    if WEATHER_KEYWORDS.iter().any(|k| lower.contains(k)) {
        QueryKind::Weather
    } else {
        QueryKind::General
    }
}

/// First word after `marker`, cut at whitespace or `?` and stripped of
/// trailing punctuation. `lower` must be `query` ASCII-lowercased.
fn word_after(query: &str, lower: &str, marker: &str) -> Option<String> {
    let at = lower.find(marker)?;
    word_at(query, at + marker.len())
}

fn word_at(query: &str, from: usize) -> Option<String> {
    let rest = query.get(from..)?;
    let end = rest
        .find(|c: char| c.is_whitespace() || c == '?')
        .unwrap_or(rest.len());
    let word = rest[..end].trim_matches(|c| matches!(c, '.' | ',' | '!' | '?'));
    (!word.is_empty()).then(|| word.to_string())
}

/// "how ... weather ... in X"
fn how_weather_in(query: &str, lower: &str) -> Option<String> {
    let how = lower.find("how")?;
    let weather = how + 4 + lower.get(how + 4..)?.find("weather")?;
    let tail_start = weather + "weather".len() + 1;
    let tail = lower.get(tail_start..)?;
    let in_at = tail_start + tail.rfind("in ")?;
    word_at(query, in_at + "in ".len())
}

/// City named in a weather question, or `default_city`.
pub fn extract_city(query: &str, default_city: &str) -> String {
    let lower = query.to_ascii_lowercase();

    word_after(query, &lower, "weather in ")
        .or_else(|| how_weather_in(query, &lower))
        .or_else(|| word_after(query, &lower, "temperature in "))
        .or_else(|| {
            let words: Vec<&str> = query.split_whitespace().collect();
            words
                .iter()
                .position(|w| w.eq_ignore_ascii_case("in"))
                .and_then(|i| words.get(i + 1))
                .and_then(|next| word_at(next, 0))
        })
        .unwrap_or_else(|| default_city.to_string())
}

/// Builds the context string for a question. Never fails: a weather lookup
/// error becomes an apology the model can pass on.
pub struct ContextProvider {
    weather: Arc<dyn WeatherSource>,
    default_city: String,
    assistant_name: String,
}

impl ContextProvider {
    pub fn new(weather: Arc<dyn WeatherSource>, default_city: &str, assistant_name: &str) -> Self {
        Self {
            weather,
            default_city: default_city.to_string(),
            assistant_name: assistant_name.to_string(),
        }
    }

    /// Persona instructions followed by the question-specific context.
    pub fn full_context(&self, query: &str) -> String {
        format!(
            "{}\n\n{}",
            persona::base_instructions(&self.assistant_name),
            self.context_for(query)
        )
    }

    /// Question-specific context only.
    pub fn context_for(&self, query: &str) -> String {
        match classify(query) {
            QueryKind::Weather => self.weather_context(query),
            QueryKind::General => GENERAL_CONTEXT.to_string(),
        }
    }

    fn weather_context(&self, query: &str) -> String {
        let city = extract_city(query, &self.default_city);
        tracing::debug!(%city, "weather question");

        match self.weather.current(&city) {
            Ok(report) => render_weather(&city, &report),
            Err(e) => {
                tracing::warn!(%city, error = %e, "weather lookup failed");
                format!(
                    "WEATHER ERROR CONTEXT:\n\
                     Sorry, I couldn't get the weather data for {}. Error: {}\n\
                     Please try asking about weather for another city.",
                    city, e
                )
            }
        }
    }
}

const GENERAL_CONTEXT: &str = "GENERAL CONTEXT:
- Use the most recent information available
- Mention when information may be out of date";

fn render_weather(city: &str, report: &WeatherReport) -> String {
    let advice = weather::clothing_recommendations(report).join("\n- ");
    format!(
        "CURRENT WEATHER CONTEXT FOR {city}:
Location: {location}
Date/Time: {time}
Temperature: {temp:.1}°C
Conditions: {description}
Humidity: {humidity:.0}%
Wind Speed: {wind:.1} m/s
Precipitation: {rain:.1} mm

CLOTHING RECOMMENDATIONS:
- {advice}

INSTRUCTIONS:
- Present this weather information in a natural, conversational way
- Include the clothing recommendations as helpful advice
- Mention that this is current weather data",
        location = report.location,
        time = report.time,
        temp = report.temperature_c,
        description = report.description,
        humidity = report.humidity_pct,
        wind = report.wind_ms,
        rain = report.precipitation_mm,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn paris() -> WeatherReport {
        WeatherReport {
            time: "2026-10-19 15:00:00".to_string(),
            location: "Paris".to_string(),
            temperature_c: 14.0,
            description: "light rain".to_string(),
            humidity_pct: 85.0,
            wind_ms: 5.5,
            precipitation_mm: 1.2,
        }
    }

    #[test]
    fn classifies_weather_keywords() {
        assert_eq!(classify("Will it RAIN tomorrow?"), QueryKind::Weather);
        assert_eq!(classify("What's the temperature outside"), QueryKind::Weather);
        assert_eq!(classify("Is it windy?"), QueryKind::Weather);
        assert_eq!(classify("Tell me a joke"), QueryKind::General);
    }

    #[test]
    fn extracts_city_from_common_phrasings() {
        assert_eq!(extract_city("What's the weather in Paris?", "Bucharest"), "Paris");
        assert_eq!(extract_city("weather in London today", "Bucharest"), "London");
        assert_eq!(
            extract_city("How is the weather today in Berlin?", "Bucharest"),
            "Berlin"
        );
        assert_eq!(extract_city("Temperature in Oslo.", "Bucharest"), "Oslo");
        assert_eq!(extract_city("Is it cold in Madrid, right?", "Bucharest"), "Madrid");
    }

    #[test]
    fn falls_back_to_default_city() {
        assert_eq!(extract_city("Is it going to rain?", "Bucharest"), "Bucharest");
        assert_eq!(extract_city("weather in ?", "Bucharest"), "Bucharest");
    }

    #[test]
    fn weather_context_includes_report_and_advice() {
        let source = Arc::new(MockWeatherSource::reporting(paris()));
        let provider = ContextProvider::new(source.clone(), "Bucharest", "Kira");

        let context = provider.context_for("What's the weather in Paris?");

        assert_eq!(source.cities(), vec!["Paris".to_string()]);
        assert!(context.starts_with("CURRENT WEATHER CONTEXT FOR Paris:"));
        assert!(context.contains("Temperature: 14.0°C"));
        assert!(context.contains("Humidity: 85%"));
        assert!(context.contains("- Umbrella or raincoat"));
    }

    #[test]
    fn weather_failure_becomes_apology() {
        let source = Arc::new(MockWeatherSource::failing("connection refused"));
        let provider = ContextProvider::new(source, "Bucharest", "Kira");

        let context = provider.context_for("What's the weather in Paris?");

        assert!(context.contains(
            "Sorry, I couldn't get the weather data for Paris. Error: connection refused"
        ));
    }

    #[test]
    fn general_questions_skip_weather_lookup() {
        let source = Arc::new(MockWeatherSource::failing("unused"));
        let provider = ContextProvider::new(source.clone(), "Bucharest", "Kira");

        let context = provider.full_context("Tell me a joke");

        assert!(context.starts_with("Your name is Kira."));
        assert!(context.ends_with(GENERAL_CONTEXT));
        assert!(source.cities().is_empty());
    }
}

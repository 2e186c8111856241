//! Weather lookups and the clothing advice derived from them.

use crate::config::WeatherConfig;
use crate::error::{KiraError, Result};
use crate::http;
use reqwest::blocking::Client;
use serde::Deserialize;
use std::sync::Mutex;

const SERVICE: &str = "openweathermap";

/// Current conditions for one place.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherReport {
    /// Forecast slot the data belongs to, as reported by the service.
    pub time: String,
    pub location: String,
    pub temperature_c: f32,
    pub description: String,
    pub humidity_pct: f32,
    pub wind_ms: f32,
    pub precipitation_mm: f32,
}

pub trait WeatherSource: Send + Sync {
    fn current(&self, city: &str) -> Result<WeatherReport>;
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    #[serde(default)]
    list: Vec<ForecastSlot>,
    city: Option<ForecastCity>,
}

#[derive(Debug, Deserialize)]
struct ForecastCity {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ForecastSlot {
    main: MainReadings,
    #[serde(default)]
    weather: Vec<Condition>,
    #[serde(default)]
    wind: Wind,
    #[serde(default)]
    rain: Rain,
    #[serde(default)]
    dt_txt: String,
}

#[derive(Debug, Deserialize)]
struct MainReadings {
    temp: f32,
    #[serde(default)]
    humidity: f32,
}

#[derive(Debug, Deserialize)]
struct Condition {
    description: String,
}

#[derive(Debug, Default, Deserialize)]
struct Wind {
    #[serde(default)]
    speed: f32,
}

#[derive(Debug, Default, Deserialize)]
struct Rain {
    #[serde(rename = "3h", default)]
    three_hours: f32,
}

fn report_from_forecast(city: &str, forecast: ForecastResponse) -> Result<WeatherReport> {
    let location = forecast
        .city
        .map(|c| c.name)
        .unwrap_or_else(|| city.to_string());
    let slot = forecast
        .list
        .into_iter()
        .next()
        .ok_or_else(|| KiraError::malformed(SERVICE, format!("no forecast data for {}", city)))?;

    Ok(WeatherReport {
        time: slot.dt_txt,
        location,
        temperature_c: slot.main.temp,
        description: slot
            .weather
            .into_iter()
            .next()
            .map(|c| c.description)
            .unwrap_or_default(),
        humidity_pct: slot.main.humidity,
        wind_ms: slot.wind.speed,
        precipitation_mm: slot.rain.three_hours,
    })
}

/// OpenWeatherMap 5-day forecast; the first slot stands in for "now".
pub struct OpenWeatherClient {
    client: Client,
    url: String,
    api_key: String,
}

impl OpenWeatherClient {
    pub fn new(config: &WeatherConfig) -> Result<Self> {
        Ok(Self {
            client: http::client(config.timeout_secs)?,
            url: config.url.clone(),
            api_key: config.api_key.clone(),
        })
    }
}

impl WeatherSource for OpenWeatherClient {
    fn current(&self, city: &str) -> Result<WeatherReport> {
        if self.api_key.is_empty() {
            return Err(KiraError::ConfigInvalidValue {
                key: "weather.api_key".to_string(),
                message: "not set (use KIRA_WEATHER_API_KEY)".to_string(),
            });
        }

        let url = reqwest::Url::parse_with_params(
            &self.url,
            &[("q", city), ("appid", self.api_key.as_str()), ("units", "metric")],
        )
        .map_err(|e| KiraError::ConfigInvalidValue {
            key: "weather.url".to_string(),
            message: e.to_string(),
        })?;

        let response = self.client.get(url).send()?;
        let text = http::ensure_success(SERVICE, response)?.text()?;
        let forecast: ForecastResponse = serde_json::from_str(&text)
            .map_err(|e| KiraError::malformed(SERVICE, e.to_string()))?;
        report_from_forecast(city, forecast)
    }
}

/// What to wear, one line per concern, most important first.
pub fn clothing_recommendations(report: &WeatherReport) -> Vec<&'static str> {
    let description = report.description.to_lowercase();
    let mut advice = Vec::new();

    advice.push(match report.temperature_c {
        t if t < 0.0 => "Winter coat, warm layers, gloves, hat and warm boots",
        t if t < 10.0 => "Jacket or coat, sweater, long pants and closed shoes",
        t if t < 20.0 => "Light jacket or cardigan, long pants and comfortable shoes",
        t if t < 25.0 => "T-shirt or light shirt with jeans or light pants",
        _ => "Light clothing: t-shirt, shorts, sandals or breathable shoes",
    });

    if report.precipitation_mm > 0.0
        || description.contains("rain")
        || description.contains("drizzle")
    {
        advice.push("Umbrella or raincoat and waterproof shoes");
    }
    if report.wind_ms > 10.0 {
        advice.push("Windbreaker against the strong wind");
    }
    if report.humidity_pct > 80.0 {
        advice.push("Breathable, moisture-wicking fabrics");
    }
    if description.contains("snow") {
        advice.push("Warm winter clothing, waterproof boots and gloves");
    }
    if description.contains("fog") || description.contains("mist") {
        advice.push("A light jacket; visibility is reduced and the air is damp");
    }

    advice
}

/// Weather source returning one fixed result.
#[derive(Debug)]
pub struct MockWeatherSource {
    result: Result<WeatherReport>,
    cities: Mutex<Vec<String>>,
}

impl MockWeatherSource {
    pub fn reporting(report: WeatherReport) -> Self {
        Self {
            result: Ok(report),
            cities: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            result: Err(KiraError::Other(message.to_string())),
            cities: Mutex::new(Vec::new()),
        }
    }

    /// Cities asked for, in order.
    pub fn cities(&self) -> Vec<String> {
        self.cities.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl WeatherSource for MockWeatherSource {
    fn current(&self, city: &str) -> Result<WeatherReport> {
        if let Ok(mut cities) = self.cities.lock() {
            cities.push(city.to_string());
        }
        match &self.result {
            Ok(report) => Ok(report.clone()),
            Err(e) => Err(KiraError::Other(e.to_string())),
        }
    }
}

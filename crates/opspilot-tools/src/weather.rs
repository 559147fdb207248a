use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::debug;

use opspilot_config::ToolSpec;
use opspilot_core::tool::{Tool, ToolError, ToolMeta};

use crate::common::{
    arg_string, config_string, config_u64, get_json, http_client, number_text,
    DEFAULT_HTTP_TIMEOUT_MS,
};

const DEFAULT_GEOCODING_BASE: &str = "https://geocoding-api.open-meteo.com/v1";
const DEFAULT_FORECAST_BASE: &str = "https://api.open-meteo.com/v1";
const CURRENT_FIELDS: &str = "temperature_2m,wind_speed_10m,weather_code";

/// WMO weather interpretation code to a short description.
pub fn weather_summary(code: i64) -> &'static str {
    match code {
        0 => "Clear sky",
        1 => "Mainly clear",
        2 => "Partly cloudy",
        3 => "Overcast",
        45 => "Fog",
        48 => "Depositing rime fog",
        51 => "Light drizzle",
        53 => "Moderate drizzle",
        55 => "Dense drizzle",
        61 => "Slight rain",
        63 => "Moderate rain",
        65 => "Heavy rain",
        71 => "Slight snow fall",
        73 => "Moderate snow fall",
        75 => "Heavy snow fall",
        80 => "Rain showers",
        81 => "Heavy rain showers",
        95 => "Thunderstorm",
        _ => "Unknown conditions",
    }
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct GeoHit {
    pub name: String,
    #[serde(default)]
    pub country: Option<String>,
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoHit {
    fn label(&self) -> String {
        match &self.country {
            Some(country) if !country.is_empty() => format!("{}, {}", self.name, country),
            _ => self.name.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GeoResponse {
    #[serde(default)]
    results: Vec<GeoHit>,
}

/// First geocoding hit for `city`.
pub(crate) fn first_geo_hit(city: &str, data: Value) -> Result<GeoHit, ToolError> {
    let response: GeoResponse = serde_json::from_value(data)
        .map_err(|err| ToolError::InvalidOutput(format!("unexpected geocoding payload: {}", err)))?;
    response
        .results
        .into_iter()
        .next()
        .ok_or_else(|| ToolError::NotFound(format!("no geocoding results for city '{}'", city)))
}

/// Build the tool output from the forecast `current` block.
pub(crate) fn shape_weather_output(
    geo: &GeoHit,
    data: &Value,
    source_url: &str,
) -> Result<Value, ToolError> {
    let current = data
        .get("current")
        .and_then(Value::as_object)
        .ok_or_else(|| ToolError::InvalidOutput("forecast has no 'current' block".to_string()))?;
    let code = current.get("weather_code").and_then(Value::as_i64);
    let summary = code.map(weather_summary).unwrap_or("Unknown conditions");

    Ok(json!({
        "location": geo.label(),
        "temperature_c": current.get("temperature_2m").cloned().unwrap_or(Value::Null),
        "wind_kph": current.get("wind_speed_10m").cloned().unwrap_or(Value::Null),
        "weather_code": code,
        "weather_summary": summary,
        "source_url": source_url,
    }))
}

/// Current conditions by city name, via Open-Meteo.
pub struct WeatherCurrentTool {
    name: String,
    description: String,
    geocoding_base: String,
    forecast_base: String,
    timeout_ms: u64,
    client: reqwest::Client,
}

impl WeatherCurrentTool {
    pub fn new() -> Self {
        Self::from_spec(&ToolSpec {
            name: "weather_current".to_string(),
            kind: "weather_current".to_string(),
            description: None,
            config: Value::Null,
        })
    }

    pub fn from_spec(spec: &ToolSpec) -> Self {
        let timeout_ms = config_u64(&spec.config, "timeout_ms").unwrap_or(DEFAULT_HTTP_TIMEOUT_MS);
        let base = |key: &str, default: &str| {
            config_string(&spec.config, key)
                .unwrap_or_else(|| default.to_string())
                .trim_end_matches('/')
                .to_string()
        };
        Self {
            name: spec.name.clone(),
            description: spec.description_or("Get current weather by city name."),
            geocoding_base: base("geocoding_base", DEFAULT_GEOCODING_BASE),
            forecast_base: base("forecast_base", DEFAULT_FORECAST_BASE),
            timeout_ms,
            client: http_client(timeout_ms),
        }
    }

    async fn geocode(&self, city: &str) -> Result<GeoHit, ToolError> {
        let request = self
            .client
            .get(format!("{}/search", self.geocoding_base))
            .query(&[("name", city), ("count", "1"), ("language", "en"), ("format", "json")]);
        let (data, _) = get_json(request, self.timeout_ms).await?;
        first_geo_hit(city, data)
    }
}

impl Default for WeatherCurrentTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for WeatherCurrentTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn metadata(&self) -> ToolMeta {
        ToolMeta::new(self.name(), self.description())
            .with_input_schema(json!({
                "type": "object",
                "required": ["city"],
                "properties": {
                    "city": {"type": "string", "description": "city name, e.g. Mumbai"}
                }
            }))
            .with_output_schema(json!({
                "type": "object",
                "required": ["location", "weather_summary", "source_url"],
                "properties": {
                    "location": {"type": "string"},
                    "temperature_c": {"type": ["number", "null"]},
                    "wind_kph": {"type": ["number", "null"]},
                    "weather_code": {"type": ["integer", "null"]},
                    "weather_summary": {"type": "string"},
                    "source_url": {"type": "string"}
                }
            }))
            .with_keywords(["weather", "temperature", "forecast", "wind", "rain", "climate"])
    }

    async fn invoke(&self, arguments: &Map<String, Value>) -> Result<Value, ToolError> {
        let city = arg_string(arguments, "city")
            .ok_or_else(|| ToolError::InvalidArguments("missing 'city'".to_string()))?;

        let geo = self.geocode(&city).await?;
        let latitude = geo.latitude.to_string();
        let longitude = geo.longitude.to_string();
        let request = self
            .client
            .get(format!("{}/forecast", self.forecast_base))
            .query(&[
                ("latitude", latitude.as_str()),
                ("longitude", longitude.as_str()),
                ("current", CURRENT_FIELDS),
            ]);
        let (data, source_url) = get_json(request, self.timeout_ms).await?;
        let output = shape_weather_output(&geo, &data, &source_url)?;
        debug!(tool = %self.name, city = %city, location = %geo.label(), "weather lookup finished");
        Ok(output)
    }

    fn summarize(&self, output: &Value) -> Option<String> {
        let location = output.get("location")?.as_str()?;
        let summary = output
            .get("weather_summary")
            .and_then(Value::as_str)
            .unwrap_or("Unknown conditions");
        let temperature = number_text(output.get("temperature_c").unwrap_or(&Value::Null));
        let wind = number_text(output.get("wind_kph").unwrap_or(&Value::Null));
        Some(format!(
            "Current weather in {}: {}, {}°C, wind {} kph.",
            location, summary, temperature, wind
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mumbai() -> GeoHit {
        GeoHit {
            name: "Mumbai".to_string(),
            country: Some("India".to_string()),
            latitude: 19.07,
            longitude: 72.88,
        }
    }

    #[test]
    fn test_weather_code_table() {
        assert_eq!(weather_summary(0), "Clear sky");
        assert_eq!(weather_summary(48), "Depositing rime fog");
        assert_eq!(weather_summary(81), "Heavy rain showers");
        assert_eq!(weather_summary(95), "Thunderstorm");
        assert_eq!(weather_summary(99), "Unknown conditions");
        assert_eq!(weather_summary(-1), "Unknown conditions");
    }

    #[test]
    fn test_first_geo_hit() {
        let hit = first_geo_hit(
            "Mumbai",
            json!({"results": [
                {"name": "Mumbai", "country": "India", "latitude": 19.07, "longitude": 72.88},
                {"name": "Mumbai Suburban", "country": "India", "latitude": 19.1, "longitude": 72.9}
            ]}),
        )
        .expect("hit");
        assert_eq!(hit.label(), "Mumbai, India");

        let err = first_geo_hit("Atlantis", json!({"generationtime_ms": 0.5})).expect_err("none");
        assert_eq!(
            err,
            ToolError::NotFound("no geocoding results for city 'Atlantis'".to_string())
        );
    }

    #[test]
    fn test_shape_and_summarize() {
        let data = json!({"current": {"temperature_2m": 31.4, "wind_speed_10m": 12, "weather_code": 2}});
        let output = shape_weather_output(&mumbai(), &data, "https://api.open-meteo.com/v1/forecast?x").expect("shape");
        assert_eq!(output["weather_summary"], json!("Partly cloudy"));
        assert_eq!(output["weather_code"], json!(2));

        let tool = WeatherCurrentTool::new();
        assert!(opspilot_core::schema::validate(&output, &tool.metadata().output_schema).is_ok());
        assert_eq!(
            tool.summarize(&output).as_deref(),
            Some("Current weather in Mumbai, India: Partly cloudy, 31.4°C, wind 12 kph.")
        );
    }

    #[test]
    fn test_missing_current_block_is_invalid_output() {
        let err = shape_weather_output(&mumbai(), &json!({}), "u").expect_err("no current");
        assert!(matches!(err, ToolError::InvalidOutput(_)));
    }

    #[test]
    fn test_unknown_code_falls_back() {
        let data = json!({"current": {"temperature_2m": 1.0, "wind_speed_10m": 3.5, "weather_code": 77}});
        let output = shape_weather_output(&mumbai(), &data, "u").expect("shape");
        assert_eq!(output["weather_summary"], json!("Unknown conditions"));
    }

    #[test]
    fn test_missing_city_is_invalid_arguments() {
        tokio_test::block_on(async {
            let err = WeatherCurrentTool::new()
                .invoke(&Map::new())
                .await
                .expect_err("missing city");
            assert_eq!(err, ToolError::InvalidArguments("missing 'city'".to_string()));
        });
    }
}

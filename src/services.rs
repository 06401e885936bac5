//! External content lookups — weather, quotes, jokes, translation.
//!
//! These are opaque third-party services invoked by specific command
//! handlers. Handlers depend on the `ContentServices` trait so tests can
//! stub them out.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ServiceError;

/// Third-party content lookups. Each method returns a fully formatted reply.
#[async_trait]
pub trait ContentServices: Send + Sync {
    async fn weather(&self, city: &str) -> Result<String, ServiceError>;
    async fn quote(&self) -> Result<String, ServiceError>;
    async fn joke(&self) -> Result<String, ServiceError>;
    async fn translate(&self, text: &str) -> Result<String, ServiceError>;
}

/// reqwest-backed implementation hitting the public APIs.
pub struct HttpContentServices {
    http: reqwest::Client,
    weather_api_key: Option<String>,
    translate_api_key: Option<String>,
}

impl HttpContentServices {
    pub fn new(weather_api_key: Option<String>, translate_api_key: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            weather_api_key,
            translate_api_key,
        }
    }
}

fn field<'a>(value: &'a Value, path: &[&str]) -> Result<&'a Value, ServiceError> {
    let mut current = value;
    for key in path {
        current = current
            .get(key)
            .ok_or_else(|| ServiceError::InvalidResponse(format!("missing field {key}")))?;
    }
    Ok(current)
}

fn str_field(value: &Value, path: &[&str]) -> Result<String, ServiceError> {
    Ok(field(value, path)?
        .as_str()
        .ok_or_else(|| ServiceError::InvalidResponse(format!("{} is not a string", path.join("."))))?
        .to_string())
}

#[async_trait]
impl ContentServices for HttpContentServices {
    async fn weather(&self, city: &str) -> Result<String, ServiceError> {
        let api_key = self
            .weather_api_key
            .as_deref()
            .ok_or(ServiceError::NotConfigured("weather"))?;

        let body: Value = self
            .http
            .get("https://api.openweathermap.org/data/2.5/weather")
            .query(&[("q", city), ("appid", api_key), ("units", "metric")])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let name = str_field(&body, &["name"])?;
        let description = body["weather"][0]["description"]
            .as_str()
            .unwrap_or("unknown")
            .to_string();
        let main = field(&body, &["main"])?;

        Ok(format!(
            "🌤️ Weather for {name}\n\n\
             Temperature: {}°C\n\
             Feels like: {}°C\n\
             Description: {description}\n\
             Humidity: {}%\n\
             Wind Speed: {} m/s\n\
             Pressure: {} hPa",
            main["temp"],
            main["feels_like"],
            main["humidity"],
            body["wind"]["speed"],
            main["pressure"],
        ))
    }

    async fn quote(&self) -> Result<String, ServiceError> {
        let body: Value = self
            .http
            .get("https://api.quotable.io/random")
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let content = str_field(&body, &["content"])?;
        let author = str_field(&body, &["author"])?;
        Ok(format!(
            "💭 Inspirational Quote\n\n\"{content}\"\n\n- {author}"
        ))
    }

    async fn joke(&self) -> Result<String, ServiceError> {
        let body: Value = self
            .http
            .get("https://official-joke-api.appspot.com/random_joke")
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let setup = str_field(&body, &["setup"])?;
        let punchline = str_field(&body, &["punchline"])?;
        Ok(format!("😄 Random Joke\n\n{setup}\n\n{punchline}"))
    }

    async fn translate(&self, text: &str) -> Result<String, ServiceError> {
        let api_key = self
            .translate_api_key
            .as_deref()
            .ok_or(ServiceError::NotConfigured("translation"))?;

        let request = serde_json::json!({
            "model": "gpt-3.5-turbo",
            "messages": [
                {
                    "role": "system",
                    "content": "Translate the following text to English. Only return the translation, nothing else."
                },
                { "role": "user", "content": text }
            ],
            "max_tokens": 100
        });

        let body: Value = self
            .http
            .post("https://api.openai.com/v1/chat/completions")
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let translation = body["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| ServiceError::InvalidResponse("no completion content".into()))?
            .trim()
            .to_string();

        Ok(format!(
            "🌐 Translation\n\nOriginal: {text}\n\nTranslation: {translation}"
        ))
    }
}

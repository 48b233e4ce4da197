use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::color::Color;
use crate::config::RatingConfig;
use crate::palette::SLOTS;

/// A palette's cohesiveness score, 1 (worst) to 3 (best).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Rating(u8);

impl Rating {
    pub const MIN: Rating = Rating(1);
    pub const MAX: Rating = Rating(3);
    /// What a failed or unreadable rating counts as.
    pub const FALLBACK: Rating = Rating::MIN;

    pub fn clamped(n: i64) -> Self {
        Self(n.clamp(Self::MIN.0 as i64, Self::MAX.0 as i64) as u8)
    }

    pub fn value(self) -> u8 {
        self.0
    }
}

/// A hosted text-generation model.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> anyhow::Result<String>;
}

pub fn prompt(colors: &[Color; SLOTS]) -> String {
    let list = colors
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "Rate this color palette on a scale of 1 to 3 based on how cohesive the colors are.\n\
         3 is the best, 1 is the worst. Only respond with the number.\n\
         Colors: {list}"
    )
}

/// First integer in the reply, clamped to the rating range.
pub fn parse_rating(reply: &str) -> Option<Rating> {
    let start = reply.find(|c: char| c.is_ascii_digit())?;
    let digits: String = reply[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    let negative = reply[..start].ends_with('-');

    // Anything too long for i64 is far above the range anyway.
    let n = digits.parse::<i64>().unwrap_or(i64::MAX);
    Some(Rating::clamped(if negative { -n } else { n }))
}

/// Ask `model` to score `colors`. Never fails: any error yields [`Rating::FALLBACK`].
pub async fn rate(model: &dyn TextGenerator, colors: &[Color; SLOTS]) -> Rating {
    let reply = match model.generate(&prompt(colors)).await {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!(error = %format!("{e:#}"), "rating request failed");
            return Rating::FALLBACK;
        }
    };

    match parse_rating(&reply) {
        Some(r) => r,
        None => {
            tracing::warn!(%reply, "rating reply had no number");
            Rating::FALLBACK
        }
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: [Message<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

impl MessagesResponse {
    fn first_text(self) -> Option<String> {
        self.content
            .into_iter()
            .find(|b| b.kind == "text")
            .and_then(|b| b.text)
    }
}

const API_VERSION: &str = "2023-06-01";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Client for a messages-style completion endpoint.
#[derive(Debug, Clone)]
pub struct MessagesClient {
    http: reqwest::Client,
    endpoint: String,
    model: String,
    max_tokens: u32,
    api_key: String,
}

impl MessagesClient {
    pub fn from_config(cfg: &RatingConfig) -> anyhow::Result<Self> {
        let api_key = cfg
            .api_key
            .clone()
            .filter(|k| !k.is_empty())
            .context("no rating API key configured (set PALETTE_RATING_API_KEY)")?;
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("build http client")?;

        Ok(Self {
            http,
            endpoint: cfg.endpoint.clone(),
            model: cfg.model.clone(),
            max_tokens: cfg.max_tokens,
            api_key,
        })
    }
}

#[async_trait]
impl TextGenerator for MessagesClient {
    async fn generate(&self, prompt: &str) -> anyhow::Result<String> {
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: self.max_tokens,
            messages: [Message {
                role: "user",
                content: prompt,
            }],
        };

        let resp = self
            .http
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await
            .context("send rating request")?
            .error_for_status()
            .context("rating endpoint returned an error")?;

        let parsed: MessagesResponse = resp.json().await.context("parse rating response")?;
        parsed.first_text().context("rating response had no text")
    }
}

use std::time::Duration;

use serde_json::{json, Value};

use crate::transcription::domain::api_error::ApiError;
use crate::transcription::domain::text_refiner::TextRefiner;

use super::openai_http::{check_status, transport_error, OpenAiHttp};

pub const REFINEMENT_TIMEOUT: Duration = Duration::from_secs(300);
pub const REFINEMENT_TEMPERATURE: f64 = 0.3;
pub const REFINEMENT_MAX_TOKENS: u32 = 4000;

pub const SYSTEM_PROMPT: &str =
    "You are a professional transcript editor. Clean up the text while preserving all information.";

const USER_PROMPT: &str = "Clean up this transcription by removing redundant phrases and \
making sentences more coherent. Preserve all information and do not summarize. The goal is \
to improve readability while maintaining complete accuracy:";

/// Chat-completions refiner.
pub struct OpenAiTextRefiner {
    http: OpenAiHttp,
    model: String,
}

impl OpenAiTextRefiner {
    pub fn new(api_key: &str, base_url: &str, model: &str) -> Result<Self, ApiError> {
        Ok(Self {
            http: OpenAiHttp::new(api_key, base_url, REFINEMENT_TIMEOUT)?,
            model: model.to_string(),
        })
    }
}

impl TextRefiner for OpenAiTextRefiner {
    fn verify_credentials(&self) -> Result<(), ApiError> {
        self.http.verify_credentials()
    }

    fn refine(&self, text: &str) -> Result<String, ApiError> {
        let response = self
            .http
            .post("chat/completions")
            .json(&chat_request(&self.model, text))
            .send()
            .map_err(transport_error)?;
        let body: Value = check_status(response)?.json().map_err(transport_error)?;
        parse_completion(&body)
    }
}

fn chat_request(model: &str, text: &str) -> Value {
    json!({
        "model": model,
        "messages": [
            {"role": "system", "content": SYSTEM_PROMPT},
            {"role": "user", "content": format!("{USER_PROMPT}\n\n{text}")},
        ],
        "temperature": REFINEMENT_TEMPERATURE,
        "max_tokens": REFINEMENT_MAX_TOKENS,
    })
}

fn parse_completion(body: &Value) -> Result<String, ApiError> {
    body["choices"][0]["message"]["content"]
        .as_str()
        .map(|s| s.trim().to_string())
        .ok_or_else(|| ApiError::unexpected("completion response has no message content"))
}

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, warn};

use crate::assistant::context::ResolvedContext;
use crate::config::LlmConfig;

#[derive(Debug, thiserror::Error)]
pub enum AssistantError {
    #[error("LLM request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("LLM API error: {0}")]
    Api(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Chat completion backend used by the assistant.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, system_prompt: &str, user_message: &str) -> Result<String, AssistantError>;
}

pub struct OpenAiClient {
    client: Client,
    api_key: String,
    api_url: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
}

impl OpenAiClient {
    pub fn new(config: &LlmConfig) -> Result<Self, AssistantError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            api_url: config.api_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl ChatModel for OpenAiClient {
    async fn complete(&self, system_prompt: &str, user_message: &str) -> Result<String, AssistantError> {
        let payload = json!({
            "model": self.model,
            "messages": [
                {
                    "role": "system",
                    "content": system_prompt
                },
                {
                    "role": "user",
                    "content": user_message
                }
            ],
            "max_tokens": self.max_tokens,
            "temperature": self.temperature,
        });

        debug!("Calling chat completions with model {}", self.model);
        let response = self.client
            .post(format!("{}/chat/completions", self.api_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            warn!("Chat completion failed with {}", status);
            return Err(AssistantError::Api(format!("{}: {}", status, error_text)));
        }

        let json: Value = response.json().await?;
        extract_content(&json)
    }
}

/// Pull `choices[0].message.content` out of a chat completion response.
fn extract_content(json: &Value) -> Result<String, AssistantError> {
    json["choices"][0]["message"]["content"]
        .as_str()
        .map(|content| content.trim().to_string())
        .ok_or_else(|| AssistantError::Api("No content in completion response".to_string()))
}

/// System prompt with the company context, relevant data and market snippet.
pub fn build_system_prompt(
    company_name: &str,
    current_page: Option<&str>,
    resolved: &ResolvedContext,
    market_info: Option<&str>,
) -> Result<String, AssistantError> {
    let relevant_data = if resolved.relevant_data.is_empty() {
        "Nenhum dado específico encontrado.".to_string()
    } else {
        serde_json::to_string_pretty(&resolved.relevant_data)?
    };

    let mut prompt = format!(
        r#"Você é um assistente especialista em gestão ESG (Ambiental, Social e Governança) da plataforma da empresa {company}.
Responda sempre em português do Brasil, de forma objetiva e prática, usando os dados da empresa quando disponíveis.
Não invente números: se um dado não estiver no contexto, diga que ele não foi encontrado e sugira onde cadastrá-lo.

PÁGINA ATUAL: {page}

CONTEXTO:
{context}

DADOS RELEVANTES:
{data}"#,
        company = company_name,
        page = current_page.unwrap_or("não informada"),
        context = resolved.context,
        data = relevant_data,
    );

    if let Some(info) = market_info {
        prompt.push_str("\n\nINFORMAÇÕES DE MERCADO:\n");
        prompt.push_str(info);
    }

    Ok(prompt)
}

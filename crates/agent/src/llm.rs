use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Returns the assistant's reply to the full conversation so far.
    async fn complete(&self, turns: &[ConversationTurn]) -> Result<String>;
}

/// OpenAI-compatible `chat/completions` client.
#[derive(Clone)]
pub struct OpenAiChatClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: SecretString,
}

impl OpenAiChatClient {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: SecretString,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key,
        }
    }
}

#[derive(Deserialize)]
struct Message {
    content: Option<String>,
}

#[derive(Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Deserialize)]
struct ApiResponse {
    choices: Vec<Choice>,
}

#[async_trait]
impl LlmClient for OpenAiChatClient {
    async fn complete(&self, turns: &[ConversationTurn]) -> Result<String> {
        let body = json!({
            "model": &self.model,
            "messages": turns,
        });

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .context("chat completion request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("chat completion error {status}: {body}"));
        }

        let api_response: ApiResponse =
            response.json().await.context("chat completion response was not valid JSON")?;
        let content = api_response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| anyhow!("chat completion returned no content"))?;

        debug!(
            event_name = "agent.llm.completed",
            model = %self.model,
            chars = content.len(),
            "model replied"
        );
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use mockito::Matcher;
    use serde_json::json;

    use super::{ConversationTurn, LlmClient, OpenAiChatClient};

    #[tokio::test]
    async fn posts_the_whole_conversation_and_returns_first_choice() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer llm-key")
            .match_body(Matcher::Json(json!({
                "model": "gpt-4o",
                "messages": [
                    {"role": "system", "content": "be brief"},
                    {"role": "user", "content": "Restart Acme Corporation dv01 cbp"}
                ]
            })))
            .with_status(200)
            .with_body(r#"{"choices": [{"message": {"role": "assistant", "content": "Answer: done"}}]}"#)
            .create_async()
            .await;

        let client = OpenAiChatClient::new(server.url(), "gpt-4o", "llm-key".to_string().into());
        let reply = client
            .complete(&[
                ConversationTurn::system("be brief"),
                ConversationTurn::user("Restart Acme Corporation dv01 cbp"),
            ])
            .await
            .expect("completion");

        mock.assert_async().await;
        assert_eq!(reply, "Answer: done");
    }

    #[tokio::test]
    async fn error_status_is_reported_with_body() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(429)
            .with_body("rate limited")
            .create_async()
            .await;

        let client = OpenAiChatClient::new(server.url(), "gpt-4o", "k".to_string().into());
        let error = client.complete(&[ConversationTurn::user("hi")]).await.expect_err("429");

        assert!(error.to_string().contains("429"));
        assert!(error.to_string().contains("rate limited"));
    }
}

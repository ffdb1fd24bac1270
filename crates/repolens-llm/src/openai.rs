use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::LlmError;
use crate::provider::{LlmProvider, Message};

/// Client for any OpenAI-compatible `/chat/completions` + `/embeddings` API.
pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    temperature: Option<f32>,
    embedding_model: Option<String>,
}

impl fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("client", &"<reqwest::Client>")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("embedding_model", &self.embedding_model)
            .finish()
    }
}

impl Clone for OpenAiProvider {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            api_key: self.api_key.clone(),
            base_url: self.base_url.clone(),
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            embedding_model: self.embedding_model.clone(),
        }
    }
}

impl OpenAiProvider {
    #[must_use]
    pub fn new(
        api_key: String,
        mut base_url: String,
        model: String,
        max_tokens: u32,
        embedding_model: Option<String>,
    ) -> Self {
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            client: crate::http::default_client(Duration::from_secs(120)),
            api_key,
            base_url,
            model,
            max_tokens,
            temperature: None,
            embedding_model,
        }
    }

    #[must_use]
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    async fn send_request(&self, messages: &[Message]) -> Result<String, LlmError> {
        let api_messages = convert_messages(messages);
        let body = ChatRequest {
            model: &self.model,
            messages: &api_messages,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await.map_err(LlmError::Http)?;

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(LlmError::RateLimited);
        }

        if !status.is_success() {
            tracing::error!("OpenAI API error {status}: {text}");
            return Err(LlmError::Other(format!(
                "OpenAI API request failed (status {status})"
            )));
        }

        let resp: OpenAiChatResponse = serde_json::from_str(&text)?;

        if let Some(ref usage) = resp.usage {
            tracing::debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "OpenAI API usage"
            );
        }

        resp.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(LlmError::EmptyResponse { provider: "openai" })
    }

    async fn send_embedding_request(
        &self,
        model: &str,
        texts: &[String],
    ) -> Result<Vec<Vec<f32>>, LlmError> {
        let body = EmbeddingRequest { input: texts, model };

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await.map_err(LlmError::Http)?;

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(LlmError::RateLimited);
        }

        if !status.is_success() {
            tracing::error!("OpenAI embedding API error {status}: {text}");
            return Err(LlmError::Other(format!(
                "OpenAI embedding request failed (status {status})"
            )));
        }

        let resp: EmbeddingResponse = serde_json::from_str(&text)?;
        order_embeddings(resp.data, texts.len())
    }
}

impl LlmProvider for OpenAiProvider {
    async fn chat(&self, messages: &[Message]) -> Result<String, LlmError> {
        match self.send_request(messages).await {
            Ok(text) => Ok(text),
            Err(LlmError::RateLimited) => {
                tracing::warn!("OpenAI rate limited, retrying in 1s");
                tokio::time::sleep(Duration::from_secs(1)).await;
                self.send_request(messages).await
            }
            Err(e) => Err(e),
        }
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        let model = self
            .embedding_model
            .as_deref()
            .ok_or(LlmError::EmbedUnsupported { provider: "openai" })?;

        if texts.is_empty() {
            return Ok(Vec::new());
        }

        match self.send_embedding_request(model, texts).await {
            Ok(vectors) => Ok(vectors),
            Err(LlmError::RateLimited) => {
                tracing::warn!("OpenAI embeddings rate limited, retrying in 1s");
                tokio::time::sleep(Duration::from_secs(1)).await;
                self.send_embedding_request(model, texts).await
            }
            Err(e) => Err(e),
        }
    }

    fn supports_embeddings(&self) -> bool {
        self.embedding_model.is_some()
    }

    fn name(&self) -> &'static str {
        "openai"
    }
}

/// Sort returned embeddings by their `index` and check the count.
fn order_embeddings(
    mut data: Vec<EmbeddingData>,
    expected: usize,
) -> Result<Vec<Vec<f32>>, LlmError> {
    if data.len() != expected {
        return Err(LlmError::EmbedMismatch {
            expected,
            actual: data.len(),
        });
    }
    data.sort_by_key(|d| d.index);
    Ok(data.into_iter().map(|d| d.embedding).collect())
}

fn convert_messages(messages: &[Message]) -> Vec<ApiMessage<'_>> {
    messages
        .iter()
        .map(|msg| ApiMessage {
            role: msg.role.as_str(),
            content: &msg.content,
        })
        .collect()
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ApiMessage<'a>],
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Serialize)]
struct ApiMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct OpenAiChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<OpenAiUsage>,
}

#[derive(Deserialize)]
struct OpenAiUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a [String],
    model: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::Role;

    fn test_provider() -> OpenAiProvider {
        OpenAiProvider::new(
            "sk-test-key".into(),
            "https://api.openai.com/v1".into(),
            "gpt-4o-mini".into(),
            1000,
            Some("text-embedding-3-small".into()),
        )
    }

    fn test_provider_no_embed() -> OpenAiProvider {
        OpenAiProvider::new(
            "sk-test-key".into(),
            "https://api.openai.com/v1".into(),
            "gpt-4o-mini".into(),
            1000,
            None,
        )
    }

    #[test]
    fn new_stores_fields() {
        let p = test_provider();
        assert_eq!(p.api_key, "sk-test-key");
        assert_eq!(p.base_url, "https://api.openai.com/v1");
        assert_eq!(p.model, "gpt-4o-mini");
        assert_eq!(p.max_tokens, 1000);
        assert_eq!(p.embedding_model.as_deref(), Some("text-embedding-3-small"));
        assert!(p.temperature.is_none());
    }

    #[test]
    fn with_temperature_sets_value() {
        let p = test_provider().with_temperature(0.1);
        assert_eq!(p.temperature, Some(0.1));
    }

    #[test]
    fn debug_redacts_api_key() {
        let p = test_provider();
        let debug = format!("{p:?}");
        assert!(!debug.contains("sk-test-key"));
        assert!(debug.contains("<redacted>"));
        assert!(debug.contains("gpt-4o-mini"));
    }

    #[test]
    fn clone_preserves_fields() {
        let p = test_provider().with_temperature(0.3);
        let c = p.clone();
        assert_eq!(c.api_key, p.api_key);
        assert_eq!(c.base_url, p.base_url);
        assert_eq!(c.model, p.model);
        assert_eq!(c.temperature, p.temperature);
        assert_eq!(c.embedding_model, p.embedding_model);
    }

    #[test]
    fn base_url_strips_trailing_slash() {
        let p = OpenAiProvider::new(
            "key".into(),
            "https://api.openai.com/v1/".into(),
            "m".into(),
            100,
            None,
        );
        assert_eq!(p.base_url, "https://api.openai.com/v1");
    }

    #[test]
    fn supports_embeddings_follows_model() {
        assert!(test_provider().supports_embeddings());
        assert!(!test_provider_no_embed().supports_embeddings());
    }

    #[test]
    fn chat_request_skips_missing_temperature() {
        let msgs = [ApiMessage {
            role: "user",
            content: "hello",
        }];
        let body = ChatRequest {
            model: "gpt-4o-mini",
            messages: &msgs,
            max_tokens: 10,
            temperature: None,
        };
        let json = serde_json::to_string(&body).unwrap();
        assert!(!json.contains("temperature"));
        assert!(json.contains("\"max_tokens\":10"));
    }

    #[test]
    fn convert_messages_maps_roles() {
        let messages = vec![
            Message::system("system prompt"),
            Message::user("user msg"),
            Message::assistant("assistant reply"),
        ];
        let api = convert_messages(&messages);
        assert_eq!(api.len(), 3);
        assert_eq!(api[0].role, "system");
        assert_eq!(api[0].content, "system prompt");
        assert_eq!(api[1].role, "user");
        assert_eq!(api[2].role, "assistant");
        assert_eq!(messages[2].role, Role::Assistant);
    }

    #[test]
    fn parse_chat_response() {
        let json = r#"{"choices":[{"message":{"content":"Hello!"}}]}"#;
        let resp: OpenAiChatResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.choices[0].message.content.as_deref(), Some("Hello!"));
    }

    #[test]
    fn parse_chat_response_null_content() {
        let json = r#"{"choices":[{"message":{"content":null}}]}"#;
        let resp: OpenAiChatResponse = serde_json::from_str(json).unwrap();
        assert!(resp.choices[0].message.content.is_none());
    }

    #[test]
    fn embedding_request_serializes_batch() {
        let input = vec!["a".to_string(), "b".to_string()];
        let body = EmbeddingRequest {
            input: &input,
            model: "text-embedding-3-small",
        };
        let json = serde_json::to_string(&body).unwrap();
        assert!(json.contains("\"input\":[\"a\",\"b\"]"));
    }

    #[test]
    fn order_embeddings_sorts_by_index() {
        let json = r#"{"data":[{"index":1,"embedding":[2.0]},{"index":0,"embedding":[1.0]}]}"#;
        let resp: EmbeddingResponse = serde_json::from_str(json).unwrap();
        let ordered = order_embeddings(resp.data, 2).unwrap();
        assert_eq!(ordered, vec![vec![1.0], vec![2.0]]);
    }

    #[test]
    fn order_embeddings_rejects_count_mismatch() {
        let json = r#"{"data":[{"index":0,"embedding":[1.0]}]}"#;
        let resp: EmbeddingResponse = serde_json::from_str(json).unwrap();
        let err = order_embeddings(resp.data, 3).unwrap_err();
        assert!(matches!(
            err,
            LlmError::EmbedMismatch {
                expected: 3,
                actual: 1
            }
        ));
    }

    #[tokio::test]
    async fn chat_unreachable_endpoint_errors() {
        let p = OpenAiProvider::new(
            "key".into(),
            "http://127.0.0.1:1".into(),
            "model".into(),
            100,
            None,
        );
        assert!(p.chat(&[Message::user("test")]).await.is_err());
    }

    #[tokio::test]
    async fn embed_without_model_returns_error() {
        let p = test_provider_no_embed();
        let err = p.embed_batch(&["x".to_string()]).await.unwrap_err();
        assert!(err.to_string().contains("embedding not supported"));
    }

    #[tokio::test]
    async fn embed_empty_batch_skips_request() {
        let p = OpenAiProvider::new(
            "key".into(),
            "http://127.0.0.1:1".into(),
            "model".into(),
            100,
            Some("embed".into()),
        );
        assert!(p.embed_batch(&[]).await.unwrap().is_empty());
    }

    mod wire {
        use wiremock::matchers::{body_partial_json, header, method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        use super::*;

        fn provider_for(server: &MockServer) -> OpenAiProvider {
            OpenAiProvider::new(
                "sk-wire".into(),
                format!("{}/v1", server.uri()),
                "gpt-4o-mini".into(),
                64,
                Some("text-embedding-3-small".into()),
            )
        }

        #[tokio::test]
        async fn chat_posts_messages_and_returns_content() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/v1/chat/completions"))
                .and(header("Authorization", "Bearer sk-wire"))
                .and(body_partial_json(serde_json::json!({
                    "model": "gpt-4o-mini",
                    "max_tokens": 64,
                    "messages": [{"role": "user", "content": "hi"}]
                })))
                .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                    "choices": [{"message": {"content": "hello back"}}],
                    "usage": {"prompt_tokens": 3, "completion_tokens": 2}
                })))
                .expect(1)
                .mount(&server)
                .await;

            let answer = provider_for(&server).chat(&[Message::user("hi")]).await.unwrap();
            assert_eq!(answer, "hello back");
        }

        #[tokio::test]
        async fn chat_null_content_is_empty_response() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/v1/chat/completions"))
                .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                    "choices": [{"message": {"content": null}}]
                })))
                .mount(&server)
                .await;

            let err = provider_for(&server).chat(&[Message::user("hi")]).await.unwrap_err();
            assert!(matches!(err, LlmError::EmptyResponse { provider: "openai" }));
        }

        #[tokio::test]
        async fn chat_server_error_is_reported() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/v1/chat/completions"))
                .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
                .mount(&server)
                .await;

            let err = provider_for(&server).chat(&[Message::user("hi")]).await.unwrap_err();
            assert!(err.to_string().contains("500"));
        }

        #[tokio::test]
        async fn chat_retries_once_after_rate_limit() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/v1/chat/completions"))
                .respond_with(ResponseTemplate::new(429))
                .up_to_n_times(1)
                .mount(&server)
                .await;
            Mock::given(method("POST"))
                .and(path("/v1/chat/completions"))
                .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                    "choices": [{"message": {"content": "after retry"}}]
                })))
                .mount(&server)
                .await;

            let answer = provider_for(&server).chat(&[Message::user("hi")]).await.unwrap();
            assert_eq!(answer, "after retry");
        }

        #[tokio::test]
        async fn embed_batch_orders_by_index() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/v1/embeddings"))
                .and(body_partial_json(serde_json::json!({
                    "model": "text-embedding-3-small",
                    "input": ["first", "second"]
                })))
                .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                    "data": [
                        {"index": 1, "embedding": [0.2, 0.2]},
                        {"index": 0, "embedding": [0.1, 0.1]}
                    ]
                })))
                .mount(&server)
                .await;

            let vectors = provider_for(&server)
                .embed_batch(&["first".to_string(), "second".to_string()])
                .await
                .unwrap();
            assert_eq!(vectors, vec![vec![0.1, 0.1], vec![0.2, 0.2]]);
        }

        #[tokio::test]
        async fn embed_batch_short_response_is_mismatch() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/v1/embeddings"))
                .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                    "data": [{"index": 0, "embedding": [0.1]}]
                })))
                .mount(&server)
                .await;

            let err = provider_for(&server)
                .embed_batch(&["a".to_string(), "b".to_string()])
                .await
                .unwrap_err();
            assert!(matches!(err, LlmError::EmbedMismatch { expected: 2, actual: 1 }));
        }
    }
}

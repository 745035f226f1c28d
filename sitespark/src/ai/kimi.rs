//! Client for the Kimi chat completions API (OpenAI-compatible wire format).

use std::collections::VecDeque;
use std::time::Duration;

use futures::stream::{self, BoxStream, StreamExt};
use reqwest::Client;
use async_openai::types::chat::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage, ChatCompletionRequestSystemMessageContent,
    ChatCompletionRequestUserMessage, ChatCompletionRequestUserMessageContent, CreateChatCompletionRequest, CreateChatCompletionResponse,
    CreateChatCompletionStreamResponse,
};
use tracing::{debug, instrument};

use super::{AiError, AiProvider, ContentSection, DesignTokens, GeneratedContent, IntentAnalysis, parse_reply};
use crate::config::AiConfig;

const INTENT_SYSTEM_PROMPT: &str = r#"You analyse requests for new websites.
Reply with a single JSON object and nothing else, using exactly this shape:
{
  "intent": "one sentence describing the site",
  "category": "business | portfolio | blog | ecommerce | landing | personal",
  "features": ["short feature names"],
  "targetAudience": "who the site is for",
  "tone": "professional | friendly | playful | formal | ...",
  "style": "modern | minimal | classic | bold | ..."
}"#;

const CONTENT_SYSTEM_PROMPT: &str = r#"You write website copy.
Reply with a single JSON object and nothing else, using exactly this shape:
{
  "title": "site title",
  "headline": "hero headline",
  "subheadline": "hero supporting sentence",
  "sections": [
    {"id": "hero", "type": "hero", "heading": "...", "content": "..."},
    {"id": "features", "type": "features", "heading": "...", "content": "...", "items": ["...", "...", "..."]},
    {"id": "about", "type": "about", "heading": "...", "content": "..."},
    {"id": "cta", "type": "cta", "heading": "...", "content": "..."}
  ],
  "seo": {"title": "at most 60 chars", "description": "at most 160 chars", "keywords": ["..."]}
}
Section types are limited to hero, features, about, services, testimonials, cta, contact and footer."#;

const DESIGN_SYSTEM_PROMPT: &str = r##"You design visual systems for websites.
Reply with a single JSON object and nothing else, using exactly this shape:
{
  "colors": {"primary": "#RRGGBB", "secondary": "#RRGGBB", "accent": "#RRGGBB", "background": "#RRGGBB",
             "surface": "#RRGGBB", "text": "#RRGGBB", "textMuted": "#RRGGBB"},
  "typography": {"headingFont": "CSS font stack", "bodyFont": "CSS font stack", "baseSize": "16px", "scale": 1.25},
  "spacing": {"unit": "1rem", "scale": [0.25, 0.5, 1, 1.5, 2, 3, 4, 6, 8]},
  "borderRadius": {"small": "0.25rem", "medium": "0.5rem", "large": "1rem"},
  "shadows": {"small": "CSS box-shadow", "medium": "CSS box-shadow", "large": "CSS box-shadow"}
}"##;

const SECTION_SYSTEM_PROMPT: &str = r#"You rewrite one section of website copy.
Reply with a single JSON object and nothing else, keeping the given "id" and "type":
{"id": "...", "type": "...", "heading": "...", "content": "...", "items": ["optional", "list"]}"#;

/// Build a system message
pub fn system_message(content: impl Into<String>) -> ChatCompletionRequestMessage {
    ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
        content: ChatCompletionRequestSystemMessageContent::Text(content.into()),
        name: None,
    })
}

/// Build a user message
pub fn user_message(content: impl Into<String>) -> ChatCompletionRequestMessage {
    ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
        content: ChatCompletionRequestUserMessageContent::Text(content.into()),
        name: None,
    })
}

/// Sampling settings for one kind of request
#[derive(Debug, Clone, Copy)]
struct Sampling {
    temperature: f32,
    max_tokens: u32,
}

const INTENT_SAMPLING: Sampling = Sampling {
    temperature: 0.7,
    max_tokens: 1000,
};
const CONTENT_SAMPLING: Sampling = Sampling {
    temperature: 0.8,
    max_tokens: 2000,
};
const DESIGN_SAMPLING: Sampling = Sampling {
    temperature: 0.6,
    max_tokens: 1500,
};
const SECTION_SAMPLING: Sampling = Sampling {
    temperature: 0.8,
    max_tokens: 800,
};
const CHAT_SAMPLING: Sampling = Sampling {
    temperature: 0.7,
    max_tokens: 2000,
};

/// One parsed line of a server-sent event stream
#[derive(Debug, PartialEq, Eq)]
pub enum SseEvent {
    Delta(String),
    Done,
    Skip,
}

/// Interpret one SSE line. Comments, blank lines, empty deltas and unparsable chunks are skipped.
pub fn parse_sse_line(line: &str) -> SseEvent {
    let Some(data) = line.trim().strip_prefix("data:") else {
        return SseEvent::Skip;
    };
    let data = data.trim();
    if data == "[DONE]" {
        return SseEvent::Done;
    }

    match serde_json::from_str::<CreateChatCompletionStreamResponse>(data) {
        Ok(chunk) => match chunk.choices.into_iter().next().and_then(|c| c.delta.content) {
            Some(content) if !content.is_empty() => SseEvent::Delta(content),
            _ => SseEvent::Skip,
        },
        Err(e) => {
            debug!("Ignoring malformed stream chunk: {e}");
            SseEvent::Skip
        }
    }
}

struct SseState {
    bytes: BoxStream<'static, reqwest::Result<Vec<u8>>>,
    buffer: Vec<u8>,
    pending: VecDeque<Result<String, AiError>>,
    done: bool,
}

impl SseState {
    /// Move every complete line out of the buffer and into `pending`
    fn drain_lines(&mut self) {
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            match parse_sse_line(&String::from_utf8_lossy(&line)) {
                SseEvent::Delta(content) => self.pending.push_back(Ok(content)),
                SseEvent::Done => {
                    self.done = true;
                    self.buffer.clear();
                    return;
                }
                SseEvent::Skip => {}
            }
        }
    }
}

/// Kimi API client
#[derive(Debug, Clone)]
pub struct KimiClient {
    http: Client,
    api_url: String,
    api_key: String,
    model: String,
}

impl KimiClient {
    pub fn new(api_url: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>, timeout: Duration) -> Result<Self, AiError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(AiError::NotConfigured("empty API key".to_string()));
        }

        let http = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("sitespark/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AiError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            api_url: api_url.into(),
            api_key,
            model: model.into(),
        })
    }

    /// Build a client from configuration; fails with `NotConfigured` when no API key is set.
    pub fn from_config(config: &AiConfig) -> Result<Self, AiError> {
        let api_key = config
            .api_key
            .as_deref()
            .ok_or_else(|| AiError::NotConfigured("KIMI_API_KEY is not set".to_string()))?;
        Self::new(&config.api_url, api_key, &config.model, config.request_timeout)
    }

    async fn send(&self, messages: &[ChatCompletionRequestMessage], sampling: Sampling, stream: bool) -> Result<reqwest::Response, AiError> {
        // Kimi reads `max_tokens`, not `max_completion_tokens`
        #[allow(deprecated)]
        let request = CreateChatCompletionRequest {
            model: self.model.clone(),
            messages: messages.to_vec(),
            temperature: Some(sampling.temperature),
            max_tokens: Some(sampling.max_tokens),
            stream: Some(stream),
            ..Default::default()
        };

        let res = self
            .http
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(AiError::Http {
                status: status.as_u16(),
                body,
            });
        }

        Ok(res)
    }

    /// Send a non-streaming chat request and return the assistant's reply text
    #[instrument(skip(self, messages), fields(model = %self.model), err)]
    pub async fn chat(&self, messages: &[ChatCompletionRequestMessage], temperature: f32, max_tokens: u32) -> Result<String, AiError> {
        self.complete(messages, Sampling { temperature, max_tokens }).await
    }

    async fn complete(&self, messages: &[ChatCompletionRequestMessage], sampling: Sampling) -> Result<String, AiError> {
        let res = self.send(messages, sampling, false).await?;
        let body: CreateChatCompletionResponse = res.json().await.map_err(|e| AiError::MalformedResponse {
            operation: "chat",
            reason: e.to_string(),
        })?;

        body.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(AiError::EmptyResponse)
    }

    /// Stream assistant text deltas for a conversation.
    ///
    /// The stream ends at the provider's `[DONE]` marker or when the connection closes.
    #[instrument(skip(self, messages), fields(model = %self.model), err)]
    pub async fn stream_chat(&self, messages: &[ChatCompletionRequestMessage]) -> Result<BoxStream<'static, Result<String, AiError>>, AiError> {
        let res = self.send(messages, CHAT_SAMPLING, true).await?;

        let state = SseState {
            bytes: res.bytes_stream().map(|chunk| chunk.map(|b| b.to_vec())).boxed(),
            buffer: Vec::new(),
            pending: VecDeque::new(),
            done: false,
        };

        let deltas = stream::unfold(state, |mut st| async move {
            loop {
                if let Some(item) = st.pending.pop_front() {
                    return Some((item, st));
                }
                if st.done {
                    return None;
                }
                match st.bytes.next().await {
                    Some(Ok(chunk)) => {
                        st.buffer.extend_from_slice(&chunk);
                        st.drain_lines();
                    }
                    Some(Err(e)) => {
                        st.done = true;
                        st.pending.push_back(Err(map_reqwest_error(e)));
                    }
                    None => {
                        st.done = true;
                        st.buffer.push(b'\n');
                        st.drain_lines();
                    }
                }
            }
        });

        Ok(deltas.boxed())
    }
}

/// Context block shared by the content and design prompts
fn describe_intent(intent: &IntentAnalysis) -> String {
    format!(
        "Intent: {}\nCategory: {}\nTarget Audience: {}\nTone: {}\nStyle: {}",
        intent.intent, intent.category, intent.target_audience, intent.tone, intent.style
    )
}

#[async_trait::async_trait]
impl AiProvider for KimiClient {
    fn name(&self) -> &str {
        &self.model
    }

    async fn parse_intent(&self, prompt: &str) -> Result<IntentAnalysis, AiError> {
        let messages = [system_message(INTENT_SYSTEM_PROMPT), user_message(prompt)];
        let reply = self.complete(&messages, INTENT_SAMPLING).await?;
        parse_reply("intent", &reply)
    }

    async fn generate_content(&self, intent: &IntentAnalysis, prompt: &str) -> Result<GeneratedContent, AiError> {
        let user = format!("{}\nOriginal Prompt: {prompt}", describe_intent(intent));
        let messages = [system_message(CONTENT_SYSTEM_PROMPT), user_message(user)];
        let reply = self.complete(&messages, CONTENT_SAMPLING).await?;
        parse_reply("content", &reply)
    }

    async fn generate_design_tokens(&self, intent: &IntentAnalysis) -> Result<DesignTokens, AiError> {
        let messages = [system_message(DESIGN_SYSTEM_PROMPT), user_message(describe_intent(intent))];
        let reply = self.complete(&messages, DESIGN_SAMPLING).await?;
        parse_reply("design", &reply)
    }

    async fn regenerate_section(
        &self,
        intent: &IntentAnalysis,
        section: &ContentSection,
        instructions: &str,
    ) -> Result<ContentSection, AiError> {
        let current = serde_json::to_string(section).map_err(|e| AiError::MalformedResponse {
            operation: "section",
            reason: e.to_string(),
        })?;
        let user = format!("{}\nCurrent section: {current}\nInstructions: {instructions}", describe_intent(intent));
        let messages = [system_message(SECTION_SYSTEM_PROMPT), user_message(user)];
        let reply = self.complete(&messages, SECTION_SAMPLING).await?;
        parse_reply("section", &reply)
    }
}

fn map_reqwest_error(e: reqwest::Error) -> AiError {
    if e.is_timeout() {
        AiError::Timeout
    } else {
        AiError::Transport(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{bearer_token, body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> KimiClient {
        KimiClient::new(
            format!("{}/v1/chat/completions", server.uri()),
            "sk-test",
            "kimi-k2",
            Duration::from_secs(5),
        )
        .unwrap()
    }

    fn completion(content: &str) -> serde_json::Value {
        json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "created": 1_760_000_000,
            "model": "kimi-k2",
            "choices": [{
                "index": 0,
                "message": { "role": "assistant", "content": content },
                "finish_reason": "stop"
            }]
        })
    }

    fn chunk(delta: serde_json::Value) -> String {
        let chunk = json!({
            "id": "chatcmpl-1",
            "object": "chat.completion.chunk",
            "created": 1_760_000_000,
            "model": "kimi-k2",
            "choices": [{ "index": 0, "delta": delta }]
        });
        format!("data: {chunk}")
    }

    fn intent() -> IntentAnalysis {
        IntentAnalysis {
            intent: "Portfolio for a photographer".to_string(),
            category: "portfolio".to_string(),
            features: vec!["gallery".to_string(), "contact".to_string()],
            target_audience: "wedding couples".to_string(),
            tone: "warm".to_string(),
            style: "minimal".to_string(),
        }
    }

    #[test]
    fn test_from_config_requires_key() {
        let err = KimiClient::from_config(&AiConfig::default()).unwrap_err();
        assert!(matches!(err, AiError::NotConfigured(_)));
    }

    #[test]
    fn test_parse_sse_line() {
        assert_eq!(parse_sse_line(&chunk(json!({ "content": "Hel" }))), SseEvent::Delta("Hel".to_string()));
        assert_eq!(parse_sse_line("data: [DONE]"), SseEvent::Done);
        assert_eq!(parse_sse_line(": keep-alive"), SseEvent::Skip);
        assert_eq!(parse_sse_line(""), SseEvent::Skip);
        assert_eq!(parse_sse_line("data: {not json"), SseEvent::Skip);
        assert_eq!(parse_sse_line(&chunk(json!({ "role": "assistant" }))), SseEvent::Skip);
        // A chunk without the completion envelope is not a chunk
        assert_eq!(parse_sse_line(r#"data: {"choices":[{"delta":{"content":"Hel"}}]}"#), SseEvent::Skip);
    }

    #[tokio::test]
    #[test_log::test]
    async fn test_parse_intent_sends_expected_request() {
        let server = MockServer::start().await;
        let reply = format!("```json\n{}\n```", serde_json::to_string(&intent()).unwrap());

        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(bearer_token("sk-test"))
            .and(body_partial_json(json!({ "model": "kimi-k2", "max_tokens": 1000, "stream": false })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion(&reply)))
            .expect(1)
            .mount(&server)
            .await;

        let parsed = client(&server).parse_intent("A portfolio for my photography").await.unwrap();
        assert_eq!(parsed, intent());
    }

    #[tokio::test]
    #[test_log::test]
    async fn test_design_tokens_use_design_sampling() {
        let server = MockServer::start().await;
        let tokens = crate::generation::design::default_tokens(&intent());

        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "max_tokens": 1500 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion(&serde_json::to_string(&tokens).unwrap())))
            .expect(1)
            .mount(&server)
            .await;

        let parsed = client(&server).generate_design_tokens(&intent()).await.unwrap();
        assert_eq!(parsed, tokens);
    }

    #[tokio::test]
    #[test_log::test]
    async fn test_routed_content_records_model_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion(&serde_json::to_string(&intent()).unwrap())))
            .mount(&server)
            .await;

        let kimi = client(&server);
        assert_eq!(kimi.name(), "kimi-k2");

        let router = crate::ai::AiRouter::new(Some(std::sync::Arc::new(kimi)), vec![]);
        assert_eq!(router.primary_name(), "kimi-k2");

        let routed = router.parse_intent("A portfolio for my photography").await;
        assert_eq!(routed.provider, "kimi-k2");
        assert!(!routed.is_mock());
    }

    #[tokio::test]
    #[test_log::test]
    async fn test_http_error_is_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
            .mount(&server)
            .await;

        let err = client(&server).parse_intent("anything at all").await.unwrap_err();
        match err {
            AiError::Http { status, body } => {
                assert_eq!(status, 503);
                assert_eq!(body, "overloaded");
            }
            other => panic!("expected http error, got {other:?}"),
        }
    }

    #[tokio::test]
    #[test_log::test]
    async fn test_malformed_json_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("Sure! Here is a website idea.")))
            .mount(&server)
            .await;

        let err = client(&server).generate_content(&intent(), "prompt").await.unwrap_err();
        assert!(matches!(err, AiError::MalformedResponse { operation: "content", .. }));
    }

    #[tokio::test]
    #[test_log::test]
    async fn test_empty_choices() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "chatcmpl-1",
                "object": "chat.completion",
                "created": 1_760_000_000,
                "model": "kimi-k2",
                "choices": []
            })))
            .mount(&server)
            .await;

        let err = client(&server).chat(&[user_message("hi")], 0.7, 100).await.unwrap_err();
        assert!(matches!(err, AiError::EmptyResponse));
    }

    #[tokio::test]
    #[test_log::test]
    async fn test_stream_chat_collects_deltas() {
        let server = MockServer::start().await;
        let body = [
            chunk(json!({ "role": "assistant" })),
            chunk(json!({ "content": "Hello" })),
            ": keep-alive".to_string(),
            chunk(json!({ "content": ", world" })),
            "data: [DONE]".to_string(),
            chunk(json!({ "content": "ignored" })),
        ]
        .map(|line| format!("{line}\n\n"))
        .concat();

        Mock::given(method("POST"))
            .and(body_partial_json(json!({ "stream": true })))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&server)
            .await;

        let deltas: Vec<String> = client(&server)
            .stream_chat(&[user_message("hi")])
            .await
            .unwrap()
            .map(|d| d.unwrap())
            .collect()
            .await;

        assert_eq!(deltas, vec!["Hello".to_string(), ", world".to_string()]);
    }
}

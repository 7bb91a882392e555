//! Remote vector-store and answer service
//!
//! The remote capability is abstracted behind `VectorStoreClient` so the
//! orchestrator and query service take an injected client instead of
//! touching process-wide state. `OpenAiClient` is the real implementation
//! over the OpenAI-compatible REST surface, using a blocking HTTP client:
//! the CLI is strictly sequential and accepts arbitrarily long calls.

use crate::config::Config;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Message role in a chat transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One turn of an in-memory chat transcript.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Input for an answer round: a bare question or a full transcript.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum AnswerInput {
    Question(String),
    Transcript(Vec<ChatMessage>),
}

/// A retrieval-augmented generation request.
#[derive(Debug, Clone)]
pub struct AnswerRequest {
    pub model: String,
    pub system_prompt: Option<String>,
    pub input: AnswerInput,
    pub store_ids: Vec<String>,
    pub max_results: u32,
}

/// The remote capabilities the rest of the crate depends on.
pub trait VectorStoreClient {
    /// Create a new store, returning its opaque identifier.
    fn create_store(&self, name: &str) -> Result<String>;

    /// Upload one local file into a store, returning the remote file id.
    fn upload_file(&self, store_id: &str, path: &Path) -> Result<String>;

    /// Answer a question (or continue a transcript) against stores.
    fn answer(&self, req: &AnswerRequest) -> Result<String>;
}

#[derive(Serialize)]
struct CreateStoreBody<'a> {
    name: &'a str,
}

#[derive(Serialize)]
struct AttachFileBody<'a> {
    file_id: &'a str,
}

#[derive(Serialize)]
struct FileSearchTool<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    vector_store_ids: &'a [String],
    max_num_results: u32,
}

#[derive(Serialize)]
struct ResponsesBody<'a> {
    model: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    instructions: Option<&'a str>,
    input: &'a AnswerInput,
    tools: Vec<FileSearchTool<'a>>,
}

#[derive(Deserialize)]
struct IdReply {
    id: String,
}

#[derive(Deserialize)]
struct StoreFileReply {
    status: String,
    #[serde(default)]
    last_error: Option<LastError>,
}

#[derive(Deserialize)]
struct LastError {
    message: String,
}

#[derive(Deserialize)]
struct ResponsesReply {
    output: Vec<OutputItem>,
}

#[derive(Deserialize)]
struct OutputItem {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    content: Vec<ContentItem>,
}

#[derive(Deserialize)]
struct ContentItem {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct ErrorReply {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// Client for an OpenAI-compatible vector-store and responses API.
pub struct OpenAiClient {
    http: reqwest::blocking::Client,
    api_key: String,
    base_url: String,
}

impl OpenAiClient {
    pub fn new(config: &Config) -> Result<Self> {
        let http = reqwest::blocking::Client::builder().build()?;
        Ok(Self {
            http,
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Upload a file with `purpose=assistants` and return its id.
    fn upload_raw_file(&self, path: &Path) -> Result<String> {
        let form = reqwest::blocking::multipart::Form::new()
            .text("purpose", "assistants")
            .file("file", path)?;

        let resp = self
            .http
            .post(self.url("/files"))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()?;
        let reply: IdReply = check(resp)?.json()?;
        Ok(reply.id)
    }

    /// Attach an uploaded file to a store and wait until ingestion reaches
    /// a terminal status. No timeout beyond the transport's own.
    fn attach_and_poll(&self, store_id: &str, file_id: &str) -> Result<()> {
        let resp = self
            .http
            .post(self.url(&format!("/vector_stores/{store_id}/files")))
            .bearer_auth(&self.api_key)
            .json(&AttachFileBody { file_id })
            .send()?;
        check(resp)?;

        loop {
            let resp = self
                .http
                .get(self.url(&format!("/vector_stores/{store_id}/files/{file_id}")))
                .bearer_auth(&self.api_key)
                .send()?;
            let reply: StoreFileReply = check(resp)?.json()?;

            match reply.status.as_str() {
                "completed" => return Ok(()),
                "in_progress" | "queued" => {
                    debug!("File {} still {}", file_id, reply.status);
                    std::thread::sleep(Duration::from_secs(1));
                }
                other => {
                    let detail = reply
                        .last_error
                        .map(|e| e.message)
                        .unwrap_or_else(|| "no detail reported".to_string());
                    return Err(Error::RemoteRequest(format!(
                        "file {file_id} ended in status {other}: {detail}"
                    )));
                }
            }
        }
    }
}

impl VectorStoreClient for OpenAiClient {
    fn create_store(&self, name: &str) -> Result<String> {
        let resp = self
            .http
            .post(self.url("/vector_stores"))
            .bearer_auth(&self.api_key)
            .json(&CreateStoreBody { name })
            .send()?;
        let reply: IdReply = check(resp)?.json()?;
        Ok(reply.id)
    }

    fn upload_file(&self, store_id: &str, path: &Path) -> Result<String> {
        let file_id = self.upload_raw_file(path)?;
        self.attach_and_poll(store_id, &file_id)?;
        Ok(file_id)
    }

    fn answer(&self, req: &AnswerRequest) -> Result<String> {
        let body = ResponsesBody {
            model: &req.model,
            instructions: req.system_prompt.as_deref(),
            input: &req.input,
            tools: vec![FileSearchTool {
                kind: "file_search",
                vector_store_ids: &req.store_ids,
                max_num_results: req.max_results,
            }],
        };

        let resp = self
            .http
            .post(self.url("/responses"))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()?;
        let reply: ResponsesReply = check(resp)?.json()?;
        Ok(output_text(&reply))
    }
}

/// Gather the assistant's `output_text` fragments from a responses reply.
fn output_text(reply: &ResponsesReply) -> String {
    reply
        .output
        .iter()
        .filter(|item| item.kind == "message")
        .flat_map(|item| item.content.iter())
        .filter(|c| c.kind == "output_text")
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Map a non-success response onto the error taxonomy: 4xx means the
/// request was rejected, anything else is a service/transport failure.
fn check(resp: reqwest::blocking::Response) -> Result<reqwest::blocking::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = resp.text().unwrap_or_default();
    let message = serde_json::from_str::<ErrorReply>(&body)
        .map(|e| e.error.message)
        .unwrap_or(body);

    if status.is_client_error() {
        Err(Error::RemoteRequest(format!("{status}: {message}")))
    } else {
        Err(Error::RemoteTransport(format!("{status}: {message}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_question_input_serializes_as_string() {
        let input = AnswerInput::Question("what is this?".to_string());
        assert_eq!(
            serde_json::to_value(&input).unwrap(),
            serde_json::json!("what is this?")
        );
    }

    #[test]
    fn test_transcript_input_serializes_as_role_content_array() {
        let input = AnswerInput::Transcript(vec![
            ChatMessage::user("hi"),
            ChatMessage::assistant("hello"),
        ]);
        assert_eq!(
            serde_json::to_value(&input).unwrap(),
            serde_json::json!([
                {"role": "user", "content": "hi"},
                {"role": "assistant", "content": "hello"},
            ])
        );
    }

    #[test]
    fn test_responses_body_shape() {
        let input = AnswerInput::Question("q".to_string());
        let store_ids = vec!["vs_1".to_string()];
        let body = ResponsesBody {
            model: "gpt-4.1-mini",
            instructions: None,
            input: &input,
            tools: vec![FileSearchTool {
                kind: "file_search",
                vector_store_ids: &store_ids,
                max_num_results: 8,
            }],
        };

        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["tools"][0]["type"], "file_search");
        assert_eq!(value["tools"][0]["vector_store_ids"][0], "vs_1");
        assert_eq!(value["tools"][0]["max_num_results"], 8);
        assert!(value.get("instructions").is_none());
    }

    #[test]
    fn test_output_text_extraction() {
        let reply: ResponsesReply = serde_json::from_value(serde_json::json!({
            "output": [
                {"type": "file_search_call", "id": "fs_1"},
                {"type": "message", "content": [
                    {"type": "output_text", "text": "part one"},
                    {"type": "output_text", "text": "part two"},
                ]},
            ]
        }))
        .unwrap();

        assert_eq!(output_text(&reply), "part one\npart two");
    }
}

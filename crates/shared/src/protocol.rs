use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{Message, Role};

/// Text used when a successful reply carries neither a chat nor a completion body.
pub const EMPTY_REPLY_PLACEHOLDER: &str = "No content returned.";

/// Role/content pair as it appears in a chat request body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireMessage {
    pub role: Role,
    pub content: String,
}

impl From<&Message> for WireMessage {
    fn from(message: &Message) -> Self {
        Self {
            role: message.role(),
            content: message.content().to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestShape {
    /// `{model, messages, stream}` as accepted by `/api/chat` style endpoints.
    #[default]
    Chat,
    /// `{model, prompt, stream}` as accepted by `/api/generate` style endpoints.
    #[serde(alias = "generate")]
    Completion,
}

impl RequestShape {
    pub fn infer_from_path(path: &str) -> Self {
        if path.contains("/chat") {
            RequestShape::Chat
        } else {
            RequestShape::Completion
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestShape::Chat => "chat",
            RequestShape::Completion => "completion",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown request shape '{0}' (expected 'chat' or 'completion')")]
pub struct UnknownRequestShape(pub String);

impl FromStr for RequestShape {
    type Err = UnknownRequestShape;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "chat" => Ok(RequestShape::Chat),
            "completion" | "generate" => Ok(RequestShape::Completion),
            _ => Err(UnknownRequestShape(value.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequestBody {
    pub model: String,
    pub messages: Vec<WireMessage>,
    pub stream: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionRequestBody {
    pub model: String,
    pub prompt: String,
    pub stream: bool,
}

/// Outbound request body. Serializes as the inner body with no tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum InferenceRequest {
    Chat(ChatRequestBody),
    Completion(CompletionRequestBody),
}

impl InferenceRequest {
    /// Builds the body for `history`, whose last entry is the turn being submitted.
    pub fn build(shape: RequestShape, model: &str, history: &[Message]) -> Self {
        match shape {
            RequestShape::Chat => InferenceRequest::Chat(ChatRequestBody {
                model: model.to_string(),
                messages: history.iter().map(WireMessage::from).collect(),
                stream: false,
            }),
            RequestShape::Completion => {
                let (latest, prior) = match history.split_last() {
                    Some((latest, prior)) => (latest.content(), prior),
                    None => ("", history),
                };
                InferenceRequest::Completion(CompletionRequestBody {
                    model: model.to_string(),
                    prompt: completion_prompt(prior, latest),
                    stream: false,
                })
            }
        }
    }

    pub fn model(&self) -> &str {
        match self {
            InferenceRequest::Chat(body) => &body.model,
            InferenceRequest::Completion(body) => &body.model,
        }
    }

    pub fn messages(&self) -> Option<&[WireMessage]> {
        match self {
            InferenceRequest::Chat(body) => Some(&body.messages),
            InferenceRequest::Completion(_) => None,
        }
    }

    pub fn shape(&self) -> RequestShape {
        match self {
            InferenceRequest::Chat(_) => RequestShape::Chat,
            InferenceRequest::Completion(_) => RequestShape::Completion,
        }
    }
}

fn completion_prompt(prior: &[Message], latest: &str) -> String {
    let transcript = prior
        .iter()
        .map(|message| format!("{}: {}", message.role(), message.content()))
        .collect::<Vec<_>>()
        .join("\n");
    format!("{transcript}\nuser: {latest}\nassistant:")
}

/// Decoded success body. Chat shape wins when a body carries both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InferenceReply {
    Chat(String),
    Completion(String),
    Empty,
}

impl InferenceReply {
    /// Fails only when `body` is not JSON. Fields of an unexpected type count as absent.
    pub fn decode(body: &[u8]) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_slice(body)?;
        Ok(Self::from_value(&value))
    }

    pub fn text(&self) -> &str {
        match self {
            InferenceReply::Chat(text) | InferenceReply::Completion(text) => text,
            InferenceReply::Empty => EMPTY_REPLY_PLACEHOLDER,
        }
    }

    pub fn into_text(self) -> String {
        match self {
            InferenceReply::Chat(text) | InferenceReply::Completion(text) => text,
            InferenceReply::Empty => EMPTY_REPLY_PLACEHOLDER.to_string(),
        }
    }

    fn from_value(value: &Value) -> Self {
        let text_at = |pointer: &str| {
            value
                .pointer(pointer)
                .and_then(Value::as_str)
                .filter(|text| !text.is_empty())
                .map(str::to_string)
        };

        if let Some(content) = text_at("/message/content") {
            InferenceReply::Chat(content)
        } else if let Some(response) = text_at("/response") {
            InferenceReply::Completion(response)
        } else {
            InferenceReply::Empty
        }
    }
}

/// Body returned by chat endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatReplyBody {
    pub message: WireMessage,
    pub done: bool,
}

/// Body returned by completion endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionReplyBody {
    pub response: String,
    pub done: bool,
}

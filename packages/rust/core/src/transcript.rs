//! Chat transcript: human questions and assistant answers.

use serde::{Deserialize, Serialize};

/// Marker the completion model emits before its final answer.
const ANSWER_MARKER: &str = "Answer:";

/// One message in the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", content = "content", rename_all = "snake_case")]
pub enum ChatMessage {
    Human(String),
    Assistant(String),
}

impl ChatMessage {
    /// Build an assistant message from a raw completion, keeping only the
    /// text after the first `Answer:` marker.
    pub fn from_completion(raw: &str) -> Self {
        Self::Assistant(extract_answer(raw))
    }

    /// Render the message for display.
    pub fn render(&self) -> String {
        match self {
            Self::Human(text) => render_human(text),
            Self::Assistant(text) => render_assistant(text),
        }
    }
}

fn render_human(text: &str) -> String {
    format!("You: {text}")
}

fn render_assistant(text: &str) -> String {
    let mut lines = text.lines();
    let first = lines.next().unwrap_or_default();
    let mut out = format!("Assistant: {first}");
    for line in lines {
        out.push_str("\n           ");
        out.push_str(line);
    }
    out
}

/// Text after the first `Answer:` marker, trimmed. The whole completion is
/// used when the marker is absent.
pub fn extract_answer(raw: &str) -> String {
    raw.split_once(ANSWER_MARKER)
        .map_or(raw, |(_, answer)| answer)
        .trim()
        .to_string()
}

/// Ordered conversation history.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Render every message, separated by blank lines.
    pub fn render(&self) -> String {
        self.messages
            .iter()
            .map(ChatMessage::render)
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

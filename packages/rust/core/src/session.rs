//! Per-user session context.
//!
//! A session owns the user's settings, the ingested corpus and the chat
//! transcript. Settings are editable until the user proceeds; proceeding
//! freezes them until an ingest fails.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use webai_shared::{AppConfig, Result, WebAiError, validate_depth};

use crate::pipeline::{IngestRequest, IngestResult, UploadedText};
use crate::transcript::{ChatMessage, Transcript};

/// Time-sortable session identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct Session {
    id: SessionId,
    max_depth: u32,
    frozen: bool,
    transcript: Transcript,
    corpus: Option<IngestResult>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: SessionId::new(),
            max_depth: 1,
            frozen: false,
            transcript: Transcript::new(),
            corpus: None,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn corpus(&self) -> Option<&IngestResult> {
        self.corpus.as_ref()
    }

    /// Change the crawl depth. Rejected once the session is frozen.
    pub fn set_max_depth(&mut self, depth: u32) -> Result<()> {
        if self.frozen {
            return Err(WebAiError::validation(
                "settings are frozen for this session",
            ));
        }
        self.max_depth = validate_depth(depth)?;
        Ok(())
    }

    /// Freeze the settings; the next step is an ingest.
    pub fn proceed(&mut self) {
        self.frozen = true;
    }

    /// Whether an ingest should run now.
    pub fn needs_ingest(&self) -> bool {
        self.frozen && self.corpus.is_none()
    }

    /// Build the ingest request for this session's settings.
    pub fn ingest_request(
        &self,
        config: &AppConfig,
        url: Option<String>,
        uploaded: Option<UploadedText>,
    ) -> IngestRequest {
        IngestRequest::from_config(config, url, uploaded, self.max_depth)
    }

    /// Keep the result of a successful ingest. Only one corpus per session.
    pub fn install_corpus(&mut self, corpus: IngestResult) -> Result<()> {
        if !self.frozen {
            return Err(WebAiError::validation(
                "proceed before installing a corpus",
            ));
        }
        if self.corpus.is_some() {
            return Err(WebAiError::validation(
                "this session already has a corpus",
            ));
        }
        self.corpus = Some(corpus);
        Ok(())
    }

    /// Unfreeze after a failed ingest so the settings can be changed.
    pub fn fail_ingest(&mut self) {
        self.frozen = false;
    }

    /// Record a question and the model's raw completion.
    ///
    /// Returns the assistant message that was stored.
    pub fn record_exchange(&mut self, question: &str, raw_completion: &str) -> Result<&ChatMessage> {
        if self.corpus.is_none() {
            return Err(WebAiError::validation("no content has been ingested yet"));
        }

        self.transcript.push(ChatMessage::Human(question.to_string()));
        self.transcript
            .push(ChatMessage::from_completion(raw_completion));

        self.transcript
            .messages()
            .last()
            .ok_or_else(|| WebAiError::validation("transcript is empty"))
    }

    pub fn render_transcript(&self) -> String {
        self.transcript.render()
    }
}

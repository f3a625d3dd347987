use serde::{Deserialize, Serialize};

use crate::errors::StudioError;

/// Author of a chat message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Model,
    System,
}

/// One entry of a rolling chat history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub role: MessageRole,
    pub text: String,
    /// Display-only marker for a model reply that is still being streamed.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_streaming: bool,
}

impl ChatMessage {
    pub fn new(role: MessageRole, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            is_streaming: false,
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(MessageRole::User, text)
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self::new(MessageRole::Model, text)
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(MessageRole::System, text)
    }
}

/// Structured song produced by the music endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Song {
    pub title: String,
    pub genre: String,
    pub mood: String,
    pub lyrics: Vec<LyricSection>,
}

/// A labelled block of lyrics (`Verse 1`, `Chorus`, ...).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LyricSection {
    #[serde(rename = "type")]
    pub label: String,
    pub lines: Vec<String>,
    /// Chord labels aligned with `lines` by index.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chords: Option<Vec<String>>,
}

impl LyricSection {
    /// Chord for the given line, if the model supplied one.
    pub fn chord_for(&self, line: usize) -> Option<&str> {
        self.chords
            .as_ref()
            .and_then(|chords| chords.get(line))
            .map(String::as_str)
            .filter(|chord| !chord.trim().is_empty())
    }
}

impl Song {
    /// Validates raw model output into a `Song`.
    ///
    /// Surrounding markdown code fences are tolerated; everything else must
    /// match the schema exactly.
    pub fn parse(raw: &str) -> Result<Self, StudioError> {
        let body = strip_code_fence(raw);
        if body.is_empty() {
            return Err(StudioError::Parse("no content returned from the model".into()));
        }
        let song: Song = serde_json::from_str(body).map_err(|e| {
            StudioError::Parse(format!("failed to parse song JSON from model response: {e}"))
        })?;
        song.validate()?;
        Ok(song)
    }

    fn validate(&self) -> Result<(), StudioError> {
        if self.title.trim().is_empty() {
            return Err(StudioError::Parse("song title is empty".into()));
        }
        if self.lyrics.is_empty() {
            return Err(StudioError::Parse("song has no lyric sections".into()));
        }
        for (idx, section) in self.lyrics.iter().enumerate() {
            if section.label.trim().is_empty() {
                return Err(StudioError::Parse(format!(
                    "lyric section {idx} has no type"
                )));
            }
            if section.lines.is_empty() {
                return Err(StudioError::Parse(format!(
                    "lyric section '{}' has no lines",
                    section.label
                )));
            }
        }
        Ok(())
    }
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (`json`) on the opening fence line.
    let rest = rest.split_once('\n').map_or("", |(_, body)| body);
    rest.trim_end().strip_suffix("```").unwrap_or(rest).trim()
}

/// Final output of a generation job.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Artifact {
    /// Remote location the artifact can be downloaded from.
    Url(String),
    /// Artifact bytes returned inline by the provider.
    Inline { bytes: bytes::Bytes, mime_type: String },
}

impl Artifact {
    /// Whether the artifact actually points at something.
    pub fn is_usable(&self) -> bool {
        match self {
            Self::Url(url) => !url.trim().is_empty(),
            Self::Inline { bytes, .. } => !bytes.is_empty(),
        }
    }
}

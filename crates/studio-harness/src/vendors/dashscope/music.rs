use tracing::debug;

use crate::content::Song;
use crate::errors::{ProviderError, StudioError};
use crate::vendors::{ensure_success, transport_error};

use super::adapter::DashScopeProvider;
use super::wire::{GenerationInput, GenerationParameters, GenerationRequest, GenerationResponse};

/// Wraps the user's idea in the song-structure instructions.
pub fn song_prompt(prompt: &str) -> String {
    format!(
        "Based on the following prompt, generate a song structure with a title, genre, mood, \
         lyrics, and chord progressions. Respond with ONLY a valid JSON object. Do not include \
         any markdown formatting like ```json. The JSON object must have these keys: \"title\", \
         \"genre\", \"mood\", and \"lyrics\". The \"lyrics\" key should be an array of objects, \
         where each object has a \"type\" (e.g., \"Verse 1\", \"Chorus\"), \"lines\" (an array \
         of strings), and \"chords\" (an array of strings).\n\nPrompt: \"{prompt}\""
    )
}

impl DashScopeProvider {
    /// Generates a structured song in a single non-streaming call.
    pub async fn generate_song(&self, prompt: &str) -> Result<Song, StudioError> {
        let provider_id = self.provider_id();
        let full_prompt = song_prompt(prompt);
        let body = GenerationRequest {
            model: &self.config.chat_model,
            input: GenerationInput::Prompt {
                prompt: &full_prompt,
            },
            parameters: GenerationParameters {
                result_format: "text",
                incremental_output: None,
            },
        };
        debug!(
            event = "music.request_started",
            domain = "music",
            model = %self.config.chat_model
        );

        let response = self
            .post(self.config.generation_url())
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(&provider_id, "song generation request", e))?;
        let response = ensure_success(&provider_id, "song generation request", response).await?;
        let envelope: GenerationResponse = response.json().await.map_err(|e| {
            ProviderError::protocol(provider_id, format!("invalid generation response: {e}"))
        })?;

        let text = envelope
            .output
            .and_then(|o| o.text)
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| StudioError::Parse("No content returned from the model.".into()))?;
        let song = Song::parse(&text)?;
        debug!(
            event = "music.song_parsed",
            domain = "music",
            sections = song.lyrics.len() as u64
        );
        Ok(song)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn song_prompt_embeds_user_idea() {
        let prompt = song_prompt("a rainy night in Tokyo");
        assert!(prompt.ends_with("Prompt: \"a rainy night in Tokyo\""));
        assert!(prompt.contains("\"lyrics\" key should be an array"));
    }
}

//! Word definitions from an external dictionary service.
//!
//! Purely optional enrichment for the end-of-game screen: failures surface as
//! a typed error and never touch room state.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::GameConfig;

#[derive(Debug, thiserror::Error)]
pub enum LookupError {
    #[error("Dictionary request failed: {0}")]
    Request(String),

    #[error("Dictionary request timed out")]
    Timeout,

    #[error("No definition found for '{0}'")]
    NotFound(String),

    #[error("Unexpected dictionary response: {0}")]
    InvalidResponse(String),
}

impl LookupError {
    pub fn code(&self) -> &'static str {
        match self {
            LookupError::Request(_) => "LOOKUP_FAILED",
            LookupError::Timeout => "LOOKUP_TIMEOUT",
            LookupError::NotFound(_) => "DEFINITION_NOT_FOUND",
            LookupError::InvalidResponse(_) => "LOOKUP_INVALID_RESPONSE",
        }
    }
}

impl From<reqwest::Error> for LookupError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            LookupError::Timeout
        } else {
            LookupError::Request(e.to_string())
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Definition {
    pub word: String,
    pub part_of_speech: Option<String>,
    pub definition: String,
}

/// Trait every definition source implements
#[async_trait]
pub trait DefinitionProvider: Send + Sync {
    async fn define(&self, word: &str) -> Result<Definition, LookupError>;
}

/// Client for dictionaryapi.dev-style endpoints (`GET {base}/{word}`)
pub struct DictionaryClient {
    base_url: String,
    client: reqwest::Client,
}

impl DictionaryClient {
    pub fn new(base_url: String, timeout: Duration) -> Result<Self, LookupError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LookupError::Request(e.to_string()))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn from_config(config: &GameConfig) -> Result<Self, LookupError> {
        Self::new(config.dictionary_base_url.clone(), config.dictionary_timeout)
    }
}

#[derive(Debug, Deserialize)]
struct EntryResponse {
    word: String,
    #[serde(default)]
    meanings: Vec<MeaningResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MeaningResponse {
    part_of_speech: Option<String>,
    #[serde(default)]
    definitions: Vec<DefinitionResponse>,
}

#[derive(Debug, Deserialize)]
struct DefinitionResponse {
    definition: String,
}

/// First definition of the first entry
fn first_definition(word: &str, entries: Vec<EntryResponse>) -> Result<Definition, LookupError> {
    entries
        .into_iter()
        .flat_map(|entry| {
            let headword = entry.word;
            entry.meanings.into_iter().flat_map(move |meaning| {
                let headword = headword.clone();
                meaning.definitions.into_iter().map(move |d| Definition {
                    word: headword.clone(),
                    part_of_speech: meaning.part_of_speech.clone(),
                    definition: d.definition,
                })
            })
        })
        .next()
        .ok_or_else(|| LookupError::NotFound(word.to_string()))
}

#[async_trait]
impl DefinitionProvider for DictionaryClient {
    async fn define(&self, word: &str) -> Result<Definition, LookupError> {
        let url = format!("{}/{}", self.base_url, word);
        tracing::debug!("Looking up definition: {}", url);

        let response = self.client.get(&url).send().await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(LookupError::NotFound(word.to_string()));
        }
        if !response.status().is_success() {
            return Err(LookupError::Request(format!(
                "status {}",
                response.status()
            )));
        }

        let entries: Vec<EntryResponse> = response
            .json()
            .await
            .map_err(|e| LookupError::InvalidResponse(e.to_string()))?;
        first_definition(word, entries)
    }
}

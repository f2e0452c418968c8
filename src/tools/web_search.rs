// ABOUTME: Web search client backed by the DuckDuckGo Instant Answer API
// ABOUTME: Extracts abstract, related topic, answer, or definition and never fails outward
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Web search for the `web_search` tool.
//!
//! The instant answer response is inspected in priority order: abstract,
//! related topics, direct answer, then definition/heading. Any failure
//! (network, HTTP status, malformed or empty payload) yields a deterministic
//! fallback [`SearchResult`] pointing at a search URL for the query.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

use crate::config::SearchConfig;
use crate::constants::tools;
use crate::errors::{AppError, AppResult};

/// Structured search result submitted as tool output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Where the content came from
    pub source: String,
    /// Summary text
    pub content: String,
    /// Link for further reading
    pub url: String,
}

impl SearchResult {
    /// Deterministic result used whenever the search cannot answer
    #[must_use]
    pub fn fallback(query: &str) -> Self {
        let trimmed = query.trim();
        Self {
            source: tools::SEARCH_SOURCE.to_owned(),
            content: format!(
                "I couldn't find specific information about \"{trimmed}\" right now. \
                 You can try the search link for more results."
            ),
            url: fallback_search_url(trimmed),
        }
    }
}

/// Human-facing search URL for a query
#[must_use]
pub fn fallback_search_url(query: &str) -> String {
    format!(
        "{}?q={}",
        tools::SEARCH_FALLBACK_URL,
        urlencoding::encode(query)
    )
}

/// Why a search produced no usable answer
///
/// Never leaves this module: [`WebSearchClient`] converts it to a fallback result.
#[derive(Debug, thiserror::Error)]
pub enum ToolDispatchError {
    /// The configured base URL could not be combined with the query
    #[error("invalid search URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// Network or timeout failure
    #[error("search request failed: {0}")]
    Request(#[from] reqwest::Error),
    /// Non-2xx response
    #[error("search API returned HTTP {0}")]
    Status(reqwest::StatusCode),
    /// Body was not the expected JSON
    #[error("malformed search response: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Something that can answer a search query
///
/// Implementations must always return a populated result.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Search for `query`
    async fn search(&self, query: &str) -> SearchResult;
}

// ============================================================================
// Instant answer response
// ============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct InstantAnswer {
    abstract_text: String,
    abstract_source: String,
    #[serde(rename = "AbstractURL")]
    abstract_url: String,
    related_topics: Vec<RelatedTopic>,
    answer: String,
    definition: String,
    definition_source: String,
    #[serde(rename = "DefinitionURL")]
    definition_url: String,
    heading: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct RelatedTopic {
    text: String,
    #[serde(rename = "FirstURL")]
    first_url: String,
    /// Grouped topics nest one level
    topics: Vec<RelatedTopic>,
}

impl InstantAnswer {
    /// Pick the most useful field, or `None` when the payload has nothing
    fn into_result(self, query: &str) -> Option<SearchResult> {
        let fallback_url = fallback_search_url(query);
        let or_fallback = |url: String| if url.is_empty() { fallback_url.clone() } else { url };

        if !self.abstract_text.is_empty() {
            return Some(SearchResult {
                source: if self.abstract_source.is_empty() {
                    tools::SEARCH_SOURCE.to_owned()
                } else {
                    self.abstract_source
                },
                content: self.abstract_text,
                url: or_fallback(self.abstract_url),
            });
        }

        let topics: Vec<&RelatedTopic> = self
            .related_topics
            .iter()
            .flat_map(|topic| {
                if topic.topics.is_empty() {
                    vec![topic]
                } else {
                    topic.topics.iter().collect()
                }
            })
            .filter(|topic| !topic.text.is_empty())
            .take(3)
            .collect();
        if let Some(first) = topics.first() {
            let content = topics
                .iter()
                .map(|topic| topic.text.as_str())
                .collect::<Vec<_>>()
                .join("\n");
            return Some(SearchResult {
                source: tools::SEARCH_SOURCE.to_owned(),
                content,
                url: or_fallback(first.first_url.clone()),
            });
        }

        if !self.answer.is_empty() {
            return Some(SearchResult {
                source: tools::SEARCH_SOURCE.to_owned(),
                content: self.answer,
                url: fallback_url.clone(),
            });
        }

        if !self.definition.is_empty() || !self.heading.is_empty() {
            let content = if self.definition.is_empty() {
                self.heading
            } else {
                self.definition
            };
            return Some(SearchResult {
                source: if self.definition_source.is_empty() {
                    tools::SEARCH_SOURCE.to_owned()
                } else {
                    self.definition_source
                },
                content,
                url: or_fallback(self.definition_url),
            });
        }

        None
    }
}

// ============================================================================
// Client
// ============================================================================

/// Instant answer search client
#[derive(Clone)]
pub struct WebSearchClient {
    client: Client,
    base_url: String,
}

impl WebSearchClient {
    /// Create a client from configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &SearchConfig) -> AppResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::internal(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: config.base_url.clone(),
        })
    }

    /// Query the API, surfacing every failure as an error
    async fn try_search(&self, query: &str) -> Result<Option<SearchResult>, ToolDispatchError> {
        let url = Url::parse_with_params(
            &self.base_url,
            &[
                ("q", query),
                ("format", "json"),
                ("no_html", "1"),
                ("skip_disambig", "1"),
            ],
        )?;

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ToolDispatchError::Status(status));
        }

        // The API answers with a javascript content type, so decode by hand
        let body = response.text().await?;
        let answer: InstantAnswer = serde_json::from_str(&body)?;

        Ok(answer.into_result(query))
    }
}

#[async_trait]
impl SearchProvider for WebSearchClient {
    async fn search(&self, query: &str) -> SearchResult {
        if query.trim().is_empty() {
            return SearchResult::fallback(query);
        }
        match self.try_search(query).await {
            Ok(Some(result)) => {
                debug!(query = %query, source = %result.source, "Search answered");
                result
            }
            Ok(None) => {
                debug!(query = %query, "Search returned no content, using fallback");
                SearchResult::fallback(query)
            }
            Err(reason) => {
                warn!(query = %query, reason = %reason, "Search failed, using fallback");
                SearchResult::fallback(query)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> InstantAnswer {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_abstract_has_priority() {
        let answer = parse(
            r#"{"AbstractText":"Rust is a language","AbstractSource":"Wikipedia",
                "AbstractURL":"https://en.wikipedia.org/wiki/Rust","Answer":"42",
                "RelatedTopics":[{"Text":"topic","FirstURL":"https://x"}]}"#,
        );
        let result = answer.into_result("rust").unwrap();
        assert_eq!(result.source, "Wikipedia");
        assert_eq!(result.content, "Rust is a language");
        assert_eq!(result.url, "https://en.wikipedia.org/wiki/Rust");
    }

    #[test]
    fn test_related_topics_flatten_groups() {
        let answer = parse(
            r#"{"AbstractText":"","RelatedTopics":[
                {"Name":"Group","Topics":[{"Text":"nested one","FirstURL":"https://a"}]},
                {"Text":"flat two","FirstURL":"https://b"}]}"#,
        );
        let result = answer.into_result("q").unwrap();
        assert_eq!(result.content, "nested one\nflat two");
        assert_eq!(result.url, "https://a");
    }

    #[test]
    fn test_answer_then_definition() {
        let result = parse(r#"{"Answer":"4"}"#).into_result("2+2").unwrap();
        assert_eq!(result.content, "4");
        assert_eq!(result.url, "https://duckduckgo.com/?q=2%2B2");

        let result = parse(r#"{"Heading":"Ferris"}"#).into_result("ferris").unwrap();
        assert_eq!(result.content, "Ferris");
    }

    #[test]
    fn test_empty_payload_has_no_result() {
        assert!(parse("{}").into_result("nothing").is_none());
    }

    #[test]
    fn test_fallback_is_fully_populated() {
        let result = SearchResult::fallback("pto policy");
        assert_eq!(result.source, "DuckDuckGo");
        assert!(result.content.contains("pto policy"));
        assert_eq!(result.url, "https://duckduckgo.com/?q=pto%20policy");
    }
}

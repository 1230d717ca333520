//! Web search tool.
//!
//! The sole built-in tool: queries a SearxNG-compatible JSON endpoint and
//! formats up to `max_results` sources, each snippet truncated to
//! `snippet_limit` characters. Transient failures are retried with
//! exponential backoff and jittered delay; when search is turned off the
//! tool returns its disabled sentinel instead of erroring.

use std::time::Duration;

use serde::Deserialize;

use mnemo_core::tool::Tool;
use mnemo_types::config::SearchSettings;
use mnemo_types::error::ToolError;

/// Sentinel returned when search is disabled by configuration.
pub const SEARCH_DISABLED: &str = "Web search is disabled.";

/// Attempts per search, including the first.
const MAX_ATTEMPTS: u32 = 3;

/// Base delay for exponential backoff.
const BASE_DELAY_MS: u64 = 500;

/// SearxNG-backed web search tool.
pub struct WebSearchTool {
    client: reqwest::Client,
    base_url: String,
    enabled: bool,
    max_results: usize,
    snippet_limit: usize,
}

impl WebSearchTool {
    pub fn new(settings: &SearchSettings) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .expect("failed to create reqwest client");

        Self {
            client,
            base_url: settings.base_url.clone(),
            enabled: settings.enabled,
            max_results: settings.max_results,
            snippet_limit: settings.snippet_limit,
        }
    }

    async fn search_once(&self, query: &str) -> Result<Vec<WireSearchResult>, ToolError> {
        let url = format!("{}/search", self.base_url.trim_end_matches('/'));

        let response = self
            .client
            .get(&url)
            .query(&[("q", query), ("format", "json")])
            .send()
            .await
            .map_err(|e| ToolError::Failed {
                name: "web_search".to_string(),
                message: format!("request failed: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ToolError::Failed {
                name: "web_search".to_string(),
                message: format!("search endpoint returned {status}"),
            });
        }

        let wire: WireSearchResponse = response.json().await.map_err(|e| ToolError::Failed {
            name: "web_search".to_string(),
            message: format!("invalid search response: {e}"),
        })?;

        Ok(wire.results)
    }
}

impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web for current information. Use this for questions about \
         current events, prices, news, weather, or anything after your training data."
    }

    async fn invoke(&self, query: &str) -> Result<String, ToolError> {
        if !self.enabled {
            return Ok(SEARCH_DISABLED.to_string());
        }

        let mut last_error = None;
        for attempt in 1..=MAX_ATTEMPTS {
            match self.search_once(query).await {
                Ok(results) => {
                    if results.is_empty() {
                        return Ok(format!("No results found for: {query}"));
                    }
                    return Ok(format_results(
                        &results,
                        self.max_results,
                        self.snippet_limit,
                    ));
                }
                Err(e) => {
                    if attempt < MAX_ATTEMPTS {
                        let delay = backoff_delay(attempt);
                        tracing::warn!(
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            error = %e,
                            "Web search attempt failed; retrying"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or(ToolError::Failed {
            name: "web_search".to_string(),
            message: "search failed".to_string(),
        }))
    }
}

/// Exponential backoff with jitter: base * 2^(attempt-1) plus up to 250ms.
fn backoff_delay(attempt: u32) -> Duration {
    let backoff = BASE_DELAY_MS * 2u64.pow(attempt.saturating_sub(1));
    Duration::from_millis(backoff + fastrand::u64(0..250))
}

/// Render the top results as a numbered source list.
fn format_results(results: &[WireSearchResult], max_results: usize, snippet_limit: usize) -> String {
    results
        .iter()
        .take(max_results)
        .enumerate()
        .map(|(i, r)| {
            let title = if r.title.is_empty() { "No title" } else { &r.title };
            let snippet = truncate_chars(&r.content, snippet_limit);
            format!(
                "{}. **{}**\n   {}\n   Source: {}",
                i + 1,
                title,
                snippet,
                r.url
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Truncate on a character boundary.
fn truncate_chars(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    s.chars().take(max_chars).collect()
}

#[derive(Debug, Deserialize)]
struct WireSearchResponse {
    #[serde(default)]
    results: Vec<WireSearchResult>,
}

#[derive(Debug, Deserialize)]
struct WireSearchResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    content: String,
}

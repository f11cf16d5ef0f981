//! Search boundary used by the scout.
//!
//! [`SearchProvider`] is one backend query. [`gather`] runs the phrasing plan
//! against a provider under the configured caps and returns hits
//! de-duplicated by URL; it never fails, a query that errors is skipped.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::SearchConfig;
use crate::errors::SearchError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub body: String,
    pub url: String,
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Run one query, returning at most `limit` hits.
    async fn query(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, SearchError>;
}

/// Provider that never finds anything. The scout then falls back to the
/// model's background knowledge.
pub struct NoSearch;

#[async_trait]
impl SearchProvider for NoSearch {
    async fn query(&self, _query: &str, _limit: usize) -> Result<Vec<SearchHit>, SearchError> {
        Ok(Vec::new())
    }
}

/// SearxNG instance queried through its JSON API (`format=json` must be
/// enabled on the instance).
pub struct SearxSearch {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct SearxResponse {
    #[serde(default)]
    results: Vec<SearxResult>,
}

#[derive(Deserialize)]
struct SearxResult {
    #[serde(default)]
    url: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: String,
}

impl SearxSearch {
    pub fn new(http: reqwest::Client, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl SearchProvider for SearxSearch {
    async fn query(&self, query: &str, limit: usize) -> Result<Vec<SearchHit>, SearchError> {
        let fail = |message: String| SearchError::Query {
            query: query.to_string(),
            message,
        };
        let response = self
            .http
            .get(format!("{}/search", self.base_url))
            .query(&[("q", query), ("format", "json")])
            .send()
            .await
            .map_err(|e| fail(e.to_string()))?;
        if !response.status().is_success() {
            return Err(fail(format!("status {}", response.status())));
        }
        let parsed: SearxResponse = response.json().await.map_err(|e| fail(e.to_string()))?;
        Ok(parsed
            .results
            .into_iter()
            .take(limit)
            .map(|r| SearchHit {
                title: r.title,
                body: r.content,
                url: r.url,
            })
            .collect())
    }
}

/// Phrasing variants, most specific first.
pub fn query_plan(subject: &str, source: &str) -> Vec<String> {
    vec![
        format!("\"{subject}\" \"{source}\" personality"),
        format!("\"{subject}\" \"{source}\" character analysis"),
        format!("{subject} {source} traits behavior"),
        format!("{subject} {source} quotes"),
        format!("{subject} {source} wiki"),
        format!("{subject} {source} personality type"),
        format!("{subject} character"),
    ]
}

/// Run the query plan until `max_results` unique hits are collected.
pub async fn gather(
    provider: &dyn SearchProvider,
    subject: &str,
    source: &str,
    caps: &SearchConfig,
) -> Vec<SearchHit> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut hits: Vec<SearchHit> = Vec::new();

    for (i, query) in query_plan(subject, source).iter().enumerate() {
        if hits.len() >= caps.max_results {
            break;
        }
        if i > 0 && caps.query_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(caps.query_delay_ms)).await;
        }

        let results = match provider.query(query, caps.per_query).await {
            Ok(results) => results,
            Err(e) => {
                warn!(error = %e, "search query failed, skipping");
                continue;
            }
        };

        for hit in results.into_iter().take(caps.per_query) {
            let url = hit.url.trim();
            if url.is_empty() || !seen.insert(url.to_string()) {
                continue;
            }
            hits.push(hit);
        }
    }

    hits.truncate(caps.max_results);
    debug!(count = hits.len(), subject, "search complete");
    hits
}

/// Render hits for the scout prompt. With no hits, the text instead tells
/// the model to compile the dossier from background knowledge.
pub fn format_results(hits: &[SearchHit], subject: &str, source: &str) -> String {
    if hits.is_empty() {
        return format!(
            "No direct search results were found for \"{subject}\" from \"{source}\".\n\
             Compile the dossier from your existing knowledge of this character. \
             If the character is obscure or unknown to you, say so and provide what \
             limited information you can.\n\
             State explicitly in the summary that the dossier is based on general \
             background knowledge rather than search results."
        );
    }

    let mut out = String::new();
    for (i, hit) in hits.iter().enumerate() {
        let title = if hit.title.is_empty() { "No title" } else { &hit.title };
        let body = if hit.body.is_empty() { "No description" } else { &hit.body };
        out.push_str(&format!(
            "\n--- Result {} ---\nTitle: {}\nSource: {}\nContent: {}\n",
            i + 1,
            title,
            hit.url,
            body,
        ));
    }
    out
}

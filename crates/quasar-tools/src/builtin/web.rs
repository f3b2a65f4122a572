// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
//! Web tools: search, paginated URL reading and a small stateful browser.
//!
//! Search goes to Tavily when a key is configured, with a SearXNG JSON API
//! fallback.  Fetched HTML is converted to readable text before it reaches
//! the model.

use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::tool::{Tool, ToolCall, ToolOutput};

/// Window size for paginated URL reading.
const URL_WINDOW_CHARS: usize = 4000;
/// Cap on extracted links per page.
const MAX_LINKS: usize = 50;

fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .redirect(reqwest::redirect::Policy::limited(3))
        .user_agent("quasar-agent/0.4")
        .build()
        .unwrap_or_default()
}

fn html_to_text(html: &str) -> String {
    html2text::from_read(html.as_bytes(), 100)
}

/// Slice a `size`-char window starting at `start` (char offsets), returning
/// the slice and the total char count.
fn window_slice(text: &str, start: usize, size: usize) -> (String, usize) {
    let total = text.chars().count();
    let slice: String = text.chars().skip(start).take(size).collect();
    (slice, total)
}

pub struct WebSearchTool {
    pub tavily_api_key: Option<String>,
    pub searx_host: Option<String>,
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web for information, documentation or news. Returns the \
         top results with titles, URLs and snippets."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Search query"
                },
                "search_depth": {
                    "type": "string",
                    "description": "\"basic\" or \"advanced\" (default basic)"
                }
            },
            "required": ["query"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let Some(query) = call.args.get("query").and_then(|v| v.as_str()) else {
            return ToolOutput::err(&call.id, "missing required parameter 'query'");
        };
        let depth = call.args.get("search_depth").and_then(|v| v.as_str()).unwrap_or("basic");

        debug!(query, "web_search tool");
        let client = http_client();

        if let Some(key) = &self.tavily_api_key {
            match tavily_search(&client, key, query, depth).await {
                Ok(results) => return ToolOutput::json(&call.id, &results),
                Err(e) => {
                    return ToolOutput::err(&call.id, format!("Tavily search failed: {e}"))
                }
            }
        }

        if let Some(host) = &self.searx_host {
            return match searx_search(&client, host, query).await {
                Ok(results) => ToolOutput::json(&call.id, &results),
                Err(e) => ToolOutput::err(&call.id, format!("SearXNG search failed: {e}")),
            };
        }

        ToolOutput::err(
            &call.id,
            "No web search provider configured. Set TAVILY_API_KEY or SEARX_HOST.",
        )
    }
}

async fn tavily_search(
    client: &reqwest::Client,
    api_key: &str,
    query: &str,
    depth: &str,
) -> anyhow::Result<Value> {
    let resp = client
        .post("https://api.tavily.com/search")
        .json(&json!({
            "api_key": api_key,
            "query": query,
            "max_results": 5,
            "search_depth": depth,
        }))
        .send()
        .await?
        .error_for_status()?;
    let body: Value = resp.json().await?;
    let results: Vec<Value> = body["results"]
        .as_array()
        .map(|arr| {
            arr.iter()
                .map(|r| {
                    json!({
                        "title": r["title"],
                        "url": r["url"],
                        "content": r["content"],
                    })
                })
                .collect()
        })
        .unwrap_or_default();
    Ok(json!({ "query": query, "results": results }))
}

async fn searx_search(client: &reqwest::Client, host: &str, query: &str) -> anyhow::Result<Value> {
    let url = format!("{}/search", host.trim_end_matches('/'));
    let resp = client
        .get(url)
        .query(&[("q", query), ("format", "json")])
        .send()
        .await?
        .error_for_status()?;
    let body: Value = resp.json().await?;
    let results: Vec<Value> = body["results"]
        .as_array()
        .map(|arr| {
            arr.iter()
                .take(5)
                .map(|r| {
                    json!({
                        "title": r["title"],
                        "url": r["url"],
                        "content": r["content"],
                    })
                })
                .collect()
        })
        .unwrap_or_default();
    Ok(json!({ "query": query, "results": results }))
}

pub struct ReadUrlTool;

#[async_trait]
impl Tool for ReadUrlTool {
    fn name(&self) -> &str {
        "read_url"
    }

    fn description(&self) -> &str {
        "Read the content of a URL as clean text. Large pages are windowed: \
         pass start_char from the pagination note to read the next chunk."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "url": {
                    "type": "string",
                    "description": "The http(s) URL to read"
                },
                "start_char": {
                    "type": "integer",
                    "description": "Starting character offset for pagination (default 0)"
                }
            },
            "required": ["url"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let Some(url) = call.args.get("url").and_then(|v| v.as_str()) else {
            return ToolOutput::err(&call.id, "missing required parameter 'url'");
        };
        let start_char =
            call.args.get("start_char").and_then(|v| v.as_u64()).unwrap_or(0) as usize;

        debug!(url, start_char, "read_url tool");

        let text = match fetch_as_text(url).await {
            Ok(t) => t,
            Err(e) => return ToolOutput::err(&call.id, format!("Failed to read URL: {e}")),
        };

        let (slice, total) = window_slice(&text, start_char, URL_WINDOW_CHARS);
        if slice.is_empty() {
            return ToolOutput::err(&call.id, "No content could be extracted from the URL.");
        }
        let end_char = (start_char + URL_WINDOW_CHARS).min(total);
        if end_char < total {
            return ToolOutput::ok(
                &call.id,
                format!(
                    "{slice}\n\n--- PAGINATION INFO ---\n\
                     Showing characters {start_char}-{end_char} of {total}.\n\
                     To read the next chunk, call read_url with start_char={end_char}."
                ),
            );
        }
        ToolOutput::ok(&call.id, slice)
    }
}

async fn fetch_as_text(url: &str) -> anyhow::Result<String> {
    let client = http_client();
    let resp = client.get(url).send().await?.error_for_status()?;
    let content_type = resp
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_lowercase();
    let body = resp.text().await?;
    Ok(if content_type.contains("html") { html_to_text(&body) } else { body })
}

#[derive(Debug, Clone)]
struct PageState {
    url: String,
    text: String,
    links: Vec<String>,
}

/// A stateful, fetch-based browser: `navigate` loads a page, `text` pages
/// through its extracted text, `links` lists its outgoing links.
pub struct BrowseInteractiveTool {
    state: Mutex<Option<PageState>>,
}

impl BrowseInteractiveTool {
    pub fn new() -> Self {
        Self { state: Mutex::new(None) }
    }
}

impl Default for BrowseInteractiveTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for BrowseInteractiveTool {
    fn name(&self) -> &str {
        "browse_interactive"
    }

    fn description(&self) -> &str {
        "Stateful browser. Actions: 'navigate' (load a URL), 'text' (page \
         through the current page's text with start_char), 'links' (list \
         links on the current page)."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "action": {
                    "type": "string",
                    "description": "navigate | text | links"
                },
                "url": {
                    "type": "string",
                    "description": "URL for the navigate action"
                },
                "start_char": {
                    "type": "integer",
                    "description": "Text window offset for the text action (default 0)"
                }
            },
            "required": ["action"],
            "additionalProperties": false
        })
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let Some(action) = call.args.get("action").and_then(|v| v.as_str()) else {
            return ToolOutput::err(&call.id, "missing required parameter 'action'");
        };

        match action {
            "navigate" => {
                let Some(url) = call.args.get("url").and_then(|v| v.as_str()) else {
                    return ToolOutput::err(&call.id, "navigate requires 'url'");
                };
                let html = match fetch_raw(url).await {
                    Ok(h) => h,
                    Err(e) => {
                        return ToolOutput::err(&call.id, format!("Navigation failed: {e}"))
                    }
                };
                let text = html_to_text(&html);
                let links = extract_links(&html);
                let (head, total) = window_slice(&text, 0, URL_WINDOW_CHARS);
                *self.state.lock().expect("browser state poisoned") = Some(PageState {
                    url: url.to_string(),
                    text,
                    links,
                });
                ToolOutput::ok(
                    &call.id,
                    format!("Loaded {url} ({total} chars of text).\n\n{head}"),
                )
            }
            "text" => {
                let start =
                    call.args.get("start_char").and_then(|v| v.as_u64()).unwrap_or(0) as usize;
                let state = self.state.lock().expect("browser state poisoned");
                let Some(page) = state.as_ref() else {
                    return ToolOutput::err(&call.id, "No page loaded; navigate first.");
                };
                let (slice, total) = window_slice(&page.text, start, URL_WINDOW_CHARS);
                if slice.is_empty() {
                    return ToolOutput::err(&call.id, format!("Offset {start} past end ({total} chars)"));
                }
                ToolOutput::ok(&call.id, slice)
            }
            "links" => {
                let state = self.state.lock().expect("browser state poisoned");
                let Some(page) = state.as_ref() else {
                    return ToolOutput::err(&call.id, "No page loaded; navigate first.");
                };
                ToolOutput::json(
                    &call.id,
                    &json!({ "url": page.url, "links": page.links }),
                )
            }
            other => ToolOutput::err(&call.id, format!("Unsupported action: {other}")),
        }
    }
}

async fn fetch_raw(url: &str) -> anyhow::Result<String> {
    let client = http_client();
    Ok(client.get(url).send().await?.error_for_status()?.text().await?)
}

fn extract_links(html: &str) -> Vec<String> {
    let re = regex::Regex::new(r#"href\s*=\s*["']([^"']+)["']"#).expect("static regex");
    re.captures_iter(html)
        .map(|c| c[1].to_string())
        .filter(|href| href.starts_with("http") || href.starts_with('/'))
        .take(MAX_LINKS)
        .collect()
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

//! arXiv search provider
//!
//! Uses the arXiv Atom API to search scholarly articles in physics,
//! mathematics, computer science, and other fields. Optionally downloads
//! each paper's PDF and extracts its text as raw content.

use super::kind::ProviderKind;
use super::traits::*;
use crate::network::HttpClient;
use crate::results::{rank_score, QueryResponse, SearchResult};
use crate::search::Pacing;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::DateTime;
use once_cell::sync::Lazy;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::QName;
use quick_xml::reader::Reader;
use regex::Regex;
use serde::Deserialize;
use std::time::Duration;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, warn};

const DEFAULT_API_URL: &str = "https://export.arxiv.org/api/query";
const MAX_QUERY_LENGTH: usize = 300;
/// Share of the query timeout that PDF downloads may use, leaving the
/// metadata results time to come back
const PDF_BUDGET_SHARE: f64 = 0.75;

/// New-style (`2401.01234v2`) and old-style (`0704001`) arXiv identifiers
static ARXIV_ID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{2}(0[1-9]|1[0-2])\.\d{4,5}(v\d+)?|\d{7}.*)$").unwrap()
});

/// Options accepted from the caller's configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ArxivParams {
    /// Documents returned per query
    pub load_max_docs: u32,
    /// Download each PDF and extract its text
    pub get_full_documents: bool,
    /// Include categories, comment, journal reference, DOI and PDF link
    pub load_all_available_meta: bool,
}

impl Default for ArxivParams {
    fn default() -> Self {
        Self {
            load_max_docs: 5,
            get_full_documents: true,
            load_all_available_meta: true,
        }
    }
}

/// One `<entry>` of the Atom feed
#[derive(Debug, Default, Clone, PartialEq)]
struct Paper {
    id: String,
    title: String,
    summary: Option<String>,
    authors: Vec<String>,
    updated: Option<String>,
    primary_category: Option<String>,
    categories: Vec<String>,
    comment: Option<String>,
    journal_ref: Option<String>,
    doi: Option<String>,
    pdf_url: Option<String>,
}

/// Elements whose text becomes a `Paper` field
const TEXT_FIELDS: &[&str] = &[
    "id",
    "title",
    "summary",
    "updated",
    "name",
    "arxiv:comment",
    "arxiv:journal_ref",
    "arxiv:doi",
];

impl Paper {
    fn set_text(&mut self, field: &str, raw: &str) {
        let value = normalize_whitespace(raw);
        if value.is_empty() {
            return;
        }
        match field {
            "id" => self.id = value,
            "title" => self.title = value,
            "summary" => self.summary = Some(value),
            "updated" => self.updated = Some(published_date(&value)),
            "name" => self.authors.push(value),
            "arxiv:comment" => self.comment = Some(value),
            "arxiv:journal_ref" => self.journal_ref = Some(value),
            "arxiv:doi" => self.doi = Some(value),
            _ => {}
        }
    }

    /// Pick up `term` and `href` attributes of category and link elements
    fn read_attributes(&mut self, tag: &str, element: &BytesStart) -> Result<()> {
        match tag {
            "arxiv:primary_category" if self.primary_category.is_none() => {
                self.primary_category = attribute(element, "term")?;
            }
            "category" => self.categories.extend(attribute(element, "term")?),
            "link" if self.pdf_url.is_none() => {
                self.pdf_url = attribute(element, "href")?.filter(|href| href.contains("pdf"));
            }
            _ => {}
        }
        Ok(())
    }

    /// Metadata lines, only for fields that are present
    fn content(&self, all_meta: bool) -> String {
        let mut lines = Vec::new();
        if let Some(summary) = &self.summary {
            lines.push(format!("Summary: {}", summary));
        }
        if !self.authors.is_empty() {
            lines.push(format!("Authors: {}", self.authors.join(", ")));
        }
        if let Some(published) = &self.updated {
            lines.push(format!("Published: {}", published));
        }

        if all_meta {
            if let Some(primary) = &self.primary_category {
                lines.push(format!("Primary Category: {}", primary));
            }
            if !self.categories.is_empty() {
                lines.push(format!("Categories: {}", self.categories.join(", ")));
            }
            if let Some(comment) = &self.comment {
                lines.push(format!("Comment: {}", comment));
            }
            if let Some(journal_ref) = &self.journal_ref {
                lines.push(format!("Journal Reference: {}", journal_ref));
            }
            if let Some(doi) = &self.doi {
                lines.push(format!("DOI: {}", doi));
            }
            if let Some(pdf) = &self.pdf_url {
                lines.push(format!("PDF: {}", pdf));
            }
        }

        lines.join("\n")
    }
}

fn tag_name(name: QName) -> String {
    String::from_utf8_lossy(name.as_ref()).into_owned()
}

fn attribute(element: &BytesStart, key: &str) -> Result<Option<String>> {
    match element.try_get_attribute(key)? {
        Some(attr) => Ok(Some(attr.unescape_value()?.into_owned())),
        None => Ok(None),
    }
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Every `<entry>` of an Atom feed, in document order
fn parse_entries(xml: &str) -> Result<Vec<Paper>> {
    let mut reader = Reader::from_str(xml);
    let mut buffer = Vec::new();
    let mut papers = Vec::new();
    let mut current: Option<Paper> = None;
    let mut field: Option<String> = None;
    let mut text = String::new();

    loop {
        match reader.read_event_into(&mut buffer)? {
            Event::Start(e) => {
                let name = tag_name(e.name());
                if name == "entry" {
                    current = Some(Paper::default());
                } else if field.is_none() {
                    if let Some(paper) = current.as_mut() {
                        if TEXT_FIELDS.contains(&name.as_str()) {
                            text.clear();
                            field = Some(name);
                        } else {
                            paper.read_attributes(&name, &e)?;
                        }
                    }
                }
            }
            Event::Empty(e) => {
                if let Some(paper) = current.as_mut() {
                    paper.read_attributes(&tag_name(e.name()), &e)?;
                }
            }
            Event::Text(e) if field.is_some() => text.push_str(&e.unescape()?),
            Event::CData(e) if field.is_some() => {
                text.push_str(&String::from_utf8_lossy(&e.into_inner()))
            }
            Event::End(e) => {
                let name = tag_name(e.name());
                if field.as_deref() == Some(name.as_str()) {
                    field = None;
                    if let Some(paper) = current.as_mut() {
                        paper.set_text(&name, &text);
                    }
                } else if name == "entry" {
                    papers.extend(current.take());
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buffer.clear();
    }

    Ok(papers)
}

/// `YYYY-MM-DD` of an Atom timestamp
fn published_date(timestamp: &str) -> String {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|dt| dt.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|_| timestamp.chars().take(10).collect())
}

/// Whether every whitespace-separated token is an arXiv identifier
fn is_arxiv_identifier(query: &str) -> bool {
    let mut tokens = query.split_whitespace().peekable();
    tokens.peek().is_some() && tokens.all(|token| ARXIV_ID.is_match(token))
}

/// Extract the text of an in-memory PDF
fn pdf_text(bytes: &[u8]) -> Result<String> {
    let document = lopdf::Document::load_mem(bytes)?;
    let pages: Vec<u32> = document.get_pages().keys().copied().collect();
    if pages.is_empty() {
        return Err(anyhow!("PDF has no pages"));
    }
    Ok(document.extract_text(&pages)?)
}

/// arXiv search provider
pub struct Arxiv {
    api_url: String,
    params: ArxivParams,
    pacing: Pacing,
    timeout: f64,
}

impl Arxiv {
    pub fn new(params: ArxivParams) -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            params,
            pacing: ProviderKind::Arxiv.default_pacing(),
            timeout: 60.0,
        }
    }

    /// Point the provider at another endpoint
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into();
        self
    }

    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    pub fn with_timeout(mut self, timeout: f64) -> Self {
        self.timeout = timeout;
        self
    }

    /// Build the HTTP request for one query
    pub fn request(&self, query: &str) -> ProviderRequest {
        let query: String = query.chars().take(MAX_QUERY_LENGTH).collect();
        let request = ProviderRequest::get(&self.api_url)
            .timeout_secs(self.timeout)
            .param("start", "0")
            .param("max_results", self.params.load_max_docs.to_string());

        if is_arxiv_identifier(&query) {
            let ids: Vec<&str> = query.split_whitespace().collect();
            request.param("id_list", ids.join(","))
        } else {
            request.param("search_query", query)
        }
    }

    /// Parse the Atom feed into papers
    fn parse_feed(&self, xml: &str) -> Result<Vec<Paper>> {
        let papers = parse_entries(xml)
            .map_err(|e| anyhow!("Malformed arXiv feed: {}", e))?;

        // The API reports bad queries as a single error entry
        if let Some(error) = papers.iter().find(|p| p.id.contains("/api/errors")) {
            return Err(anyhow!(
                "arXiv API error: {}",
                error.summary.as_deref().unwrap_or("unknown error")
            ));
        }

        Ok(papers.into_iter().filter(|p| !p.id.is_empty()).collect())
    }

    /// Download and extract a paper's PDF before `deadline`; failures
    /// degrade to `None`
    async fn full_text(
        &self,
        client: &HttpClient,
        paper: &Paper,
        deadline: Instant,
    ) -> Option<String> {
        let Some(pdf_url) = &paper.pdf_url else {
            warn!("No PDF link for {}", paper.id);
            return None;
        };

        let remaining = deadline.saturating_duration_since(Instant::now());
        match timeout_at(deadline, self.download_text(client, pdf_url, remaining)).await {
            Ok(text) => text,
            Err(_) => {
                warn!("Out of time for PDF {}", pdf_url);
                None
            }
        }
    }

    async fn download_text(
        &self,
        client: &HttpClient,
        pdf_url: &str,
        timeout: Duration,
    ) -> Option<String> {
        let bytes = match client.get_bytes(pdf_url, timeout).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Failed to download PDF {}: {:#}", pdf_url, e);
                return None;
            }
        };

        match tokio::task::spawn_blocking(move || pdf_text(&bytes)).await {
            Ok(Ok(text)) => Some(normalize_whitespace(&text)).filter(|t| !t.is_empty()),
            Ok(Err(e)) => {
                warn!("Failed to extract text from {}: {:#}", pdf_url, e);
                None
            }
            Err(e) => {
                warn!("PDF extraction task failed for {}: {}", pdf_url, e);
                None
            }
        }
    }
}

impl Default for Arxiv {
    fn default() -> Self {
        Self::new(ArxivParams::default())
    }
}

#[async_trait]
impl SearchProvider for Arxiv {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Arxiv
    }

    fn pacing(&self) -> Pacing {
        self.pacing
    }

    fn timeout(&self) -> f64 {
        self.timeout
    }

    async fn search(&self, client: &HttpClient, query: &str) -> Result<QueryResponse> {
        let pdf_deadline = Instant::now()
            + Duration::try_from_secs_f64(self.timeout * PDF_BUDGET_SHARE).unwrap_or_default();

        let response = client.execute(self.request(query)).await?;
        response.ensure_success()?;

        let papers = self.parse_feed(&response.text)?;
        debug!("arXiv returned {} papers for '{}'", papers.len(), query);

        let count = papers.len();
        let mut results = Vec::with_capacity(count);
        for (i, paper) in papers.iter().enumerate() {
            let raw_content = if self.params.get_full_documents {
                self.full_text(client, paper, pdf_deadline).await
            } else {
                None
            };

            results.push(
                SearchResult::new(paper.id.clone(), paper.title.clone())
                    .with_content(paper.content(self.params.load_all_available_meta))
                    .with_score(rank_score(i, count))
                    .with_raw_content(raw_content),
            );
        }

        Ok(QueryResponse::with_results(query, results))
    }
}

//! PubMed search provider
//!
//! Two calls per query against NCBI E-utilities: `esearch` for the matching
//! PMIDs, then a single `efetch` for every article's XML record.

use super::kind::ProviderKind;
use super::traits::*;
use crate::network::HttpClient;
use crate::results::{rank_score, QueryResponse, SearchResult};
use crate::search::Pacing;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::NaiveDate;
use quick_xml::events::Event;
use quick_xml::name::QName;
use quick_xml::reader::Reader;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

const DEFAULT_API_URL: &str = "https://eutils.ncbi.nlm.nih.gov/entrez/eutils";
const ARTICLE_URL: &str = "https://pubmed.ncbi.nlm.nih.gov";
const TOOL: &str = "deepsearch-rs";
const NO_ABSTRACT: &str = "No abstract available";
const MAX_RETRIES: u32 = 5;

/// Options accepted from the caller's configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PubmedParams {
    /// Articles returned per query
    pub top_k_results: u32,
    /// Contact address NCBI asks API users to send
    pub email: Option<String>,
    /// NCBI API key for the higher rate limit
    pub api_key: Option<String>,
    /// Cap on the characters kept from each abstract
    pub doc_content_chars_max: usize,
}

impl Default for PubmedParams {
    fn default() -> Self {
        Self {
            top_k_results: 5,
            email: None,
            api_key: None,
            doc_content_chars_max: 4000,
        }
    }
}

/// One `<PubmedArticle>` record
#[derive(Debug, Default, Clone, PartialEq)]
struct Article {
    uid: String,
    title: String,
    published: Option<String>,
    copyright: Option<String>,
    summary: String,
}

impl Article {
    fn url(&self) -> String {
        if self.uid.is_empty() {
            String::new()
        } else {
            format!("{}/{}/", ARTICLE_URL, self.uid)
        }
    }

    fn content(&self) -> String {
        let mut lines = Vec::new();
        if let Some(published) = &self.published {
            lines.push(format!("Published: {}", published));
        }
        if let Some(copyright) = &self.copyright {
            lines.push(format!("Copyright Information: {}", copyright));
        }
        if !self.summary.is_empty() {
            lines.push(format!("Summary: {}", self.summary));
        }
        lines.join("\n")
    }
}

/// `<Year>`, `<Month>` and `<Day>` of an `ArticleDate` or `PubDate`
#[derive(Debug, Default, Clone, PartialEq)]
struct DateParts {
    year: Option<String>,
    month: Option<String>,
    day: Option<String>,
}

impl DateParts {
    fn set(&mut self, part: &str, value: String) {
        let slot = match part {
            "Year" => &mut self.year,
            "Month" => &mut self.month,
            "Day" => &mut self.day,
            _ => return,
        };
        slot.get_or_insert(value);
    }

    /// Months may be numeric or abbreviated names; partial dates keep
    /// whatever parts are present.
    fn format(&self) -> Option<String> {
        let year = self.year.as_ref()?;

        if let (Some(month), Some(day)) = (&self.month, &self.day) {
            let joined = format!("{}-{}-{}", year, month, day);
            let parsed = NaiveDate::parse_from_str(&joined, "%Y-%m-%d")
                .or_else(|_| NaiveDate::parse_from_str(&joined, "%Y-%b-%d"));
            if let Ok(date) = parsed {
                return Some(date.format("%Y-%m-%d").to_string());
            }
        }

        let parts: Vec<&str> = [Some(year), self.month.as_ref(), self.day.as_ref()]
            .into_iter()
            .flatten()
            .map(String::as_str)
            .collect();
        Some(parts.join("-"))
    }
}

/// Fields of one `<PubmedArticle>` collected while streaming the record
#[derive(Debug, Default)]
struct ArticleParts {
    article: Article,
    abstract_parts: Vec<String>,
    article_date: DateParts,
    pub_date: DateParts,
}

impl ArticleParts {
    fn set_text(&mut self, element: &str, parent: Option<&str>, raw: &str) {
        let value = normalize_whitespace(raw);
        if value.is_empty() {
            return;
        }
        let article = &mut self.article;
        match (element, parent) {
            // Comment references carry PMIDs of other articles
            ("PMID", _) if article.uid.is_empty() => article.uid = value,
            ("ArticleTitle", _) => article.title = value,
            ("BookTitle", _) if article.title.is_empty() => article.title = value,
            ("AbstractText", _) => self.abstract_parts.push(value),
            ("CopyrightInformation", _) => {
                article.copyright.get_or_insert(value);
            }
            (_, Some("ArticleDate")) => self.article_date.set(element, value),
            (_, Some("PubDate")) => self.pub_date.set(element, value),
            _ => {}
        }
    }

    fn finish(self) -> Article {
        let summary = if self.abstract_parts.is_empty() {
            NO_ABSTRACT.to_string()
        } else {
            self.abstract_parts.join("\n")
        };
        let published = self.article_date.format().or_else(|| self.pub_date.format());

        Article {
            published,
            summary,
            ..self.article
        }
    }
}

/// Whether the text of `element` under `parent` is part of an article
fn is_text_field(element: &str, parent: Option<&str>) -> bool {
    match element {
        "PMID" | "ArticleTitle" | "BookTitle" | "AbstractText" | "CopyrightInformation" => true,
        "Year" | "Month" | "Day" => matches!(parent, Some("ArticleDate" | "PubDate")),
        _ => false,
    }
}

fn tag_name(name: QName) -> String {
    String::from_utf8_lossy(name.as_ref()).into_owned()
}

fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Every `<PubmedArticle>` of an efetch response, in document order
fn parse_articles(xml: &str) -> Result<Vec<Article>> {
    let mut reader = Reader::from_str(xml);
    let mut buffer = Vec::new();
    let mut articles = Vec::new();
    let mut path: Vec<String> = Vec::new();
    let mut current: Option<ArticleParts> = None;
    // Element whose text is being collected, with its depth
    let mut field: Option<usize> = None;
    let mut text = String::new();

    loop {
        match reader.read_event_into(&mut buffer)? {
            Event::Start(e) => {
                let name = tag_name(e.name());
                if name == "PubmedArticle" {
                    current = Some(ArticleParts::default());
                } else if field.is_none()
                    && current.is_some()
                    && is_text_field(&name, path.last().map(String::as_str))
                {
                    text.clear();
                    field = Some(path.len());
                }
                path.push(name);
            }
            Event::Text(e) if field.is_some() => text.push_str(&e.unescape()?),
            Event::CData(e) if field.is_some() => {
                text.push_str(&String::from_utf8_lossy(&e.into_inner()))
            }
            Event::End(_) => {
                let name = path.pop().unwrap_or_default();
                if field == Some(path.len()) {
                    field = None;
                    if let Some(parts) = current.as_mut() {
                        parts.set_text(&name, path.last().map(String::as_str), &text);
                    }
                } else if name == "PubmedArticle" {
                    articles.extend(current.take().map(ArticleParts::finish));
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buffer.clear();
    }

    Ok(articles)
}

#[derive(Debug, Deserialize)]
struct EsearchResponse {
    esearchresult: EsearchResult,
}

#[derive(Debug, Deserialize)]
struct EsearchResult {
    #[serde(default)]
    idlist: Vec<String>,
    #[serde(default, rename = "ERROR")]
    error: Option<String>,
}

/// PubMed search provider
pub struct Pubmed {
    api_url: String,
    params: PubmedParams,
    pacing: Pacing,
    retry_backoff: Duration,
    timeout: f64,
}

impl Pubmed {
    pub fn new(params: PubmedParams) -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            params,
            pacing: ProviderKind::Pubmed.default_pacing(),
            retry_backoff: Duration::from_millis(200),
            timeout: 60.0,
        }
    }

    /// Point the provider at another E-utilities base URL
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    /// First sleep after a 429; doubles on every retry
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    pub fn with_timeout(mut self, timeout: f64) -> Self {
        self.timeout = timeout;
        self
    }

    fn with_credentials(&self, request: ProviderRequest) -> ProviderRequest {
        request
            .param("tool", TOOL)
            .param_opt("email", self.params.email.as_deref())
            .param_opt("api_key", self.params.api_key.as_deref())
    }

    /// Build the `esearch` request for one query
    pub fn search_request(&self, query: &str) -> ProviderRequest {
        self.with_credentials(
            ProviderRequest::get(format!("{}/esearch.fcgi", self.api_url))
                .timeout_secs(self.timeout)
                .param("db", "pubmed")
                .param("term", query)
                .param("retmode", "json")
                .param("retmax", self.params.top_k_results.to_string()),
        )
    }

    /// Build the `efetch` request for a set of PMIDs
    pub fn fetch_request(&self, uids: &[String]) -> ProviderRequest {
        self.with_credentials(
            ProviderRequest::get(format!("{}/efetch.fcgi", self.api_url))
                .timeout_secs(self.timeout)
                .param("db", "pubmed")
                .param("retmode", "xml")
                .param("id", uids.join(",")),
        )
    }

    /// Execute a request, retrying rate-limited responses with a doubling sleep
    async fn execute_with_retry(
        &self,
        client: &HttpClient,
        request: ProviderRequest,
    ) -> Result<ProviderResponse> {
        let mut backoff = self.retry_backoff;
        let mut retries = 0;

        loop {
            let response = client.execute(request.clone()).await?;
            if !response.is_rate_limited() || retries >= MAX_RETRIES {
                response.ensure_success()?;
                return Ok(response);
            }

            retries += 1;
            warn!(
                "PubMed rate limit hit, retry {}/{} in {:.1}s",
                retries,
                MAX_RETRIES,
                backoff.as_secs_f64()
            );
            tokio::time::sleep(backoff).await;
            backoff *= 2;
        }
    }

    fn articles(&self, xml: &str) -> Result<Vec<Article>> {
        parse_articles(xml).map_err(|e| anyhow!("Malformed PubMed response: {}", e))
    }

    fn truncate_abstract(&self, summary: &str) -> String {
        summary.chars().take(self.params.doc_content_chars_max).collect()
    }
}

impl Default for Pubmed {
    fn default() -> Self {
        Self::new(PubmedParams::default())
    }
}

#[async_trait]
impl SearchProvider for Pubmed {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Pubmed
    }

    fn pacing(&self) -> Pacing {
        self.pacing
    }

    fn timeout(&self) -> f64 {
        self.timeout
    }

    async fn search(&self, client: &HttpClient, query: &str) -> Result<QueryResponse> {
        let response = self
            .execute_with_retry(client, self.search_request(query))
            .await?;
        let esearch: EsearchResponse = response.json()?;
        if let Some(error) = esearch.esearchresult.error {
            return Err(anyhow!("PubMed search error: {}", error));
        }

        let uids = esearch.esearchresult.idlist;
        if uids.is_empty() {
            debug!("PubMed returned no articles for '{}'", query);
            return Ok(QueryResponse::new(query));
        }

        let response = self.execute_with_retry(client, self.fetch_request(&uids)).await?;
        let articles = self.articles(&response.text)?;
        debug!("PubMed returned {} articles for '{}'", articles.len(), query);

        let count = articles.len();
        let results = articles
            .iter()
            .enumerate()
            .map(|(i, article)| {
                SearchResult::new(article.url(), article.title.clone())
                    .with_content(article.content())
                    .with_score(rank_score(i, count))
                    .with_raw_content(Some(self.truncate_abstract(&article.summary)))
            })
            .collect();

        Ok(QueryResponse::with_results(query, results))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const EFETCH: &str = r#"<?xml version="1.0" ?>
<PubmedArticleSet>
<PubmedArticle>
  <MedlineCitation Status="MEDLINE" Owner="NLM">
    <PMID Version="1">31452104</PMID>
    <Article PubModel="Print">
      <Journal><JournalIssue><PubDate><Year>2019</Year><Month>Sep</Month></PubDate></JournalIssue></Journal>
      <ArticleTitle>CRISPR-Cas9 in <i>vivo</i> gene editing.</ArticleTitle>
      <Abstract>
        <AbstractText Label="BACKGROUND">Genome editing &amp; repair.</AbstractText>
        <AbstractText Label="RESULTS">Efficient correction.</AbstractText>
        <CopyrightInformation>Copyright 2019 Elsevier.</CopyrightInformation>
      </Abstract>
      <ArticleDate DateType="Electronic"><Year>2019</Year><Month>08</Month><Day>23</Day></ArticleDate>
    </Article>
  </MedlineCitation>
</PubmedArticle>
<PubmedArticle>
  <MedlineCitation>
    <PMID Version="1">30000001</PMID>
    <Article>
      <Journal><JournalIssue><PubDate><Year>2018</Year><Month>Jul</Month><Day>4</Day></PubDate></JournalIssue></Journal>
      <ArticleTitle>Short communication</ArticleTitle>
    </Article>
  </MedlineCitation>
</PubmedArticle>
</PubmedArticleSet>"#;

    async fn mount_esearch(server: &MockServer, ids: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path("/esearch.fcgi"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"esearchresult": {"count": "2", "idlist": ids}})),
            )
            .mount(server)
            .await;
    }

    #[test]
    fn test_parse_article() {
        let articles = Pubmed::default().articles(EFETCH).unwrap();
        assert_eq!(articles.len(), 2);

        let first = &articles[0];
        assert_eq!(first.uid, "31452104");
        assert_eq!(first.title, "CRISPR-Cas9 in vivo gene editing.");
        assert_eq!(first.published.as_deref(), Some("2019-08-23"));
        assert_eq!(first.copyright.as_deref(), Some("Copyright 2019 Elsevier."));
        assert_eq!(first.summary, "Genome editing & repair.\nEfficient correction.");
        assert_eq!(first.url(), "https://pubmed.ncbi.nlm.nih.gov/31452104/");
        assert_eq!(
            first.content(),
            "Published: 2019-08-23\n\
             Copyright Information: Copyright 2019 Elsevier.\n\
             Summary: Genome editing & repair.\nEfficient correction."
        );

        let second = &articles[1];
        assert_eq!(second.published.as_deref(), Some("2018-07-04"));
        assert_eq!(second.summary, NO_ABSTRACT);
        assert_eq!(second.copyright, None);
    }

    #[test]
    fn test_partial_publication_date() {
        let mut date = DateParts::default();
        date.set("Year", "2019".to_string());
        date.set("Month", "Sep".to_string());
        assert_eq!(date.format().as_deref(), Some("2019-Sep"));

        // MedlineDate-only records have no Year
        assert_eq!(DateParts::default().format(), None);
    }

    #[test]
    fn test_missing_uid_gives_empty_url() {
        let xml = "<PubmedArticleSet><PubmedArticle><ArticleTitle>No id</ArticleTitle>\
                   </PubmedArticle></PubmedArticleSet>";
        let articles = parse_articles(xml).unwrap();
        assert_eq!(articles[0].title, "No id");
        assert_eq!(articles[0].url(), "");
    }

    #[test]
    fn test_only_first_pmid_is_the_article() {
        let xml = r#"<PubmedArticle><MedlineCitation><PMID>111</PMID>
            <CommentsCorrectionsList><CommentsCorrections><PMID>222</PMID></CommentsCorrections>
            </CommentsCorrectionsList></MedlineCitation>
            <PubmedData><History><PubMedPubDate><Year>2001</Year></PubMedPubDate></History></PubmedData>
            </PubmedArticle>"#;
        let articles = parse_articles(xml).unwrap();
        assert_eq!(articles[0].uid, "111");
        assert_eq!(articles[0].published, None);
    }

    #[test]
    fn test_malformed_efetch_is_error() {
        let err = Pubmed::default()
            .articles("<PubmedArticleSet><PubmedArticle></PubmedArticleSet>")
            .unwrap_err();
        assert!(err.to_string().starts_with("Malformed PubMed response"));
    }

    #[test]
    fn test_requests_carry_credentials() {
        let pubmed = Pubmed::new(PubmedParams {
            email: Some("me@example.org".into()),
            api_key: Some("ncbi".into()),
            top_k_results: 3,
            ..Default::default()
        });

        let search = pubmed.search_request("crispr");
        assert!(search.url.ends_with("/esearch.fcgi"));
        assert_eq!(search.params.get("term"), Some(&"crispr".to_string()));
        assert_eq!(search.params.get("retmax"), Some(&"3".to_string()));
        assert_eq!(search.params.get("email"), Some(&"me@example.org".to_string()));
        assert_eq!(search.params.get("api_key"), Some(&"ncbi".to_string()));

        let fetch = pubmed.fetch_request(&["1".to_string(), "2".to_string()]);
        assert_eq!(fetch.params.get("id"), Some(&"1,2".to_string()));
        assert_eq!(fetch.params.get("tool"), Some(&TOOL.to_string()));
    }

    #[tokio::test]
    async fn test_search_maps_articles() {
        let server = MockServer::start().await;
        mount_esearch(&server, json!(["31452104", "30000001"])).await;
        Mock::given(method("GET"))
            .and(path("/efetch.fcgi"))
            .and(query_param("id", "31452104,30000001"))
            .respond_with(ResponseTemplate::new(200).set_body_string(EFETCH))
            .expect(1)
            .mount(&server)
            .await;

        let pubmed = Pubmed::new(PubmedParams {
            doc_content_chars_max: 10,
            ..Default::default()
        })
        .with_api_url(server.uri());
        let client = HttpClient::new().unwrap();
        let response = pubmed.search(&client, "crispr").await.unwrap();

        assert_eq!(response.results.len(), 2);
        assert_eq!(response.results[0].score, 1.0);
        assert!(response.results[1].score < 1.0);
        assert_eq!(response.results[0].raw_content.as_deref(), Some("Genome edi"));
        assert_eq!(response.results[1].title, "Short communication");
    }

    #[tokio::test]
    async fn test_no_ids_skips_fetch() {
        let server = MockServer::start().await;
        mount_esearch(&server, json!([])).await;
        Mock::given(path("/efetch.fcgi"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let pubmed = Pubmed::default().with_api_url(server.uri());
        let client = HttpClient::new().unwrap();
        let response = pubmed.search(&client, "nothing").await.unwrap();
        assert!(response.is_success());
        assert!(response.results.is_empty());
    }

    #[tokio::test]
    async fn test_rate_limited_requests_are_retried() {
        let server = MockServer::start().await;
        Mock::given(path("/esearch.fcgi"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        mount_esearch(&server, json!([])).await;

        let pubmed = Pubmed::default()
            .with_api_url(server.uri())
            .with_retry_backoff(Duration::from_millis(1));
        let client = HttpClient::new().unwrap();
        let response = pubmed.search(&client, "crispr").await.unwrap();
        assert!(response.is_success());
    }

    #[tokio::test]
    async fn test_retries_exhausted() {
        let server = MockServer::start().await;
        Mock::given(path("/esearch.fcgi"))
            .respond_with(ResponseTemplate::new(429))
            .expect(u64::from(MAX_RETRIES) + 1)
            .mount(&server)
            .await;

        let pubmed = Pubmed::default()
            .with_api_url(server.uri())
            .with_retry_backoff(Duration::from_millis(1));
        let client = HttpClient::new().unwrap();
        let err = pubmed.search(&client, "crispr").await.unwrap_err();
        assert!(err.to_string().contains("429"));
    }
}

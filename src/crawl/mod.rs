//! Website crawling with robots.txt support and rate limiting
//!
//! This module provides:
//! - URL fetching with configurable timeouts
//! - robots.txt parsing and respect
//! - Per-host rate limiting
//! - Breadth-first crawling bounded by page count, depth and URL scope

mod rate_limit;
mod robots;

pub use rate_limit::*;
pub use robots::*;

use crate::config::CrawlConfig;
use crate::error::{Error, Result};
use crate::parse::{parse_content, ContentType};
use indicatif::ProgressBar;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use url::Url;

/// A fetched page with its extracted text
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawledPage {
    pub url: String,
    pub title: Option<String>,
    pub text: String,
    pub content_type: ContentType,
    /// Absolute URLs of same-host links found on the page
    #[serde(default)]
    pub links: Vec<String>,
    pub depth: u32,
}

/// What to crawl for one website datasource
#[derive(Debug, Clone)]
pub struct CrawlRequest {
    pub base_url: String,
    /// Paths or URLs fetched right after the base URL, regardless of scope
    pub mandatory_pages: Vec<String>,
    /// Path substrings that must never be fetched
    pub exclude_pages: Vec<String>,
    /// Follow links found on fetched pages
    pub follow_links: bool,
}

impl CrawlRequest {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            mandatory_pages: Vec::new(),
            exclude_pages: Vec::new(),
            follow_links: true,
        }
    }
}

/// Web crawler state
pub struct Crawler {
    client: Client,
    config: CrawlConfig,
    robots_cache: Arc<RwLock<HashMap<String, RobotsRules>>>,
    rate_limiter: HostRateLimiter,
}

impl Crawler {
    /// Create a new crawler
    pub fn new(config: CrawlConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| Error::Crawl(format!("Failed to create HTTP client: {}", e)))?;

        let rate_limiter = HostRateLimiter::new(config.rate_limit_per_host);

        Ok(Self {
            client,
            config,
            robots_cache: Arc::new(RwLock::new(HashMap::new())),
            rate_limiter,
        })
    }

    /// Fetch a single URL and extract its text
    pub async fn fetch(&self, url: &str) -> Result<CrawledPage> {
        let parsed_url = Url::parse(url)?;
        let host = host_key(&parsed_url)?;

        if self.config.respect_robots_txt {
            self.ensure_robots_loaded(&host, &parsed_url).await;
            let rules = self.robots_cache.read().await;
            if let Some(r) = rules.get(&host) {
                if !r.is_allowed(parsed_url.as_str(), &self.config.user_agent) {
                    return Err(Error::RobotsDisallowed(url.to_string()));
                }
            }
        }

        self.rate_limiter.wait(&host).await;

        debug!("Fetching: {}", url);

        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Crawl(format!("HTTP {}: {}", status, url)));
        }

        // Redirects may land somewhere else; links resolve against the final URL
        let final_url = response.url().to_string();

        let content_type_header = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let ct = match ContentType::detect(Some(parsed_url.path()), content_type_header.as_deref())
        {
            // Extensionless paths without a header are almost always pages
            ContentType::Unknown if content_type_header.is_none() => ContentType::Html,
            ContentType::Unknown => {
                return Err(Error::Crawl(format!(
                    "Unsupported content type {}: {}",
                    content_type_header.unwrap_or_default(),
                    url
                )));
            }
            ct => ct,
        };

        let content = response.text().await?;
        let parsed = parse_content(&content, ct, Some(&final_url))?;

        let links = parsed
            .links
            .into_iter()
            .filter(|link| link.is_internal)
            .map(|link| link.url)
            .collect();

        Ok(CrawledPage {
            url: url.to_string(),
            title: parsed.title,
            text: parsed.text,
            content_type: ct,
            links,
            depth: 0,
        })
    }

    /// Crawl a website breadth-first from its base URL
    pub async fn crawl(
        &self,
        request: &CrawlRequest,
        progress: Option<&ProgressBar>,
    ) -> Result<Vec<CrawledPage>> {
        let base = Url::parse(&request.base_url)?;
        host_key(&base)?;

        let mut excludes: Vec<String> = request.exclude_pages.clone();
        excludes.extend(self.config.exclude_patterns.iter().cloned());
        excludes.retain(|p| !p.trim().is_empty());

        let mut queue: VecDeque<(String, u32)> = VecDeque::new();
        queue.push_back((base.to_string(), 0));
        for page in &request.mandatory_pages {
            match base.join(page) {
                Ok(url) => queue.push_back((url.to_string(), 0)),
                Err(e) => warn!("Skipping mandatory page {}: {}", page, e),
            }
        }

        let max_pages = self.config.max_pages as usize;
        let max_attempts = max_pages.saturating_mul(5);

        let mut visited: HashSet<String> = HashSet::new();
        let mut results = Vec::new();
        let mut attempts = 0usize;

        while let Some((url, depth)) = queue.pop_front() {
            if results.len() >= max_pages {
                info!("Reached max pages limit ({})", max_pages);
                break;
            }
            if attempts >= max_attempts {
                warn!("Giving up after {} fetch attempts", attempts);
                break;
            }
            if depth > self.config.max_depth {
                continue;
            }

            let normalized = normalize_url(&url);
            if !visited.insert(normalized) {
                continue;
            }

            attempts += 1;
            if let Some(pb) = progress {
                pb.set_message(url.clone());
            }

            let mut page = match self.fetch(&url).await {
                Ok(page) => page,
                Err(e) => {
                    warn!("Failed to fetch {}: {}", url, e);
                    continue;
                }
            };
            page.depth = depth;

            if request.follow_links && depth < self.config.max_depth {
                for link in &page.links {
                    let Ok(link_url) = Url::parse(link) else {
                        continue;
                    };
                    if !is_in_scope(&base, &link_url)
                        || is_excluded(&link_url, &excludes)
                        || !should_crawl_url(&normalize_url(link))
                    {
                        continue;
                    }
                    if !visited.contains(&normalize_url(link)) {
                        queue.push_back((link.clone(), depth + 1));
                    }
                }
            }

            if page.text.trim().is_empty() {
                debug!("No text extracted from {}", url);
                continue;
            }

            if let Some(pb) = progress {
                pb.inc(1);
            }
            results.push(page);
        }

        info!("Crawled {} pages from {}", results.len(), request.base_url);
        Ok(results)
    }

    async fn ensure_robots_loaded(&self, host: &str, url: &Url) {
        {
            let cache = self.robots_cache.read().await;
            if cache.contains_key(host) {
                return;
            }
        }

        let robots_url = format!("{}://{}/robots.txt", url.scheme(), host);
        debug!("Fetching robots.txt from {}", robots_url);

        let rules = match self.client.get(&robots_url).send().await {
            Ok(response) if response.status().is_success() => {
                let text = response.text().await.unwrap_or_default();
                RobotsRules::parse(&text)
            }
            // No robots.txt or error: allow all
            _ => RobotsRules::allow_all(),
        };

        let mut cache = self.robots_cache.write().await;
        cache.insert(host.to_string(), rules);
    }
}

/// `host[:port]` used to key robots rules and rate limits
fn host_key(url: &Url) -> Result<String> {
    let host = url
        .host_str()
        .ok_or_else(|| Error::InvalidUrl(format!("URL has no host: {}", url)))?;
    Ok(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}

/// Same host and port as the base, with a path under the base path
pub fn is_in_scope(base: &Url, url: &Url) -> bool {
    if url.scheme() != base.scheme()
        || url.host_str() != base.host_str()
        || url.port_or_known_default() != base.port_or_known_default()
    {
        return false;
    }

    let prefix = base.path().trim_end_matches('/');
    if prefix.is_empty() {
        return true;
    }

    let path = url.path();
    path == prefix || path.starts_with(&format!("{}/", prefix))
}

/// Whether the URL path contains any exclude pattern
pub fn is_excluded(url: &Url, patterns: &[String]) -> bool {
    let path = url.path();
    patterns.iter().any(|p| path.contains(p.as_str()))
}

/// Normalize a URL for deduplication
pub fn normalize_url(url: &str) -> String {
    if let Ok(parsed) = Url::parse(url) {
        let mut normalized = parsed.clone();

        normalized.set_fragment(None);

        let path = parsed.path().trim_end_matches('/');
        if path.is_empty() {
            normalized.set_path("/");
        } else {
            normalized.set_path(path);
        }

        normalized.to_string()
    } else {
        url.to_string()
    }
}

/// Check if a URL looks like a document worth crawling
pub fn should_crawl_url(url: &str) -> bool {
    let lower = url.to_lowercase();

    // Skip common non-document URLs
    let skip_patterns = [
        "/login", "/logout", "/signin", "/signout", "/register",
        "/admin", "/wp-admin", "/api/", "/cgi-bin/",
        ".xml", ".json", ".rss", ".atom",
        ".png", ".jpg", ".jpeg", ".gif", ".svg", ".webp", ".ico",
        ".pdf", ".zip", ".gz", ".mp3", ".mp4", ".css", ".js",
        "javascript:", "mailto:", "tel:",
        "?page=", "?sort=", "?filter=",
    ];

    for pattern in skip_patterns {
        if lower.contains(pattern) {
            return false;
        }
    }

    // Skip calendar-like URLs with dates
    if date_path_pattern().is_some_and(|re| re.is_match(&lower)) {
        return false;
    }

    true
}

fn date_path_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"/\d{4}/\d{2}/\d{2}/").ok())
        .as_ref()
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config() -> CrawlConfig {
        CrawlConfig {
            rate_limit_per_host: 1000.0,
            ..CrawlConfig::default()
        }
    }

    fn html(body: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_raw(
            format!("<html><head><title>T</title></head><body>{}</body></html>", body),
            "text/html",
        )
    }

    #[test]
    fn test_normalize_url() {
        assert_eq!(
            normalize_url("https://example.com/path/"),
            "https://example.com/path"
        );
        assert_eq!(
            normalize_url("https://example.com/path#fragment"),
            "https://example.com/path"
        );
        assert_eq!(normalize_url("https://example.com/"), "https://example.com/");
    }

    #[test]
    fn test_should_crawl_url() {
        assert!(should_crawl_url("https://example.com/docs/intro"));
        assert!(!should_crawl_url("https://example.com/login"));
        assert!(!should_crawl_url("https://example.com/api/users"));
        assert!(!should_crawl_url("https://example.com/logo.png"));
        assert!(!should_crawl_url("https://example.com/2024/01/02/post"));
        assert!(!should_crawl_url("javascript:void(0)"));
    }

    #[test]
    fn test_scope() {
        let base = Url::parse("https://example.com/docs/").unwrap();
        let ok = |u: &str| is_in_scope(&base, &Url::parse(u).unwrap());

        assert!(ok("https://example.com/docs"));
        assert!(ok("https://example.com/docs/guide"));
        assert!(!ok("https://example.com/docsearch"));
        assert!(!ok("https://example.com/blog"));
        assert!(!ok("https://other.com/docs/guide"));

        let root = Url::parse("https://example.com").unwrap();
        assert!(is_in_scope(&root, &Url::parse("https://example.com/any").unwrap()));
    }

    #[test]
    fn test_excluded() {
        let url = Url::parse("https://example.com/blog/post-1").unwrap();
        assert!(is_excluded(&url, &["/blog".to_string()]));
        assert!(!is_excluded(&url, &["/careers".to_string()]));
    }

    #[tokio::test]
    async fn test_crawl_follows_internal_links() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(html(
                r#"<p>Home page</p>
                <a href="/about">About</a>
                <a href="/blog/post">Blog</a>
                <a href="https://elsewhere.example/x">Out</a>"#,
            ))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/about"))
            .respond_with(html(r#"<p>About us</p><a href="/">Home</a>"#))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/blog/post"))
            .respond_with(html("<p>A post</p>"))
            .expect(0)
            .mount(&server)
            .await;

        let crawler = Crawler::new(test_config()).unwrap();
        let mut request = CrawlRequest::new(server.uri());
        request.exclude_pages = vec!["/blog".to_string()];

        let pages = crawler.crawl(&request, None).await.unwrap();
        let urls: Vec<_> = pages.iter().map(|p| normalize_url(&p.url)).collect();

        assert_eq!(pages.len(), 2);
        assert_eq!(urls[0], normalize_url(&server.uri()));
        assert!(urls[1].ends_with("/about"));
        assert_eq!(pages[1].depth, 1);
        assert!(pages[1].text.contains("About us"));
    }

    #[tokio::test]
    async fn test_crawl_respects_max_pages_and_skips_failures() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(html(
                r#"<p>Home</p>
                <a href="/missing">Missing</a>
                <a href="/a">A</a>
                <a href="/b">B</a>"#,
            ))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/a"))
            .respond_with(html("<p>Page A</p>"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/b"))
            .respond_with(html("<p>Page B</p>"))
            .mount(&server)
            .await;

        let config = CrawlConfig {
            max_pages: 2,
            ..test_config()
        };
        let crawler = Crawler::new(config).unwrap();
        let pages = crawler
            .crawl(&CrawlRequest::new(server.uri()), None)
            .await
            .unwrap();

        assert_eq!(pages.len(), 2);
        assert!(pages[1].url.ends_with("/a"));
    }

    #[tokio::test]
    async fn test_mandatory_pages_are_fetched_without_links() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(html("<p>Home</p>"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/pricing"))
            .respond_with(html("<p>Plans and prices</p>"))
            .mount(&server)
            .await;

        let crawler = Crawler::new(test_config()).unwrap();
        let mut request = CrawlRequest::new(server.uri());
        request.mandatory_pages = vec!["/pricing".to_string()];

        let pages = crawler.crawl(&request, None).await.unwrap();
        assert_eq!(pages.len(), 2);
        assert!(pages[1].text.contains("Plans and prices"));
    }

    #[tokio::test]
    async fn test_robots_disallow() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/robots.txt"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private\n"),
            )
            .mount(&server)
            .await;

        let crawler = Crawler::new(test_config()).unwrap();
        let err = crawler
            .fetch(&format!("{}/private/page", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::RobotsDisallowed(_)));
    }

    #[tokio::test]
    async fn test_fetch_plain_text_and_rejects_binary() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/notes.txt"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw("Opening hours\n\n9 to 5", "text/plain"),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/image"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(vec![0u8, 1, 2], "image/png"))
            .mount(&server)
            .await;

        let crawler = Crawler::new(test_config()).unwrap();

        let page = crawler
            .fetch(&format!("{}/notes.txt", server.uri()))
            .await
            .unwrap();
        assert_eq!(page.content_type, ContentType::PlainText);
        assert_eq!(page.text, "Opening hours\n\n9 to 5");

        let err = crawler.fetch(&format!("{}/image", server.uri())).await;
        assert!(err.is_err());
    }
}

//! Polite HTTP fetching
//!
//! A logical fetch runs robots check, throttle, the retried network call and
//! finally the render fallback, in that order. Only the network call is
//! retried; robots and throttle run once per logical fetch.

use std::sync::Arc;

use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::config::RenderMode;
use super::error::CrawlError;
use super::render::Renderer;
use super::retry::retry;
use super::session::CrawlSession;

/// A successful response, possibly with a rendered body substituted
#[derive(Debug, Clone)]
pub struct FetchedResponse {
    /// Final URL after redirects
    pub url: String,

    /// HTTP status code
    pub status: u16,

    /// Response headers
    pub headers: HeaderMap,

    /// Response body
    pub body: Vec<u8>,

    /// Whether `body` came from the render fallback
    pub rendered: bool,
}

impl FetchedResponse {
    /// Lower-cased MIME essence of the Content-Type header, if any
    pub fn content_type(&self) -> Option<String> {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.split(';').next().unwrap_or_default().trim().to_ascii_lowercase())
            .filter(|ct| !ct.is_empty())
    }

    /// Body decoded as UTF-8, dropping invalid sequences
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Whether a response should be treated as an HTML page
pub fn looks_html(content_type: Option<&str>, url: &str) -> bool {
    match content_type {
        Some(ct) => ct.contains("text/html") || ct.contains("application/xhtml"),
        None => {
            let lower = url.to_ascii_lowercase();
            lower.ends_with(".htm") || lower.ends_with(".html") || lower.ends_with('/')
        }
    }
}

fn visible_chars(text: &str) -> usize {
    text.chars().filter(|c| !c.is_whitespace()).count()
}

/// HTTP fetcher bound to a crawl session
#[derive(Clone)]
pub struct Fetcher {
    session: Arc<CrawlSession>,
    renderer: Option<Arc<dyn Renderer>>,
}

impl Fetcher {
    /// Create a fetcher without a render fallback
    pub fn new(session: Arc<CrawlSession>) -> Self {
        Self {
            session,
            renderer: None,
        }
    }

    /// Attach a render fallback engine
    pub fn with_renderer(mut self, renderer: Arc<dyn Renderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    /// Crawl session this fetcher uses
    pub fn session(&self) -> &Arc<CrawlSession> {
        &self.session
    }

    /// Fetch `url` under robots, throttle and retry policy
    #[instrument(skip(self), fields(url = %url))]
    pub async fn fetch(&self, url: &str) -> Result<FetchedResponse, CrawlError> {
        let parsed = Url::parse(url)?;

        if !self.session.allowed(&parsed).await {
            info!("Disallowed by robots.txt");
            return Err(CrawlError::RobotsDisallowed(url.to_string()));
        }

        self.session.pace(&parsed).await;

        let config = self.session.config();
        let response = retry(&config.retry, CrawlError::is_retryable, |attempt| {
            debug!(attempt, "Sending request");
            self.get_once(url)
        })
        .await?;

        Ok(self.maybe_render(response).await)
    }

    async fn get_once(&self, url: &str) -> Result<FetchedResponse, CrawlError> {
        let config = self.session.config();
        let response = self
            .session
            .client()
            .get(url)
            .timeout(config.fetch_timeout)
            .send()
            .await
            .map_err(|e| CrawlError::from_request(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CrawlError::from_status(url, status));
        }

        let final_url = response.url().to_string();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| CrawlError::from_request(url, e))?
            .to_vec();

        Ok(FetchedResponse {
            url: final_url,
            status: status.as_u16(),
            headers,
            body,
            rendered: false,
        })
    }

    async fn maybe_render(&self, response: FetchedResponse) -> FetchedResponse {
        let config = self.session.config();
        let Some(renderer) = self.renderer.as_ref() else {
            return response;
        };

        if !looks_html(response.content_type().as_deref(), &response.url) {
            return response;
        }

        let needs_render = match config.render_mode {
            RenderMode::Off => false,
            RenderMode::Always => true,
            RenderMode::Auto => visible_chars(&response.text()) < config.min_html_chars,
        };
        if !needs_render {
            return response;
        }

        info!(url = %response.url, "Using render fallback");
        match renderer.render(&response.url).await {
            Ok(html) if visible_chars(&html) >= config.min_html_chars => {
                let mut headers = response.headers;
                headers.insert(
                    CONTENT_TYPE,
                    HeaderValue::from_static("text/html; charset=utf-8"),
                );
                FetchedResponse {
                    url: response.url,
                    status: response.status,
                    headers,
                    body: html.into_bytes(),
                    rendered: true,
                }
            }
            Ok(_) => {
                debug!(url = %response.url, "Rendered page still too short, keeping original");
                response
            }
            Err(e) => {
                warn!(url = %response.url, error = %e, "Render fallback failed, keeping original");
                response
            }
        }
    }
}

//! Headless render fallback for script-populated pages

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chromiumoxide::Page;
use chromiumoxide::browser::{Browser, BrowserConfig};
use futures::StreamExt;
use futures::future::BoxFuture;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::error::CrawlError;

/// Loads a URL in a full browser engine and returns the rendered HTML
pub trait Renderer: Send + Sync {
    /// Render `url` and return the resulting document HTML
    fn render<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<String, CrawlError>>;
}

/// Chromium-backed renderer with a lazily launched, shared headless browser
#[derive(Clone)]
pub struct ChromiumRenderer {
    browser: Arc<Mutex<Option<Arc<Browser>>>>,
    user_agent: String,
    timeout: Duration,
}

impl ChromiumRenderer {
    /// Create a renderer; the browser is launched on first use
    pub fn new(user_agent: impl Into<String>, timeout: Duration) -> Self {
        Self {
            browser: Arc::new(Mutex::new(None)),
            user_agent: user_agent.into(),
            timeout,
        }
    }

    async fn get_or_launch(&self) -> Result<Arc<Browser>, CrawlError> {
        let mut guard = self.browser.lock().await;
        if let Some(ref browser) = *guard {
            return Ok(Arc::clone(browser));
        }

        let config = BrowserConfig::builder()
            .arg("--no-sandbox")
            .arg("--disable-setuid-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu")
            .arg(format!("--user-agent={}", self.user_agent))
            .build()
            .map_err(|e| CrawlError::RenderFailed(format!("Browser config error: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| CrawlError::RenderFailed(format!("Browser launch failed: {e}")))?;

        tokio::spawn(async move { while handler.next().await.is_some() {} });
        info!("Headless browser launched");

        let shared = Arc::new(browser);
        *guard = Some(Arc::clone(&shared));
        Ok(shared)
    }

    fn timed_out(&self, url: &str, step: &str) -> CrawlError {
        CrawlError::RenderFailed(format!(
            "{step} of {url} timed out after {}s",
            self.timeout.as_secs()
        ))
    }

    async fn render_page(&self, url: &str) -> Result<String, CrawlError> {
        let browser = self.get_or_launch().await?;

        // open a blank tab first so every later step has a page to close
        let page = tokio::time::timeout(self.timeout, browser.new_page("about:blank"))
            .await
            .map_err(|_| self.timed_out(url, "Opening a tab"))?
            .map_err(|e| CrawlError::RenderFailed(format!("Failed to open a tab for {url}: {e}")))?;

        let tab = page.clone();
        let close = async move {
            if let Err(e) = tab.close().await {
                debug!(url, error = %e, "Page close error");
            }
        };
        within_then(self.timeout, load_content(&page, url), close, || self.timed_out(url, "Render")).await
    }

    /// Close the browser if this renderer holds the last reference
    pub async fn shutdown(&self) {
        let mut guard = self.browser.lock().await;
        if let Some(browser) = guard.take() {
            if let Ok(mut browser) = Arc::try_unwrap(browser) {
                if let Err(e) = browser.close().await {
                    warn!(error = %e, "Browser close error");
                }
            }
        }
    }
}

impl Renderer for ChromiumRenderer {
    fn render<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<String, CrawlError>> {
        Box::pin(self.render_page(url))
    }
}

/// Run `work` under `limit`, then `finish` whether it completed, failed or timed out
async fn within_then<T, W, F>(
    limit: Duration,
    work: W,
    finish: F,
    on_timeout: impl FnOnce() -> CrawlError,
) -> Result<T, CrawlError>
where
    W: Future<Output = Result<T, CrawlError>>,
    F: Future<Output = ()>,
{
    let result = tokio::time::timeout(limit, work).await;
    finish.await;
    result.unwrap_or_else(|_| Err(on_timeout()))
}

async fn load_content(page: &Page, url: &str) -> Result<String, CrawlError> {
    page.goto(url)
        .await
        .map_err(|e| CrawlError::RenderFailed(format!("Failed to load {url}: {e}")))?;

    // best-effort: some pages never report a settled navigation
    if let Err(e) = page.wait_for_navigation().await {
        debug!(url, error = %e, "Navigation did not settle");
    }

    page.content()
        .await
        .map_err(|e| CrawlError::RenderFailed(format!("Failed to read content of {url}: {e}")))
}

//! Rendering backend: turn a URL into raw markup.
//!
//! Two fetch modes, selected per source strategy:
//!
//! - **Static**: one direct GET through a shared `reqwest` client with
//!   optional per-source headers and a bounded timeout. Certificate
//!   verification is deliberately disabled: several supported outlets
//!   serve misconfigured TLS chains, and the content is public news
//!   markup. This is an explicit opt-out scoped to this client, not a
//!   process-wide default.
//! - **Dynamic**: a headless Chromium render. Navigation waits for the
//!   DOM-content-loaded signal and, when the strategy names one, for a
//!   content selector to appear. The page (and, on the ephemeral path,
//!   the whole engine) is torn down on every exit path, success or
//!   failure, before the call returns.

use std::time::Duration;

use chromiumoxide::Page;
use tracing::{debug, instrument, warn};

use crate::browser::{self, BrowserManager};
use crate::error::ClipError;

/// Default static-fetch timeout.
pub const STATIC_TIMEOUT_SECS: u64 = 15;
/// Default dynamic-render timeout.
pub const DYNAMIC_TIMEOUT_SECS: u64 = 30;
/// How long to poll for a strategy's wait-for selector before capturing
/// whatever has rendered.
const WAIT_FOR_SELECTOR: Duration = Duration::from_secs(10);

/// Shared fetch backend holding the HTTP client and the configured timeouts.
pub struct Backend {
    client: reqwest::Client,
    static_timeout: Duration,
    dynamic_timeout: Duration,
}

impl Backend {
    pub fn new(static_timeout: Duration, dynamic_timeout: Duration) -> Result<Self, ClipError> {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .timeout(static_timeout)
            .build()
            .map_err(|e| ClipError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            static_timeout,
            dynamic_timeout,
        })
    }

    pub fn with_defaults() -> Result<Self, ClipError> {
        Self::new(
            Duration::from_secs(STATIC_TIMEOUT_SECS),
            Duration::from_secs(DYNAMIC_TIMEOUT_SECS),
        )
    }

    /// Direct GET, decoded as UTF-8 regardless of what the response
    /// headers claim (every supported outlet serves UTF-8; some mislabel
    /// it).
    #[instrument(level = "debug", skip_all, fields(%url))]
    pub async fn fetch_static(
        &self,
        url: &str,
        headers: &[(&str, &str)],
    ) -> Result<String, ClipError> {
        let mut request = self.client.get(url);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ClipError::Timeout(self.static_timeout.as_secs())
            } else if e.is_connect() {
                ClipError::Network(format!("connection failed: {e}"))
            } else {
                ClipError::Network(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClipError::Network(format!(
                "HTTP {} for {url}",
                status.as_u16()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ClipError::Network(format!("failed to read response body: {e}")))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Headless render. With a pooled [`BrowserManager`] the shared engine
    /// is reused and only the page is ephemeral; without one, a whole
    /// engine is launched and torn down for this single call.
    #[instrument(level = "debug", skip_all, fields(%url, pooled = browser.is_some()))]
    pub async fn fetch_dynamic(
        &self,
        url: &str,
        wait_for: Option<&str>,
        browser: Option<&BrowserManager>,
    ) -> Result<String, ClipError> {
        match browser {
            Some(manager) => self.render_pooled(manager, url, wait_for).await,
            None => self.render_ephemeral(url, wait_for).await,
        }
    }

    async fn render_pooled(
        &self,
        manager: &BrowserManager,
        url: &str,
        wait_for: Option<&str>,
    ) -> Result<String, ClipError> {
        let secs = self.dynamic_timeout.as_secs();
        let page = match tokio::time::timeout(self.dynamic_timeout, manager.new_page(url)).await {
            Ok(opened) => opened?,
            Err(_) => return Err(ClipError::Timeout(secs)),
        };
        self.capture_and_close(page, url, wait_for).await
    }

    async fn render_ephemeral(&self, url: &str, wait_for: Option<&str>) -> Result<String, ClipError> {
        let secs = self.dynamic_timeout.as_secs();
        let (mut engine, handler) = browser::launch_engine().await?;

        let opened = tokio::time::timeout(self.dynamic_timeout, engine.new_page(url)).await;
        let result = match opened {
            Ok(Ok(page)) => self.capture_and_close(page, url, wait_for).await,
            Ok(Err(e)) => Err(ClipError::Browser(format!("failed to open page for {url}: {e}"))),
            Err(_) => Err(ClipError::Timeout(secs)),
        };

        // Engine teardown happens on every exit path before returning.
        if let Err(e) = engine.close().await {
            warn!(error = %e, "ephemeral browser close reported an error");
        }
        handler.abort();
        result
    }

    /// Wait for render, grab the DOM, close the page. The page is closed
    /// whether or not the capture succeeded.
    async fn capture_and_close(
        &self,
        page: Page,
        url: &str,
        wait_for: Option<&str>,
    ) -> Result<String, ClipError> {
        let secs = self.dynamic_timeout.as_secs();
        let captured = match tokio::time::timeout(self.dynamic_timeout, capture(&page, wait_for))
            .await
        {
            Ok(inner) => inner,
            Err(_) => Err(ClipError::Timeout(secs)),
        };
        if let Err(e) = page.close().await {
            debug!(error = %e, %url, "page close reported an error");
        }
        captured
    }
}

async fn capture(page: &Page, wait_for: Option<&str>) -> Result<String, ClipError> {
    // DOM-content-loaded is the baseline render signal.
    let _ = page.wait_for_navigation().await;

    // When the strategy names a content selector, poll for it and then
    // capture whatever has rendered; a missing selector degrades, it
    // does not fail the fetch.
    if let Some(selector) = wait_for {
        let deadline = tokio::time::Instant::now() + WAIT_FOR_SELECTOR;
        loop {
            if page.find_element(selector).await.is_ok() {
                break;
            }
            if tokio::time::Instant::now() >= deadline {
                warn!(selector, "content selector never appeared; capturing current DOM");
                break;
            }
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
    }

    page.content()
        .await
        .map_err(|e| ClipError::Browser(format!("failed to read page content: {e}")))
}

//! Shared headless-browser session manager.
//!
//! A [`BrowserManager`] is a lazily created singleton wrapping one headless
//! Chromium process. Batch exports that contain dynamic-mode URLs acquire
//! it once and reuse it for every render in the job instead of paying a
//! browser launch per URL; one-off extractions keep using an ephemeral
//! engine (see [`crate::fetch`]).
//!
//! Lifecycle is a tagged state, not a boolean: the singleton slot empty
//! means *uninitialized*, then *open* after the first acquisition, then
//! *closed* after an explicit [`close`](BrowserManager::close). Close is
//! idempotent, tears down the browser process and the CDP handler in
//! order while swallowing and logging engine-level errors, and clears the
//! singleton so a later `get_instance` starts a fresh engine.
//!
//! Jobs hold the session through a [`BrowserGuard`]. The guard's `Drop`
//! covers abandonment: when the owning future is dropped before the
//! orderly close runs, the singleton slot is cleared and the engine
//! handle reclaimed, so no Chromium process outlives its job.
//!
//! Both page creation and close must happen on the thread that created
//! the instance; calling from any other thread is a usage error and
//! panics. The binary runs a current-thread runtime, which keeps this
//! check sound across await points.

use std::path::PathBuf;
use std::sync::{Arc, Mutex as StdMutex};
use std::thread::{self, ThreadId};

use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use once_cell::sync::Lazy;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::ClipError;

/// Creation lock plus singleton slot. An empty slot is the uninitialized
/// state.
static INSTANCE: Lazy<StdMutex<Option<Arc<BrowserManager>>>> = Lazy::new(|| StdMutex::new(None));

/// What the lifecycle needs from a running engine: orderly shutdown and
/// stopping the background event pump. Factored as a trait so the state
/// machine has a test double; the one production implementation is
/// [`ChromiumEngine`].
pub trait RenderEngine {
    async fn shutdown(&mut self) -> Result<(), ClipError>;
    fn stop_pump(&mut self);
}

/// A live Chromium process plus its CDP event pump. Dropping the handle
/// kills the child process, which is what the reclaim path relies on.
pub struct ChromiumEngine {
    browser: Browser,
    handler: JoinHandle<()>,
}

impl ChromiumEngine {
    async fn open_page(&self, url: &str) -> Result<Page, ClipError> {
        self.browser
            .new_page(url)
            .await
            .map_err(|e| ClipError::Browser(format!("failed to open page for {url}: {e}")))
    }
}

impl RenderEngine for ChromiumEngine {
    async fn shutdown(&mut self) -> Result<(), ClipError> {
        self.browser
            .close()
            .await
            .map(|_| ())
            .map_err(|e| ClipError::Browser(e.to_string()))
    }

    fn stop_pump(&mut self) {
        self.handler.abort();
    }
}

enum EngineState<E> {
    Open(E),
    Closed,
}

/// Singleton handle to a shared headless rendering engine.
pub struct BrowserManager<E = ChromiumEngine> {
    owner: ThreadId,
    state: Mutex<EngineState<E>>,
}

impl<E: RenderEngine> BrowserManager<E> {
    /// Tear the engine down if it is open. Repeated calls are no-ops.
    async fn shutdown_engine(&self) {
        let mut state = self.state.lock().await;
        match std::mem::replace(&mut *state, EngineState::Closed) {
            EngineState::Open(mut engine) => {
                if let Err(e) = engine.shutdown().await {
                    warn!(error = %e, "browser process close reported an error");
                }
                engine.stop_pump();
                info!("browser session closed");
            }
            EngineState::Closed => {
                debug!("browser session already closed; close is a no-op");
            }
        }
    }

    /// Synchronous best-effort teardown for abandoned jobs. No executor is
    /// available from a `Drop` impl, so instead of an orderly shutdown the
    /// engine handle is dropped, which kills the child process. If another
    /// task momentarily holds the state lock, the handle still drops once
    /// the last reference to this manager goes away.
    fn reclaim_engine(&self) {
        if let Ok(mut state) = self.state.try_lock() {
            if let EngineState::Open(mut engine) =
                std::mem::replace(&mut *state, EngineState::Closed)
            {
                engine.stop_pump();
                info!("browser session reclaimed after abandoned job");
            }
        }
    }

    /// True once the engine has been torn down.
    pub async fn is_closed(&self) -> bool {
        matches!(&*self.state.lock().await, EngineState::Closed)
    }

    fn assert_owner(&self, op: &str) {
        let current = thread::current().id();
        if current != self.owner {
            panic!(
                "BrowserManager::{op} called from non-owner thread {current:?} (owner {:?})",
                self.owner
            );
        }
    }
}

impl BrowserManager {
    /// Return the live instance, launching the engine on first call.
    pub async fn get_instance() -> Result<Arc<BrowserManager>, ClipError> {
        if let Some(existing) = INSTANCE.lock().unwrap().clone() {
            return Ok(existing);
        }

        let (browser, handler) = launch_engine().await?;
        let candidate = Arc::new(BrowserManager {
            owner: thread::current().id(),
            state: Mutex::new(EngineState::Open(ChromiumEngine { browser, handler })),
        });

        // Another task may have won the race while we were launching.
        let raced = {
            let mut slot = INSTANCE.lock().unwrap();
            match slot.clone() {
                Some(existing) => Some(existing),
                None => {
                    *slot = Some(Arc::clone(&candidate));
                    None
                }
            }
        };
        match raced {
            Some(existing) => {
                candidate.close().await;
                Ok(existing)
            }
            None => {
                info!("browser session manager initialized");
                Ok(candidate)
            }
        }
    }

    /// Open a page on the shared engine and navigate it to `url`.
    ///
    /// # Panics
    ///
    /// Panics when called from a thread other than the one that created
    /// the instance.
    pub async fn new_page(&self, url: &str) -> Result<Page, ClipError> {
        self.assert_owner("new_page");
        let state = self.state.lock().await;
        match &*state {
            EngineState::Open(engine) => engine.open_page(url).await,
            EngineState::Closed => {
                Err(ClipError::Browser("browser session already closed".into()))
            }
        }
    }

    /// Tear down the engine. Repeated calls are no-ops.
    ///
    /// Engine-level errors during teardown are logged and swallowed; the
    /// singleton slot is cleared either way so the next
    /// [`get_instance`](Self::get_instance) launches fresh.
    ///
    /// # Panics
    ///
    /// Panics when called from a thread other than the one that created
    /// the instance.
    pub async fn close(&self) {
        self.assert_owner("close");
        self.shutdown_engine().await;
        self.release_slot();
    }

    /// Clear the singleton slot, but only if it still holds this instance.
    fn release_slot(&self) {
        let mut slot = INSTANCE.lock().unwrap();
        if let Some(current) = slot.as_ref() {
            if std::ptr::eq(current.as_ref(), self) {
                slot.take();
            }
        }
    }
}

/// Ties the pooled engine's lifetime to one export job.
///
/// The normal path ends with [`close`](Self::close). If the owning future
/// is dropped before that (an abandoned export), `Drop` clears the
/// singleton slot and reclaims the engine, so the Chromium process does
/// not survive the job it was opened for.
pub struct BrowserGuard {
    manager: Option<Arc<BrowserManager>>,
}

impl BrowserGuard {
    /// Acquire the shared engine for the duration of one job.
    pub async fn acquire() -> Result<Self, ClipError> {
        Ok(Self {
            manager: Some(BrowserManager::get_instance().await?),
        })
    }

    /// The managed engine, for page creation.
    pub fn manager(&self) -> Option<&BrowserManager> {
        self.manager.as_deref()
    }

    /// Orderly teardown at the end of the job.
    pub async fn close(mut self) {
        if let Some(manager) = self.manager.take() {
            manager.close().await;
        }
    }
}

impl Drop for BrowserGuard {
    fn drop(&mut self) {
        if let Some(manager) = self.manager.take() {
            manager.release_slot();
            manager.reclaim_engine();
        }
    }
}

/// Launch a headless Chromium engine and spawn the CDP event pump.
///
/// Shared by the pooled manager above and the ephemeral per-call path in
/// [`crate::fetch`].
pub(crate) async fn launch_engine() -> Result<(Browser, JoinHandle<()>), ClipError> {
    let mut builder = BrowserConfig::builder().no_sandbox();
    if let Some(bin) = chrome_binary() {
        debug!(path = %bin.display(), "using explicit Chrome binary");
        builder = builder.chrome_executable(bin);
    }
    let config = builder
        .arg("--headless=new")
        .arg("--disable-gpu")
        .arg("--disable-dev-shm-usage")
        .arg("--no-first-run")
        .build()
        .map_err(|e| ClipError::Browser(format!("browser config error: {e}")))?;

    let (browser, mut handler) = Browser::launch(config)
        .await
        .map_err(|e| ClipError::Browser(format!("failed to launch browser: {e}")))?;

    // The CDP handler must be polled continuously for the connection to work.
    let handle = tokio::spawn(async move {
        while let Some(event) = handler.next().await {
            if event.is_err() {
                warn!(?event, "browser CDP handler error");
                break;
            }
        }
    });

    Ok((browser, handle))
}

/// Locate a Chrome/Chromium binary, honoring `CHROME_BIN` first and
/// falling back to well-known install paths. Returns `None` to let
/// `chromiumoxide` do its own lookup.
fn chrome_binary() -> Option<PathBuf> {
    if let Ok(p) = std::env::var("CHROME_BIN") {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }
    const CANDIDATES: &[&str] = &[
        "/usr/bin/google-chrome-stable",
        "/usr/bin/google-chrome",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
    ];
    CANDIDATES.iter().map(PathBuf::from).find(|p| p.exists())
}

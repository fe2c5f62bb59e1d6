//! Headless-browser rendering for client-rendered pages.
//!
//! Used only as a retry pass for targets whose roster page was reachable but
//! yielded zero players. One browser process is shared across the whole
//! pass; if it cannot launch, each page falls back to a system chromium
//! child process in dump-DOM mode, bounded by a wall-clock timeout.

use anyhow::{anyhow, bail, Context, Result};
use chromiumoxide::browser::{Browser, BrowserConfig as ChromeConfig};
use futures::StreamExt;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::BrowserConfig;

/// System binaries tried, in order, for the subprocess fallback.
const CHROMIUM_BINARIES: &[&str] = &["chromium", "chromium-browser", "google-chrome"];

pub struct Renderer {
    settings: BrowserConfig,
    browser: Option<(Browser, JoinHandle<()>)>,
    /// Launch already failed once; skip straight to the subprocess path.
    launch_failed: bool,
}

impl Renderer {
    pub fn new(settings: BrowserConfig) -> Self {
        Renderer {
            settings,
            browser: None,
            launch_failed: false,
        }
    }

    /// Fetch fully rendered HTML for a page.
    pub async fn fetch_html(&mut self, url: &str) -> Result<String> {
        if !self.launch_failed {
            match self.ensure_browser().await {
                Ok(()) => match self.fetch_via_browser(url).await {
                    Ok(html) => return Ok(html),
                    Err(e) => warn!(url, error = %e, "browser render failed, trying subprocess"),
                },
                Err(e) => {
                    warn!(error = %e, "headless browser unavailable, using subprocess fallback");
                    self.launch_failed = true;
                }
            }
        }
        self.fetch_via_subprocess(url).await
    }

    async fn ensure_browser(&mut self) -> Result<()> {
        if self.browser.is_some() {
            return Ok(());
        }
        let config = ChromeConfig::builder()
            .no_sandbox()
            .build()
            .map_err(|e| anyhow!("browser config: {e}"))?;
        let (browser, mut handler) = Browser::launch(config)
            .await
            .context("Failed to launch headless browser")?;
        let handle = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });
        info!("headless browser launched");
        self.browser = Some((browser, handle));
        Ok(())
    }

    async fn fetch_via_browser(&mut self, url: &str) -> Result<String> {
        let (browser, _) = self
            .browser
            .as_mut()
            .ok_or_else(|| anyhow!("browser not launched"))?;
        let timeout = Duration::from_millis(self.settings.page_load_timeout_ms);

        let page = browser.new_page(url).await?;
        let result = tokio::time::timeout(timeout, async {
            page.wait_for_navigation().await?;
            page.content().await.map_err(anyhow::Error::from)
        })
        .await;
        let html = match result {
            Ok(html) => html,
            Err(_) => Err(anyhow!("page load timed out after {timeout:?}")),
        };
        if let Err(e) = page.close().await {
            debug!(error = %e, "page close failed");
        }
        html
    }

    async fn fetch_via_subprocess(&self, url: &str) -> Result<String> {
        let timeout = Duration::from_secs(self.settings.subprocess_timeout_secs);
        let mut last_error = anyhow!("no chromium binary found");
        for binary in CHROMIUM_BINARIES {
            match dump_dom(Path::new(binary), url, timeout).await {
                Ok(html) => return Ok(html),
                Err(e) => last_error = e,
            }
        }
        Err(last_error)
    }

    pub async fn shutdown(&mut self) {
        if let Some((mut browser, handle)) = self.browser.take() {
            if let Err(e) = browser.close().await {
                debug!(error = %e, "browser close failed");
            }
            let _ = browser.wait().await;
            handle.abort();
        }
    }
}

/// Run a chromium binary in headless dump-DOM mode and capture its stdout,
/// killing the child if it outlives the timeout.
async fn dump_dom(binary: &Path, url: &str, timeout: Duration) -> Result<String> {
    let mut child = tokio::process::Command::new(binary)
        .arg("--headless=new")
        .arg("--disable-gpu")
        .arg("--dump-dom")
        .arg(url)
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("Failed to spawn {}", binary.display()))?;

    let mut stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("child stdout unavailable"))?;

    let mut html = String::new();
    let read = async {
        stdout.read_to_string(&mut html).await?;
        child.wait().await.map_err(anyhow::Error::from)
    };
    let status = match tokio::time::timeout(timeout, read).await {
        Ok(status) => status?,
        Err(_) => {
            let _ = child.kill().await;
            bail!("render subprocess timed out after {timeout:?}");
        }
    };
    if !status.success() {
        bail!("render subprocess exited with {status}");
    }
    if html.trim().is_empty() {
        bail!("render subprocess produced no output");
    }
    Ok(html)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;

    fn fake_chromium(dir: &Path, script: &str) -> std::path::PathBuf {
        let path = dir.join("chromium");
        std::fs::write(&path, script).unwrap();
        let mut perms = std::fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).unwrap();
        path
    }

    #[tokio::test]
    async fn dump_dom_captures_stdout() {
        let dir = tempfile::tempdir().unwrap();
        let bin = fake_chromium(
            dir.path(),
            "#!/bin/sh\necho '<html><body>rendered</body></html>'\n",
        );
        let html = dump_dom(&bin, "https://example.edu", Duration::from_secs(5))
            .await
            .unwrap();
        assert!(html.contains("rendered"));
    }

    #[tokio::test]
    async fn dump_dom_rejects_failing_binary() {
        let dir = tempfile::tempdir().unwrap();
        let bin = fake_chromium(dir.path(), "#!/bin/sh\nexit 1\n");
        assert!(dump_dom(&bin, "https://example.edu", Duration::from_secs(5))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn dump_dom_kills_stuck_subprocess() {
        let dir = tempfile::tempdir().unwrap();
        let bin = fake_chromium(dir.path(), "#!/bin/sh\nsleep 60\n");
        let err = dump_dom(&bin, "https://example.edu", Duration::from_millis(200))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }
}

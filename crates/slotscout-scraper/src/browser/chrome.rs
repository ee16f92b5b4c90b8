//! Chrome/Chromium driven over the DevTools protocol.
//!
//! Every [`ChromeBrowser::open`] launches a fresh browser process with its
//! own throw-away profile directory, so no cookies or storage leak between
//! venue runs.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use slotscout_core::AppConfig;
use tokio::process::{Child, Command};

use super::cdp::CdpClient;
use super::page::{Browser, Page};
use crate::error::ScraperError;

#[derive(Debug, Clone)]
pub struct ChromeSettings {
    pub executable: Option<PathBuf>,
    pub headless: bool,
    pub user_agent: Option<String>,
    /// Budget for the DevTools endpoint to come up after launch.
    pub launch_timeout: Duration,
    /// Budget for a single CDP command and for a page load.
    pub command_timeout: Duration,
}

impl ChromeSettings {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            executable: config.browser_path.clone(),
            headless: config.browser_headless,
            user_agent: config.browser_user_agent.clone(),
            launch_timeout: Duration::from_secs(config.browser_launch_timeout_secs),
            command_timeout: Duration::from_millis(config.wait_timeout_ms.max(5_000)),
        }
    }
}

pub struct ChromeBrowser {
    executable: PathBuf,
    settings: ChromeSettings,
    http: reqwest::Client,
}

impl ChromeBrowser {
    /// Resolves the browser executable (configured path or a search of the
    /// usual install locations and `PATH`).
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::Session`] when no executable is found.
    pub fn new(settings: ChromeSettings) -> Result<Self, ScraperError> {
        let executable = match &settings.executable {
            Some(path) => path.clone(),
            None => find_browser_binary().ok_or_else(|| ScraperError::Session {
                reason: "no Chrome/Chromium executable found; set SLOTSCOUT_BROWSER_PATH"
                    .to_string(),
            })?,
        };
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(2))
            .build()?;
        Ok(Self {
            executable,
            settings,
            http,
        })
    }

    #[must_use]
    pub fn executable(&self) -> &Path {
        &self.executable
    }

    async fn launch(&self) -> Result<ChromePage, ScraperError> {
        let profile_dir =
            std::env::temp_dir().join(format!("slotscout-profile-{}", uuid::Uuid::new_v4()));
        tokio::fs::create_dir_all(&profile_dir).await?;

        let port = find_free_port().await?;
        let args = build_browser_args(port, &profile_dir, &self.settings);

        tracing::debug!(
            executable = %self.executable.display(),
            port,
            headless = self.settings.headless,
            "launching browser"
        );

        let mut child = match Command::new(&self.executable)
            .args(&args)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                let _ = tokio::fs::remove_dir_all(&profile_dir).await;
                return Err(ScraperError::Session {
                    reason: format!("failed to launch {}: {e}", self.executable.display()),
                });
            }
        };

        match self.connect(port).await {
            Ok(cdp) => Ok(ChromePage {
                cdp,
                child,
                profile_dir,
                load_timeout: self.settings.command_timeout,
                closed: false,
            }),
            Err(e) => {
                let _ = child.kill().await;
                let _ = tokio::fs::remove_dir_all(&profile_dir).await;
                Err(e)
            }
        }
    }

    async fn connect(&self, port: u16) -> Result<CdpClient, ScraperError> {
        let base = format!("http://127.0.0.1:{port}");
        discovery::wait_for_devtools(&self.http, &base, self.settings.launch_timeout).await?;
        let page_ws = discovery::page_ws_url(&self.http, &base).await?;

        let cdp = CdpClient::connect(&page_ws, self.settings.command_timeout).await?;
        cdp.enable_domain("Page").await?;
        cdp.enable_domain("Runtime").await?;
        if let Some(ua) = &self.settings.user_agent {
            cdp.send_command("Network.setUserAgentOverride", json!({ "userAgent": ua }))
                .await?;
        }
        Ok(cdp)
    }
}

#[async_trait]
impl Browser for ChromeBrowser {
    async fn open(&self) -> Result<Box<dyn Page>, ScraperError> {
        match self.launch().await {
            Ok(page) => Ok(Box::new(page)),
            Err(e @ ScraperError::Session { .. }) => Err(e),
            Err(other) => Err(ScraperError::Session {
                reason: other.to_string(),
            }),
        }
    }
}

pub struct ChromePage {
    cdp: CdpClient,
    child: Child,
    profile_dir: PathBuf,
    load_timeout: Duration,
    closed: bool,
}

impl ChromePage {
    fn string_list(value: Value, method: &str) -> Result<Vec<Option<String>>, ScraperError> {
        serde_json::from_value(value).map_err(|e| ScraperError::Protocol {
            method: method.to_string(),
            reason: format!("unexpected script result: {e}"),
        })
    }
}

#[async_trait]
impl Page for ChromePage {
    async fn goto(&mut self, url: &str) -> Result<(), ScraperError> {
        let mut loaded = self.cdp.subscribe("Page.loadEventFired").await;
        let result = self
            .cdp
            .send_command("Page.navigate", json!({ "url": url }))
            .await?;
        if let Some(error) = result.get("errorText").and_then(Value::as_str) {
            return Err(ScraperError::Session {
                reason: format!("navigation to {url} failed: {error}"),
            });
        }
        if tokio::time::timeout(self.load_timeout, loaded.recv())
            .await
            .is_err()
        {
            tracing::debug!(url, "load event not seen in time, continuing");
        }
        Ok(())
    }

    async fn current_url(&mut self) -> Result<String, ScraperError> {
        let value = self.cdp.evaluate("location.href").await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn texts(&mut self, selector: &str) -> Result<Vec<String>, ScraperError> {
        let expression = format!(
            "Array.from(document.querySelectorAll({sel})).map(e => (e.innerText || e.textContent || '').trim())",
            sel = js_string(selector)
        );
        let value = self.cdp.evaluate(&expression).await?;
        Ok(Self::string_list(value, "texts")?
            .into_iter()
            .map(Option::unwrap_or_default)
            .collect())
    }

    async fn attributes(
        &mut self,
        selector: &str,
        name: &str,
    ) -> Result<Vec<Option<String>>, ScraperError> {
        let expression = format!(
            "Array.from(document.querySelectorAll({sel})).map(e => e.getAttribute({name}))",
            sel = js_string(selector),
            name = js_string(name)
        );
        let value = self.cdp.evaluate(&expression).await?;
        Self::string_list(value, "attributes")
    }

    async fn rows(
        &mut self,
        row_selector: &str,
        fields: &[Vec<String>],
    ) -> Result<Vec<Vec<Option<String>>>, ScraperError> {
        let fields_json = serde_json::to_string(fields).map_err(|e| ScraperError::Protocol {
            method: "rows".to_string(),
            reason: e.to_string(),
        })?;
        let expression = format!(
            r"(() => {{
                const fields = {fields_json};
                return Array.from(document.querySelectorAll({sel})).map(row =>
                    fields.map(list => {{
                        for (const s of list) {{
                            const el = row.querySelector(s);
                            if (el) return (el.innerText || el.textContent || '').trim();
                        }}
                        return null;
                    }}));
            }})()",
            sel = js_string(row_selector)
        );
        let value = self.cdp.evaluate(&expression).await?;
        serde_json::from_value(value).map_err(|e| ScraperError::Protocol {
            method: "rows".to_string(),
            reason: format!("unexpected script result: {e}"),
        })
    }

    async fn click(&mut self, selector: &str, index: usize) -> Result<(), ScraperError> {
        let expression = format!(
            r"(() => {{
                const el = document.querySelectorAll({sel})[{index}];
                if (!el || !el.isConnected) return null;
                el.scrollIntoView({{ block: 'center', inline: 'center' }});
                const r = el.getBoundingClientRect();
                return {{ x: r.left + r.width / 2, y: r.top + r.height / 2 }};
            }})()",
            sel = js_string(selector)
        );
        let point = self.cdp.evaluate(&expression).await?;
        let (Some(x), Some(y)) = (
            point.get("x").and_then(Value::as_f64),
            point.get("y").and_then(Value::as_f64),
        ) else {
            return Err(ScraperError::StaleElement {
                selector: selector.to_string(),
                index,
            });
        };

        self.cdp.dispatch_mouse_event("mouseMoved", x, y).await?;
        self.cdp.dispatch_mouse_event("mousePressed", x, y).await?;
        self.cdp.dispatch_mouse_event("mouseReleased", x, y).await?;
        Ok(())
    }

    async fn screenshot(&mut self) -> Result<Vec<u8>, ScraperError> {
        self.cdp.screenshot().await
    }

    async fn close(&mut self) -> Result<(), ScraperError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        if let Err(e) = self.cdp.send_command("Browser.close", json!({})).await {
            tracing::debug!(error = %e, "Browser.close failed, killing process");
        }
        let _ = self.child.kill().await;
        if let Err(e) = tokio::fs::remove_dir_all(&self.profile_dir).await {
            tracing::debug!(
                dir = %self.profile_dir.display(),
                error = %e,
                "could not remove browser profile dir"
            );
        }
        Ok(())
    }
}

impl Drop for ChromePage {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        // Only reached for pages dropped without `close`.
        let _ = self.child.start_kill();
        let dir = std::mem::take(&mut self.profile_dir);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    let _ = tokio::fs::remove_dir_all(dir).await;
                });
            }
            Err(_) => {
                let _ = std::fs::remove_dir_all(dir);
            }
        }
    }
}

/// Serialises `s` as a JavaScript string literal.
fn js_string(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}

fn build_browser_args(port: u16, profile_dir: &Path, settings: &ChromeSettings) -> Vec<String> {
    let mut args = vec![
        format!("--remote-debugging-port={port}"),
        format!("--user-data-dir={}", profile_dir.display()),
        "--no-first-run".to_string(),
        "--no-default-browser-check".to_string(),
        "--disable-background-networking".to_string(),
        "--disable-extensions".to_string(),
        "--disable-sync".to_string(),
        "--disable-translate".to_string(),
        "--metrics-recording-only".to_string(),
        "--password-store=basic".to_string(),
        "--window-size=1280,900".to_string(),
    ];
    if settings.headless {
        args.push("--headless=new".to_string());
    }
    if let Some(ua) = &settings.user_agent {
        args.push(format!("--user-agent={ua}"));
    }
    args.push("about:blank".to_string());
    args
}

/// Searches the usual install locations, then `PATH`.
#[must_use]
pub fn find_browser_binary() -> Option<PathBuf> {
    let candidates: &[&str] = if cfg!(target_os = "macos") {
        &[
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
        ]
    } else if cfg!(target_os = "windows") {
        &[
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
        ]
    } else {
        &[
            "google-chrome",
            "google-chrome-stable",
            "chromium",
            "chromium-browser",
            "/usr/bin/google-chrome",
            "/usr/bin/chromium",
        ]
    };

    candidates.iter().find_map(|candidate| {
        let path = Path::new(candidate);
        if path.is_absolute() {
            path.exists().then(|| path.to_path_buf())
        } else {
            which::which(candidate).ok()
        }
    })
}

async fn find_free_port() -> Result<u16, ScraperError> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    Ok(listener.local_addr()?.port())
}

/// DevTools HTTP discovery endpoints (`/json/version`, `/json/list`).
pub mod discovery {
    use std::time::{Duration, Instant};

    use serde::Deserialize;

    use crate::error::ScraperError;
    use crate::retry::retry_with_backoff;

    #[derive(Debug, Deserialize)]
    struct VersionInfo {
        #[serde(rename = "webSocketDebuggerUrl")]
        ws_url: String,
    }

    #[derive(Debug, Deserialize)]
    struct TargetInfo {
        #[serde(rename = "type")]
        kind: String,
        #[serde(rename = "webSocketDebuggerUrl")]
        ws_url: Option<String>,
    }

    /// Polls `{base}/json/version` until it reports a browser WebSocket URL.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::Session`] if the endpoint is not ready within
    /// `timeout`.
    pub async fn wait_for_devtools(
        client: &reqwest::Client,
        base: &str,
        timeout: Duration,
    ) -> Result<String, ScraperError> {
        let url = format!("{base}/json/version");
        let started = Instant::now();
        loop {
            if let Ok(resp) = client.get(&url).send().await {
                if let Ok(info) = resp.json::<VersionInfo>().await {
                    return Ok(info.ws_url);
                }
            }
            if started.elapsed() >= timeout {
                return Err(ScraperError::Session {
                    reason: format!(
                        "DevTools endpoint {url} not ready after {}ms",
                        timeout.as_millis()
                    ),
                });
            }
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
    }

    /// Returns the WebSocket URL of the first `page` target in `{base}/json/list`.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::DevToolsNotReady`] when no page target appears
    /// after a few retries.
    pub async fn page_ws_url(client: &reqwest::Client, base: &str) -> Result<String, ScraperError> {
        let url = format!("{base}/json/list");
        let url = url.as_str();
        retry_with_backoff(5, 50, || async move {
            let targets: Vec<TargetInfo> = client.get(url).send().await?.json().await?;
            targets
                .into_iter()
                .filter(|t| t.kind == "page")
                .find_map(|t| t.ws_url)
                .ok_or_else(|| ScraperError::DevToolsNotReady {
                    endpoint: url.to_string(),
                })
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(headless: bool, user_agent: Option<&str>) -> ChromeSettings {
        ChromeSettings {
            executable: None,
            headless,
            user_agent: user_agent.map(str::to_string),
            launch_timeout: Duration::from_secs(1),
            command_timeout: Duration::from_secs(1),
        }
    }

    #[test]
    fn args_include_port_profile_and_headless() {
        let args = build_browser_args(9333, Path::new("/tmp/p"), &settings(true, None));
        assert!(args.contains(&"--remote-debugging-port=9333".to_string()));
        assert!(args.contains(&"--user-data-dir=/tmp/p".to_string()));
        assert!(args.contains(&"--headless=new".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("about:blank"));
    }

    #[test]
    fn headed_mode_omits_headless_flag_and_sets_user_agent() {
        let args = build_browser_args(9333, Path::new("/tmp/p"), &settings(false, Some("UA/1")));
        assert!(!args.iter().any(|a| a.starts_with("--headless")));
        assert!(args.contains(&"--user-agent=UA/1".to_string()));
    }

    #[test]
    fn js_string_escapes_quotes() {
        assert_eq!(js_string("a[href='x\"y']"), r#""a[href='x\"y']""#);
    }

    #[test]
    fn configured_executable_is_used_verbatim() {
        let mut s = settings(true, None);
        s.executable = Some(PathBuf::from("/opt/chrome/chrome"));
        let browser = ChromeBrowser::new(s).unwrap();
        assert_eq!(browser.executable(), Path::new("/opt/chrome/chrome"));
    }

    #[tokio::test]
    async fn free_port_is_nonzero() {
        assert_ne!(find_free_port().await.unwrap(), 0);
    }
}

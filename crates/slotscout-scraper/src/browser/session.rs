//! Browser session manager: page-level primitives with timeouts, ordered
//! selector fallbacks, human-like pacing and anti-automation detection.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use chrono::Utc;
use slotscout_core::AppConfig;

use super::page::{Browser, Page};
use crate::error::ScraperError;
use crate::selectors::SelectorSet;

#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Budget for the first attempt of a confirming wait.
    pub wait_timeout: Duration,
    /// The single retry waits `wait_timeout * retry_multiplier`.
    pub retry_multiplier: u32,
    pub poll_interval: Duration,
    pub pacing_min: Duration,
    pub pacing_max: Duration,
}

impl SessionSettings {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            wait_timeout: Duration::from_millis(config.wait_timeout_ms),
            retry_multiplier: config.wait_retry_multiplier.max(1),
            poll_interval: Duration::from_millis(config.poll_interval_ms.max(1)),
            pacing_min: Duration::from_millis(config.pacing_min_ms),
            pacing_max: Duration::from_millis(config.pacing_max_ms),
        }
    }
}

/// A located element: which selector of the set matched, its position among
/// that selector's matches, and its text at the time it was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElementHandle {
    pub selector: String,
    pub index: usize,
    pub label: String,
}

pub struct Session {
    page: Box<dyn Page>,
    settings: SessionSettings,
    block_markers: SelectorSet,
}

impl Session {
    /// Opens a page and loads `url`.
    ///
    /// The page is released before returning an error.
    ///
    /// # Errors
    ///
    /// [`ScraperError::Session`] if the browser cannot start or the first
    /// navigation fails; [`ScraperError::Blocked`] if the landing page is an
    /// anti-automation challenge.
    pub async fn open(
        browser: &dyn Browser,
        url: &str,
        settings: SessionSettings,
        block_markers: SelectorSet,
    ) -> Result<Self, ScraperError> {
        let page = browser.open().await?;
        let mut session = Self {
            page,
            settings,
            block_markers,
        };
        match session.navigate(url).await {
            Ok(()) => Ok(session),
            Err(e) => {
                if let Err(close_err) = session.page.close().await {
                    tracing::debug!(error = %close_err, "closing page after failed open");
                }
                match e {
                    ScraperError::Blocked { .. } | ScraperError::Session { .. } => Err(e),
                    other => Err(ScraperError::Session {
                        reason: format!("initial navigation to {url} failed: {other}"),
                    }),
                }
            }
        }
    }

    /// Loads `url`, then checks for anti-automation markers.
    pub async fn navigate(&mut self, url: &str) -> Result<(), ScraperError> {
        pace(self.pacing_pause()).await;
        self.page.goto(url).await?;
        self.check_not_blocked().await
    }

    pub async fn current_url(&mut self) -> Result<String, ScraperError> {
        self.page.current_url().await
    }

    /// Every element matched by the first selector of `set` that matches
    /// anything. Never returns an empty list.
    ///
    /// # Errors
    ///
    /// [`ScraperError::NotFound`] once the set is exhausted.
    pub async fn find_all(&mut self, set: &SelectorSet) -> Result<Vec<ElementHandle>, ScraperError> {
        for selector in set.iter() {
            let texts = self.page.texts(selector).await?;
            if !texts.is_empty() {
                return Ok(texts
                    .into_iter()
                    .enumerate()
                    .map(|(index, label)| ElementHandle {
                        selector: selector.to_string(),
                        index,
                        label,
                    })
                    .collect());
            }
        }
        Err(ScraperError::NotFound {
            selectors: set.to_string(),
        })
    }

    pub async fn find(&mut self, set: &SelectorSet) -> Result<ElementHandle, ScraperError> {
        self.find_all(set)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ScraperError::NotFound {
                selectors: set.to_string(),
            })
    }

    /// Polls until some selector of `set` matches or `timeout` elapses.
    pub async fn wait_for_all(
        &mut self,
        set: &SelectorSet,
        timeout: Duration,
    ) -> Result<Vec<ElementHandle>, ScraperError> {
        let started = Instant::now();
        loop {
            match self.find_all(set).await {
                Ok(found) => return Ok(found),
                Err(ScraperError::NotFound { .. }) => {}
                Err(e) => return Err(e),
            }
            let waited = started.elapsed();
            if waited >= timeout {
                return Err(ScraperError::Timeout {
                    selectors: set.to_string(),
                    waited_ms: u64::try_from(waited.as_millis()).unwrap_or(u64::MAX),
                });
            }
            tokio::time::sleep(self.settings.poll_interval.min(timeout - waited)).await;
        }
    }

    pub async fn wait_for(
        &mut self,
        set: &SelectorSet,
        timeout: Duration,
    ) -> Result<ElementHandle, ScraperError> {
        self.wait_for_all(set, timeout)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ScraperError::NotFound {
                selectors: set.to_string(),
            })
    }

    /// Waits with the configured budget; on timeout retries exactly once
    /// with `wait_timeout * retry_multiplier`.
    pub async fn wait_confirmed(
        &mut self,
        set: &SelectorSet,
    ) -> Result<Vec<ElementHandle>, ScraperError> {
        match self.wait_for_all(set, self.settings.wait_timeout).await {
            Err(ScraperError::Timeout { .. }) => {
                let longer = self.settings.wait_timeout * self.settings.retry_multiplier;
                tracing::debug!(
                    selectors = %set,
                    retry_ms = u64::try_from(longer.as_millis()).unwrap_or(u64::MAX),
                    "wait timed out, retrying once with a longer budget"
                );
                self.wait_for_all(set, longer).await
            }
            other => other,
        }
    }

    /// Clicks `handle` after a pacing pause. If the element went stale it is
    /// re-resolved once by label and clicked again. The resulting page is
    /// checked for block markers.
    pub async fn click(&mut self, handle: &ElementHandle) -> Result<(), ScraperError> {
        pace(self.pacing_pause()).await;
        let clicked = match self.page.click(&handle.selector, handle.index).await {
            Err(ScraperError::StaleElement { selector, index }) => {
                let fresh = self.page.texts(&handle.selector).await?;
                let Some(position) = fresh.iter().position(|t| *t == handle.label) else {
                    return Err(ScraperError::StaleElement { selector, index });
                };
                tracing::debug!(
                    selector = %handle.selector,
                    old_index = index,
                    new_index = position,
                    "element went stale, re-resolved by label"
                );
                self.page.click(&handle.selector, position).await
            }
            other => other,
        };
        clicked?;
        self.check_not_blocked().await
    }

    /// Text of every element matched by the first matching selector of `set`.
    pub async fn read_text(&mut self, set: &SelectorSet) -> Result<Vec<String>, ScraperError> {
        Ok(self
            .find_all(set)
            .await?
            .into_iter()
            .map(|h| h.label)
            .collect())
    }

    pub async fn read_attribute(
        &mut self,
        handle: &ElementHandle,
        name: &str,
    ) -> Result<Option<String>, ScraperError> {
        let values = self.page.attributes(&handle.selector, name).await?;
        Ok(values.get(handle.index).cloned().flatten())
    }

    /// Attribute `name` for each handle, in order.
    pub async fn read_attributes(
        &mut self,
        handles: &[ElementHandle],
        name: &str,
    ) -> Result<Vec<Option<String>>, ScraperError> {
        let mut by_selector: Vec<(String, Vec<Option<String>>)> = Vec::new();
        let mut out = Vec::with_capacity(handles.len());
        for handle in handles {
            let position = match by_selector.iter().position(|(s, _)| *s == handle.selector) {
                Some(p) => p,
                None => {
                    let values = self.page.attributes(&handle.selector, name).await?;
                    by_selector.push((handle.selector.clone(), values));
                    by_selector.len() - 1
                }
            };
            out.push(by_selector[position].1.get(handle.index).cloned().flatten());
        }
        Ok(out)
    }

    /// Reads grid rows using the first row selector with at least one match.
    /// Returns the row selector used alongside one cell list per row, in the
    /// order of `fields`.
    pub async fn read_rows(
        &mut self,
        rows: &SelectorSet,
        fields: &[&SelectorSet],
    ) -> Result<(String, Vec<Vec<Option<String>>>), ScraperError> {
        let field_lists: Vec<Vec<String>> = fields.iter().map(|f| f.as_slice().to_vec()).collect();
        for selector in rows.iter() {
            let found = self.page.rows(selector, &field_lists).await?;
            if !found.is_empty() {
                return Ok((selector.to_string(), found));
            }
        }
        Err(ScraperError::NotFound {
            selectors: rows.to_string(),
        })
    }

    /// Fails with [`ScraperError::Blocked`] when any block marker is present.
    pub async fn check_not_blocked(&mut self) -> Result<(), ScraperError> {
        let markers: Vec<String> = self.block_markers.iter().map(str::to_string).collect();
        for marker in markers {
            if !self.page.texts(&marker).await?.is_empty() {
                let url = self.page.current_url().await.unwrap_or_default();
                return Err(ScraperError::Blocked { url, marker });
            }
        }
        Ok(())
    }

    /// Writes a PNG of the current viewport to `dir` and returns its path.
    pub async fn save_failure_screenshot(
        &mut self,
        dir: &Path,
        label: &str,
    ) -> Result<PathBuf, ScraperError> {
        let png = self.page.screenshot().await?;
        tokio::fs::create_dir_all(dir).await?;
        let safe: String = label
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        let path = dir.join(format!("{safe}-{}.png", Utc::now().format("%Y%m%dT%H%M%S%3f")));
        tokio::fs::write(&path, png).await?;
        Ok(path)
    }

    /// Releases the page and its browser process.
    pub async fn close(mut self) -> Result<(), ScraperError> {
        self.page.close().await
    }

    /// Random pause in `[pacing_min, pacing_max]`.
    fn pacing_pause(&self) -> Duration {
        let min = self.settings.pacing_min;
        let max = self.settings.pacing_max.max(min);
        min + (max - min).mul_f64(rand::random::<f64>())
    }
}

async fn pace(pause: Duration) {
    if !pause.is_zero() {
        tokio::time::sleep(pause).await;
    }
}

//! Scripted in-memory browser for driving flows without Chrome.
//!
//! A `FakeSite` maps URLs to static views. Each view lists the elements a
//! selector matches and the pre-read cells of grid rows (in the order time,
//! price, duration, provider, resource). Navigating to an unknown URL shows
//! an empty page, so every wait on it times out.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use slotscout_core::{FlowKind, VenueConfig, DEFAULT_PROFILE_ID};
use slotscout_scraper::{
    Browser, Field, Page, RunnerSettings, ScraperError, SelectorProfile, SessionSettings,
};

/// First (preferred) selector of a default-profile field.
pub fn sel(field: Field) -> String {
    SelectorProfile::builtin_default()
        .get(field)
        .iter()
        .next()
        .map(str::to_string)
        .expect("default profile has selectors for every field")
}

#[derive(Debug, Clone)]
pub struct FakeElement {
    pub text: String,
    pub attrs: HashMap<String, String>,
}

pub fn el(text: &str) -> FakeElement {
    FakeElement {
        text: text.to_string(),
        attrs: HashMap::new(),
    }
}

pub fn el_attr(text: &str, name: &str, value: &str) -> FakeElement {
    let mut e = el(text);
    e.attrs.insert(name.to_string(), value.to_string());
    e
}

pub fn row(cells: [Option<&str>; 5]) -> Vec<Option<String>> {
    cells.iter().map(|c| c.map(str::to_string)).collect()
}

#[derive(Debug, Clone, Default)]
pub struct FakeView {
    elements: HashMap<String, Vec<FakeElement>>,
    rows: HashMap<String, Vec<Vec<Option<String>>>>,
}

impl FakeView {
    pub fn with(mut self, field: Field, elements: Vec<FakeElement>) -> Self {
        self.elements.insert(sel(field), elements);
        self
    }

    pub fn with_selector(mut self, selector: &str, elements: Vec<FakeElement>) -> Self {
        self.elements.insert(selector.to_string(), elements);
        self
    }

    pub fn with_rows(mut self, rows: Vec<Vec<Option<String>>>) -> Self {
        let texts = rows
            .iter()
            .map(|r| el(r.first().cloned().flatten().as_deref().unwrap_or("")))
            .collect();
        self.elements.insert(sel(Field::SlotRows), texts);
        self.rows.insert(sel(Field::SlotRows), rows);
        self
    }

    /// A resource, `dates` bookable day cells and a slot grid, i.e. one
    /// complete direct-booking page.
    pub fn direct_booking(resource: &str, dates: &[&str], rows: Vec<Vec<Option<String>>>) -> Self {
        Self::default()
            .with(Field::Resources, vec![el(resource)])
            .with(
                Field::Dates,
                dates
                    .iter()
                    .map(|d| el_attr(d, "data-date", d))
                    .collect(),
            )
            .with_rows(rows)
    }
}

#[derive(Debug, Default)]
pub struct Counters {
    pub opened: AtomicUsize,
    pub closed: AtomicUsize,
}

#[derive(Default)]
pub struct FakeSite {
    views: HashMap<String, FakeView>,
    /// Grid reads never return for these URLs.
    hang_rows: HashSet<String>,
    /// (selector, index) pairs whose first click reports a stale element.
    stale_once: Mutex<HashSet<(String, usize)>>,
    /// (selector, index) pairs whose click brings up a challenge page.
    challenge_after: HashSet<(String, usize)>,
    pub clicks: Mutex<Vec<(String, usize)>>,
    pub counters: Counters,
    pub panic_on_open: bool,
}

impl FakeSite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, view: FakeView) -> Self {
        self.views.insert(url.to_string(), view);
        self
    }

    pub fn hang_rows_at(mut self, url: &str) -> Self {
        self.hang_rows.insert(url.to_string());
        self
    }

    pub fn stale_once(self, field: Field, index: usize) -> Self {
        self.stale_once
            .lock()
            .unwrap()
            .insert((sel(field), index));
        self
    }

    pub fn challenge_after_click(mut self, field: Field, index: usize) -> Self {
        self.challenge_after.insert((sel(field), index));
        self
    }

    pub fn panicking(mut self) -> Self {
        self.panic_on_open = true;
        self
    }

    pub fn into_browser(self) -> (Arc<FakeBrowser>, Arc<FakeSite>) {
        let site = Arc::new(self);
        (
            Arc::new(FakeBrowser {
                site: Arc::clone(&site),
            }),
            site,
        )
    }

    pub fn opened(&self) -> usize {
        self.counters.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.counters.closed.load(Ordering::SeqCst)
    }

    pub fn clicked(&self) -> Vec<(String, usize)> {
        self.clicks.lock().unwrap().clone()
    }
}

pub struct FakeBrowser {
    site: Arc<FakeSite>,
}

#[async_trait]
impl Browser for FakeBrowser {
    async fn open(&self) -> Result<Box<dyn Page>, ScraperError> {
        assert!(!self.site.panic_on_open, "scripted browser crash");
        self.site.counters.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakePage {
            site: Arc::clone(&self.site),
            url: "about:blank".to_string(),
            view: FakeView::default(),
            closed: false,
        }))
    }
}

pub struct FakePage {
    site: Arc<FakeSite>,
    url: String,
    view: FakeView,
    closed: bool,
}

#[async_trait]
impl Page for FakePage {
    async fn goto(&mut self, url: &str) -> Result<(), ScraperError> {
        self.url = url.to_string();
        self.view = self.site.views.get(url).cloned().unwrap_or_default();
        Ok(())
    }

    async fn current_url(&mut self) -> Result<String, ScraperError> {
        Ok(self.url.clone())
    }

    async fn texts(&mut self, selector: &str) -> Result<Vec<String>, ScraperError> {
        Ok(self
            .view
            .elements
            .get(selector)
            .map(|els| els.iter().map(|e| e.text.clone()).collect())
            .unwrap_or_default())
    }

    async fn attributes(
        &mut self,
        selector: &str,
        name: &str,
    ) -> Result<Vec<Option<String>>, ScraperError> {
        Ok(self
            .view
            .elements
            .get(selector)
            .map(|els| els.iter().map(|e| e.attrs.get(name).cloned()).collect())
            .unwrap_or_default())
    }

    async fn rows(
        &mut self,
        row_selector: &str,
        _fields: &[Vec<String>],
    ) -> Result<Vec<Vec<Option<String>>>, ScraperError> {
        if self.site.hang_rows.contains(&self.url) {
            std::future::pending::<()>().await;
        }
        Ok(self.view.rows.get(row_selector).cloned().unwrap_or_default())
    }

    async fn click(&mut self, selector: &str, index: usize) -> Result<(), ScraperError> {
        let key = (selector.to_string(), index);
        if self.site.stale_once.lock().unwrap().remove(&key) {
            return Err(stale(selector, index));
        }
        let present = self
            .view
            .elements
            .get(selector)
            .is_some_and(|els| index < els.len());
        if !present {
            return Err(stale(selector, index));
        }
        if self.site.challenge_after.contains(&key) {
            self.view
                .elements
                .insert(sel(Field::BlockMarkers), vec![el("")]);
        }
        self.site.clicks.lock().unwrap().push(key);
        Ok(())
    }

    async fn screenshot(&mut self) -> Result<Vec<u8>, ScraperError> {
        Ok(b"\x89PNG\r\n\x1a\nfake".to_vec())
    }

    async fn close(&mut self) -> Result<(), ScraperError> {
        if !self.closed {
            self.closed = true;
            self.site.counters.closed.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

fn stale(selector: &str, index: usize) -> ScraperError {
    ScraperError::StaleElement {
        selector: selector.to_string(),
        index,
    }
}

/// Short waits and no pacing so timeouts resolve in milliseconds.
pub fn fast_session() -> SessionSettings {
    SessionSettings {
        wait_timeout: Duration::from_millis(30),
        retry_multiplier: 2,
        poll_interval: Duration::from_millis(5),
        pacing_min: Duration::ZERO,
        pacing_max: Duration::ZERO,
    }
}

pub fn fast_runner(days_ahead: u32) -> RunnerSettings {
    RunnerSettings {
        session: fast_session(),
        run_timeout: Duration::from_secs(5),
        days_ahead,
        screenshot_dir: None,
    }
}

pub fn venue(id: &str, url: &str, kind: Option<FlowKind>) -> VenueConfig {
    VenueConfig {
        venue_id: id.to_string(),
        url: url.to_string(),
        flow_kind: kind,
        selector_profile_id: DEFAULT_PROFILE_ID.to_string(),
    }
}

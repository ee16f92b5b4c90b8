use async_trait::async_trait;

use crate::error::ScraperError;

/// Low-level driver for one browser page.
///
/// Selectors are plain CSS. Element lists are in document order, and an
/// `index` always refers to a position in the list `texts(selector)` would
/// return at that moment.
#[async_trait]
pub trait Page: Send {
    async fn goto(&mut self, url: &str) -> Result<(), ScraperError>;

    async fn current_url(&mut self) -> Result<String, ScraperError>;

    /// Trimmed visible text of every element matching `selector`.
    async fn texts(&mut self, selector: &str) -> Result<Vec<String>, ScraperError>;

    /// Attribute `name` of every element matching `selector`.
    async fn attributes(
        &mut self,
        selector: &str,
        name: &str,
    ) -> Result<Vec<Option<String>>, ScraperError>;

    /// For every element matching `row_selector`, the text of the first
    /// descendant matching each field's selector list (or `None`).
    async fn rows(
        &mut self,
        row_selector: &str,
        fields: &[Vec<String>],
    ) -> Result<Vec<Vec<Option<String>>>, ScraperError>;

    /// Clicks the `index`-th match of `selector`. Fails with
    /// [`ScraperError::StaleElement`] when that element is gone.
    async fn click(&mut self, selector: &str, index: usize) -> Result<(), ScraperError>;

    /// PNG bytes of the current viewport.
    async fn screenshot(&mut self) -> Result<Vec<u8>, ScraperError>;

    /// Releases the page and its browser process. Idempotent.
    async fn close(&mut self) -> Result<(), ScraperError>;
}

/// Factory for isolated pages; one page per venue run.
#[async_trait]
pub trait Browser: Send + Sync {
    /// # Errors
    ///
    /// Returns [`ScraperError::Session`] when no page could be created.
    async fn open(&self) -> Result<Box<dyn Page>, ScraperError>;
}

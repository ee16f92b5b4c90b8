//! Venue catalog: which booking pages to scrape, which navigation flow each
//! one needs, and per-profile selector overrides.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

use crate::ConfigError;

/// Selector profile used when a venue does not name one.
pub const DEFAULT_PROFILE_ID: &str = "default";

/// Profile id -> logical field name -> ordered selector list.
pub type ProfileOverrides = BTreeMap<String, BTreeMap<String, Vec<String>>>;

/// Shape of navigation needed to reach a venue's time/price grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowKind {
    /// The landing page goes straight to resources and a calendar.
    DirectBooking,
    /// A service must be picked before resources are shown.
    ServiceMenu,
    /// A branch/location must be picked first; each branch is its own flow.
    MultiBranch,
}

impl FlowKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            FlowKind::DirectBooking => "direct-booking",
            FlowKind::ServiceMenu => "service-menu",
            FlowKind::MultiBranch => "multi-branch",
        }
    }

    /// Guess the flow kind from the shape of a booking URL.
    ///
    /// Looks at path segments, query keys/values and hash-route segments.
    /// Branch selection wins over service menus, which win over direct
    /// calendars. Returns `None` when nothing recognisable is present.
    #[must_use]
    pub fn infer_from_url(raw: &str) -> Option<Self> {
        const MULTI_BRANCH: &[&str] = &["select-city", "select-branch", "branches", "group"];
        const SERVICE_MENU: &[&str] = &["select-services", "services", "menu"];
        const DIRECT: &[&str] = &[
            "select-time",
            "select-master",
            "record",
            "booking",
            "book",
            "calendar",
            "schedule",
        ];

        let parsed = url::Url::parse(raw).ok()?;
        let mut tokens: Vec<String> = parsed
            .path_segments()
            .map(|segments| segments.map(str::to_lowercase).collect())
            .unwrap_or_default();
        for (key, value) in parsed.query_pairs() {
            tokens.push(key.to_lowercase());
            tokens.push(value.to_lowercase());
        }
        if let Some(fragment) = parsed.fragment() {
            tokens.extend(
                fragment
                    .split(['/', '?', '&', '='])
                    .filter(|s| !s.is_empty())
                    .map(str::to_lowercase),
            );
        }

        let has_any = |wanted: &[&str]| tokens.iter().any(|t| wanted.contains(&t.as_str()));

        if has_any(MULTI_BRANCH) {
            Some(FlowKind::MultiBranch)
        } else if has_any(SERVICE_MENU) {
            Some(FlowKind::ServiceMenu)
        } else if has_any(DIRECT) {
            Some(FlowKind::DirectBooking)
        } else {
            None
        }
    }
}

impl std::fmt::Display for FlowKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FlowKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "direct-booking" => Ok(FlowKind::DirectBooking),
            "service-menu" => Ok(FlowKind::ServiceMenu),
            "multi-branch" => Ok(FlowKind::MultiBranch),
            other => Err(format!("unknown flow kind '{other}'")),
        }
    }
}

/// Static descriptor for one venue. Immutable for the lifetime of the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VenueConfig {
    pub venue_id: String,
    pub url: String,
    /// `None` when the configured kind was missing or unrecognised and the
    /// URL did not match a known shape; the router fails such venues.
    pub flow_kind: Option<FlowKind>,
    pub selector_profile_id: String,
}

#[derive(Debug, Deserialize)]
struct VenueEntry {
    id: String,
    url: String,
    #[serde(default)]
    flow_kind: Option<String>,
    #[serde(default)]
    selector_profile: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VenuesFile {
    venues: Vec<VenueEntry>,
    #[serde(default)]
    selector_profiles: ProfileOverrides,
}

/// Resolved venue catalog.
#[derive(Debug, Clone, Default)]
pub struct VenueCatalog {
    pub venues: Vec<VenueConfig>,
    pub profile_overrides: ProfileOverrides,
    /// Non-fatal problems (e.g. an unrecognised flow kind) for the caller to log.
    pub warnings: Vec<String>,
}

impl VenueCatalog {
    #[must_use]
    pub fn venue(&self, venue_id: &str) -> Option<&VenueConfig> {
        self.venues.iter().find(|v| v.venue_id == venue_id)
    }
}

/// Load and validate the venue catalog from a YAML file.
///
/// # Errors
///
/// Returns `ConfigError` if the file cannot be read, parsed, or fails validation.
pub fn load_venues(path: &Path) -> Result<VenueCatalog, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::VenuesFileIo {
        path: path.display().to_string(),
        source: e,
    })?;
    parse_venues(&content)
}

/// Parse and validate a venue catalog from YAML text.
///
/// # Errors
///
/// Returns `ConfigError` if the YAML does not parse or fails validation.
pub fn parse_venues(yaml: &str) -> Result<VenueCatalog, ConfigError> {
    let file: VenuesFile = serde_yaml::from_str(yaml)?;
    resolve_catalog(file)
}

fn resolve_catalog(file: VenuesFile) -> Result<VenueCatalog, ConfigError> {
    let mut seen_ids = HashSet::new();
    let mut venues = Vec::with_capacity(file.venues.len());
    let mut warnings = Vec::new();

    for entry in file.venues {
        let venue_id = entry.id.trim().to_string();
        if venue_id.is_empty() {
            return Err(ConfigError::Validation(
                "venue id must be non-empty".to_string(),
            ));
        }
        if !seen_ids.insert(venue_id.clone()) {
            return Err(ConfigError::Validation(format!(
                "duplicate venue id: '{venue_id}'"
            )));
        }

        let parsed = url::Url::parse(entry.url.trim()).map_err(|e| {
            ConfigError::Validation(format!("venue '{venue_id}' has invalid url: {e}"))
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::Validation(format!(
                "venue '{venue_id}' url must be http(s), got '{}'",
                parsed.scheme()
            )));
        }

        let flow_kind = match entry.flow_kind.as_deref() {
            Some(raw) => match raw.parse::<FlowKind>() {
                Ok(kind) => Some(kind),
                Err(reason) => {
                    warnings.push(format!("venue '{venue_id}': {reason}"));
                    None
                }
            },
            None => {
                let inferred = FlowKind::infer_from_url(entry.url.trim());
                if inferred.is_none() {
                    warnings.push(format!(
                        "venue '{venue_id}': flow kind not set and url shape not recognised"
                    ));
                }
                inferred
            }
        };

        let selector_profile_id = entry
            .selector_profile
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| DEFAULT_PROFILE_ID.to_string());

        venues.push(VenueConfig {
            venue_id,
            url: entry.url.trim().to_string(),
            flow_kind,
            selector_profile_id,
        });
    }

    Ok(VenueCatalog {
        venues,
        profile_overrides: file.selector_profiles,
        warnings,
    })
}

#[cfg(test)]
#[path = "venues_test.rs"]
mod tests;

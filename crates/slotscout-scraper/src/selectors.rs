//! Selector profiles: per logical field, an ordered list of alternative CSS
//! selectors. The first selector that matches wins.

use std::collections::HashMap;
use std::str::FromStr;

use slotscout_core::{ProfileOverrides, DEFAULT_PROFILE_ID};

use crate::error::ScraperError;

const FIELD_COUNT: usize = 13;

/// Logical page fields a flow needs to locate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    Ready,
    BlockMarkers,
    BranchLinks,
    Services,
    Resources,
    Dates,
    SlotRows,
    EmptyGrid,
    SlotTime,
    SlotPrice,
    SlotDuration,
    SlotProvider,
    SlotResource,
}

impl Field {
    pub const ALL: [Field; FIELD_COUNT] = [
        Field::Ready,
        Field::BlockMarkers,
        Field::BranchLinks,
        Field::Services,
        Field::Resources,
        Field::Dates,
        Field::SlotRows,
        Field::EmptyGrid,
        Field::SlotTime,
        Field::SlotPrice,
        Field::SlotDuration,
        Field::SlotProvider,
        Field::SlotResource,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Field::Ready => "ready",
            Field::BlockMarkers => "block_markers",
            Field::BranchLinks => "branch_links",
            Field::Services => "services",
            Field::Resources => "resources",
            Field::Dates => "dates",
            Field::SlotRows => "slot_rows",
            Field::EmptyGrid => "empty_grid",
            Field::SlotTime => "slot_time",
            Field::SlotPrice => "slot_price",
            Field::SlotDuration => "slot_duration",
            Field::SlotProvider => "slot_provider",
            Field::SlotResource => "slot_resource",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl FromStr for Field {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace('-', "_");
        Field::ALL
            .into_iter()
            .find(|f| f.as_str() == wanted)
            .ok_or_else(|| format!("unknown selector field '{s}'"))
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered fallback selectors for one field.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SelectorSet(Vec<String>);

impl SelectorSet {
    #[must_use]
    pub fn new<I, S>(selectors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(selectors.into_iter().map(Into::into).collect())
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// `self`'s selectors followed by `other`'s, keeping order.
    #[must_use]
    pub fn union(&self, other: &SelectorSet) -> SelectorSet {
        let mut joined = self.0.clone();
        joined.extend(other.0.iter().filter(|s| !self.0.contains(s)).cloned());
        SelectorSet(joined)
    }
}

impl std::fmt::Display for SelectorSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0.join(", "))
    }
}

/// A complete field -> selector-set mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectorProfile {
    id: String,
    fields: [SelectorSet; FIELD_COUNT],
}

impl SelectorProfile {
    /// The built-in profile: framework `data-*` locators first, generic class
    /// names last.
    #[must_use]
    pub fn builtin_default() -> Self {
        let mut fields: [SelectorSet; FIELD_COUNT] = Default::default();
        for field in Field::ALL {
            fields[field.index()] = SelectorSet::new(default_selectors(field).iter().copied());
        }
        Self {
            id: DEFAULT_PROFILE_ID.to_string(),
            fields,
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn get(&self, field: Field) -> &SelectorSet {
        &self.fields[field.index()]
    }

    fn with_overrides(
        &self,
        id: &str,
        overrides: &std::collections::BTreeMap<String, Vec<String>>,
    ) -> Result<Self, ScraperError> {
        let mut profile = self.clone();
        profile.id = id.to_string();
        for (name, selectors) in overrides {
            let field = name
                .parse::<Field>()
                .map_err(|reason| ScraperError::InvalidProfile {
                    profile_id: id.to_string(),
                    reason,
                })?;
            let cleaned: Vec<String> = selectors
                .iter()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
            if cleaned.is_empty() {
                return Err(ScraperError::InvalidProfile {
                    profile_id: id.to_string(),
                    reason: format!("field '{field}' has no selectors"),
                });
            }
            profile.fields[field.index()] = SelectorSet(cleaned);
        }
        Ok(profile)
    }
}

fn default_selectors(field: Field) -> &'static [&'static str] {
    match field {
        Field::Ready => &["[data-booking-root]", "#app", "body"],
        Field::BlockMarkers => &[
            "iframe[src*='captcha']",
            "iframe[src*='hcaptcha']",
            "[data-captcha]",
            "#challenge-form",
            ".g-recaptcha",
        ],
        Field::BranchLinks => &[
            "[data-locator='branch-link']",
            "[data-branch-id] a",
            "a.branch-item",
            ".branches a",
        ],
        Field::Services => &[
            "[data-locator='service-item']",
            "[data-service-id]",
            ".service-item",
            ".services-list li",
        ],
        Field::Resources => &[
            "[data-locator='staff-item']",
            "[data-staff-id]",
            "[data-resource]",
            ".master-item",
            ".staff-item",
            ".resource-item",
        ],
        Field::Dates => &[
            "[data-locator='calendar-day']:not([data-disabled='true'])",
            "[data-date]:not(.disabled)",
            ".calendar-day.available",
            ".calendar-day:not(.disabled)",
        ],
        Field::SlotRows => &[
            "[data-locator='time-slot']",
            "[data-slot]",
            ".time-slot",
            ".slot-item",
        ],
        Field::EmptyGrid => &["[data-locator='no-slots']", ".no-slots", ".empty-slots"],
        Field::SlotTime => &["[data-locator='slot-time']", ".slot-time", ".time"],
        Field::SlotPrice => &["[data-locator='slot-price']", ".slot-price", ".price"],
        Field::SlotDuration => &[
            "[data-locator='slot-duration']",
            ".slot-duration",
            ".duration",
        ],
        Field::SlotProvider => &[
            "[data-locator='slot-master']",
            ".slot-master",
            ".master-name",
            ".staff-name",
        ],
        Field::SlotResource => &[
            "[data-locator='slot-resource']",
            ".slot-resource",
            ".resource-name",
        ],
    }
}

/// Resolved profiles keyed by id. Always contains `default`.
#[derive(Debug, Clone)]
pub struct ProfileRegistry {
    profiles: HashMap<String, SelectorProfile>,
}

impl Default for ProfileRegistry {
    fn default() -> Self {
        let default = SelectorProfile::builtin_default();
        Self {
            profiles: HashMap::from([(default.id.clone(), default)]),
        }
    }
}

impl ProfileRegistry {
    /// Merges each override over the built-in default. An override named
    /// `default` replaces the base that every other profile starts from.
    ///
    /// # Errors
    ///
    /// Returns [`ScraperError::InvalidProfile`] for unknown field names or
    /// empty selector lists.
    pub fn from_overrides(overrides: &ProfileOverrides) -> Result<Self, ScraperError> {
        let mut base = SelectorProfile::builtin_default();
        if let Some(default_overrides) = overrides.get(DEFAULT_PROFILE_ID) {
            base = base.with_overrides(DEFAULT_PROFILE_ID, default_overrides)?;
        }

        let mut profiles = HashMap::with_capacity(overrides.len() + 1);
        for (id, fields) in overrides {
            if id == DEFAULT_PROFILE_ID {
                continue;
            }
            profiles.insert(id.clone(), base.with_overrides(id, fields)?);
        }
        profiles.insert(base.id.clone(), base);
        Ok(Self { profiles })
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&SelectorProfile> {
        self.profiles.get(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.profiles.keys().map(String::as_str)
    }
}

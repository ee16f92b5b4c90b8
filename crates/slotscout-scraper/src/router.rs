//! Picks the flow for a venue and binds it to its selector profile.

use slotscout_core::{FlowKind, VenueConfig};

use crate::error::ScraperError;
use crate::flow::FlowMachine;
use crate::selectors::ProfileRegistry;

/// # Errors
///
/// [`ScraperError::UnsupportedVenue`] when the venue has no configured kind
/// and its URL shape was not recognised at load time.
pub fn select_flow(venue: &VenueConfig) -> Result<FlowKind, ScraperError> {
    venue.flow_kind.ok_or_else(|| ScraperError::UnsupportedVenue {
        venue_id: venue.venue_id.clone(),
        reason: format!("no flow kind configured and URL shape not recognised: {}", venue.url),
    })
}

/// # Errors
///
/// [`ScraperError::UnsupportedVenue`] for an unknown flow kind or selector
/// profile.
pub fn dispatch(
    venue: &VenueConfig,
    registry: &ProfileRegistry,
    days_ahead: u32,
) -> Result<FlowMachine, ScraperError> {
    let kind = select_flow(venue)?;
    let profile = registry
        .get(&venue.selector_profile_id)
        .ok_or_else(|| ScraperError::UnsupportedVenue {
            venue_id: venue.venue_id.clone(),
            reason: format!("unknown selector profile '{}'", venue.selector_profile_id),
        })?;
    Ok(FlowMachine::new(kind, profile.clone(), days_ahead))
}

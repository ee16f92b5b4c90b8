//! Venue booking flows as explicit state machines.
//!
//! Every step waits for its target with a single confirming retry, and every
//! failure is tagged with the state it happened in. Cancellation is checked
//! between steps.

mod branches;

use std::fmt;

use async_trait::async_trait;
use chrono::{Days, NaiveDate};
use slotscout_core::{BookingSlotCandidate, FlowKind};
use tokio_util::sync::CancellationToken;

use crate::browser::{ElementHandle, Session};
use crate::error::ScraperError;
use crate::selectors::{Field, SelectorProfile};

/// Where a flow is. Resources are identified by their visible label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowState {
    Start,
    ServiceSelected,
    ResourceSelected { resource: String },
    DateSelected { resource: String, offset: u32 },
    SlotsRead { resource: String, offset: u32 },
    Done,
}

impl fmt::Display for FlowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowState::Start => f.write_str("start"),
            FlowState::ServiceSelected => f.write_str("service-selected"),
            FlowState::ResourceSelected { resource } => write!(f, "resource-selected({resource})"),
            FlowState::DateSelected { resource, offset } => {
                write!(f, "date-selected({resource}, +{offset}d)")
            }
            FlowState::SlotsRead { resource, offset } => {
                write!(f, "slots-read({resource}, +{offset}d)")
            }
            FlowState::Done => f.write_str("done"),
        }
    }
}

/// Receives each grid of candidates as soon as it has been read.
#[async_trait]
pub trait GridConsumer: Send {
    async fn consume(&mut self, grid: Vec<BookingSlotCandidate>) -> Result<(), ScraperError>;
}

#[async_trait]
impl GridConsumer for Vec<BookingSlotCandidate> {
    async fn consume(&mut self, grid: Vec<BookingSlotCandidate>) -> Result<(), ScraperError> {
        self.extend(grid);
        Ok(())
    }
}

#[derive(Debug)]
pub struct BranchFailure {
    pub label: String,
    pub error: ScraperError,
}

/// How a completed flow went. Single-branch flows report one branch.
#[derive(Debug, Default)]
pub struct FlowReport {
    pub branches_ok: usize,
    pub branch_failures: Vec<BranchFailure>,
}

impl FlowReport {
    #[must_use]
    pub fn is_partial(&self) -> bool {
        !self.branch_failures.is_empty()
    }
}

/// Per-run inputs that are not part of the venue descriptor.
#[derive(Debug, Clone)]
pub struct FlowContext {
    pub venue_id: String,
    /// Day the run treats as offset zero.
    pub reference_date: NaiveDate,
    pub cancel: CancellationToken,
}

impl FlowContext {
    fn check_cancelled(&self) -> Result<(), ScraperError> {
        if self.cancel.is_cancelled() {
            Err(ScraperError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// A flow bound to its kind and resolved selector profile.
#[derive(Debug, Clone)]
pub struct FlowMachine {
    kind: FlowKind,
    profile: SelectorProfile,
    days_ahead: u32,
}

/// Field order of the cells returned by [`Session::read_rows`].
const CELL_FIELDS: [Field; 5] = [
    Field::SlotTime,
    Field::SlotPrice,
    Field::SlotDuration,
    Field::SlotProvider,
    Field::SlotResource,
];

impl FlowMachine {
    #[must_use]
    pub fn new(kind: FlowKind, profile: SelectorProfile, days_ahead: u32) -> Self {
        Self {
            kind,
            profile,
            days_ahead: days_ahead.max(1),
        }
    }

    #[must_use]
    pub fn kind(&self) -> FlowKind {
        self.kind
    }

    #[must_use]
    pub fn profile(&self) -> &SelectorProfile {
        &self.profile
    }

    /// Drives the flow on an already opened session, handing every grid to
    /// `consumer` as it is read.
    ///
    /// # Errors
    ///
    /// The first step failure of a single-branch flow, tagged with its state;
    /// for multi-branch flows, the last branch error when no branch succeeded.
    /// [`ScraperError::Cancelled`] when `ctx.cancel` fires between steps.
    pub async fn run(
        &self,
        session: &mut Session,
        ctx: &FlowContext,
        consumer: &mut dyn GridConsumer,
    ) -> Result<FlowReport, ScraperError> {
        match self.kind {
            FlowKind::DirectBooking | FlowKind::ServiceMenu => {
                self.run_single(session, self.kind, ctx, consumer).await?;
                Ok(FlowReport {
                    branches_ok: 1,
                    branch_failures: Vec::new(),
                })
            }
            FlowKind::MultiBranch => self.run_branches(session, ctx, consumer).await,
        }
    }

    /// Service menu or direct booking, starting from the current page.
    /// Walks every listed resource in turn. When the resource list has left
    /// the screen, the next one is reached by returning to the entry page.
    async fn run_single(
        &self,
        session: &mut Session,
        shape: FlowKind,
        ctx: &FlowContext,
        consumer: &mut dyn GridConsumer,
    ) -> Result<(), ScraperError> {
        let entry_url = session
            .current_url()
            .await
            .map_err(|e| e.in_state(FlowState::Start))?;

        let mut position = 0usize;
        loop {
            ctx.check_cancelled()?;
            let resources = if position == 0 {
                self.enter(session, shape, ctx).await?
            } else {
                match session.find_all(self.profile.get(Field::Resources)).await {
                    Ok(found) => found,
                    Err(ScraperError::NotFound { .. }) => {
                        session
                            .navigate(&entry_url)
                            .await
                            .map_err(|e| e.in_state(FlowState::Start))?;
                        self.enter(session, shape, ctx).await?
                    }
                    Err(e) => return Err(e.in_state(FlowState::Start)),
                }
            };
            let Some(resource) = resources.get(position) else {
                break;
            };

            let state = FlowState::ResourceSelected {
                resource: resource.label.clone(),
            };
            session
                .click(resource)
                .await
                .map_err(|e| e.in_state(FlowState::Start))?;
            tracing::debug!(venue = %ctx.venue_id, %state, "flow step");
            self.read_dates(session, ctx, consumer, &resource.label)
                .await?;
            position += 1;
        }

        let state = FlowState::Done;
        tracing::debug!(venue = %ctx.venue_id, %state, resources = position, "flow step");
        Ok(())
    }

    /// `Start` and, for service menus, `ServiceSelected`. Returns the
    /// resource list once it is on screen.
    async fn enter(
        &self,
        session: &mut Session,
        shape: FlowKind,
        ctx: &FlowContext,
    ) -> Result<Vec<ElementHandle>, ScraperError> {
        let mut state = FlowState::Start;

        if shape == FlowKind::ServiceMenu {
            ctx.check_cancelled()?;
            let service = self
                .confirm_first(session, Field::Services)
                .await
                .map_err(|e| e.in_state(&state))?;
            session.click(&service).await.map_err(|e| e.in_state(&state))?;
            state = FlowState::ServiceSelected;
            tracing::debug!(venue = %ctx.venue_id, %state, service = %service.label, "flow step");
        }

        ctx.check_cancelled()?;
        let set = self.profile.get(Field::Resources);
        let found = session
            .wait_confirmed(set)
            .await
            .map_err(|e| e.in_state(&state))?;
        if found.is_empty() {
            return Err(ScraperError::NotFound {
                selectors: set.to_string(),
            }
            .in_state(&state));
        }
        Ok(found)
    }

    /// Date and grid steps for the selected resource, one grid per day.
    async fn read_dates(
        &self,
        session: &mut Session,
        ctx: &FlowContext,
        consumer: &mut dyn GridConsumer,
        resource_label: &str,
    ) -> Result<(), ScraperError> {
        let mut state = FlowState::ResourceSelected {
            resource: resource_label.to_string(),
        };

        for offset in 0..self.days_ahead {
            ctx.check_cancelled()?;
            let dates = session
                .wait_confirmed(self.profile.get(Field::Dates))
                .await
                .map_err(|e| e.in_state(&state))?;
            let Some(cell) = dates.get(offset as usize) else {
                tracing::debug!(
                    venue = %ctx.venue_id,
                    offset,
                    available = dates.len(),
                    "no further bookable date"
                );
                break;
            };
            let raw_date = session
                .read_attribute(cell, "data-date")
                .await
                .map_err(|e| e.in_state(&state))?
                .or_else(|| Some(cell.label.clone()));
            session.click(cell).await.map_err(|e| e.in_state(&state))?;
            state = FlowState::DateSelected {
                resource: resource_label.to_string(),
                offset,
            };

            ctx.check_cancelled()?;
            let nominal_date = ctx
                .reference_date
                .checked_add_days(Days::new(u64::from(offset)))
                .unwrap_or(ctx.reference_date);
            let grid = self
                .read_grid(session, resource_label, raw_date, nominal_date)
                .await
                .map_err(|e| e.in_state(&state))?;
            state = FlowState::SlotsRead {
                resource: resource_label.to_string(),
                offset,
            };
            tracing::debug!(venue = %ctx.venue_id, %state, rows = grid.len(), "flow step");
            consumer.consume(grid).await.map_err(|e| e.in_state(&state))?;
        }
        Ok(())
    }

    async fn confirm_first(
        &self,
        session: &mut Session,
        field: Field,
    ) -> Result<ElementHandle, ScraperError> {
        let set = self.profile.get(field);
        session
            .wait_confirmed(set)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ScraperError::NotFound {
                selectors: set.to_string(),
            })
    }

    /// Waits for either slot rows or the empty-grid marker, then reads rows.
    async fn read_grid(
        &self,
        session: &mut Session,
        resource_label: &str,
        raw_date: Option<String>,
        nominal_date: NaiveDate,
    ) -> Result<Vec<BookingSlotCandidate>, ScraperError> {
        let rows = self.profile.get(Field::SlotRows);
        let empty = self.profile.get(Field::EmptyGrid);
        let first = session.wait_confirmed(&rows.union(empty)).await?;
        if first
            .first()
            .is_some_and(|h| empty.as_slice().contains(&h.selector))
        {
            return Ok(Vec::new());
        }

        let fields = CELL_FIELDS.map(|f| self.profile.get(f));
        let (row_selector, cells) = session.read_rows(rows, &fields).await?;
        let page_url = session.current_url().await?;

        Ok(cells
            .into_iter()
            .map(|row| {
                let cell = |i: usize| row.get(i).cloned().flatten();
                BookingSlotCandidate {
                    raw_time: cell(0),
                    raw_price: cell(1),
                    raw_duration: cell(2),
                    raw_provider: cell(3),
                    raw_resource_name: cell(4).or_else(|| Some(resource_label.to_string())),
                    raw_date: raw_date.clone(),
                    nominal_date,
                    source_selector: row_selector.clone(),
                    page_url: page_url.clone(),
                }
            })
            .collect())
    }
}

use slotscout_core::{ErrorKind, FlowKind};
use url::Url;

use super::{BranchFailure, FlowContext, FlowMachine, FlowReport, FlowState, GridConsumer};
use crate::browser::{ElementHandle, Session};
use crate::error::ScraperError;
use crate::selectors::Field;

enum BranchTarget {
    Url(String),
    /// No usable href; reached by clicking the link on the selection page.
    Click,
}

struct Branch {
    label: String,
    target: BranchTarget,
}

impl FlowMachine {
    /// Runs every branch listed on the selection page. One failing branch
    /// makes the report partial; only a total failure fails the flow.
    /// Cancellation and a block page end the flow at once.
    pub(super) async fn run_branches(
        &self,
        session: &mut Session,
        ctx: &FlowContext,
        consumer: &mut dyn GridConsumer,
    ) -> Result<FlowReport, ScraperError> {
        let start = FlowState::Start;
        ctx.check_cancelled()?;
        let links = session
            .wait_confirmed(self.profile.get(Field::BranchLinks))
            .await
            .map_err(|e| e.in_state(&start))?;
        let hrefs = session
            .read_attributes(&links, "href")
            .await
            .map_err(|e| e.in_state(&start))?;
        let selection_url = session.current_url().await.map_err(|e| e.in_state(&start))?;
        let branches = resolve_branches(&selection_url, &links, hrefs);
        tracing::info!(venue = %ctx.venue_id, branches = branches.len(), "branch selection page read");

        let mut report = FlowReport::default();
        for (i, branch) in branches.into_iter().enumerate() {
            ctx.check_cancelled()?;
            let result = self
                .run_branch(session, ctx, consumer, &branch, i, &selection_url)
                .await;
            match result {
                Ok(()) => report.branches_ok += 1,
                // Neither is confined to one branch: the whole run stops.
                Err(error) if matches!(error.kind(), ErrorKind::Cancelled | ErrorKind::Blocked) => {
                    return Err(error);
                }
                Err(error) => {
                    tracing::warn!(
                        venue = %ctx.venue_id,
                        branch = %branch.label,
                        error = %error,
                        "branch failed"
                    );
                    report.branch_failures.push(BranchFailure {
                        label: branch.label,
                        error,
                    });
                }
            }
        }

        if report.branches_ok == 0 {
            return Err(report
                .branch_failures
                .pop()
                .map_or_else(|| ScraperError::NotFound {
                    selectors: self.profile.get(Field::BranchLinks).to_string(),
                }, |f| f.error));
        }
        Ok(report)
    }

    async fn run_branch(
        &self,
        session: &mut Session,
        ctx: &FlowContext,
        consumer: &mut dyn GridConsumer,
        branch: &Branch,
        position: usize,
        selection_url: &str,
    ) -> Result<(), ScraperError> {
        let start = FlowState::Start;
        match &branch.target {
            BranchTarget::Url(url) => session.navigate(url).await?,
            BranchTarget::Click => {
                if position > 0 {
                    session.navigate(selection_url).await?;
                }
                let links = session
                    .wait_confirmed(self.profile.get(Field::BranchLinks))
                    .await
                    .map_err(|e| e.in_state(&start))?;
                let link = links
                    .iter()
                    .find(|h| h.label == branch.label)
                    .or_else(|| links.get(position))
                    .ok_or_else(|| ScraperError::StaleElement {
                        selector: self.profile.get(Field::BranchLinks).to_string(),
                        index: position,
                    })?;
                session.click(link).await.map_err(|e| e.in_state(&start))?;
            }
        }

        let shape = self.detect_shape(session).await.map_err(|e| e.in_state(&start))?;
        tracing::debug!(
            venue = %ctx.venue_id,
            branch = %branch.label,
            shape = shape.as_str(),
            "branch shape detected"
        );
        self.run_single(session, shape, ctx, consumer).await
    }

    /// Whichever of services or resources shows up first decides the shape.
    async fn detect_shape(&self, session: &mut Session) -> Result<FlowKind, ScraperError> {
        let services = self.profile.get(Field::Services);
        let either = services.union(self.profile.get(Field::Resources));
        let found = session.wait_confirmed(&either).await?;
        let is_service = found
            .first()
            .is_some_and(|h| services.as_slice().contains(&h.selector));
        Ok(if is_service {
            FlowKind::ServiceMenu
        } else {
            FlowKind::DirectBooking
        })
    }
}

/// Absolute branch URLs where the link carries a navigable href.
fn resolve_branches(
    selection_url: &str,
    links: &[ElementHandle],
    hrefs: Vec<Option<String>>,
) -> Vec<Branch> {
    let base = Url::parse(selection_url).ok();
    links
        .iter()
        .zip(hrefs.into_iter().chain(std::iter::repeat(None)))
        .map(|(link, href)| {
            let target = href
                .as_deref()
                .map(str::trim)
                .filter(|h| !h.is_empty() && !h.starts_with('#') && !h.starts_with("javascript:"))
                .and_then(|h| base.as_ref().and_then(|b| b.join(h).ok()))
                .map_or(BranchTarget::Click, |u| BranchTarget::Url(u.to_string()));
            Branch {
                label: link.label.clone(),
                target,
            }
        })
        .collect()
}

pub mod aggregate;
pub mod browser;
pub mod classify;
pub mod error;
pub mod flow;
mod retry;
pub mod router;
pub mod run;
pub mod scheduler;
pub mod selectors;
pub mod sink;

pub use aggregate::{aggregate, Aggregator};
pub use browser::{Browser, ChromeBrowser, ChromeSettings, ElementHandle, Page, Session, SessionSettings};
pub use error::ScraperError;
pub use flow::{FlowContext, FlowMachine, FlowReport, FlowState, GridConsumer};
pub use router::{dispatch, select_flow};
pub use run::{RunnerSettings, VenueRunner};
pub use scheduler::{Scheduler, SchedulerSettings};
pub use selectors::{Field, ProfileRegistry, SelectorProfile, SelectorSet};
pub use sink::{MemorySlotSink, OutcomeSink, SlotSink, TracingOutcomeSink};

//! Follow-up reminders: scheduling with validation, agent-scoped status transitions, and the
//! ranked customer list and due-today feed served to the browser client.
//!
//! Time only enters through [`Clock`], and "today" is always the calling agent's local day
//! expressed as a UTC [`DayWindow`], so both repository backends rank identically.

pub mod clock;
pub mod domain;
pub mod memory;
pub mod pagination;
pub mod postgres;
pub(crate) mod ranking;
pub mod repository;
pub mod router;
pub mod service;
pub mod validation;

#[cfg(test)]
mod tests;

pub use clock::{Clock, DayWindow, FixedClock, SystemClock};
pub use domain::{
    CustomerId, CustomerSummary, FollowUp, FollowUpDraft, FollowUpEntry, FollowUpId,
    FollowUpStatus, Lookup, StatusUpdate, TargetStatus,
};
pub use memory::InMemoryFollowUpRepository;
pub use pagination::{Page, PageRequest};
pub use postgres::PgFollowUpRepository;
pub use repository::{
    FollowUpQuery, FollowUpRepository, ListScope, Listing, RepositoryError, StatusChange,
};
pub use router::{follow_up_router, ListParams};
pub use service::{FollowUpError, FollowUpService};
pub use validation::{ValidationError, MAX_CONTENT_CHARS};

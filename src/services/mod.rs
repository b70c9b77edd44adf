//! Service layer: the query facade and the warmup pipeline.
//!
//! Both sit on top of the [`Store`](crate::repository::Store) and a
//! [`CampusSource`](crate::scrapers::CampusSource), so the CLI and tests can
//! drive them with either the live scrapers or a stub.

pub mod query;
pub mod singleflight;
pub mod warmup;

pub use query::{classify, Answer, Intent, QueryError, QueryService};
pub use singleflight::{FlightResult, SingleFlight};
pub use warmup::{
    parse_modules, Module, ModuleSummary, UnknownModule, Warmup, WarmupOptions, WarmupPlan,
    WarmupSummary, WarmupTask,
};

//! Domain model for the Avanzando project-management API.
//!
//! Entities mirror the relational tables one-to-one. Every derived value
//! (KPI status, risk exposure, resource allocation, subscription limits,
//! portfolio totals, heuristic predictions) is computed here by pure
//! functions so the HTTP and storage layers never duplicate the rules.

#[macro_use]
mod macros;

pub mod client;
pub mod dates;
pub mod document;
pub mod error;
pub mod export;
pub mod kpi;
pub mod patch;
pub mod portfolio;
pub mod prediction;
pub mod project;
pub mod resource;
pub mod risk;
pub mod settlement;
pub mod subscription;
pub mod user;

pub use error::{CoreError, CoreResult};

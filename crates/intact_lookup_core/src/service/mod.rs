//! Lookup use-case services.
//!
//! # Responsibility
//! - Map finder-style calls onto specifications and plans.
//! - Keep callers decoupled from plan building and SQL execution.

pub mod lookup_service;

pub use lookup_service::{LookupService, XrefQuery};

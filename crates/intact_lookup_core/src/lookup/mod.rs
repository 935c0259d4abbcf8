//! Caller-facing lookup intent.
//!
//! # Responsibility
//! - Describe which entities to find and how to disambiguate the concept.
//! - Reject contradictory requests before any query is planned.

pub mod spec;

//! # signage-domain
//!
//! Pure domain model for the signage playback orchestrator.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, time of day
//! - Define the **Schedule** (zones × time slots) and the **Settings** document
//! - Define **Page configuration** per display region
//! - Define **Queue items** and their stable keys
//! - Define **Automation rules** and rule selection
//! - Define **Pairing state** and **push events**
//! - Contain all invariant enforcement and domain logic
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;

pub mod automation;
pub mod pairing;
pub mod push;
pub mod queue;
pub mod schedule;
pub mod settings;

//! Core types shared across the engine.
//!
//! Currently this is the [`MeetError`] taxonomy. Fallible APIs in this crate
//! return `anyhow::Result`; distinguished failure modes that callers need to
//! react to (run exclusivity, source-load failures, the dirty-tree removal
//! gate) are surfaced as `MeetError` variants and matched with
//! `downcast_ref::<MeetError>()`.

pub mod error;

pub use error::MeetError;

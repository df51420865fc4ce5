#![doc = "daily-status-core: core logic library for daily-status."]

//! Keeps one shared markdown status page up to date. Each contributor owns a
//! region of the page delimited by invisible anchor lines; a run classifies
//! their open work, renders it into a draft, lets them edit it, splices the
//! result into their region and publishes the page through git.
//!
//! # Usage
//! The CLI crate wires real adapters into [`synchronise::synchronise`]. Tests
//! use the `mockall` mocks exported from [`contract`] behind the
//! `test-export-mocks` feature.

pub mod classify;
pub mod compose;
pub mod config;
pub mod contract;
pub mod draft;
pub mod error;
pub mod git;
pub mod io;
pub mod item;
pub mod region;
pub mod sync;
pub mod synchronise;
pub mod template;

pub use error::{DailyStatusError, Result};

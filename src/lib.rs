//! prepweek: a weekly production planner for a single kitchen.
//!
//! Preparation tasks sit on a Monday–Friday grid split into shifts. The
//! plan is kept in one SQLite key/value entry and rewritten whole after
//! every change, and a polling loop raises an alert when each task starts
//! and finishes cooking.

#[macro_use]
extern crate prettytable;

pub mod alerts;
pub mod clock;
pub mod config;
pub mod error;
pub mod export;
pub mod model;
pub mod storage;
pub mod store;
pub mod timecalc;
pub mod view;

pub use error::{PlannerError, Result};

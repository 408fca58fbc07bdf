//! Core types and trait definitions for Vaani.
//!
//! Vaani lets a user prove control of a mobile number with a one-time code,
//! receive a bearer credential, and vote on geographically-scoped concerns.
//!
//! This crate is deliberately free of HTTP and database dependencies. Storage
//! backends implement the traits in [`store`]; the outer layers depend on the
//! abstractions, never on a concrete backend.

pub mod auth;
pub mod concern;
pub mod error;
pub mod identity;
pub mod leaderboard;
pub mod passcode;
pub mod store;
pub mod vote;

pub use error::{Error, Result};

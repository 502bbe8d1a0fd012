//! # fleetreport-server
//!
//! HTTP server library for fleetreport.
//!
//! This library provides the API handlers and state management for the
//! report endpoints.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

pub mod api;
pub mod logging;
pub mod state;

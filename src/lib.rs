//! Camera event relay
//!
//! This library provides the core functionality for the event-relay daemon,
//! which filters detection notifications from a camera NVR application and
//! uploads them to a remote monitoring API with retry.

pub mod config;
pub mod host;
pub mod models;
pub mod pipeline;
pub mod services;

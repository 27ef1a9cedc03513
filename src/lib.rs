//! # SolarLink
//!
//! `solarlink` is the client side of a solar-tracker monitoring dashboard. It
//! keeps a STOMP session over a web-socket open to the plant backend, feeds
//! live sensor readings into an in-memory dashboard state and sends tracker
//! commands back while the session is up.
//!
//! ## Core Modules
//!
//! - `channel`: The telemetry channel: connect, subscribe, deliver in order, reconnect.
//! - `stomp`: STOMP frame encoding and decoding.
//! - `transport`: The web-socket link the channel runs over.
//! - `telemetry`: Sensor and command records plus the dashboard built on the channel.
//! - `auth`: The signed-in session and which views it may open.
//! - `config`: Loads settings from file and environment.
//! - `utils`: Error types and tracing setup.

pub mod auth;
pub mod channel;
pub mod config;
pub mod stomp;
pub mod telemetry;
pub mod transport;
pub mod utils;

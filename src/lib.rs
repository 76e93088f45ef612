//! Samples a sensor at a fixed rate and streams every reading to browsers
//! over a websocket.

pub mod broadcaster;
pub mod config;
pub mod externals;
pub mod models;
pub mod tasks;
pub mod telemetry;

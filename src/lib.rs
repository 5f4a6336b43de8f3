// src/lib.rs
pub mod types;
pub mod config;
pub mod series;
pub mod calc;
pub mod providers;
pub mod updater;
pub mod publishing;
pub mod telemetry;

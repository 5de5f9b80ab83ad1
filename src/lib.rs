//! Terminal viewer for job listing CSV files with a persistent "applied"
//! marker per job.

pub mod actions;
pub mod columns;
pub mod controller;
pub mod dataset;
pub mod domain;
pub mod filter;
pub mod inputter;
pub mod model;
pub mod parser;
pub mod projection;
pub mod store;
pub mod ui;

pub use domain::{AppConfig, JTError, Message};

//! Domain models

pub mod metrics;
pub mod plan;
pub mod run;
pub mod service;

//! HTTP façade

pub mod error;
pub mod handlers;
pub mod serve;
pub mod state;

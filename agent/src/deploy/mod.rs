//! Deployment module

pub mod fsm;
pub mod health;
pub mod orchestrator;
pub mod planner;

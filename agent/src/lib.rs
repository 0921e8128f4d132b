//! Kube-Garden deployment agent library
//!
//! Plans service deployments, executes them step by step against CI, Kubernetes
//! and metrics backends, and promotes or rolls back canaries based on health.

pub mod app;
pub mod catalog;
pub mod deploy;
pub mod errors;
pub mod filesys;
pub mod logs;
pub mod models;
pub mod server;
pub mod storage;
pub mod store;
pub mod tools;
pub mod utils;

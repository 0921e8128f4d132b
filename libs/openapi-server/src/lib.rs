//! Wire models for the Kube-Garden agent HTTP API.

pub mod models;

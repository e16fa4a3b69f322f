//! policyset - declarative policy set reconciliation
//!
//! Keeps a remote orchestration service's policy set (ordered policies with
//! settings and typed filters, plus delivery group associations) converged
//! on a declared target state.

pub mod cli;
pub mod config;
pub mod logging;
pub mod model;
pub mod reconciler;
pub mod remote;

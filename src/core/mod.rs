//! Core infrastructure shared by the decision and build phases

pub mod config;
pub mod lock;
pub mod output;
pub mod runtime;

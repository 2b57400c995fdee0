//! Terminal shell for the chapter aggregator.
pub mod cli;
pub mod commands;
pub mod effects;
pub mod logging;
pub mod persistence;
pub mod session;
pub mod sources;

pub mod categorize;
pub mod config;
pub mod control;
pub mod logging;
pub mod session;
pub mod tokenstore;

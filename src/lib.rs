// Library exports for the kiro2api daemon supervisor

pub mod cli;
pub mod config;
pub mod daemon;
pub mod error;
pub mod logging;
pub mod logs;
pub mod service;

//! Plot API service library.
//!
//! This module exposes the internal modules for testing purposes.

pub mod cache;
pub mod config;
pub mod coords;
pub mod data;
pub mod decomposer;
pub mod export;
pub mod handlers;
pub mod metrics;
pub mod plotters;
pub mod service;
pub mod state;

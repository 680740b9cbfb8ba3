//! Bulk, concurrent transfer of files between a local directory tree and a
//! Swift / Cloud Files object-storage container.

pub mod auth;
pub mod config;
pub mod context;
pub mod core;
pub mod error;
pub mod logging;
pub mod store;

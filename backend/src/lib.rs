pub mod analysis;
pub mod classifier;
pub mod config;
pub mod cors;
pub mod demo;
pub mod error;
pub mod loader;
pub mod routes;
pub mod storage;

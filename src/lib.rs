pub mod aggregate;
pub mod base;
pub mod cache;
pub mod config;
pub mod error;
pub mod fetch;
pub mod geo;
pub mod output;
pub mod provider;
pub mod scoring;
pub mod types;

pub mod app;
pub mod config;
pub mod domain;
pub mod download;
pub mod error;
pub mod output;
pub mod registry;
pub mod report;
pub mod search;
pub mod store;

pub mod bing;
pub mod classify;
pub mod collector;
pub mod config;
pub mod dataset;
pub mod domain;
pub mod downloader;
pub mod error;
pub mod store;

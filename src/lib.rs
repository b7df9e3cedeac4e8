pub mod config;
pub mod download;
pub mod error;
pub mod query;
pub mod summary;
pub mod transfer;
pub mod visibility;

pub mod catalog;
pub mod concurrency;
pub mod config;
pub mod database;
pub mod error;
pub mod storage;
pub mod transaction;
pub mod tuple;

pub use config::Config;
pub use database::Database;
pub use error::{Error, Result};

// src/lib.rs

pub mod db;
pub mod http;
pub mod webdiplomacy;
pub mod repositories;
pub mod services;
pub mod tasks;
pub mod platforms;

pub use db::Database;
pub use svetlana_common::error::Error;
pub use http::{DefaultHttpClient, HttpClient};

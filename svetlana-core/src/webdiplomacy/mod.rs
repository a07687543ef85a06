// File: src/webdiplomacy/mod.rs
//
// Everything that knows about WebDiplomacy boards: where they live, how to
// download them, how to read them and what phase a read board is in.

pub mod links;
pub mod fetcher;
pub mod parser;
pub mod classifier;

pub use links::{BoardLinks, DEFAULT_BASE_URL};
pub use fetcher::{BackoffPolicy, BoardFetcher};
pub use parser::parse;
pub use classifier::{classify, classify_at};

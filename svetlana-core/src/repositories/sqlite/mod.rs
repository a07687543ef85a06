pub mod follows;

pub use follows::SqliteFollowRepository;

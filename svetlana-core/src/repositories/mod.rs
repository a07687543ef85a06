pub mod sqlite;

pub use sqlite::SqliteFollowRepository;
pub use svetlana_common::traits::repository_traits::FollowRepository;

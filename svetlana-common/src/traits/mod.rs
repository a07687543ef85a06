pub mod repository_traits;
pub mod sink_traits;

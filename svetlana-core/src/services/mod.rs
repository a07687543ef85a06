pub mod message_catalog;
pub mod notification_engine;
pub mod command_service;

pub use notification_engine::NotificationEngine;
pub use command_service::{CommandResponse, CommandService};

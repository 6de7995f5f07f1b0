pub mod db;
pub mod discord;
pub mod memory;

pub use db::DbAdapter;
pub use discord::{DiscordGateway, DiscordHandler};
pub use memory::InMemorySurveyRepository;

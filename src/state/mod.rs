pub mod database;
pub mod store;

pub use database::BotDatabase;
pub use store::{create_shared_entity_store, EntityStore, SharedEntityStore};

pub mod guild;
pub mod interaction;

pub use guild::{handle_guild_create, handle_guild_delete};
pub use interaction::handle_interaction;

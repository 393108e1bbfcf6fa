pub mod giveaway_manager;
pub mod grant_manager;
pub mod ticket_manager;

pub use giveaway_manager::{create_shared_giveaway_manager, SharedGiveawayManager};
pub use grant_manager::{create_shared_grant_manager, SharedGrantManager};
pub use ticket_manager::{create_shared_ticket_manager, SharedTicketManager};

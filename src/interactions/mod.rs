pub mod custom_id;
pub mod outcome;

pub use custom_id::{ComponentAction, ModalAction};
pub use outcome::{Ack, ModalRequest, Outcome};

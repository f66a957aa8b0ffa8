pub mod actor;
pub mod session;
pub mod writer;

pub use actor::{SessionActor, SessionActorArgs};
pub use session::ChatSession;
pub use writer::*;

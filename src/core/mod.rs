pub mod circular_buffer;
pub mod codec;
pub mod dispatch;
pub mod frame;
pub mod health;
pub mod identity;
pub mod keepalive;
pub mod observers;
pub mod protocol;
pub mod reconnect;
pub mod types;

pub use circular_buffer::*;

pub use codec::*;
pub use dispatch::*;
pub use frame::*;
pub use health::*;
pub use identity::*;
pub use keepalive::*;
pub use observers::*;
pub use protocol::*;
pub use reconnect::*;
pub use types::*;

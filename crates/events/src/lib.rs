//! Real-time fan-out protocol.
//!
//! - [`Room`]: tenant-, project- and user-scoped subscription groups
//! - [`ClientFrame`] / [`ServerFrame`]: the JSON frames exchanged over the socket
//! - [`RoomEnvelope`]: a server frame addressed to one room (the backplane unit)
//! - [`Backplane`]: pub/sub transport between server instances
//! - [`RoomSet`]: the rooms one verified connection has joined

pub mod bus;
pub mod envelope;
pub mod frame;
pub mod in_memory_bus;
pub mod room;
pub mod session;

pub use bus::{Backplane, BackplaneError, Subscription};
pub use envelope::RoomEnvelope;
pub use frame::{ClientFrame, ServerEvent, ServerFrame};
pub use in_memory_bus::InMemoryBackplane;
pub use room::Room;
pub use session::{JoinError, RoomSet};

//! Listeners and the dispatcher that drives them

pub mod dispatcher;
pub mod listener;

pub use dispatcher::{ChannelId, Dispatcher};
pub use listener::{Listener, ListenerState, Protocol};

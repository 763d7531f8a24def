//! Event demultiplexing: registrations, lifetime controllers and the
//! demultiplexer that fans events out to them.

mod controller;
mod demultiplexer;
mod registration;

pub use controller::{Controller, Ctrl};
pub use demultiplexer::{ChannelError, EventDemultiplexer};
pub use registration::{
    Handler, HandlerFuture, Listener, Middleware, Registration, RegistrationError,
};

mod controller;
mod session;
mod session_command;
mod session_event;

pub use controller::*;
pub(crate) use session::*;
pub(crate) use session_command::*;
pub use session_event::*;

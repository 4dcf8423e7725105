mod channel;
mod config;
mod error;
mod media;
mod negotiation;
mod session;
mod signaling;
mod transport;

pub use channel::*;
pub use config::*;
pub use error::*;
pub use media::*;
pub use negotiation::*;
pub use session::{SessionController, SessionEvent, SessionSnapshot};
pub use signaling::*;
pub use transport::*;

mod channel_link;
mod signaling_link;

pub use channel_link::*;
pub use signaling_link::*;

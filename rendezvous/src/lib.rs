pub use rendezvous_core::model::PeerId;

pub mod model {
    pub use rendezvous_core::model::*;
    pub use rendezvous_core::utils;
}

#[cfg(feature = "session")]
pub mod session {
    pub use rendezvous_session::*;
}

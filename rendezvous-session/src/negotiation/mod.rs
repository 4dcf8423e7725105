mod candidate_buffer;
mod negotiator;

pub use candidate_buffer::*;
pub use negotiator::*;

mod priority;
mod status;

pub use priority::*;
pub use status::*;

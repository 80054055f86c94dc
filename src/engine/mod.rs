// Engine: session pool and range streaming.

pub mod plan;
pub mod pool;
pub mod session;
pub mod stats;
pub mod streamer;

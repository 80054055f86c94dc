// Chunk sources: the HTTP platform gateway and an in-memory backend.

pub mod http_source;
pub mod memory_source;
pub mod traits;

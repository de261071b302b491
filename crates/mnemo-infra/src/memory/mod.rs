//! In-process repository implementations backed by `DashMap`.
//!
//! Used by tests and by embedders that keep memory for a single process
//! lifetime. Values are cloned on read, so no map guard is ever held across
//! an `.await`.

pub mod conversation;
pub mod entity;

pub use conversation::InMemoryConversationRepository;
pub use entity::InMemoryEntityRepository;

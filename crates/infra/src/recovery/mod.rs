//! Recovery-store implementations (the saga's durable checkpoint).

pub mod file;
pub mod memory;

pub use file::FileRecoveryStore;
pub use memory::InMemoryRecoveryStore;

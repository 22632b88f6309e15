mod memory;
mod persistent;
mod reclaim;

pub use memory::MemoryStateStore;
pub use persistent::{PersistentStateStore, DATABASE_FILE_NAME};
pub use reclaim::{ReclaimHandle, ReclaimReport};

pub mod locks;
pub mod memory;
pub mod store;

pub use locks::SchedulingLocks;
pub use memory::InMemoryStore;
pub use store::{ChangeSet, SchedulingStore, SessionSchedule, SlotBookings, StoreError, StoreResult};

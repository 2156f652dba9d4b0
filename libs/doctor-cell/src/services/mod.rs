pub mod doctor;
pub mod recurrence;
pub mod resize;
pub mod session;
pub mod slots;

pub use doctor::DoctorService;
pub use recurrence::RecurrenceService;
pub use resize::{Edge, ResizePlan, ResizePlanner};
pub use session::SessionService;
pub use slots::{SlotAllocator, SlotTiling};

pub mod booking;
pub mod conflict;
pub mod lifecycle;

pub use booking::AppointmentService;
pub use conflict::SlotConflictService;
pub use lifecycle::AppointmentLifecycleService;

pub mod cleaner;
pub mod context;
pub mod maintenance;
pub mod scheduler;

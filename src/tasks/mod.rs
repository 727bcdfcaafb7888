pub mod scheduler_core;
pub mod timers;

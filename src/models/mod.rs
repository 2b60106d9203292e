pub mod event;
pub mod job;

pub mod calendar_event;
pub mod calendar_token;
pub mod candidate;
pub mod email;
pub mod job;

pub mod analysis_service;
pub mod calendar_service;
pub mod email_service;
pub mod ingest_service;
pub mod job_events;
pub mod job_service;
pub mod pipeline;
pub mod ranking;

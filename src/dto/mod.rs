pub mod calendar_dto;
pub mod email_dto;
pub mod job_dto;

//! Import pipeline services

pub mod batch_writer;
pub mod csv_parser;
pub mod import_processor;
pub mod import_store;
pub mod job_events;
pub mod running_jobs;

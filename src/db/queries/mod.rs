//! Database queries

pub mod contact;
pub mod import_job;
pub mod notification;

//! Type definitions

pub mod contact;
pub mod import_job;
pub mod notification;

pub use contact::*;
pub use import_job::*;
pub use notification::*;

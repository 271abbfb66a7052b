//! Data models

pub mod teacher;
pub mod student;
pub mod prediction;

pub use teacher::*;
pub use student::*;
pub use prediction::*;

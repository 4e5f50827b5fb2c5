//! External collaborators

pub mod storage;

pub use storage::{FileStorage, LocalFileStorage};

//! Issue rows for display and export.

pub mod export;
pub mod extract;
pub mod pdf;
pub mod sort;
pub mod summary;

//! Application services layer.

pub mod archive;
pub mod error;
pub mod listing;
pub mod pagination;
pub mod repos;

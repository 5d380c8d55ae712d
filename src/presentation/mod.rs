//! Serializable response shapes.

pub mod views;

//! Lectern: a read service for published blog posts.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
pub mod presentation;

//! REST API Handlers

pub mod admin;
pub mod cleanup;
pub mod files;

//! Command handlers

pub mod build;

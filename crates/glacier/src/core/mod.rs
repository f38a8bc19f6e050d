//! Core engine settings

pub mod config;

//! Response models for the picam HTTP API

pub mod models;

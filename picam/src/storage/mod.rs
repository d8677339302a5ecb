//! Persistent state: settings file and capture directory

pub mod captures;
pub mod settings;

//! Command implementations

pub mod check;
pub mod config;
pub mod forward;
pub mod history;
pub mod sms;
pub mod stats;
pub mod token;

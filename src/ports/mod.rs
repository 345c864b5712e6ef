//! Port traits at the configuration and persistence seams.

pub mod config_port;
pub mod report_store;

//! Data Transfer Objects for coordinator communication
//!
//! Bodies sent to and received from the coordinator. Field names follow the
//! coordinator's wire format.

pub mod completion;
pub mod particle;

#![cfg_attr(not(test), no_std)]

//! Platform-independent core of the focus enforcer: sensor debouncing,
//! the focus-session state machine, link supervision and the backend
//! message contract.

pub mod clock;
pub mod config;
pub mod device;
pub mod link;
pub mod protocol;
pub mod render;
pub mod sensors;
pub mod session;
pub mod telemetry;

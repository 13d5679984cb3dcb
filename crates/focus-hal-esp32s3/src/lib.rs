#![no_std]

//! ESP32-S3 board support for the focus enforcer: clock, sensor lines,
//! character display and the Wi-Fi/WebSocket link.

pub mod input;
pub mod network;
pub mod platform;

//! Subsystem modules for Memory Machine.

#[cfg(feature = "plugin-chat")]
pub mod chat;
pub mod comms;
pub mod memory;
#[cfg(feature = "gmail-app")]
pub mod tools;

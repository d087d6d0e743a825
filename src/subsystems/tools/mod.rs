//! Tools: integrations with outside services.

pub mod gmail;

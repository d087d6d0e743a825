// Library root. Binaries live in src/main.rs and src/bin/.

pub mod config;
pub mod error;
pub mod llm;
pub mod logger;
pub mod subsystems;

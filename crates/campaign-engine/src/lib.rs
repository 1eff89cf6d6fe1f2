pub mod config;
pub mod content;
pub mod llm;
pub mod session;

pub mod admin;
pub mod config;
pub mod engine;
pub mod models;
pub mod notifier;
pub mod scheduler;
pub mod source;
pub mod window;

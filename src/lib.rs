pub mod config;
pub mod context;
pub mod models;
pub mod services;
pub mod settings;
pub mod utils;

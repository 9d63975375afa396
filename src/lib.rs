pub mod app;
pub mod clock;
pub mod config;
pub mod errors;
pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod services;
pub mod types;
pub mod validator;

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod models;
pub mod openapi;
pub mod provider;
pub mod repository;
pub mod routes;
pub mod services;
pub mod state;

pub use routes::app_router;
pub use state::{build_state, AppState};

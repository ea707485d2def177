// src/lib.rs

pub mod attempt;
pub mod config;
pub mod error;
pub mod handlers;
pub mod insights;
pub mod models;
pub mod openapi;
pub mod reporting;
pub mod room;
pub mod routes;
pub mod state;
pub mod store;
pub mod utils;

pub use routes::create_router;

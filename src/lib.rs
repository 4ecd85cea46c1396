pub mod audit;
pub mod auth;
pub mod config;
pub mod contracts;
pub mod db;
pub mod error;
pub mod models;
pub mod reminders;
pub mod routes;
pub mod schema;
pub mod settings;
pub mod state;
pub mod storage;

pub mod api;
pub mod auth;
pub mod client;
pub mod config;
pub mod db;
pub mod docs;
pub mod model;
pub mod models;
pub mod routes;
pub mod workflow;

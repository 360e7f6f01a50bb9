pub mod challenge;
pub mod errors;
pub mod models;
pub mod service;

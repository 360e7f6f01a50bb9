pub mod errors;
pub mod lifecycle;
pub mod models;
pub mod ports;
pub mod service;

pub mod bootstrap;
pub mod config;
pub mod domain;
pub mod outbound;

pub use domain::auth;
pub use domain::user;
pub use outbound::repositories;

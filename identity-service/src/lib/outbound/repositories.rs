pub mod user;

pub use user::FileUserRepository;

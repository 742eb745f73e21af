pub mod error;
pub mod model;
pub mod password;
pub mod repository;

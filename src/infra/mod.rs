pub mod argon2_scheme;
pub mod json_store;

pub mod books;
pub mod error;
pub mod library;
pub mod store;
pub mod users;

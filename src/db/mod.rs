mod connection;

pub use connection::{create_pool, DbPool};

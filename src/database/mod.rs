/// Connection pool and migrations
pub mod connection;
/// Row types and their persistence helpers
pub mod models;
/// Storage traits consumed by the booking core and their SQLite implementation
pub mod store;

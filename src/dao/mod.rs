/// Database model definitions.
pub mod models;
/// Party persistence behind a single repository interface.
pub mod party_store;
/// Storage abstraction layer for database operations.
pub mod storage;

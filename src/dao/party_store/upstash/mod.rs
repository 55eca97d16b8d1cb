mod config;
mod error;
mod store;

pub use config::UpstashConfig;
pub use error::UpstashDaoError;
pub use store::UpstashPartyStore;

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod session;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

pub use api::{ApiClient, MaintenanceBackend};
pub use config::Config;
pub use error::{ClientError, ClientResult};
pub use services::LifecycleService;
pub use session::Session;

pub mod auth_service;
pub mod cache_service;
pub mod filter_service;
pub mod image_service;
pub mod lifecycle_service;

pub use auth_service::AuthService;
pub use cache_service::{RequestCache, SnapshotScope};
pub use filter_service::{technician_view, RequestFilter, StatusFilter};
pub use lifecycle_service::LifecycleService;

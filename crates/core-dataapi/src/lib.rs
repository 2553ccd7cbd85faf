pub mod aws;
pub mod error;
pub mod models;
pub mod service;
pub mod settings;

pub use error::{DataApiError, DataApiResult};
pub use models::*;
pub use service::DataApiService;
pub use settings::{DataSourceSettings, ManagedSecret};

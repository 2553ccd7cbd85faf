pub mod backoff;
pub mod cancel;
pub mod connection;
pub mod decoder;
pub mod driver;
pub mod error;
pub mod models;
pub mod poller;
pub mod rows;
pub mod statement;

#[cfg(test)]
pub mod tests;

pub use connection::{AsyncDb, Connection};
pub use driver::Driver;
pub use error::{DecodeError, DriverError, DriverResult};
pub use models::{Interruption, QueryContext, QueryStatus};
pub use rows::Rows;

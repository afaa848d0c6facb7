pub mod client;
pub mod error;
pub mod filter;
pub mod flavors;
pub mod global_config;
pub mod models;
pub mod paths;
pub mod stack_io;
pub mod store;
pub mod validation;

pub use client::Client;
pub use error::{Result, StoreError};
pub use global_config::GlobalConfiguration;
pub use models::ComponentType;

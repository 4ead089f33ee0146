pub mod accounts;
pub mod broker;
pub mod config;
pub mod db;
pub mod error;
pub mod identity;
pub mod oauth_utils;
pub mod server;
pub mod toolkits;
pub(crate) mod upstream;
pub(crate) mod utils;

pub use error::ToolkitError;

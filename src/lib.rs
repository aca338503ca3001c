pub mod config;
pub mod dom;
pub mod engine;
pub mod error;
pub mod net;
pub mod page;
pub mod render;

pub use config::UsherConfig;
pub use error::{Result, UsherError};

pub mod cache;
pub mod fetch;
pub mod store;
pub mod summarize;

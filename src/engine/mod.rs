pub mod background;
pub mod host;
pub mod message;
pub mod pipeline;

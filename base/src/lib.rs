pub mod datetime;
pub mod error;
pub mod id_generator;
pub mod logging;

pub static APP_NAME: &str = "flowdesk";

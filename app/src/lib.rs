pub mod app;
pub mod module;

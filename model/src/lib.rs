pub mod data;
pub mod event;
pub mod identity;

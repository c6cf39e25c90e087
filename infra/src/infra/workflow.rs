pub mod event;
pub mod rdb;
pub mod rows;

pub mod alert;
pub mod log;
pub mod user;

pub mod activity;
pub mod session;
pub mod user;

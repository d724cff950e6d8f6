pub mod activity_tracker;
pub mod auth_reconciler;
pub mod health_service;
pub mod route_guard;
pub mod session_store;
pub mod warmup_service;

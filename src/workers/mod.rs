pub mod session_sweep;
pub mod warmup;

pub use session_sweep::SessionSweepWorker;
pub use warmup::WarmupWorker;

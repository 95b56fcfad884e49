pub mod cache;
pub mod config;
pub mod memory;
pub mod sim;
pub mod trace;

#[cfg(feature = "stat")]
pub mod stat;

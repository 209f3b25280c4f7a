pub mod config;
pub mod error;
pub mod games;
pub mod hooks;
pub mod net;
pub mod progress;

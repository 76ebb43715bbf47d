pub mod application;
pub mod cli;
pub mod config;
pub mod domain;
pub mod storage;

pub use application::{EngineError, ErrorKind, LedgerCoordinator};
pub use config::EngineConfig;
pub use domain::*;
pub use storage::Repository;

//! Player statistics cache backing the profile page: a locally persisted,
//! time-bounded copy of Riot ranked standing and recent matches.

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod riot;
pub mod service;
pub mod stats;

pub use error::AppError;

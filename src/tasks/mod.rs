//! Background Tasks Module
//!
//! Contains background tasks that run periodically during server operation.
//!
//! # Tasks
//! - Sweeper: drops expired and over-capacity ephemeral entries

mod sweeper;

pub use sweeper::spawn_sweeper;

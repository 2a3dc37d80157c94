//! Concrete worker implementations.

mod command;

pub use command::{CommandWorker, CommandWorkerBuilder};

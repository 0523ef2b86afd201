mod command;
mod runner;

pub use command::Command;
pub use runner::{OutputMode, init_logging, run, run_with_output};

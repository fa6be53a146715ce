//! Running the toolchain and the produced program.

mod output;
mod runner;

pub use output::{CapturedOutput, OutputSink, StdioSink, Stream};
pub use runner::{ProgramExit, SystemRunner, ToolOutput, ToolRunner, command_line, run_checked};

//! Program synthesis and the build pipeline.
//!
//! A cell goes through materialization (cell text to a minimal program),
//! declaration parsing, a tentative merge with the committed declarations,
//! rendering of the merged program, import resolution and compilation. Only a
//! successful compile commits the merge; see [`crate::Session::run_pipeline`].

pub mod diagnostics;
mod materialize;
mod pipeline;
mod render;

pub use diagnostics::{Location, SourceMap};
pub use materialize::{
    CellProgram, ENTRY_MARKERS, EmittedLine, LineMap, LineSink, Materialized, SkipLines, is_entry_marker,
    materialize, write_cell_program,
};
pub use pipeline::ProgramCursor;
pub use render::{RenderedProgram, render_program, write_program};

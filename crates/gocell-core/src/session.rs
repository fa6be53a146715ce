//! Session state: the committed declarations and everything a cell needs to
//! build against them.

use crate::config::SessionConfig;
use crate::decls::{DeclKey, Declarations};
use crate::directives::{Directive, parse_directives};
use crate::error::Result;
use crate::execute::{OutputSink, ProgramExit, Stream, SystemRunner, ToolRunner};
use crate::parse::{DeclParser, TopLevelScanner};
use crate::paths::WorkDir;

/// Outcome of a successfully built cell.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CellReport {
    /// How the program ended; `None` if the cell did not build anything.
    pub exit: Option<ProgramExit>,
    /// Keys contributed by the cell, now part of the committed declarations.
    pub committed: Vec<DeclKey>,
}

/// One notebook session.
///
/// Cells run one at a time; every operation that touches the working
/// directory takes `&mut self`.
pub struct Session {
    pub(crate) config: SessionConfig,
    pub(crate) work_dir: WorkDir,
    pub(crate) decls: Declarations,
    pub(crate) parser: Box<dyn DeclParser>,
    pub(crate) runner: Box<dyn ToolRunner>,
}

impl Session {
    /// Create a session using the system toolchain.
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the working directory cannot be created.
    pub fn new(config: SessionConfig) -> Result<Self> {
        Self::with_collaborators(config, Box::new(TopLevelScanner::new()), Box::new(SystemRunner::new()))
    }

    /// Create a session with a custom parser and tool runner.
    ///
    /// # Arguments
    ///
    /// * `config` - Session settings; `config.work_dir` of `None` selects a
    ///   temporary directory removed with the session
    /// * `parser` - Splits generated programs into declarations
    /// * `runner` - Runs `go`, `goimports` and the produced binary
    ///
    /// # Errors
    ///
    /// Returns `Error::Io` if the working directory cannot be created.
    pub fn with_collaborators(
        config: SessionConfig,
        parser: Box<dyn DeclParser>,
        runner: Box<dyn ToolRunner>,
    ) -> Result<Self> {
        let work_dir = match &config.work_dir {
            Some(dir) => WorkDir::create(dir, &config.package)?,
            None => WorkDir::temporary(&config.package)?,
        };
        tracing::debug!(
            work_dir = %work_dir.root().display(),
            package = %config.package,
            "session created"
        );
        Ok(Self {
            config,
            work_dir,
            decls: Declarations::new(),
            parser,
            runner,
        })
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn work_dir(&self) -> &WorkDir {
        &self.work_dir
    }

    /// The committed declarations.
    pub fn declarations(&self) -> &Declarations {
        &self.decls
    }

    /// Apply the cell's directives, then build and run what remains.
    pub fn execute_cell<S: AsRef<str>>(&mut self, lines: &[S], sink: &dyn OutputSink) -> Result<CellReport> {
        let cell = parse_directives(lines)?;
        for directive in &cell.directives {
            self.apply(directive, sink)?;
        }
        if cell.covers(lines) {
            tracing::debug!(directives = cell.directives.len(), "nothing to build");
            return Ok(CellReport::default());
        }
        self.run_pipeline(lines, &cell.skip, sink)
    }

    fn apply(&mut self, directive: &Directive, sink: &dyn OutputSink) -> Result<()> {
        tracing::debug!(?directive, "applying directive");
        match directive {
            Directive::Args(args) => self.config.args = args.clone(),
            Directive::AutoGet(enabled) => self.config.auto_get = *enabled,
            Directive::Reset => {
                tracing::info!(dropped = self.decls.len(), "declarations reset");
                self.decls.clear();
                self.work_dir.clean()?;
            }
            Directive::List => {
                let listing: String = self.decls.keys().iter().map(|k| format!("{k}\n")).collect();
                sink.write(Stream::Stdout, &listing);
            }
            Directive::Remove(keys) => {
                for key in keys {
                    if !self.decls.remove(key) {
                        tracing::warn!(%key, "no such declaration");
                        sink.write(Stream::Stderr, &format!("no declaration {key}\n"));
                    }
                }
            }
        }
        Ok(())
    }
}

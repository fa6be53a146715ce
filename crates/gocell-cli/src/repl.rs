//! Interactive loop over stdin.
//!
//! A cell ends at a line containing only `;;` or at end of input. Failing
//! cells are reported and the session carries on with its previous state.

use std::io::{BufRead, IsTerminal, Write};

use gocell_core::{Session, SessionConfig, StdioSink};

use crate::colors;

/// Line that terminates a cell.
const CELL_END: &str = ";;";

/// Read the next cell; `None` at end of input.
pub fn read_cell(input: &mut impl BufRead) -> std::io::Result<Option<Vec<String>>> {
    let mut lines = Vec::new();
    let mut buf = String::new();
    loop {
        buf.clear();
        if input.read_line(&mut buf)? == 0 {
            return Ok((!lines.is_empty()).then_some(lines));
        }
        let line = buf.trim_end_matches(['\n', '\r']);
        if line.trim_end() == CELL_END {
            return Ok(Some(lines));
        }
        lines.push(line.to_string());
    }
}

fn prompt(interactive: bool) {
    if interactive {
        eprint!("{}gocell>{} ", colors::BOLD, colors::RESET);
        let _ = std::io::stderr().flush();
    }
}

/// Run the read-eval loop.
pub fn execute(config: SessionConfig) -> anyhow::Result<()> {
    let mut session = Session::new(config)?;
    let stdin = std::io::stdin();
    let interactive = stdin.is_terminal();
    let mut input = stdin.lock();

    prompt(interactive);
    while let Some(lines) = read_cell(&mut input)? {
        if let Err(err) = session.execute_cell(&lines, &StdioSink) {
            eprintln!("{}error:{} {}", colors::RED, colors::RESET, err.with_hint());
        }
        prompt(interactive);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_cells() {
        let mut input = "func f() {}\n;;\n%main\nf()\n;;  \n\nlast\n".as_bytes();
        assert_eq!(read_cell(&mut input).unwrap(), Some(vec!["func f() {}".to_string()]));
        assert_eq!(
            read_cell(&mut input).unwrap(),
            Some(vec!["%main".to_string(), "f()".to_string()])
        );
        assert_eq!(
            read_cell(&mut input).unwrap(),
            Some(vec![String::new(), "last".to_string()])
        );
        assert_eq!(read_cell(&mut input).unwrap(), None);
    }

    #[test]
    fn test_empty_cell_between_terminators() {
        let mut input = ";;\n".as_bytes();
        assert_eq!(read_cell(&mut input).unwrap(), Some(Vec::new()));
        assert_eq!(read_cell(&mut input).unwrap(), None);
    }
}

//! Runner collaborator: invokes the downstream toolchain on a generated
//! file. Only called when the user asked to build and run.

use std::io;
use std::process::{Command, ExitStatus};

/// Run a whitespace-separated command line and wait for it to finish.
pub fn run(command_line: &str) -> io::Result<ExitStatus> {
    let mut parts = command_line.split_whitespace();
    let Some(program) = parts.next() else {
        return Err(io::Error::new(io::ErrorKind::InvalidInput, "empty command line"));
    };
    Command::new(program).args(parts).status()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_command_rejected() {
        let err = run("").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn test_runs_process() {
        let status = run("true").unwrap();
        assert!(status.success());
    }

    #[test]
    fn test_exit_status_propagates() {
        let status = run("false").unwrap();
        assert!(!status.success());
    }
}

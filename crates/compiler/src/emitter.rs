//! Emitter collaborator: writes generated IR to disk verbatim.

use std::fs;
use std::io;
use std::path::Path;

pub fn emit(ir: &str, path: &Path) -> io::Result<()> {
    fs::write(path, ir.as_bytes())
}

use std::env;
use std::fs;
use std::path::Path;
use std::process;

use common::{Diagnostic, Severity};
use compiler::{compile, emitter, runner, CommandLineArgs};

const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const RESET: &str = "\x1b[0m";

fn main() {
    let args: Vec<String> = env::args().skip(1).collect();

    if args.is_empty() {
        eprintln!("Usage: limec <path> [-O=<0..3>] [-br]");
        process::exit(1);
    }

    let args = match CommandLineArgs::from_args(&args) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(1);
        }
    };

    if !args.has_source_extension() {
        eprintln!("expected a .lm file");
        process::exit(1);
    }

    let source = match fs::read_to_string(&args.path) {
        Ok(source) => source,
        Err(_) => {
            eprintln!("failed to open file \"{}\"", args.path);
            process::exit(1);
        }
    };

    let module_name = Path::new(&args.path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(&args.path);

    let outcome = compile(&source, module_name);
    for diagnostic in &outcome.diagnostics {
        print_diagnostic(diagnostic);
    }

    if !outcome.succeeded {
        process::exit(1);
    }
    let Some(ir) = outcome.ir else {
        process::exit(1);
    };

    let output_path = args.output_path();
    if let Err(e) = emitter::emit(&ir, Path::new(&output_path)) {
        eprintln!("failed to write \"{}\": {}", output_path, e);
        process::exit(1);
    }

    if args.build_and_run {
        match runner::run(&format!("lime {}", output_path)) {
            Ok(status) => process::exit(status.code().unwrap_or(1)),
            Err(e) => {
                eprintln!("failed to run downstream toolchain: {}", e);
                process::exit(1);
            }
        }
    }
}

fn print_diagnostic(diagnostic: &Diagnostic) {
    let color = match diagnostic.severity {
        Severity::Error => RED,
        Severity::Warning => YELLOW,
    };
    eprintln!("{}{}{}", color, diagnostic, RESET);
}

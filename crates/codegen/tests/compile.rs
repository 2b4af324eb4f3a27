//! File-based tests for IR generation.
//!
//! Each `tests/compile/*.lm` input is compiled and the resulting IR text
//! (or the diagnostics of a failed stage) is compared against the
//! `.expected` file next to it.

use std::path::Path;

use bumpalo::Bump;
use datatest_stable::harness;

fn run_test(path: &Path) -> datatest_stable::Result<()> {
    let input = std::fs::read_to_string(path)?;
    let expected_path = format!("{}.expected", path.display());
    let expected = std::fs::read_to_string(&expected_path)?;

    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("test.lm");
    let arena = Bump::new();
    let mut parsed = parser::parse(&arena, &input);

    let actual = if !parsed.succeeded {
        let lines: Vec<String> = parsed
            .diagnostics
            .iter()
            .filter(|d| d.is_error())
            .map(|d| d.to_string())
            .collect();
        format!("PARSE ERRORS:\n{}", lines.join("\n"))
    } else {
        let module = parsed.module.expect("module");
        let result = codegen::generate(name, &module, &mut parsed.types, &parsed.protos);
        match result.ir {
            Some(ir) => ir,
            None => {
                let lines: Vec<String> = result
                    .diagnostics
                    .iter()
                    .filter(|d| d.is_error())
                    .map(|d| d.to_string())
                    .collect();
                format!("COMPILE ERROR:\n{}", lines.join("\n"))
            }
        }
    };

    if actual.trim() != expected.trim() {
        return Err(format!(
            "Mismatch for {:?}\n\nExpected:\n{}\n\nActual:\n{}",
            path,
            expected.trim(),
            actual.trim()
        )
        .into());
    }

    Ok(())
}

harness!(run_test, "tests/compile", r"\.lm$");

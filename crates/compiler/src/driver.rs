//! Pipeline driver: lexer → parser → generator, strictly in sequence.

use bumpalo::Bump;
use codegen::generate;
use common::Diagnostic;

/// Outcome of compiling one source buffer.
#[derive(Debug)]
pub struct CompileOutcome {
    /// The generated IR text, present iff compilation succeeded.
    pub ir: Option<String>,
    /// Diagnostics from every stage, in stage order.
    pub diagnostics: Vec<Diagnostic>,
    pub succeeded: bool,
}

impl CompileOutcome {
    pub fn errors(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| d.is_error())
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter().filter(|d| !d.is_error())
    }
}

/// Compile `source` to IR text. All compilation-scoped state (arena, type
/// registry, scope stack, builder) lives inside this call.
pub fn compile(source: &str, module_name: &str) -> CompileOutcome {
    let arena = Bump::new();
    let mut parsed = parser::parse(&arena, source);

    let Some(module) = parsed.module else {
        // Parse failure: downstream stages are skipped.
        return CompileOutcome { ir: None, diagnostics: parsed.diagnostics, succeeded: false };
    };

    let result = generate(module_name, &module, &mut parsed.types, &parsed.protos);

    let mut diagnostics = parsed.diagnostics;
    diagnostics.extend(result.diagnostics);
    CompileOutcome { ir: result.ir, diagnostics, succeeded: result.succeeded }
}

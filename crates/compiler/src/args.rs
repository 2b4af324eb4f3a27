//! Command-line argument handling for the `limec` binary.

/// Parsed command line: the input path plus compiler options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLineArgs {
    pub path: String,
    /// Optimization hint for the downstream toolchain; never interpreted
    /// here.
    pub optimization_level: u8,
    /// Invoke the downstream runner on the generated IR.
    pub build_and_run: bool,
}

impl CommandLineArgs {
    /// Parse the arguments after the program name: `<path>` followed by
    /// any of `-O=<0..3>` and `-br`.
    pub fn from_args(args: &[String]) -> Result<Self, String> {
        let Some(path) = args.first() else {
            return Err("unable to parse compiler args: expected a file path".to_string());
        };

        let mut parsed = CommandLineArgs {
            path: path.clone(),
            optimization_level: 0,
            build_and_run: false,
        };

        for (index, arg) in args.iter().enumerate().skip(1) {
            if let Some(value) = arg.strip_prefix("-O") {
                let Some(value) = value.strip_prefix('=') else {
                    return Err("unable to parse compiler args: expected '=' after '-O'".to_string());
                };
                let level: i64 = value.parse().map_err(|_| {
                    "unable to parse argument value: expected a non-negative integer for '-O'"
                        .to_string()
                })?;
                if !(0..=3).contains(&level) {
                    return Err(format!(
                        "invalid argument value: expected either 0, 1, 2, or 3 for '-O' (got {})",
                        level
                    ));
                }
                parsed.optimization_level = level as u8;
            } else if arg == "-br" {
                parsed.build_and_run = true;
            } else if arg.starts_with('-') {
                return Err(format!("unable to parse compiler args: invalid argument '{}'", arg));
            } else {
                return Err(format!(
                    "unable to parse compiler args: expected a valid argument at arg index {}",
                    index
                ));
            }
        }

        Ok(parsed)
    }

    /// Whether the input path carries the expected `.lm` extension.
    pub fn has_source_extension(&self) -> bool {
        self.path.ends_with(".lm")
    }

    /// The output path: the `lm` suffix replaced with `ll`.
    pub fn output_path(&self) -> String {
        let stem = self.path.strip_suffix("lm").unwrap_or(&self.path);
        format!("{}ll", stem)
    }
}

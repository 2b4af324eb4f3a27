//! Debug infrastructure with per-module loggers.
//!
//! Control via LIMEC_DEBUG environment variable:
//! - `LIMEC_DEBUG=*` - Enable all loggers
//! - `LIMEC_DEBUG=parser` - Enable only the parser
//! - `LIMEC_DEBUG=parser,codegen` - Enable multiple
//!
//! Verbosity via LIMEC_DEBUG_VERBOSITY (1-2, default 1)

use std::collections::HashSet;
use std::env;
use std::sync::OnceLock;

enum Enabled {
    All,
    None,
    Some(HashSet<String>),
}

struct Config {
    enabled: Enabled,
    verbosity: u8,
}

static CONFIG: OnceLock<Config> = OnceLock::new();

fn config() -> &'static Config {
    CONFIG.get_or_init(|| {
        let enabled = match env::var("LIMEC_DEBUG").ok().as_deref() {
            None | Some("") => Enabled::None,
            Some("*") | Some("1") | Some("true") => Enabled::All,
            Some(value) => {
                let set: HashSet<_> = value
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect();
                if set.is_empty() { Enabled::None } else { Enabled::Some(set) }
            }
        };
        let verbosity = env::var("LIMEC_DEBUG_VERBOSITY")
            .ok()
            .and_then(|v| v.parse().ok())
            .map(|v: u8| v.clamp(1, 2))
            .unwrap_or(1);
        Config { enabled, verbosity }
    })
}

fn is_enabled(name: &str) -> bool {
    match &config().enabled {
        Enabled::None => false,
        Enabled::All => true,
        Enabled::Some(set) => set.contains(name),
    }
}

/// A named logger writing to stderr when enabled.
pub struct Logger {
    name: &'static str,
    enabled: bool,
}

impl Logger {
    pub const fn disabled() -> Self {
        Self { name: "", enabled: false }
    }

    #[inline]
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    #[inline]
    pub fn log(&self, msg: &str) {
        if self.enabled {
            eprintln!("[{}] {}", self.name, msg);
        }
    }

    #[inline]
    pub fn detail(&self, msg: &str) {
        if self.enabled && config().verbosity >= 2 {
            eprintln!("[{}] {}", self.name, msg);
        }
    }
}

/// Create a logger. The name must be a static string.
pub fn create_logger(name: &'static str) -> Logger {
    if is_enabled(name) {
        Logger { name, enabled: true }
    } else {
        Logger::disabled()
    }
}

// Macros avoid the format! cost when the logger is disabled.

#[macro_export]
macro_rules! log {
    ($logger:expr, $($arg:tt)*) => {
        if $logger.enabled() {
            $logger.log(&format!($($arg)*));
        }
    };
}

#[macro_export]
macro_rules! log_detail {
    ($logger:expr, $($arg:tt)*) => {
        if $logger.enabled() {
            $logger.detail(&format!($($arg)*));
        }
    };
}

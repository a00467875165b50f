// Copyright 2025 Eric Jingryd (tidynest@proton.me)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! src/logging.rs
//!
//! Tracing subscriber setup for the command line tool
//!
//! `RUST_LOG` wins when set:
//! - `RUST_LOG=debug` - everything the compiler logs
//! - `RUST_LOG=xkb_compiler::core::include=debug` - include resolution only
//!
//! Without it the filter follows the warning level. Diagnostic records
//! (target `xkb_compiler::diag`) are printed by the CLI itself and stay
//! off here so they do not show up twice.

use tracing_subscriber::{
    fmt, layer::SubscriberExt, util::SubscriberInitExt, util::TryInitError, EnvFilter, Layer,
};

/// Filter used when `RUST_LOG` is unset
pub fn default_directive(warning_level: u32) -> String {
    let level = match warning_level {
        0..=4 => "warn",
        5..=8 => "info",
        _ => "debug",
    };
    format!("{},xkb_compiler::diag=off", level)
}

/// Install the global subscriber
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed.
pub fn init(warning_level: u32) -> Result<(), TryInitError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(warning_level)));

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_line_number(true)
        .with_filter(filter);

    tracing_subscriber::registry().with(console_layer).try_init()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warning_level_raises_filter() {
        assert!(default_directive(0).starts_with("warn"));
        assert!(default_directive(5).starts_with("info"));
        assert!(default_directive(10).starts_with("debug"));
    }

    #[test]
    fn test_diagnostics_target_silenced() {
        for level in [0, 3, 7, 10] {
            assert!(default_directive(level).ends_with("xkb_compiler::diag=off"));
        }
    }
}

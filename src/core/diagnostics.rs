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

//! src/core/diagnostics.rs
//!
//! Diagnostic sink shared by all sub-compilers
//!
//! Compilation never stops at the first problem. Every error, warning or
//! informational note is recorded here together with an optional follow-up
//! line describing what the compiler did about it ("Ignoring ...",
//! "Using first definition"). Each record is mirrored to `tracing` so a
//! library user sees diagnostics through their subscriber as well.
//!
//! Whether a warning is emitted at all depends on the warning level
//! (0 = quiet .. 10 = everything); call sites check [`Diagnostics::level`]
//! the same way for every message.

use std::collections::HashSet;
use std::fmt;

use colored::Colorize;
use tracing::{error, info, warn};

/// Severity of a diagnostic record
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "Info"),
            Severity::Warning => write!(f, "Warning"),
            Severity::Error => write!(f, "Error"),
        }
    }
}

/// A single diagnostic with its optional follow-up action
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    pub action: Option<String>,
}

impl Diagnostic {
    /// Attach (or extend) the follow-up action line
    pub fn action(&mut self, text: impl Into<String>) -> &mut Self {
        let text = text.into();
        tracing::debug!(target: "xkb_compiler::diag", "{}", text);
        match &mut self.action {
            Some(existing) => {
                existing.push('\n');
                existing.push_str(&text);
            }
            None => self.action = Some(text),
        }
        self
    }

    /// Colored rendering for terminal output
    pub fn render(&self) -> String {
        let label = match self.severity {
            Severity::Info => "Info:".cyan(),
            Severity::Warning => "Warning:".yellow().bold(),
            Severity::Error => "Error:".red().bold(),
        };
        let mut out = format!("{} {}", label, self.message);
        if let Some(action) = &self.action {
            for line in action.lines() {
                out.push_str(&format!("\n          {} {}", "→".cyan(), line));
            }
        }
        out
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<9} {}", format!("{}:", self.severity), self.message)?;
        if let Some(action) = &self.action {
            for line in action.lines() {
                write!(f, "\n          {}", line)?;
            }
        }
        Ok(())
    }
}

/// Collected diagnostics of one compile
#[derive(Clone, Debug, Default)]
pub struct Diagnostics {
    level: u32,
    records: Vec<Diagnostic>,
    once: HashSet<&'static str>,
}

impl Diagnostics {
    pub fn new(level: u32) -> Self {
        Self {
            level,
            records: Vec::new(),
            once: HashSet::new(),
        }
    }

    /// Warning level this compile runs at
    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn set_level(&mut self, level: u32) {
        self.level = level;
    }

    /// True the first time `key` is seen during this compile
    pub fn first_time(&mut self, key: &'static str) -> bool {
        self.once.insert(key)
    }

    pub fn error(&mut self, message: impl Into<String>) -> &mut Diagnostic {
        let message = message.into();
        error!(target: "xkb_compiler::diag", "{}", message);
        self.push(Severity::Error, message)
    }

    pub fn warn(&mut self, message: impl Into<String>) -> &mut Diagnostic {
        let message = message.into();
        warn!(target: "xkb_compiler::diag", "{}", message);
        self.push(Severity::Warning, message)
    }

    pub fn info(&mut self, message: impl Into<String>) -> &mut Diagnostic {
        let message = message.into();
        info!(target: "xkb_compiler::diag", "{}", message);
        self.push(Severity::Info, message)
    }

    fn push(&mut self, severity: Severity, message: String) -> &mut Diagnostic {
        self.records.push(Diagnostic {
            severity,
            message,
            action: None,
        });
        let last = self.records.len() - 1;
        &mut self.records[last]
    }

    pub fn records(&self) -> &[Diagnostic] {
        &self.records
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.records
            .iter()
            .filter(|r| r.severity == severity)
            .count()
    }

    pub fn has_errors(&self) -> bool {
        self.records.iter().any(|r| r.severity == Severity::Error)
    }

    /// True if any record contains `needle` in its message
    pub fn contains(&self, needle: &str) -> bool {
        self.records.iter().any(|r| r.message.contains(needle))
    }

    /// Move all records out, leaving the sink empty
    pub fn take(&mut self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_keep_order_and_actions() {
        let mut diag = Diagnostics::new(3);
        diag.warn("Multiple definitions").action("Using last definition");
        diag.error("Unknown field");

        assert_eq!(diag.records().len(), 2);
        assert_eq!(
            diag.records()[0].action.as_deref(),
            Some("Using last definition")
        );
        assert_eq!(diag.count(Severity::Error), 1);
        assert!(diag.has_errors());
        assert!(diag.contains("Unknown"));
    }

    #[test]
    fn test_display_indents_action() {
        let mut diag = Diagnostics::new(0);
        diag.info("Key out of range").action("Ignored");
        let text = diag.records()[0].to_string();
        assert!(text.starts_with("Info:"));
        assert!(text.contains("\n          Ignored"));
    }

    #[test]
    fn test_first_time_fires_once() {
        let mut diag = Diagnostics::new(0);
        assert!(diag.first_time("high keycodes"));
        assert!(!diag.first_time("high keycodes"));
        assert!(diag.first_time("other"));
    }
}

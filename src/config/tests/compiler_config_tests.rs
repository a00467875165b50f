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

use super::super::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

use crate::core::diagnostics::{Diagnostic, Severity};
use crate::core::keysym::lookup_keysym;
use crate::core::types::KeyName;

const KEYMAP_WITH_INCLUDE: &str = r#"
xkb_keymap {
    xkb_keycodes "test" {
        <ESC> = 9;
        <AE01> = 10;
    };
    xkb_types "test" { };
    xkb_compatibility "test" { };
    xkb_symbols "test" {
        include "extra"
        key <ESC> { [ Escape ] };
    };
};
"#;

/// Helper: include root with `symbols/extra` defining <AE01>
fn create_include_root() -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    let symbols = temp_dir.path().join("symbols");
    fs::create_dir_all(&symbols).unwrap();
    fs::write(
        symbols.join("extra"),
        "xkb_symbols \"basic\" { key <AE01> { [ 1, exclam ] }; };\n",
    )
    .unwrap();
    temp_dir
}

fn diagnostic(severity: Severity, message: &str) -> Diagnostic {
    Diagnostic {
        severity,
        message: message.to_string(),
        action: None,
    }
}

// ============================================================================
// Builder and validation
// ============================================================================

#[test]
fn test_defaults() {
    let config = CompilerConfig::new();
    assert_eq!(config.warning_level(), 0);
    assert!(config.message_prefix().is_none());
    assert!(config.error_footer().is_none());
    assert!(config.include_roots().unwrap().is_empty());
}

#[test]
fn test_warning_level_out_of_range() {
    let config = CompilerConfig::new().with_warning_level(11);
    assert!(matches!(config.validate(), Err(ConfigError::WarningLevel(11))));

    let config = CompilerConfig::new().with_warning_level(MAX_WARNING_LEVEL);
    assert!(config.validate().is_ok());
}

#[test]
fn test_missing_include_dir_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let missing = temp_dir.path().join("nope");
    let config = CompilerConfig::new().with_include_dir(&missing);

    match config.build() {
        Err(ConfigError::NotFound(path)) => assert_eq!(path, missing),
        other => panic!("Expected NotFound, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_file_as_include_dir_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let file = temp_dir.path().join("plain");
    fs::write(&file, "not a directory").unwrap();

    let config = CompilerConfig::new().with_root(&file);
    assert!(matches!(config.validate(), Err(ConfigError::NotADirectory(_))));
}

#[test]
fn test_root_searched_before_include_dirs() {
    let config = CompilerConfig::new()
        .with_include_dir("/b")
        .with_root("/a")
        .with_include_dir("/c");

    let roots = config.include_roots().unwrap();
    assert_eq!(
        roots,
        vec![PathBuf::from("/a"), PathBuf::from("/b"), PathBuf::from("/c")]
    );
}

#[test]
fn test_tilde_expanded() {
    let expanded = expand_path(Path::new("~/xkb")).unwrap();
    match std::env::var_os("HOME") {
        Some(home) if !home.is_empty() => {
            assert_eq!(expanded, PathBuf::from(home).join("xkb"));
        }
        _ => assert_eq!(expanded, PathBuf::from("~/xkb")),
    }

    let plain = expand_path(Path::new("/usr/share/X11/xkb")).unwrap();
    assert_eq!(plain, PathBuf::from("/usr/share/X11/xkb"));
}

// ============================================================================
// Building a compiler
// ============================================================================

#[test]
fn test_build_resolves_includes_from_root() {
    let root = create_include_root();
    let mut compiler = CompilerConfig::new()
        .with_warning_level(3)
        .with_root(root.path())
        .build()
        .unwrap();

    assert_eq!(compiler.warning_level(), 3);
    assert_eq!(compiler.include_roots(), &[root.path().to_path_buf()]);

    let keymap = compiler.compile_str(KEYMAP_WITH_INCLUDE, None).unwrap();
    let kc = keymap.find_key(KeyName::new("AE01"), false, 0).unwrap();
    assert_eq!(keymap.sym_at(kc, 0), lookup_keysym("1"));
    assert_eq!(keymap.sym_at(kc, 1), lookup_keysym("exclam"));
}

#[test]
fn test_build_without_roots_fails_include() {
    let mut compiler = CompilerConfig::new().build().unwrap();
    let result = compiler.compile_str(KEYMAP_WITH_INCLUDE, None);

    assert!(result.is_err(), "Include without a search path must fail");
    assert!(compiler
        .diagnostics()
        .iter()
        .any(|d| d.message.contains("extra")));
}

// ============================================================================
// Diagnostic formatting
// ============================================================================

#[test]
fn test_prefix_applied_to_every_line() {
    let config = CompilerConfig::new().with_message_prefix("> ");
    let mut warning = diagnostic(Severity::Warning, "Multiple definitions");
    warning.action("Using last definition");

    let lines = config.format_diagnostics(&[warning], false, false);
    assert_eq!(lines.len(), 2);
    assert!(lines.iter().all(|l| l.starts_with("> ")));
    assert!(lines[1].contains("Using last definition"));
}

#[test]
fn test_footer_only_after_errors() {
    let config = CompilerConfig::new().with_error_footer("Errors encountered");

    let quiet = config.format_diagnostics(&[diagnostic(Severity::Warning, "w")], false, false);
    assert!(!quiet.iter().any(|l| l == "Errors encountered"));

    let failed = config.format_diagnostics(&[diagnostic(Severity::Error, "e")], false, false);
    assert_eq!(failed.last().map(String::as_str), Some("Errors encountered"));

    let aborted = config.format_diagnostics(&[], true, false);
    assert_eq!(aborted, vec!["Errors encountered".to_string()]);
}

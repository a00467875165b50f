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

//! Compiler driver tests
//!
//! Tests for the composite-file driver:
//! - Required, illegal and duplicated sections per composite kind
//! - Map selection by name, default flag and position
//! - Reading files and reporting parse failures

use std::fs;

use tempfile::TempDir;

use crate::core::{
    compiler::{select_map, CompileError, Compiler},
    diagnostics::Severity,
    parser::parse_source,
    types::FileType,
};

const FULL: &str = r#"
xkb_keymap "full" {
    xkb_keycodes "evdev" { <ESC> = 9; <AE01> = 10; };
    xkb_types "basic" { };
    xkb_compat "minimal" { };
    xkb_symbols "us" { key <AE01> { [ 1, exclam ] }; };
};
"#;

#[test]
fn test_full_keymap() {
    let mut compiler = Compiler::new(0);
    let keymap = compiler.compile_str(FULL, None).unwrap();

    assert!(compiler.diagnostics().is_empty());
    assert_eq!(keymap.keycodes_name.as_deref(), Some("evdev"));
    assert_eq!(keymap.types_name.as_deref(), Some("basic"));
    assert_eq!(keymap.compat_name.as_deref(), Some("minimal"));
    assert_eq!(keymap.symbols_name.as_deref(), Some("us"));
    assert_eq!(keymap.num_syms(10), 2);
    assert_eq!(keymap.sym_at(10, 1), Some('!' as u32));
    assert_eq!(keymap.find_key_for_symbol('1' as u32), Some(10));
}

#[test]
fn test_missing_required_section() {
    let mut compiler = Compiler::new(0);
    let result = compiler.compile_str(
        "xkb_keymap { xkb_keycodes { <ESC> = 9; }; xkb_types { }; xkb_symbols { }; };",
        None,
    );

    assert!(matches!(
        result,
        Err(CompileError::MissingSection {
            section: FileType::Compat,
            composite: FileType::Keymap,
        })
    ));
    assert_eq!(
        compiler.diagnostics()[0].message,
        "Required section compatibility map missing from keymap"
    );
}

#[test]
fn test_semantics_needs_only_compat() {
    let mut compiler = Compiler::new(0);
    let keymap = compiler
        .compile_str(
            "xkb_semantics { xkb_types \"t\" { }; xkb_compat \"c\" { }; };",
            None,
        )
        .unwrap();
    assert_eq!(keymap.compat_name.as_deref(), Some("c"));
    assert_eq!(keymap.types.len(), 4);
    assert_eq!(keymap.symbols_name, None);
}

#[test]
fn test_illegal_section_in_layout() {
    let mut compiler = Compiler::new(0);
    let keymap = compiler
        .compile_str(
            r#"
            xkb_layout {
                xkb_keycodes { <ESC> = 9; };
                xkb_types { };
                xkb_compat "ignored" { };
                xkb_symbols { key <ESC> { [ Escape ] }; };
            };
            "#,
            None,
        )
        .unwrap();

    let diags = compiler.diagnostics();
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].severity, Severity::Error);
    assert_eq!(diags[0].message, "Cannot define compatibility map in a layout");
    assert_eq!(diags[0].action.as_deref(), Some("Ignoring section \"ignored\""));
    assert_eq!(keymap.compat_name, None);
}

#[test]
fn test_duplicate_section_ignored() {
    let mut compiler = Compiler::new(0);
    let keymap = compiler
        .compile_str(
            r#"
            xkb_keymap {
                xkb_keycodes "first" { <ESC> = 9; };
                xkb_keycodes "second" { <ESC> = 20; };
                xkb_types { };
                xkb_compat { };
                xkb_symbols { };
            };
            "#,
            None,
        )
        .unwrap();

    assert_eq!(keymap.keycodes_name.as_deref(), Some("first"));
    assert_eq!(
        compiler.diagnostics()[0].message,
        "More than one keycodes section in a keymap file"
    );
}

#[test]
fn test_geometry_skipped() {
    let text = r#"
        xkb_keymap {
            xkb_keycodes { <ESC> = 9; };
            xkb_types { };
            xkb_compat { };
            xkb_symbols { };
            xkb_geometry "pc" { width = 470; shape "NORM" { { [ 18, 18 ] } }; };
        };
    "#;

    let mut quiet = Compiler::new(0);
    assert!(quiet.compile_str(text, None).is_ok());
    assert!(quiet.diagnostics().is_empty());

    let mut loud = Compiler::new(1);
    assert!(loud.compile_str(text, None).is_ok());
    let diags = loud.diagnostics();
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].severity, Severity::Info);
    assert_eq!(diags[0].message, "Geometry section \"pc\" not compiled");
}

#[test]
fn test_lone_section_rejected() {
    let mut compiler = Compiler::new(0);
    let err = compiler
        .compile_str("xkb_keycodes \"evdev\" { <ESC> = 9; };", None)
        .unwrap_err();
    assert!(matches!(err, CompileError::NotAKeymap(FileType::Keycodes)));
    assert!(err.to_string().starts_with("Cannot compile a lone keycodes section"));
}

#[test]
fn test_select_map() {
    let files = parse_source(
        r#"
        xkb_keymap "a" { };
        default xkb_keymap "b" { };
        xkb_keymap "c" { };
        "#,
    )
    .unwrap();

    assert_eq!(select_map(&files, None).unwrap().name, "b");
    assert_eq!(select_map(&files, Some("c")).unwrap().name, "c");
    assert!(matches!(
        select_map(&files, Some("zz")),
        Err(CompileError::NoSuchMap(ref name)) if name == "zz"
    ));

    let plain = parse_source("xkb_keymap \"x\" { }; xkb_keymap \"y\" { };").unwrap();
    assert_eq!(select_map(&plain, None).unwrap().name, "x");

    assert!(matches!(select_map(&[], None), Err(CompileError::Empty)));
}

#[test]
fn test_compile_named_map() {
    let text = format!("{}\n{}", FULL, FULL.replace("\"full\"", "\"second\"").replace("\"us\"", "\"de\""));
    let mut compiler = Compiler::new(0);

    let keymap = compiler.compile_str(&text, Some("second")).unwrap();
    assert_eq!(keymap.symbols_name.as_deref(), Some("de"));

    let keymap = compiler.compile_str(&text, None).unwrap();
    assert_eq!(keymap.symbols_name.as_deref(), Some("us"));

    assert!(matches!(
        compiler.compile_str(&text, Some("third")),
        Err(CompileError::NoSuchMap(_))
    ));
    assert!(matches!(compiler.compile_str("", None), Err(CompileError::Empty)));
}

#[test]
fn test_parse_error() {
    let mut compiler = Compiler::new(0);
    let result = compiler.compile_str("xkb_keymap { xkb_keycodes { <ESC> = ; }; };", None);
    assert!(matches!(result, Err(CompileError::Parse(_))));
}

#[test]
fn test_failed_section_named() {
    let mut compiler = Compiler::new(0);
    let result = compiler.compile_str(
        r#"
        xkb_keymap {
            xkb_keycodes { <ESC> = 9; };
            xkb_types "broken" { type "X" { bogus = 1; }; };
            xkb_compat { };
            xkb_symbols { };
        };
        "#,
        None,
    );
    let err = result.unwrap_err();
    assert!(matches!(
        err,
        CompileError::SectionFailed { section: FileType::Types, ref name } if name == "broken"
    ));
    assert_eq!(err.to_string(), "Failed to compile types section \"broken\"");
}

#[test]
fn test_diagnostics_reset_between_compiles() {
    let mut compiler = Compiler::new(0);
    let _ = compiler.compile_str("xkb_keymap { xkb_keycodes { }; };", None);
    assert!(!compiler.diagnostics().is_empty());

    compiler.compile_str(FULL, None).unwrap();
    assert!(compiler.diagnostics().is_empty());
}

#[test]
fn test_compile_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("keymap.xkb");
    fs::write(&path, FULL).unwrap();

    let mut compiler = Compiler::new(0);
    let keymap = compiler.compile_file(&path, None).unwrap();
    assert_eq!(keymap.keycodes_name.as_deref(), Some("evdev"));

    let missing = dir.path().join("missing.xkb");
    assert!(matches!(
        compiler.compile_file(&missing, None),
        Err(CompileError::Io { ref path, .. }) if *path == missing
    ));
}

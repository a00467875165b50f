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

//! Parser module tests
//!
//! Tests for parsing XKB source text:
//! - Section keywords, names and map flags
//! - Composite keymaps and skipped geometry
//! - Statement forms (keycodes, aliases, interprets, keys, modmaps)
//! - Include strings and their merge operators
//! - Syntax errors with line numbers

use crate::core::{
    ast::{BinaryOp, Expr, Stmt},
    parser::*,
    types::{FileType, KeyName, MapFlags, MergeMode},
};

#[test]
fn test_parse_section_header() {
    let files = parse_source(
        r#"
partial alphanumeric_keys xkb_symbols "basic" { };
xkb_types { };
"#,
    )
    .unwrap();

    assert_eq!(files.len(), 2);
    assert_eq!(files[0].file_type, FileType::Symbols);
    assert_eq!(files[0].name, "basic");
    assert!(files[0].flags.contains(MapFlags::PARTIAL));
    assert!(files[0].flags.contains(MapFlags::ALPHANUMERIC_KEYS));
    assert!(!files[0].is_default());

    assert_eq!(files[1].file_type, FileType::Types);
    assert_eq!(files[1].name, "");
    assert_ne!(files[0].id, files[1].id);
}

#[test]
fn test_compat_keyword_aliases() {
    for keyword in ["xkb_compatibility", "xkb_compat", "xkb_compatibility_map", "XKB_COMPAT_MAP"] {
        let files = parse_source(&format!("{} \"x\" {{ }};", keyword)).unwrap();
        assert_eq!(files[0].file_type, FileType::Compat, "{}", keyword);
    }
}

#[test]
fn test_composite_keymap() {
    let files = parse_source(
        r#"
default xkb_keymap "main" {
    xkb_keycodes "kc" { <ESC> = 9; };
    xkb_types "t" { };
    xkb_geometry "pc" {
        shape "NORM" { { [ 18, 18 ] } };
        text "label" { text = "}"; };
    };
};
xkb_keymap "other" { };
"#,
    )
    .unwrap();

    assert_eq!(files.len(), 2);
    let main = &files[0];
    assert!(main.is_default());
    assert_eq!(main.file_type, FileType::Keymap);
    assert_eq!(main.sections.len(), 3);
    assert_eq!(main.sections[0].file_type, FileType::Keycodes);
    assert_eq!(main.sections[0].stmts.len(), 1);
    assert_eq!(main.sections[2].file_type, FileType::Geometry);
    assert!(main.sections[2].stmts.is_empty());
    assert_eq!(files[1].name, "other");
}

#[test]
fn test_comments_skipped() {
    let files = parse_source(
        r#"
// line comment
# hash comment
xkb_keycodes "kc" {
    /* block
       comment */
    <ESC> = 9; // trailing
};
"#,
    )
    .unwrap();
    assert_eq!(files[0].stmts.len(), 1);
}

#[test]
fn test_keycode_statements() {
    let files = parse_source(
        r#"
xkb_keycodes "kc" {
    minimum = 8;
    <AE01> = 10;
    alternate <AE01> = 11;
    alias <ONE> = <AE01>;
    indicator 1 = "Caps Lock";
    virtual indicator 2 = "Shift Lock";
};
"#,
    )
    .unwrap();
    let stmts = &files[0].stmts;
    assert_eq!(stmts.len(), 6);

    assert!(matches!(stmts[0], Stmt::Var(_)));
    assert_eq!(
        stmts[1],
        Stmt::Keycode {
            merge: MergeMode::Default,
            name: KeyName::new("AE01"),
            value: 10,
        }
    );
    assert_eq!(stmts[2].merge(), MergeMode::AltForm);
    assert!(matches!(
        stmts[3],
        Stmt::KeyAlias { alias, real, .. } if alias == KeyName::new("ONE") && real == KeyName::new("AE01")
    ));
    assert!(matches!(
        stmts[4],
        Stmt::IndicatorName { index: 1, is_virtual: false, .. }
    ));
    assert!(matches!(
        stmts[5],
        Stmt::IndicatorName { index: 2, is_virtual: true, .. }
    ));
}

#[test]
fn test_interpret_statement() {
    let files = parse_source(
        r#"
xkb_compatibility "c" {
    virtual_modifiers NumLock, AltGr = Mod5;
    interpret Shift_L+AnyOf(all) {
        useModMapMods = level1;
        action = SetMods(modifiers = modMapMods, clearLocks);
    };
    interpret Any + Exactly(Lock) { action = LockMods(modifiers = Lock); };
    interpret Num_Lock { virtualModifier = NumLock; };
    group 2 = AltGr;
};
"#,
    )
    .unwrap();
    let stmts = &files[0].stmts;
    assert_eq!(stmts.len(), 6);

    assert!(matches!(&stmts[0], Stmt::VMod { name, value: None, .. } if name == "NumLock"));
    assert!(matches!(&stmts[1], Stmt::VMod { name, value: Some(_), .. } if name == "AltGr"));

    let Stmt::Interp { sym, predicate, body, .. } = &stmts[2] else {
        panic!("expected an interpret, got {:?}", stmts[2]);
    };
    assert_eq!(sym, "Shift_L");
    assert_eq!(
        predicate.as_ref(),
        Some(&Expr::Action {
            name: "AnyOf".to_string(),
            args: vec![Expr::ident("all")],
        })
    );
    assert_eq!(body.len(), 2);
    let Some(Expr::Action { name, args }) = &body[1].value else {
        panic!("expected an action, got {:?}", body[1].value);
    };
    assert_eq!(name, "SetMods");
    assert_eq!(args.len(), 2);
    assert!(matches!(&args[0], Expr::Binary { op: BinaryOp::Assign, .. }));
    assert_eq!(args[1], Expr::ident("clearLocks"));

    assert!(matches!(&stmts[3], Stmt::Interp { sym, .. } if sym == "Any"));
    assert!(matches!(&stmts[4], Stmt::Interp { predicate: None, .. }));
    assert!(matches!(&stmts[5], Stmt::GroupCompat { group: 2, .. }));
}

#[test]
fn test_key_statement() {
    let files = parse_source(
        r#"
xkb_symbols "s" {
    name[Group1] = "English";
    key <AE01> { [ 1, exclam ], [ 2, at ] };
    key <LFSH> {
        type[Group1] = "ONE_LEVEL",
        symbols[Group1] = [ Shift_L ],
        actions[Group1] = [ SetMods(modifiers = Shift) ],
        !repeat
    };
    override key <AC01> { [ a, A ], };
    modifier_map Shift { <LFSH>, Shift_R };
};
"#,
    )
    .unwrap();
    let stmts = &files[0].stmts;
    assert_eq!(stmts.len(), 5);

    let Stmt::Symbols { key_name, body, merge } = &stmts[1] else {
        panic!("expected a key, got {:?}", stmts[1]);
    };
    assert_eq!(*key_name, KeyName::new("AE01"));
    assert_eq!(*merge, MergeMode::Default);
    assert_eq!(body.len(), 2);
    assert!(body[0].name.is_none());
    assert_eq!(
        body[0].value,
        Some(Expr::KeysymList(vec!["1".to_string(), "exclam".to_string()]))
    );

    let Stmt::Symbols { body, .. } = &stmts[2] else {
        panic!("expected a key, got {:?}", stmts[2]);
    };
    assert_eq!(body.len(), 4);
    assert!(matches!(&body[0].name, Some(Expr::ArrayRef { field, .. }) if field == "type"));
    assert!(matches!(&body[2].value, Some(Expr::ActionList(list)) if list.len() == 1));
    assert_eq!(body[3].value, Some(Expr::Boolean(false)));

    assert_eq!(stmts[3].merge(), MergeMode::Override);
    assert!(matches!(
        &stmts[4],
        Stmt::ModMap { modifier, keys, .. } if modifier == "Shift" && keys.len() == 2
    ));
}

#[test]
fn test_include_statement() {
    let files = parse_source(
        r#"
xkb_symbols "s" {
    include "pc+us(intl):2|extra"
    augment "level3(ralt_switch)"
};
"#,
    )
    .unwrap();
    let stmts = &files[0].stmts;
    assert_eq!(stmts.len(), 2);

    let Stmt::Include(include) = &stmts[0] else {
        panic!("expected an include, got {:?}", stmts[0]);
    };
    assert_eq!(include.stmt, "pc+us(intl):2|extra");
    assert_eq!(include.terms.len(), 3);

    let Stmt::Include(augment) = &stmts[1] else {
        panic!("expected an include, got {:?}", stmts[1]);
    };
    assert_eq!(augment.merge, MergeMode::Augment);
    assert_eq!(augment.terms[0].merge, MergeMode::Augment);
    assert_eq!(augment.terms[0].map.as_deref(), Some("ralt_switch"));
}

#[test]
fn test_parse_include_terms() {
    let include = parse_include(MergeMode::Default, "pc+us(intl):2|extra").unwrap();
    let terms = &include.terms;

    assert_eq!(terms[0].merge, MergeMode::Default);
    assert_eq!(terms[0].file.as_deref(), Some("pc"));
    assert_eq!(terms[0].map, None);

    assert_eq!(terms[1].merge, MergeMode::Override);
    assert_eq!(terms[1].file.as_deref(), Some("us"));
    assert_eq!(terms[1].map.as_deref(), Some("intl"));
    assert_eq!(terms[1].modifier, Some(2));

    assert_eq!(terms[2].merge, MergeMode::Augment);
    assert_eq!(terms[2].file.as_deref(), Some("extra"));
}

#[test]
fn test_parse_include_group_in_parentheses() {
    let include = parse_include(MergeMode::Default, "pc+us(intl)(2)").unwrap();
    let us = &include.terms[1];
    assert_eq!(us.file.as_deref(), Some("us"));
    assert_eq!(us.map.as_deref(), Some("intl"));
    assert_eq!(us.modifier, Some(2));

    // Without a map the parentheses name the map
    let include = parse_include(MergeMode::Default, "us(2)").unwrap();
    assert_eq!(include.terms[0].map.as_deref(), Some("2"));
    assert_eq!(include.terms[0].modifier, None);

    assert!(parse_include(MergeMode::Default, "us(intl)(x)").is_none());
}

#[test]
fn test_parse_include_self_reference() {
    let include = parse_include(MergeMode::Override, "|us").unwrap();
    assert_eq!(include.terms.len(), 2);
    assert!(include.terms[0].is_self());
    assert_eq!(include.terms[0].merge, MergeMode::Override);
    assert!(!include.terms[1].is_self());

    let include = parse_include(MergeMode::Default, "").unwrap();
    assert_eq!(include.terms.len(), 1);
    assert!(include.terms[0].is_self());

    // A second self reference is not allowed
    assert!(parse_include(MergeMode::Default, "|us|").is_none());
}

#[test]
fn test_parse_include_rejects_malformed() {
    assert!(parse_include(MergeMode::Default, "us(intl").is_none());
    assert!(parse_include(MergeMode::Default, "us:x").is_none());
    assert!(parse_include(MergeMode::Default, "us(a(b))").is_none());
}

#[test]
fn test_illegal_include_reported() {
    let err = parse_source("xkb_symbols \"s\" {\n    include \"us:x\"\n};").unwrap_err();
    assert_eq!(
        err,
        ParseError::IllegalInclude {
            line: 2,
            stmt: "us:x".to_string(),
        }
    );
}

#[test]
fn test_syntax_error_line() {
    let text = "xkb_keycodes \"kc\" {\n    <ESC> = 9;\n    <TAB> 23;\n};\n";
    let err = parse_source(text).unwrap_err();

    let ParseError::InvalidSyntax { line, message } = err else {
        panic!("expected a syntax error, got {:?}", err);
    };
    assert_eq!(line, 3);
    assert!(message.contains("<TAB>"), "{}", message);
}

#[test]
fn test_unterminated_section() {
    let err = parse_source("xkb_types \"t\" {\n").unwrap_err();
    assert!(matches!(err, ParseError::InvalidSyntax { .. }));
}

#[test]
fn test_empty_source() {
    assert!(parse_source("").unwrap().is_empty());
    assert!(parse_source("  // nothing here\n").unwrap().is_empty());
}

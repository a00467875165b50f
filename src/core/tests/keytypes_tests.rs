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

//! Key types section tests

use crate::core::{
    compiler::{CompileError, Compiler},
    diagnostics::{Diagnostic, Severity},
    keymap::{KeyTypeEntry, Keymap},
    types::{FileType, ModMask, CONTROL_MASK, LOCK_MASK, SHIFT_MASK},
};

fn compile(body: &str, level: u32) -> (Result<Keymap, CompileError>, Vec<Diagnostic>) {
    let text = format!(
        r#"
xkb_keymap {{
    xkb_keycodes {{ <ESC> = 9; }};
    xkb_types "test" {{
{}
    }};
    xkb_compat {{ }};
    xkb_symbols {{ }};
}};
"#,
        body
    );
    let mut compiler = Compiler::new(level);
    let result = compiler.compile_str(&text, None);
    (result, compiler.diagnostics().to_vec())
}

fn entry(mods: ModMask, level: u32, preserve: ModMask) -> KeyTypeEntry {
    KeyTypeEntry {
        mods,
        level,
        preserve,
    }
}

const SHIFT: ModMask = ModMask::new(SHIFT_MASK, 0);
const LOCK: ModMask = ModMask::new(LOCK_MASK, 0);
const NONE: ModMask = ModMask::new(0, 0);

#[test]
fn test_canonical_types_filled_in() {
    let keymap = compile("", 0).0.unwrap();
    let names: Vec<&str> = keymap.types.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["ONE_LEVEL", "TWO_LEVEL", "ALPHABETIC", "KEYPAD"]);

    assert_eq!(keymap.types[0].num_levels, 1);
    assert!(keymap.types[0].entries.is_empty());

    assert_eq!(keymap.types[1].entries, vec![entry(SHIFT, 1, NONE)]);

    let alpha = &keymap.types[2];
    assert_eq!(alpha.mods, SHIFT.union(LOCK));
    assert_eq!(alpha.entries, vec![entry(SHIFT, 1, NONE), entry(LOCK, 0, LOCK)]);

    // No NumLock virtual modifier: KEYPAD is a plain Shift type
    assert_eq!(keymap.types[3].mods, SHIFT);
    assert_eq!(keymap.types[3].entries.len(), 1);
}

#[test]
fn test_keypad_uses_num_lock() {
    let keymap = compile("virtual_modifiers NumLock;", 0).0.unwrap();
    let num_lock = ModMask::new(0, 1);

    let keypad = &keymap.types[3];
    assert_eq!(keypad.mods, SHIFT.union(num_lock));
    assert_eq!(keypad.entries, vec![entry(SHIFT, 1, NONE), entry(num_lock, 1, NONE)]);
}

#[test]
fn test_custom_type() {
    let (result, diags) = compile(
        r#"
        virtual_modifiers LevelThree;
        type "FOUR_LEVEL" {
            modifiers = Shift+LevelThree;
            map[None] = Level1;
            map[Shift] = Level2;
            map[LevelThree] = Level3;
            map[Shift+LevelThree] = Level4;
            level_name[Level1] = "Base";
            level_name[Level4] = "Shift AltGr";
        };
        "#,
        0,
    );
    let keymap = result.unwrap();
    assert!(diags.is_empty());
    assert_eq!(keymap.types_name.as_deref(), Some("test"));
    assert_eq!(keymap.types.len(), 5);

    let four = &keymap.types[4];
    let level3 = ModMask::new(0, 1);
    assert_eq!(four.name, "FOUR_LEVEL");
    assert_eq!(four.mods, SHIFT.union(level3));
    assert_eq!(four.num_levels, 4);
    // The level 1 entry is implied and dropped
    assert_eq!(
        four.entries,
        vec![
            entry(SHIFT, 1, NONE),
            entry(level3, 2, NONE),
            entry(SHIFT.union(level3), 3, NONE),
        ]
    );
    assert_eq!(
        four.level_names,
        vec![Some("Base".to_string()), None, None, Some("Shift AltGr".to_string())]
    );
}

#[test]
fn test_preserve_without_map_entry() {
    let keymap = compile(
        r#"
        type "CAPS" {
            modifiers = Shift+Lock;
            map[Shift] = Level2;
            preserve[Lock] = Lock;
        };
        "#,
        0,
    )
    .0
    .unwrap();

    assert_eq!(
        keymap.types[4].entries,
        vec![entry(SHIFT, 1, NONE), entry(LOCK, 0, LOCK)]
    );
}

#[test]
fn test_preserve_attached_to_entry() {
    let keymap = compile(
        r#"
        type "CAPS" {
            modifiers = Shift+Lock;
            map[Shift+Lock] = Level2;
            preserve[Shift+Lock] = Lock;
        };
        "#,
        0,
    )
    .0
    .unwrap();

    assert_eq!(
        keymap.types[4].entries,
        vec![entry(SHIFT.union(LOCK), 1, LOCK)]
    );
}

#[test]
fn test_canonical_type_redefined() {
    let keymap = compile(
        "type \"TWO_LEVEL\" { modifiers = Control; map[Control] = Level2; };",
        0,
    )
    .0
    .unwrap();

    assert_eq!(keymap.types.len(), 4);
    assert_eq!(keymap.types[1].name, "TWO_LEVEL");
    assert_eq!(keymap.types[1].mods, ModMask::new(CONTROL_MASK, 0));
}

#[test]
fn test_canonical_level_limit() {
    let (result, diags) = compile(
        "type \"ONE_LEVEL\" { modifiers = Shift; map[Shift] = Level2; };",
        0,
    );

    assert!(matches!(
        result,
        Err(CompileError::SectionFailed { section: FileType::Types, .. })
    ));
    assert_eq!(diags[0].message, "Key type \"ONE_LEVEL\" has 2 levels, must have 1");
}

#[test]
fn test_multiple_modifier_masks() {
    let (result, diags) = compile("type \"X\" { modifiers = Shift; modifiers = Lock; };", 0);

    assert!(result.is_err());
    assert_eq!(diags[0].severity, Severity::Warning);
    assert_eq!(diags[0].message, "Multiple modifier mask definitions for key type X");
    assert_eq!(diags[0].action.as_deref(), Some("Using Shift, ignoring Lock"));
}

#[test]
fn test_unknown_field() {
    let (result, diags) = compile("type \"X\" { modifiers = Shift; speed = 2; };", 0);
    assert!(result.is_err());
    assert_eq!(diags[0].message, "Unknown field speed in key type X");
}

#[test]
fn test_shift_level_out_of_range() {
    let (result, diags) = compile("type \"X\" { modifiers = Shift; map[Shift] = 65; };", 0);
    assert!(result.is_err());
    assert_eq!(diags[0].message, "Shift level 65 out of range (1..64) in key type X");
}

#[test]
fn test_map_entry_clipped_to_type_mask() {
    let (result, diags) = compile("type \"X\" { modifiers = Shift; map[Control] = Level2; };", 1);
    let keymap = result.unwrap();

    assert_eq!(diags[0].message, "Map entry for unused modifiers in X");
    assert_eq!(diags[0].action.as_deref(), Some("Using none instead of Control"));
    assert_eq!(keymap.types[4].entries, vec![entry(NONE, 1, NONE)]);
}

#[test]
fn test_type_defaults() {
    let keymap = compile(
        r#"
        type.modifiers = Shift;
        type.map[Shift] = Level2;
        type "X" { };
        type "Y" { modifiers = Lock; };
        "#,
        0,
    )
    .0
    .unwrap();

    let x = &keymap.types[4];
    assert_eq!(x.mods, SHIFT);
    assert_eq!(x.entries, vec![entry(SHIFT, 1, NONE)]);
    assert_eq!(x.num_levels, 2);

    // Default entries outside the type's own mask are skipped
    let y = &keymap.types[5];
    assert_eq!(y.mods, LOCK);
    assert!(y.entries.is_empty());
}

#[test]
fn test_redefinition_merge() {
    let keymap = compile(
        r#"
        type "X" { modifiers = Shift; map[Shift] = Level2; };
        type "X" { modifiers = Lock; map[Lock] = Level2; };
        "#,
        0,
    )
    .0
    .unwrap();
    assert_eq!(keymap.types.len(), 5);
    assert_eq!(keymap.types[4].mods, LOCK);

    let keymap = compile(
        r#"
        type "X" { modifiers = Shift; map[Shift] = Level2; };
        augment type "X" { modifiers = Lock; map[Lock] = Level2; };
        "#,
        0,
    )
    .0
    .unwrap();
    assert_eq!(keymap.types[4].mods, SHIFT);
}

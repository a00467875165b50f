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

//! Symbols section tests
//!
//! Tests for compiling `xkb_symbols`:
//! - Automatic key types and the explicit-type bits
//! - Group gap filling, collapsing and padding to the key width
//! - Key merges under override, augment and replace
//! - Actions, behaviors, repeat and virtual modifier maps
//! - Modifier maps and their conflicts

use crate::core::{
    action::{Action, ModAction},
    compiler::{CompileError, Compiler},
    diagnostics::{Diagnostic, Severity},
    keymap::{BehaviorKind, Keymap},
    symbols::automatic_type,
    types::{explicit, FileType, ModMask, LOCK_MASK, NO_SYMBOL, SHIFT_MASK},
};

const ESC: usize = 9;
const AE01: usize = 10;
const AC01: usize = 38;
const LFSH: usize = 50;
const CAPS: usize = 66;
const KP1: usize = 87;

const ESCAPE: u32 = 0xff1b;
const SHIFT_L: u32 = 0xffe1;
const CAPS_LOCK: u32 = 0xffe5;

const FOUR_LEVEL: &str = r#"
    virtual_modifiers LevelThree;
    type "FOUR_LEVEL" {
        modifiers = Shift+LevelThree;
        map[Shift] = Level2;
        map[LevelThree] = Level3;
        map[Shift+LevelThree] = Level4;
    };
"#;

fn compile_with(types: &str, symbols: &str, level: u32) -> (Result<Keymap, CompileError>, Vec<Diagnostic>) {
    let text = format!(
        r#"
xkb_keymap {{
    xkb_keycodes "evdev" {{
        <ESC> = 9; <AE01> = 10; <AC01> = 38; <LFSH> = 50; <CAPS> = 66; <KP1> = 87;
        alias <LSHF> = <LFSH>;
    }};
    xkb_types {{
{}
    }};
    xkb_compat {{ }};
    xkb_symbols "test" {{
{}
    }};
}};
"#,
        types, symbols
    );
    let mut compiler = Compiler::new(level);
    let result = compiler.compile_str(&text, None);
    (result, compiler.diagnostics().to_vec())
}

fn compile(symbols: &str) -> Keymap {
    let (result, diags) = compile_with("", symbols, 0);
    match result {
        Ok(keymap) => keymap,
        Err(err) => panic!("compile failed: {} ({:?})", err, diags),
    }
}

fn syms(keymap: &Keymap, kc: usize, group: usize) -> Vec<u32> {
    keymap.keys[kc].groups[group].syms.clone()
}

#[test]
fn test_automatic_type_choice() {
    let a = 'a' as u32;
    let upper_a = 'A' as u32;
    let one = '1' as u32;
    let kp_end = 0xff9c;
    let kp_1 = 0xffb1;

    assert_eq!(automatic_type(1, &[ESCAPE]), Some(("ONE_LEVEL", true)));
    assert_eq!(automatic_type(2, &[a, upper_a]), Some(("ALPHABETIC", false)));
    assert_eq!(automatic_type(2, &[kp_end, kp_1]), Some(("KEYPAD", true)));
    assert_eq!(automatic_type(2, &[one, '!' as u32]), Some(("TWO_LEVEL", true)));
    assert_eq!(
        automatic_type(4, &[a, upper_a, 'b' as u32, 'B' as u32]),
        Some(("FOUR_LEVEL_ALPHABETIC", false))
    );
    assert_eq!(
        automatic_type(4, &[a, upper_a, one, '!' as u32]),
        Some(("FOUR_LEVEL_SEMIALPHABETIC", false))
    );
    assert_eq!(automatic_type(3, &[kp_end, kp_1, one]), Some(("FOUR_LEVEL_KEYPAD", false)));
    assert_eq!(automatic_type(4, &[one, '!' as u32, a, upper_a]), Some(("FOUR_LEVEL", false)));
    assert_eq!(automatic_type(5, &[]), None);
}

#[test]
fn test_two_level_key() {
    let keymap = compile("key <AE01> { [ 1, exclam ] };");
    let key = &keymap.keys[AE01];

    assert_eq!(keymap.symbols_name.as_deref(), Some("test"));
    assert_eq!(key.groups.len(), 1);
    assert_eq!(key.groups[0].type_index, 1);
    assert_eq!(key.groups[0].syms, vec!['1' as u32, '!' as u32]);
    assert_eq!(key.groups[0].actions, None);
    assert_eq!(key.explicit, 0);
}

#[test]
fn test_alphabetic_key_marks_type_explicit() {
    let keymap = compile("key <AC01> { [ a, A ] };");
    let key = &keymap.keys[AC01];
    assert_eq!(key.groups[0].type_index, 2);
    assert_eq!(key.explicit, explicit::KEY_TYPE_1);
}

#[test]
fn test_keypad_and_one_level_keys() {
    let keymap = compile("key <KP1> { [ KP_End, KP_1 ] }; key <ESC> { [ Escape ] };");

    assert_eq!(keymap.keys[KP1].groups[0].type_index, 3);
    assert_eq!(keymap.keys[KP1].explicit, 0);
    assert_eq!(keymap.keys[ESC].groups[0].type_index, 0);
    assert_eq!(syms(&keymap, ESC, 0), vec![ESCAPE]);
}

#[test]
fn test_four_level_key() {
    let (result, _) = compile_with(
        FOUR_LEVEL,
        "key <AE01> { [ 1, exclam, onesuperior, exclamdown ] };",
        0,
    );
    let keymap = result.unwrap();
    let key = &keymap.keys[AE01];

    assert_eq!(keymap.types[key.groups[0].type_index].name, "FOUR_LEVEL");
    assert_eq!(key.groups[0].syms, vec!['1' as u32, '!' as u32, 0xb9, 0xa1]);
    assert_eq!(key.explicit, explicit::KEY_TYPE_1);
}

#[test]
fn test_unknown_type_falls_back_to_two_level() {
    let (result, diags) = compile_with("", "key <AE01> { type = \"NOPE\", [ 1, exclam, at ] };", 3);
    let key = &result.unwrap().keys[AE01];

    assert_eq!(key.groups[0].type_index, 1);
    assert_eq!(key.groups[0].syms, vec!['1' as u32, '!' as u32]);
    assert_eq!(key.explicit, 0);
    assert!(diags.iter().any(|d| d.message == "Type \"NOPE\" is not defined"));
}

#[test]
fn test_trailing_no_symbol_trimmed() {
    let keymap = compile("key <AE01> { [ 1, NoSymbol ] };");
    assert_eq!(keymap.keys[AE01].groups[0].type_index, 0);
    assert_eq!(syms(&keymap, AE01, 0), vec!['1' as u32]);
}

#[test]
fn test_groups_padded_to_key_width() {
    let keymap = compile("key <AC01> { [ a, A ], [ Escape ] };");
    let key = &keymap.keys[AC01];

    assert_eq!(key.groups.len(), 2);
    assert_eq!(key.groups[1].type_index, 0);
    assert_eq!(key.groups[1].syms, vec![ESCAPE, NO_SYMBOL]);
    assert_eq!(key.width(), 2);
    assert_eq!(key.explicit, explicit::KEY_TYPE_1);
}

#[test]
fn test_gap_groups_filled_from_first() {
    let keymap = compile("key <AC01> { symbols[Group1] = [ a, A ], symbols[Group3] = [ b, B ] };");
    let key = &keymap.keys[AC01];

    assert_eq!(key.groups.len(), 3);
    assert_eq!(key.groups[1].syms, vec!['a' as u32, 'A' as u32]);
    assert_eq!(key.groups[2].syms, vec!['b' as u32, 'B' as u32]);
}

#[test]
fn test_identical_groups_collapse() {
    let keymap = compile("key <AE01> { [ 1, exclam ], [ 1, exclam ] };");
    assert_eq!(keymap.keys[AE01].groups.len(), 1);
}

#[test]
fn test_actions_set_interpret_bit() {
    let keymap = compile(
        r#"
        key <LFSH> {
            type = "ONE_LEVEL",
            symbols[Group1] = [ Shift_L ],
            actions[Group1] = [ SetMods(modifiers = Shift) ]
        };
        "#,
    );
    let key = &keymap.keys[LFSH];

    assert_eq!(key.explicit, explicit::KEY_TYPE_1 | explicit::INTERPRET);
    assert_eq!(
        key.groups[0].actions,
        Some(vec![Action::SetMods(ModAction {
            flags: 0,
            mods: ModMask::new(SHIFT_MASK, 0),
        })])
    );
}

#[test]
fn test_repeat_and_virtual_modifiers() {
    let keymap = compile(
        r#"
        virtual_modifiers NumLock;
        key <ESC> { [ Escape ], repeat = No, vmods = NumLock };
        "#,
    );
    let key = &keymap.keys[ESC];

    assert_eq!(key.repeat, Some(false));
    assert_eq!(key.vmodmap, 1);
    assert_eq!(key.explicit, explicit::AUTO_REPEAT | explicit::VMODMAP);
}

#[test]
fn test_behaviors() {
    let keymap = compile(
        r#"
        key <CAPS> { [ Caps_Lock ], locks = yes };
        key <ESC> { [ Escape ], radiogroup = 2 };
        key <KP1> { [ KP_End, KP_1 ], overlay1 = <AE01> };
        "#,
    );

    assert_eq!(keymap.keys[CAPS].behavior.kind, BehaviorKind::Lock);
    assert_ne!(keymap.keys[CAPS].explicit & explicit::BEHAVIOR, 0);
    assert_eq!(
        keymap.keys[ESC].behavior.kind,
        BehaviorKind::RadioGroup {
            group: 1,
            allow_none: false,
        }
    );
    assert_eq!(
        keymap.keys[KP1].behavior.kind,
        BehaviorKind::Overlay {
            overlay: 1,
            key: AE01 as u32,
        }
    );
}

#[test]
fn test_key_merge_modes() {
    let keymap = compile("key <AE01> { [ 1, exclam ] }; key <AE01> { [ 2 ] };");
    assert_eq!(syms(&keymap, AE01, 0), vec!['2' as u32, '!' as u32]);

    let keymap = compile("key <AE01> { [ 1, exclam ] }; augment key <AE01> { [ 2, at ] };");
    assert_eq!(syms(&keymap, AE01, 0), vec!['1' as u32, '!' as u32]);

    let keymap = compile("key <AE01> { [ 1, exclam ] }; replace key <AE01> { [ 2 ] };");
    assert_eq!(syms(&keymap, AE01, 0), vec!['2' as u32]);
    assert_eq!(keymap.keys[AE01].groups[0].type_index, 0);
}

#[test]
fn test_augment_merge_is_order_independent() {
    let base = "augment key <AE01> { [ 1, exclam ] };";
    let extra = "augment key <AE01> { symbols[Group2] = [ 2, at ], repeat = No };";

    let forward = compile(&format!("{}\n{}", base, extra));
    let backward = compile(&format!("{}\n{}", extra, base));

    assert_eq!(forward.keys[AE01], backward.keys[AE01]);
    assert_eq!(syms(&forward, AE01, 0), vec!['1' as u32, '!' as u32]);
    assert_eq!(syms(&forward, AE01, 1), vec!['2' as u32, '@' as u32]);
    assert_eq!(forward.keys[AE01].repeat, Some(false));
}

#[test]
fn test_merge_adds_new_group() {
    let keymap = compile("key <AC01> { [ a, A ] }; key <AC01> { symbols[Group2] = [ b, B ] };");
    let key = &keymap.keys[AC01];
    assert_eq!(key.groups.len(), 2);
    assert_eq!(key.groups[1].syms, vec!['b' as u32, 'B' as u32]);
}

#[test]
fn test_key_defined_by_alias() {
    let keymap = compile("key <LSHF> { [ Shift_L ] };");
    assert_eq!(syms(&keymap, LFSH, 0), vec![SHIFT_L]);
}

#[test]
fn test_key_defaults() {
    let keymap = compile(
        r#"
        key.type = "TWO_LEVEL";
        key <ESC> { [ Escape ] };
        "#,
    );
    let key = &keymap.keys[ESC];
    assert_eq!(key.groups[0].type_index, 1);
    assert_eq!(key.groups[0].syms, vec![ESCAPE, NO_SYMBOL]);
    assert_eq!(key.explicit, explicit::KEY_TYPE_1);
}

#[test]
fn test_group_names() {
    let keymap = compile(
        r#"
        name[Group1] = "English (US)";
        name[Group2] = "Russian";
        key <ESC> { [ Escape ] };
        "#,
    );
    assert_eq!(keymap.group_names[0].as_deref(), Some("English (US)"));
    assert_eq!(keymap.group_names[1].as_deref(), Some("Russian"));
}

#[test]
fn test_section_without_keys() {
    let keymap = compile("name[Group1] = \"English (US)\";");
    assert_eq!(keymap.symbols_name, None);
    assert!(keymap.keys.iter().all(|k| k.groups.is_empty()));
}

#[test]
fn test_modifier_map() {
    let keymap = compile(
        r#"
        key <LFSH> { [ Shift_L ] };
        key <CAPS> { [ Caps_Lock ] };
        modifier_map Shift { <LFSH> };
        modifier_map Lock { Caps_Lock };
        "#,
    );
    assert_eq!(keymap.keys[LFSH].modmap, SHIFT_MASK);
    assert_eq!(keymap.keys[CAPS].modmap, LOCK_MASK);
    assert_eq!(syms(&keymap, CAPS, 0), vec![CAPS_LOCK]);
}

#[test]
fn test_modifier_map_conflict() {
    let (result, diags) = compile_with(
        "",
        r#"
        key <LFSH> { [ Shift_L ] };
        modifier_map Shift { <LFSH> };
        modifier_map Lock { <LFSH> };
        "#,
        0,
    );
    let keymap = result.unwrap();

    assert_eq!(keymap.keys[LFSH].modmap, LOCK_MASK);
    assert_eq!(diags.len(), 1);
    assert_eq!(diags[0].severity, Severity::Error);
    assert_eq!(diags[0].message, "Key <LFSH> added to map for multiple modifiers");
    assert_eq!(diags[0].action.as_deref(), Some("Using Lock, ignoring Shift."));
}

#[test]
fn test_symbols_defined_twice() {
    let (result, diags) = compile_with(
        "",
        "key <AE01> { symbols[Group1] = [ 1 ], symbols[Group1] = [ 2 ] };",
        0,
    );
    assert!(matches!(
        result,
        Err(CompileError::SectionFailed { section: FileType::Symbols, .. })
    ));
    assert_eq!(diags[0].message, "Symbols for key <AE01>, group 1 already defined");
}

#[test]
fn test_unknown_key_field() {
    let (result, diags) = compile_with("", "key <AE01> { [ 1 ], speed = 3 };", 0);
    assert!(result.is_err());
    assert_eq!(diags[0].message, "Unknown field speed in a key symbol definition");
}

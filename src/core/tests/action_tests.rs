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

//! Action resolver tests
//!
//! Tests for turning `Name(args)` expressions into actions:
//! - Modifier, group and pointer actions with their flags
//! - Private actions and their raw data bytes
//! - Field errors (unknown actions, illegal fields, bad ranges)
//! - Section-level action defaults
//! - Printing actions back in call syntax

use crate::core::{
    action::{
        controls, flags, Action, ActionContext, ActionDefaults, ActionError, ActionKind,
        ControlsAction, GroupAction, ModAction, PointerAction, PrivateAction,
        RedirectKeyAction,
    },
    ast::{Expr, Stmt},
    diagnostics::Diagnostics,
    dump::action_text,
    keymap::Keymap,
    parser::parse_source,
    types::{KeyName, MergeMode, ModMask, CONTROL_MASK, SHIFT_MASK},
};

/// Parse `text` as the action of an interpret statement
fn action_expr(text: &str) -> Expr {
    let source = format!("xkb_compat {{ interpret Any {{ action = {}; }}; }};", text);
    let files = parse_source(&source).unwrap();
    match &files[0].stmts[0] {
        Stmt::Interp { body, .. } => body[0].value.clone().unwrap(),
        other => panic!("expected an interpret, got {:?}", other),
    }
}

fn resolve_with(keymap: &Keymap, defaults: &ActionDefaults, text: &str) -> Result<Action, ActionError> {
    defaults.resolve(&action_expr(text), &ActionContext::new(keymap))
}

fn resolve(text: &str) -> Result<Action, ActionError> {
    resolve_with(&Keymap::new(), &ActionDefaults::new(), text)
}

#[test]
fn test_set_mods() {
    let action = resolve("SetMods(modifiers = Shift+Control, clearLocks)").unwrap();
    assert_eq!(
        action,
        Action::SetMods(ModAction {
            flags: flags::CLEAR_LOCKS,
            mods: ModMask::new(SHIFT_MASK | CONTROL_MASK, 0),
        })
    );
}

#[test]
fn test_mod_map_mods() {
    let action = resolve("LatchMods(modifiers = modMapMods, latchToLock)").unwrap();
    assert_eq!(
        action,
        Action::LatchMods(ModAction {
            flags: flags::USE_MOD_MAP_MODS | flags::LATCH_TO_LOCK,
            mods: ModMask::default(),
        })
    );
}

#[test]
fn test_negated_flag() {
    let action = resolve("SetMods(clearLocks, !clearLocks)").unwrap();
    assert_eq!(action, Action::SetMods(ModAction::default()));
}

#[test]
fn test_lock_mods_affect() {
    let Action::LockMods(act) = resolve("LockMods(modifiers = Lock, affect = lock)").unwrap() else {
        panic!("expected LockMods");
    };
    assert_eq!(act.flags & flags::LOCK_MASK, flags::LOCK_NO_UNLOCK);
    assert_eq!(act.mods, ModMask::new(1 << 1, 0));
}

#[test]
fn test_virtual_modifier_in_action() {
    let mut keymap = Keymap::new();
    let mut diag = Diagnostics::new(0);
    keymap
        .vmods
        .define("AltGr", Some(1 << 7), MergeMode::Override, &mut diag)
        .unwrap();

    let action = resolve_with(&keymap, &ActionDefaults::new(), "SetMods(modifiers = AltGr)").unwrap();
    assert_eq!(
        action,
        Action::SetMods(ModAction {
            flags: 0,
            mods: ModMask::new(0, 1),
        })
    );
    assert_eq!(action_text(&keymap, &action), "SetMods(modifiers=AltGr)");
}

#[test]
fn test_group_absolute_and_relative() {
    assert_eq!(
        resolve("SetGroup(group = 2)").unwrap(),
        Action::SetGroup(GroupAction {
            flags: flags::GROUP_ABSOLUTE,
            group: 1,
        })
    );
    assert_eq!(
        resolve("LatchGroup(group = +1)").unwrap(),
        Action::LatchGroup(GroupAction { flags: 0, group: 1 })
    );
    assert_eq!(
        resolve("LockGroup(group = -1)").unwrap(),
        Action::LockGroup(GroupAction { flags: 0, group: -1 })
    );
    assert_eq!(
        resolve("LockGroup(group = Group3)").unwrap(),
        Action::LockGroup(GroupAction {
            flags: flags::GROUP_ABSOLUTE,
            group: 2,
        })
    );
}

#[test]
fn test_group_out_of_range() {
    assert!(matches!(
        resolve("SetGroup(group = 5)"),
        Err(ActionError::OutOfRange(_))
    ));
    assert!(matches!(
        resolve("LockGroup(group = 0)"),
        Err(ActionError::OutOfRange(_))
    ));
}

#[test]
fn test_move_pointer() {
    assert_eq!(
        resolve("MovePtr(x = 10, y = -5)").unwrap(),
        Action::MovePtr(PointerAction {
            flags: flags::MOVE_ABSOLUTE_X,
            x: 10,
            y: -5,
        })
    );
    assert_eq!(
        resolve("MovePtr(x = +1, y = +1, !accel)").unwrap(),
        Action::MovePtr(PointerAction {
            flags: flags::NO_ACCELERATION,
            x: 1,
            y: 1,
        })
    );
}

#[test]
fn test_controls() {
    let action = resolve("LockControls(controls = RepeatKeys+MouseKeys, affect = unlock)").unwrap();
    assert_eq!(
        action,
        Action::LockControls(ControlsAction {
            flags: flags::LOCK_NO_LOCK,
            ctrls: controls::REPEAT_KEYS | controls::MOUSE_KEYS,
        })
    );
}

#[test]
fn test_redirect_key() {
    let mut keymap = Keymap::new();
    keymap.key_names[10] = KeyName::new("AE01");

    let action = resolve_with(
        &keymap,
        &ActionDefaults::new(),
        "RedirectKey(key = <AE01>, clearmods = Shift)",
    )
    .unwrap();
    assert_eq!(
        action,
        Action::RedirectKey(RedirectKeyAction {
            new_key: 10,
            mods_mask: ModMask::new(SHIFT_MASK, 0),
            mods: ModMask::default(),
        })
    );
    assert_eq!(action_text(&keymap, &action), "RedirectKey(key=<AE01>,clearmods=Shift)");

    let err = resolve_with(&keymap, &ActionDefaults::new(), "RedirectKey(key = <ZZZZ>)").unwrap_err();
    assert!(matches!(err, ActionError::KeyNotFound { .. }));
}

#[test]
fn test_private_action() {
    let action = resolve("Private(type = 0x86, data = \"abc\")").unwrap();
    assert_eq!(
        action,
        Action::Private(PrivateAction {
            action_type: 0x86,
            data: [b'a', b'b', b'c', 0, 0, 0, 0],
        })
    );

    let action = resolve("Private(type = 1, data[0] = 0x7f, data[6] = 255)").unwrap();
    assert_eq!(
        action,
        Action::Private(PrivateAction {
            action_type: 1,
            data: [0x7f, 0, 0, 0, 0, 0, 0xff],
        })
    );
    assert_eq!(
        action_text(&Keymap::new(), &action),
        "Private(type=0x01,data[0]=0x7f,data[6]=0xff)"
    );
}

#[test]
fn test_private_action_ranges() {
    assert_eq!(
        resolve("Private(type = 256)"),
        Err(ActionError::OutOfRange(
            "Private action type must be in the range 0..255 (got 256)".to_string()
        ))
    );
    assert_eq!(
        resolve("Private(data[7] = 1)"),
        Err(ActionError::OutOfRange(
            "Array subscript must be in the range 0..6 (got 7)".to_string()
        ))
    );
    assert!(matches!(
        resolve("Private(data[0] = 300)"),
        Err(ActionError::OutOfRange(_))
    ));
    assert!(matches!(
        resolve("Private(type[1] = 2)"),
        Err(ActionError::NotArray { field: "type", .. })
    ));
}

#[test]
fn test_action_errors() {
    assert_eq!(
        resolve("Frobnicate()").unwrap_err(),
        ActionError::UnknownAction("Frobnicate".to_string())
    );
    assert_eq!(
        resolve("SetMods(group = 1)").unwrap_err(),
        ActionError::IllegalField {
            field: "group",
            kind: ActionKind::SetMods,
        }
    );
    assert_eq!(
        resolve("SetMods(bogus = 1)").unwrap_err(),
        ActionError::UnknownField("bogus".to_string())
    );
    assert!(matches!(
        resolve("SetMods(action.clearLocks = true)").unwrap_err(),
        ActionError::DefaultsInDefinition { .. }
    ));
    assert!(matches!(
        resolve("SetMods(modifiers[1] = Shift)").unwrap_err(),
        ActionError::NotArray { .. }
    ));
    assert!(matches!(
        resolve("DevVal(device = 1)").unwrap_err(),
        ActionError::Unsupported { .. }
    ));
}

#[test]
fn test_action_aliases() {
    assert_eq!(resolve("NoAction()").unwrap(), Action::None);
    assert!(matches!(resolve("MovePointer(x = 1)").unwrap(), Action::MovePtr(_)));
    assert!(matches!(resolve("Redirect()").unwrap(), Action::RedirectKey(_)));
    assert_eq!(ActionKind::IsoLock.name(), "ISOLock");
    assert_eq!(ActionKind::DeviceBtn.name(), "DevBtn");
}

#[test]
fn test_defaults_for_kind() {
    let mut defaults = ActionDefaults::new();
    defaults
        .set_field("SetMods", "clearLocks", None, &Expr::Boolean(true))
        .unwrap();

    let keymap = Keymap::new();
    let set = resolve_with(&keymap, &defaults, "SetMods(modifiers = Shift)").unwrap();
    assert_eq!(
        set,
        Action::SetMods(ModAction {
            flags: flags::CLEAR_LOCKS,
            mods: ModMask::new(SHIFT_MASK, 0),
        })
    );

    // Defaults for one kind leave the others alone
    let latch = resolve_with(&keymap, &defaults, "LatchMods(modifiers = Shift)").unwrap();
    assert_eq!(
        latch,
        Action::LatchMods(ModAction {
            flags: 0,
            mods: ModMask::new(SHIFT_MASK, 0),
        })
    );

    // Explicit arguments apply after the defaults
    let cleared = resolve_with(&keymap, &defaults, "SetMods(!clearLocks)").unwrap();
    assert_eq!(cleared, Action::SetMods(ModAction::default()));
}

#[test]
fn test_wildcard_defaults() {
    let mut defaults = ActionDefaults::new();
    defaults
        .set_field("action", "clearLocks", None, &Expr::Boolean(true))
        .unwrap();
    let keymap = Keymap::new();

    let group = resolve_with(&keymap, &defaults, "SetGroup(group = 2)").unwrap();
    assert_eq!(
        group,
        Action::SetGroup(GroupAction {
            flags: flags::CLEAR_LOCKS | flags::GROUP_ABSOLUTE,
            group: 1,
        })
    );

    // NoAction takes no defaults at all
    assert_eq!(resolve_with(&keymap, &defaults, "NoAction()").unwrap(), Action::None);

    // A wildcard default that the kind does not understand fails it
    assert!(matches!(
        resolve_with(&keymap, &defaults, "LockGroup(group = 1)"),
        Err(ActionError::IllegalField { .. })
    ));
}

#[test]
fn test_set_field_errors() {
    let mut defaults = ActionDefaults::new();
    let value = Expr::Boolean(true);

    assert!(matches!(
        defaults.set_field("NoAction", "clearLocks", None, &value),
        Err(ActionError::NoActionField(_))
    ));
    assert!(matches!(
        defaults.set_field("Bogus", "clearLocks", None, &value),
        Err(ActionError::UnknownAction(_))
    ));
    assert!(matches!(
        defaults.set_field("SetMods", "bogus", None, &value),
        Err(ActionError::UnknownField(_))
    ));
    assert!(defaults.entries().is_empty());
}

#[test]
fn test_action_text() {
    let keymap = Keymap::new();
    let cases = [
        (
            "SetMods(modifiers = Shift+Control, clearLocks)",
            "SetMods(modifiers=Shift+Control,clearLocks)",
        ),
        ("SetGroup(group = 2)", "SetGroup(group=2)"),
        ("LockGroup(group = -1)", "LockGroup(group=-1)"),
        ("MovePtr(x = 10, y = -5)", "MovePtr(x=10,y=-5)"),
        ("LatchMods(modifiers = modMapMods)", "LatchMods(modifiers=modMapMods)"),
        ("NoAction()", "NoAction()"),
        ("Terminate()", "Terminate()"),
    ];
    for (source, printed) in cases {
        let action = resolve(source).unwrap();
        assert_eq!(action_text(&keymap, &action), printed, "{}", source);
    }
}

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

//! Virtual modifier tests
//!
//! Tests for the virtual modifier table:
//! - Slot allocation and case-insensitive lookup
//! - Redefinitions under each merge mode
//! - Mask text and mask resolution with virtual names

use crate::core::{
    ast::{BinaryOp, Expr},
    diagnostics::{Diagnostics, Severity},
    expr::ExprError,
    types::{MergeMode, ModMask, NUM_VIRTUAL_MODS, SHIFT_MASK},
    vmod::{handle_vmod_def, resolve_virtual_modifier, resolve_vmodmask, VModError, VirtualMods},
};

const MOD1: u8 = 1 << 3;
const MOD2: u8 = 1 << 4;
const MOD5: u8 = 1 << 7;

#[test]
fn test_define_allocates_slots() {
    let mut vmods = VirtualMods::new();
    let mut diag = Diagnostics::new(0);
    assert!(vmods.is_empty());

    assert_eq!(vmods.define("NumLock", Some(MOD2), MergeMode::Override, &mut diag), Ok(0));
    assert_eq!(vmods.define("Alt", None, MergeMode::Override, &mut diag), Ok(1));

    assert_eq!(vmods.index("numlock"), Some(0));
    assert_eq!(vmods.name(1), Some("Alt"));
    assert_eq!(vmods.real_mods(0), MOD2);
    assert_eq!(vmods.real_mods(1), 0);
    assert_eq!(
        vmods.iter().collect::<Vec<_>>(),
        vec![(0, "NumLock", MOD2), (1, "Alt", 0)]
    );
    assert!(diag.records().is_empty());
}

#[test]
fn test_redefinition() {
    let mut diag = Diagnostics::new(0);
    let mut vmods = VirtualMods::new();
    vmods.define("AltGr", Some(MOD5), MergeMode::Override, &mut diag).unwrap();

    // Same binding or no binding is silent
    vmods.define("AltGr", Some(MOD5), MergeMode::Override, &mut diag).unwrap();
    vmods.define("AltGr", None, MergeMode::Override, &mut diag).unwrap();
    assert!(diag.records().is_empty());

    vmods.define("AltGr", Some(MOD1), MergeMode::Augment, &mut diag).unwrap();
    assert_eq!(vmods.real_mods(0), MOD5);
    assert_eq!(diag.records()[0].severity, Severity::Warning);
    assert_eq!(diag.records()[0].message, "Virtual modifier AltGr multiply defined");
    assert_eq!(diag.records()[0].action.as_deref(), Some("Using Mod5, ignoring Mod1"));

    vmods.define("AltGr", Some(MOD1), MergeMode::Override, &mut diag).unwrap();
    assert_eq!(vmods.real_mods(0), MOD1);
    assert_eq!(diag.records()[1].action.as_deref(), Some("Using Mod1, ignoring Mod5"));
}

#[test]
fn test_too_many() {
    let mut diag = Diagnostics::new(0);
    let mut vmods = VirtualMods::new();
    for i in 0..NUM_VIRTUAL_MODS {
        vmods
            .define(&format!("V{}", i), None, MergeMode::Override, &mut diag)
            .unwrap();
    }

    assert_eq!(
        handle_vmod_def(&mut vmods, "Extra", None, MergeMode::Override, &mut diag),
        Err(VModError::TooMany)
    );
    assert_eq!(diag.records()[0].message, "Too many virtual modifiers defined (maximum 16)");
    assert_eq!(diag.records()[0].action.as_deref(), Some("Exiting"));
}

#[test]
fn test_bad_binding() {
    let mut diag = Diagnostics::new(0);
    let mut vmods = VirtualMods::new();
    let value = Expr::ident("Hyper");

    let err = handle_vmod_def(&mut vmods, "Meta", Some(&value), MergeMode::Override, &mut diag)
        .unwrap_err();
    assert!(matches!(err, VModError::BadValue { ref name, .. } if name == "Meta"));
    assert!(vmods.is_empty());
    assert!(diag.has_errors());
}

#[test]
fn test_mask_text() {
    let mut diag = Diagnostics::new(0);
    let mut vmods = VirtualMods::new();
    vmods.define("NumLock", None, MergeMode::Override, &mut diag).unwrap();
    vmods.define("LevelThree", None, MergeMode::Override, &mut diag).unwrap();

    assert_eq!(vmods.mask_text(ModMask::new(0, 0)), "none");
    assert_eq!(vmods.mask_text(ModMask::new(SHIFT_MASK, 0)), "Shift");
    assert_eq!(vmods.mask_text(ModMask::new(0, 0b11)), "NumLock+LevelThree");
    assert_eq!(vmods.mask_text(ModMask::new(SHIFT_MASK, 0b10)), "Shift+LevelThree");
    // Unnamed slots print as their index
    assert_eq!(vmods.vmods_text(1 << 5), "5");
}

#[test]
fn test_resolve_masks_with_virtual_names() {
    let mut diag = Diagnostics::new(0);
    let mut vmods = VirtualMods::new();
    vmods.define("NumLock", None, MergeMode::Override, &mut diag).unwrap();
    vmods.define("Alt", None, MergeMode::Override, &mut diag).unwrap();

    let expr = Expr::binary(BinaryOp::Add, Expr::ident("Shift"), Expr::ident("alt"));
    assert_eq!(resolve_vmodmask(&expr, &vmods), Ok(ModMask::new(SHIFT_MASK, 0b10)));

    assert!(matches!(
        resolve_vmodmask(&Expr::ident("Super"), &vmods),
        Err(ExprError::UnknownIdent { .. })
    ));
}

#[test]
fn test_resolve_single_virtual_modifier() {
    let mut diag = Diagnostics::new(0);
    let mut vmods = VirtualMods::new();
    vmods.define("NumLock", None, MergeMode::Override, &mut diag).unwrap();

    assert_eq!(resolve_virtual_modifier(&Expr::ident("NumLock"), &vmods), Ok(0));
    assert_eq!(resolve_virtual_modifier(&Expr::Integer(7), &vmods), Ok(7));
    assert!(matches!(
        resolve_virtual_modifier(&Expr::Integer(16), &vmods),
        Err(ExprError::IllegalEnum { .. })
    ));
    assert_eq!(
        resolve_virtual_modifier(&Expr::ident("Super"), &vmods),
        Err(ExprError::UnknownIdent {
            name: "Super".to_string(),
            kind: "virtual modifier",
        })
    );
}

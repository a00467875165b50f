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

//! Expression evaluation tests

use crate::core::{
    ast::{BinaryOp, Expr, UnaryOp},
    expr::{
        resolve_boolean, resolve_enum, resolve_integer, resolve_keyname, resolve_keysym,
        resolve_lhs, resolve_mask, resolve_modmask, resolve_string, ExprError, Lookup,
        ModIndexLookup, ModMaskLookup, RadioLookup, SimpleLookup, GROUP_NAMES,
    },
    types::{KeyName, ModMask, CONTROL_MASK, SHIFT_MASK},
};

fn int(value: i64) -> Expr {
    Expr::Integer(value)
}

fn string(value: &str) -> Expr {
    Expr::String(value.to_string())
}

#[test]
fn test_boolean_words() {
    for word in ["true", "Yes", "ON"] {
        assert_eq!(resolve_boolean(&Expr::ident(word), None), Ok(true), "{}", word);
    }
    for word in ["false", "no", "Off"] {
        assert_eq!(resolve_boolean(&Expr::ident(word), None), Ok(false), "{}", word);
    }
    assert_eq!(
        resolve_boolean(&Expr::unary(UnaryOp::Not, Expr::Boolean(true)), None),
        Ok(false)
    );
}

#[test]
fn test_boolean_errors() {
    assert_eq!(
        resolve_boolean(&Expr::ident("maybe"), None),
        Err(ExprError::UnknownIdent {
            name: "maybe".to_string(),
            kind: "boolean",
        })
    );
    assert_eq!(
        resolve_boolean(&int(1), None),
        Err(ExprError::TypeMismatch {
            expected: "boolean",
            found: "integer",
        })
    );
    assert_eq!(
        resolve_boolean(&Expr::unary(UnaryOp::Negate, Expr::Boolean(true)), None),
        Err(ExprError::IllegalOperation {
            op: "Negation",
            kind: "boolean",
        })
    );
}

#[test]
fn test_integer_arithmetic() {
    let expr = Expr::binary(
        BinaryOp::Add,
        int(2),
        Expr::binary(BinaryOp::Multiply, int(3), int(4)),
    );
    assert_eq!(resolve_integer(&expr, None), Ok(14));
    assert_eq!(
        resolve_integer(&Expr::binary(BinaryOp::Divide, int(7), int(2)), None),
        Ok(3)
    );
    assert_eq!(resolve_integer(&Expr::unary(UnaryOp::Negate, int(5)), None), Ok(-5));
    assert_eq!(resolve_integer(&Expr::unary(UnaryOp::Invert, int(0)), None), Ok(-1));
    assert_eq!(resolve_integer(&Expr::unary(UnaryOp::Plus, int(5)), None), Ok(5));
}

#[test]
fn test_integer_from_string() {
    assert_eq!(resolve_integer(&string("a"), None), Ok(97));
    assert_eq!(resolve_integer(&string(""), None), Ok(0));
    assert_eq!(resolve_integer(&string("ab"), None), Err(ExprError::StringTooLong));
}

#[test]
fn test_integer_errors() {
    assert_eq!(
        resolve_integer(&Expr::binary(BinaryOp::Divide, int(1), int(0)), None),
        Err(ExprError::DivideByZero)
    );
    assert_eq!(
        resolve_integer(&Expr::unary(UnaryOp::Not, int(1)), None),
        Err(ExprError::IllegalOperation {
            op: "Logical not",
            kind: "int",
        })
    );
    assert!(matches!(
        resolve_integer(&Expr::ident("Level3"), None),
        Err(ExprError::UnknownIdent { .. })
    ));
}

#[test]
fn test_integer_overflow() {
    let min = Expr::binary(BinaryOp::Subtract, int(-i64::MAX), int(1));
    assert_eq!(resolve_integer(&min, None), Ok(i64::MIN));

    assert_eq!(
        resolve_integer(&Expr::binary(BinaryOp::Divide, min.clone(), int(-1)), None),
        Err(ExprError::Overflow("Division"))
    );
    assert_eq!(
        resolve_integer(&Expr::unary(UnaryOp::Negate, min), None),
        Err(ExprError::Overflow("Negation"))
    );
    assert_eq!(
        ExprError::Overflow("Division").to_string(),
        "Division overflows an integer"
    );
}

#[test]
fn test_integer_with_lookup() {
    let groups = SimpleLookup(GROUP_NAMES);
    assert_eq!(resolve_integer(&Expr::ident("Group3"), Some(&groups)), Ok(3));

    let field = Expr::FieldRef {
        element: "key".to_string(),
        field: "group1".to_string(),
    };
    assert_eq!(
        resolve_integer(&field, Some(&groups)),
        Err(ExprError::UnknownField {
            element: "key".to_string(),
            field: "group1".to_string(),
            kind: "int",
        })
    );
}

#[test]
fn test_radio_group_names() {
    assert_eq!(RadioLookup.lookup(None, "group3"), Some(3));
    assert_eq!(RadioLookup.lookup(None, "RadioGroup2"), Some(2));
    assert_eq!(RadioLookup.lookup(None, "rg1"), Some(1));
    assert_eq!(RadioLookup.lookup(None, "7"), Some(7));
    assert_eq!(RadioLookup.lookup(None, "group0"), None);
    assert_eq!(RadioLookup.lookup(None, "group"), None);
    assert_eq!(ModIndexLookup.lookup(None, "mod4"), Some(6));
}

#[test]
fn test_string_concatenation() {
    let expr = Expr::binary(BinaryOp::Add, string("Caps"), string(" Lock"));
    assert_eq!(resolve_string(&expr), Ok("Caps Lock".to_string()));
    assert!(matches!(
        resolve_string(&Expr::binary(BinaryOp::Subtract, string("a"), string("b"))),
        Err(ExprError::IllegalOperation { .. })
    ));
    assert!(matches!(resolve_string(&int(1)), Err(ExprError::TypeMismatch { .. })));
}

#[test]
fn test_keyname() {
    let name = KeyName::new("AE01");
    assert_eq!(resolve_keyname(&Expr::KeyName(name)), Ok(name));
    assert!(resolve_keyname(&string("AE01")).is_err());
}

#[test]
fn test_enum() {
    assert_eq!(resolve_enum(&Expr::ident("GROUP2"), GROUP_NAMES), Ok(2));
    let err = resolve_enum(&Expr::ident("group9"), &GROUP_NAMES[..2]).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Illegal identifier group9 (expected one of: group1, group2)"
    );
}

#[test]
fn test_masks() {
    let shift_control = Expr::binary(BinaryOp::Add, Expr::ident("Shift"), Expr::ident("Control"));
    assert_eq!(
        resolve_modmask(&shift_control),
        Ok(ModMask::new(SHIFT_MASK | CONTROL_MASK, 0))
    );

    let all_but_shift = Expr::binary(BinaryOp::Subtract, Expr::ident("all"), Expr::ident("Shift"));
    assert_eq!(resolve_mask(&all_but_shift, &ModMaskLookup), Ok(0xfe));
    assert_eq!(resolve_mask(&Expr::ident("none"), &ModMaskLookup), Ok(0));
    assert_eq!(resolve_mask(&int(0x41), &ModMaskLookup), Ok(0x41));

    let action = Expr::Action {
        name: "SetMods".to_string(),
        args: Vec::new(),
    };
    assert_eq!(
        resolve_mask(&action, &ModMaskLookup),
        Err(ExprError::UnexpectedInMask("action"))
    );
    assert!(matches!(
        resolve_mask(&Expr::binary(BinaryOp::Multiply, int(1), int(2)), &ModMaskLookup),
        Err(ExprError::IllegalOperation { op: "Multiplication", .. })
    ));
}

#[test]
fn test_keysyms() {
    assert_eq!(resolve_keysym(&Expr::ident("exclam")), Ok('!' as u32));
    assert_eq!(resolve_keysym(&Expr::ident("NoSymbol")), Ok(0));
    assert_eq!(resolve_keysym(&Expr::ident("VoidSymbol")), Ok(0xffffff));
    // Small numbers are digits
    assert_eq!(resolve_keysym(&int(1)), Ok('1' as u32));
    assert_eq!(resolve_keysym(&int(0xff1b)), Ok(0xff1b));
    assert_eq!(
        resolve_keysym(&Expr::ident("NotAKeysym")),
        Err(ExprError::UnknownKeysym("NotAKeysym".to_string()))
    );
}

#[test]
fn test_assignment_targets() {
    assert_eq!(resolve_lhs(&Expr::ident("minimum")), Ok((None, "minimum", None)));

    let field = Expr::FieldRef {
        element: "interpret".to_string(),
        field: "repeat".to_string(),
    };
    assert_eq!(resolve_lhs(&field), Ok((Some("interpret"), "repeat", None)));

    let index = int(2);
    let array = Expr::ArrayRef {
        element: None,
        field: "symbols".to_string(),
        index: Box::new(index.clone()),
    };
    assert_eq!(resolve_lhs(&array), Ok((None, "symbols", Some(&index))));

    assert_eq!(resolve_lhs(&int(3)), Err(ExprError::IllegalLhs("integer")));
}

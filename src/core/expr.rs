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

//! src/core/expr.rs
//!
//! Expression evaluator
//!
//! Turns expression trees into typed values:
//! - integers, booleans, strings and key names
//! - enumerated values from a fixed table
//! - bit masks (`Shift+Lock`, `all-Control`, `~Mod1`)
//! - modifier masks with real and virtual modifiers
//! - keysyms
//!
//! Identifiers are resolved through a pluggable [`Lookup`]. Each context
//! passes the lookup matching its vocabulary: level names, group names,
//! modifier names, control names and so on.
//!
//! # Errors
//! Every resolver returns an [`ExprError`] instead of a value when the
//! expression has the wrong shape. Callers turn these into diagnostics and
//! drop the offending statement.

use thiserror::Error;

use crate::core::ast::{BinaryOp, Expr, UnaryOp};
use crate::core::keysym::lookup_keysym;
use crate::core::types::{
    real_mod_index, KeyName, Keysym, ModMask, ALL_REAL_MODS, MAX_RADIO_GROUPS,
};

/// Expression evaluation failures
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ExprError {
    #[error("Found constant of type {found} where {expected} was expected")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },

    #[error("Identifier \"{name}\" of type {kind} is unknown")]
    UnknownIdent { name: String, kind: &'static str },

    #[error("Default \"{element}.{field}\" of type {kind} is unknown")]
    UnknownField {
        element: String,
        field: String,
        kind: &'static str,
    },

    #[error("{op} of {kind} values not permitted")]
    IllegalOperation { op: &'static str, kind: &'static str },

    #[error("Cannot divide by zero")]
    DivideByZero,

    #[error("{0} overflows an integer")]
    Overflow(&'static str),

    #[error("Strings of length >1 not supported where an integer is expected")]
    StringTooLong,

    #[error("Illegal identifier {name} (expected one of: {expected})")]
    IllegalEnum { name: String, expected: String },

    #[error("Unexpected {0} in mask expression")]
    UnexpectedInMask(&'static str),

    #[error("\"{0}\" is not a valid keysym")]
    UnknownKeysym(String),

    #[error("Illegal left hand side of assignment ({0})")]
    IllegalLhs(&'static str),
}

/// Identifier resolution for expression evaluation
///
/// `element` is set for `element.field` references and `None` for bare
/// identifiers.
pub trait Lookup {
    fn lookup(&self, element: Option<&str>, field: &str) -> Option<u32>;
}

/// Case-insensitive lookup over a static name table
///
/// Only bare identifiers resolve; `element.field` references never do.
#[derive(Clone, Copy, Debug)]
pub struct SimpleLookup<'a>(pub &'a [(&'a str, u32)]);

impl Lookup for SimpleLookup<'_> {
    fn lookup(&self, element: Option<&str>, field: &str) -> Option<u32> {
        if element.is_some() {
            return None;
        }
        self.0
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(field))
            .map(|(_, value)| *value)
    }
}

/// Radio group names: `group3`, `radiogroup3`, `rg3` or a bare number
#[derive(Clone, Copy, Debug, Default)]
pub struct RadioLookup;

impl Lookup for RadioLookup {
    fn lookup(&self, element: Option<&str>, field: &str) -> Option<u32> {
        if element.is_some() {
            return None;
        }
        let lower = field.to_ascii_lowercase();
        let digits = ["radiogroup", "group", "rg"]
            .iter()
            .find_map(|prefix| lower.strip_prefix(prefix))
            .unwrap_or(&lower);
        if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        let value: u32 = digits.parse().ok()?;
        (1..=MAX_RADIO_GROUPS).contains(&value).then_some(value)
    }
}

/// Real modifier index by name (`Shift` = 0 .. `Mod5` = 7)
#[derive(Clone, Copy, Debug, Default)]
pub struct ModIndexLookup;

impl Lookup for ModIndexLookup {
    fn lookup(&self, element: Option<&str>, field: &str) -> Option<u32> {
        if element.is_some() {
            return None;
        }
        real_mod_index(field).map(|i| i as u32)
    }
}

/// Real modifier mask by name, plus `all` and `none`
#[derive(Clone, Copy, Debug, Default)]
pub struct ModMaskLookup;

impl Lookup for ModMaskLookup {
    fn lookup(&self, element: Option<&str>, field: &str) -> Option<u32> {
        if element.is_some() {
            return None;
        }
        if field.eq_ignore_ascii_case("all") {
            return Some(ALL_REAL_MODS as u32);
        }
        if field.eq_ignore_ascii_case("none") {
            return Some(0);
        }
        real_mod_index(field).map(|i| 1 << i)
    }
}

/// Group names `group1` .. `group8`
pub const GROUP_NAMES: &[(&str, u32)] = &[
    ("group1", 1),
    ("group2", 2),
    ("group3", 3),
    ("group4", 4),
    ("group5", 5),
    ("group6", 6),
    ("group7", 7),
    ("group8", 8),
];

/// Level names `level1` .. `level8`
pub const LEVEL_NAMES: &[(&str, u32)] = &[
    ("level1", 1),
    ("level2", 2),
    ("level3", 3),
    ("level4", 4),
    ("level5", 5),
    ("level6", 6),
    ("level7", 7),
    ("level8", 8),
];

fn binary_op_name(op: BinaryOp) -> &'static str {
    match op {
        BinaryOp::Add => "Addition",
        BinaryOp::Subtract => "Subtraction",
        BinaryOp::Multiply => "Multiplication",
        BinaryOp::Divide => "Division",
        BinaryOp::Assign => "Assignment",
    }
}

fn unary_op_name(op: UnaryOp) -> &'static str {
    match op {
        UnaryOp::Negate => "Negation",
        UnaryOp::Plus => "Unary plus",
        UnaryOp::Not => "Logical not",
        UnaryOp::Invert => "Bitwise inversion",
    }
}

fn lookup_or<T>(
    lookup: Option<&dyn Lookup>,
    element: Option<&str>,
    field: &str,
    kind: &'static str,
    map: impl FnOnce(u32) -> T,
) -> Result<T, ExprError> {
    match lookup.and_then(|l| l.lookup(element, field)) {
        Some(value) => Ok(map(value)),
        None => Err(match element {
            Some(element) => ExprError::UnknownField {
                element: element.to_string(),
                field: field.to_string(),
                kind,
            },
            None => ExprError::UnknownIdent {
                name: field.to_string(),
                kind,
            },
        }),
    }
}

/// Resolve a boolean
///
/// Accepts literals, `true`/`yes`/`on`, `false`/`no`/`off`, identifiers
/// known to `lookup` (non-zero is true) and `!`/`~` negation.
pub fn resolve_boolean(expr: &Expr, lookup: Option<&dyn Lookup>) -> Result<bool, ExprError> {
    match expr {
        Expr::Boolean(value) => Ok(*value),
        Expr::Ident(name) => {
            let lower = name.to_ascii_lowercase();
            match lower.as_str() {
                "true" | "yes" | "on" => Ok(true),
                "false" | "no" | "off" => Ok(false),
                _ => lookup_or(lookup, None, name, "boolean", |v| v != 0),
            }
        }
        Expr::FieldRef { element, field } => {
            lookup_or(lookup, Some(element), field, "boolean", |v| v != 0)
        }
        Expr::Unary {
            op: UnaryOp::Not | UnaryOp::Invert,
            operand,
        } => resolve_boolean(operand, lookup).map(|v| !v),
        Expr::Unary { op, .. } => Err(ExprError::IllegalOperation {
            op: unary_op_name(*op),
            kind: "boolean",
        }),
        Expr::Binary { op, .. } => Err(ExprError::IllegalOperation {
            op: binary_op_name(*op),
            kind: "boolean",
        }),
        other => Err(ExprError::TypeMismatch {
            expected: "boolean",
            found: other.kind_name(),
        }),
    }
}

/// Resolve an integer
///
/// Single-character strings evaluate to their character code and the empty
/// string to zero, so `"a"` can stand in for a byte value.
pub fn resolve_integer(expr: &Expr, lookup: Option<&dyn Lookup>) -> Result<i64, ExprError> {
    match expr {
        Expr::Integer(value) => Ok(*value),
        Expr::String(s) => {
            let mut chars = s.chars();
            match (chars.next(), chars.next()) {
                (None, _) => Ok(0),
                (Some(c), None) => Ok(c as i64),
                _ => Err(ExprError::StringTooLong),
            }
        }
        Expr::Ident(name) => lookup_or(lookup, None, name, "int", i64::from),
        Expr::FieldRef { element, field } => {
            lookup_or(lookup, Some(element), field, "int", i64::from)
        }
        Expr::Binary { op, left, right } => {
            if *op == BinaryOp::Assign {
                return Err(ExprError::IllegalOperation {
                    op: binary_op_name(*op),
                    kind: "int",
                });
            }
            let l = resolve_integer(left, lookup)?;
            let r = resolve_integer(right, lookup)?;
            match op {
                BinaryOp::Add => Ok(l.wrapping_add(r)),
                BinaryOp::Subtract => Ok(l.wrapping_sub(r)),
                BinaryOp::Multiply => Ok(l.wrapping_mul(r)),
                BinaryOp::Divide => {
                    if r == 0 {
                        return Err(ExprError::DivideByZero);
                    }
                    l.checked_div(r)
                        .ok_or(ExprError::Overflow(binary_op_name(*op)))
                }
                BinaryOp::Assign => Err(ExprError::IllegalOperation {
                    op: binary_op_name(*op),
                    kind: "int",
                }),
            }
        }
        Expr::Unary { op, operand } => match op {
            UnaryOp::Negate => resolve_integer(operand, lookup)?
                .checked_neg()
                .ok_or(ExprError::Overflow(unary_op_name(*op))),
            UnaryOp::Invert => resolve_integer(operand, lookup).map(|v| !v),
            UnaryOp::Plus => resolve_integer(operand, lookup),
            UnaryOp::Not => Err(ExprError::IllegalOperation {
                op: unary_op_name(*op),
                kind: "int",
            }),
        },
        other => Err(ExprError::TypeMismatch {
            expected: "an int",
            found: other.kind_name(),
        }),
    }
}

/// Resolve a string; `+` concatenates
pub fn resolve_string(expr: &Expr) -> Result<String, ExprError> {
    match expr {
        Expr::String(s) => Ok(s.clone()),
        Expr::Binary {
            op: BinaryOp::Add,
            left,
            right,
        } => Ok(resolve_string(left)? + &resolve_string(right)?),
        Expr::Binary { op, .. } => Err(ExprError::IllegalOperation {
            op: binary_op_name(*op),
            kind: "string",
        }),
        Expr::Unary { op, .. } => Err(ExprError::IllegalOperation {
            op: unary_op_name(*op),
            kind: "string",
        }),
        Expr::Ident(name) => Err(ExprError::UnknownIdent {
            name: name.clone(),
            kind: "string",
        }),
        other => Err(ExprError::TypeMismatch {
            expected: "string",
            found: other.kind_name(),
        }),
    }
}

/// Resolve a key name literal
pub fn resolve_keyname(expr: &Expr) -> Result<KeyName, ExprError> {
    match expr {
        Expr::KeyName(name) => Ok(*name),
        Expr::Ident(name) => Err(ExprError::UnknownIdent {
            name: name.clone(),
            kind: "key name",
        }),
        other => Err(ExprError::TypeMismatch {
            expected: "key name",
            found: other.kind_name(),
        }),
    }
}

/// Resolve an identifier against a fixed table of names
pub fn resolve_enum(expr: &Expr, table: &[(&str, u32)]) -> Result<u32, ExprError> {
    let Expr::Ident(name) = expr else {
        return Err(ExprError::TypeMismatch {
            expected: "an enumerated value",
            found: expr.kind_name(),
        });
    };
    SimpleLookup(table)
        .lookup(None, name)
        .ok_or_else(|| ExprError::IllegalEnum {
            name: name.clone(),
            expected: table
                .iter()
                .map(|(n, _)| *n)
                .collect::<Vec<_>>()
                .join(", "),
        })
}

/// Resolve a bit mask
///
/// `+` combines masks, `-` removes bits, `~` inverts an integer operand.
pub fn resolve_mask(expr: &Expr, lookup: &dyn Lookup) -> Result<u32, ExprError> {
    match expr {
        Expr::Integer(value) => Ok(*value as u32),
        Expr::Ident(name) => lookup_or(Some(lookup), None, name, "int", |v| v),
        Expr::FieldRef { element, field } => {
            lookup_or(Some(lookup), Some(element), field, "int", |v| v)
        }
        Expr::ArrayRef { .. } => Err(ExprError::UnexpectedInMask("array reference")),
        Expr::Action { .. } => Err(ExprError::UnexpectedInMask("action")),
        Expr::Binary { op, left, right } => match op {
            BinaryOp::Add => Ok(resolve_mask(left, lookup)? | resolve_mask(right, lookup)?),
            BinaryOp::Subtract => {
                Ok(resolve_mask(left, lookup)? & !resolve_mask(right, lookup)?)
            }
            _ => Err(ExprError::IllegalOperation {
                op: binary_op_name(*op),
                kind: "mask",
            }),
        },
        Expr::Unary {
            op: UnaryOp::Invert,
            operand,
        } => resolve_integer(operand, Some(lookup)).map(|v| !(v as u32)),
        Expr::Unary { op, .. } => Err(ExprError::IllegalOperation {
            op: unary_op_name(*op),
            kind: "mask",
        }),
        other => Err(ExprError::TypeMismatch {
            expected: "mask",
            found: other.kind_name(),
        }),
    }
}

/// Resolve a mask of real modifiers only
pub fn resolve_modmask(expr: &Expr) -> Result<ModMask, ExprError> {
    resolve_mask(expr, &ModMaskLookup).map(ModMask::from_packed)
}

/// Resolve a keysym from a name or a number
///
/// Numbers below ten are taken as the digit keysyms `0`..`9`.
pub fn resolve_keysym(expr: &Expr) -> Result<Keysym, ExprError> {
    if let Expr::Ident(name) = expr {
        if let Some(sym) = lookup_keysym(name) {
            return Ok(sym);
        }
    }
    match resolve_integer(expr, None) {
        Ok(value) if (0..10).contains(&value) => Ok(value as Keysym + '0' as Keysym),
        Ok(value) => Ok(value as Keysym),
        Err(_) => match expr {
            Expr::Ident(name) => Err(ExprError::UnknownKeysym(name.clone())),
            other => Err(ExprError::TypeMismatch {
                expected: "keysym",
                found: other.kind_name(),
            }),
        },
    }
}

/// Split an assignment target into element, field and optional index
pub fn resolve_lhs(expr: &Expr) -> Result<(Option<&str>, &str, Option<&Expr>), ExprError> {
    match expr {
        Expr::Ident(name) => Ok((None, name.as_str(), None)),
        Expr::FieldRef { element, field } => Ok((Some(element.as_str()), field.as_str(), None)),
        Expr::ArrayRef {
            element,
            field,
            index,
        } => Ok((element.as_deref(), field.as_str(), Some(index.as_ref()))),
        other => Err(ExprError::IllegalLhs(other.kind_name())),
    }
}

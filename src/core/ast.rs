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

//! src/core/ast.rs
//!
//! Statement and expression tree handed from the parser to the compilers
//!
//! The tree is plain owned data. Statements keep their merge mode so the
//! sub-compilers can apply the merge algebra per statement, and every
//! parsed section carries a unique id used to tell same-file collisions
//! from cross-file ones.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::core::types::{FileType, KeyName, MapFlags, MergeMode};

/// Binary operators
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    Assign,
}

/// Unary operators
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum UnaryOp {
    /// `-x`
    Negate,
    /// `+x`
    Plus,
    /// `!x`
    Not,
    /// `~x`
    Invert,
}

/// Expression tree
#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Boolean(bool),
    Integer(i64),
    String(String),
    KeyName(KeyName),
    /// Bare identifier such as `Shift` or `NumLock`
    Ident(String),
    /// `element.field`
    FieldRef { element: String, field: String },
    /// `field[index]` or `element.field[index]`
    ArrayRef {
        element: Option<String>,
        field: String,
        index: Box<Expr>,
    },
    /// `Name(arg, arg = value, ...)`
    Action { name: String, args: Vec<Expr> },
    /// `[ a, A, ... ]`, names resolved later
    KeysymList(Vec<String>),
    /// `[ SetMods(...), NoAction() ]`
    ActionList(Vec<Expr>),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary { op: UnaryOp, operand: Box<Expr> },
}

impl Expr {
    pub fn ident(name: &str) -> Expr {
        Expr::Ident(name.to_string())
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn unary(op: UnaryOp, operand: Expr) -> Expr {
        Expr::Unary {
            op,
            operand: Box::new(operand),
        }
    }

    /// Short description used in diagnostics
    pub fn kind_name(&self) -> &'static str {
        match self {
            Expr::Boolean(_) => "boolean",
            Expr::Integer(_) => "integer",
            Expr::String(_) => "string",
            Expr::KeyName(_) => "key name",
            Expr::Ident(_) => "identifier",
            Expr::FieldRef { .. } => "field reference",
            Expr::ArrayRef { .. } => "array reference",
            Expr::Action { .. } => "action",
            Expr::KeysymList(_) => "keysym list",
            Expr::ActionList(_) => "action list",
            Expr::Binary { .. } => "binary expression",
            Expr::Unary { .. } => "unary expression",
        }
    }
}

/// `name = value;` or the boolean shorthands `name;` / `!name;`
///
/// A `VarDef` without a name only appears inside a key body, where it
/// denotes the unnamed symbols or actions list.
#[derive(Clone, Debug, PartialEq)]
pub struct VarDef {
    pub merge: MergeMode,
    pub name: Option<Expr>,
    pub value: Option<Expr>,
}

impl VarDef {
    pub fn new(name: Expr, value: Expr) -> Self {
        Self {
            merge: MergeMode::Default,
            name: Some(name),
            value: Some(value),
        }
    }
}

/// One `file(map)` element of an include statement
#[derive(Clone, Debug, PartialEq)]
pub struct IncludeTerm {
    /// Operator joining this term to the previous one
    pub merge: MergeMode,
    /// `None` for a bare self reference
    pub file: Option<String>,
    pub map: Option<String>,
    /// `:N` group suffix, 1-based
    pub modifier: Option<u32>,
}

impl IncludeTerm {
    pub fn is_self(&self) -> bool {
        self.file.is_none()
    }
}

/// `include "a(b)+c:2|"` after splitting into terms
#[derive(Clone, Debug, PartialEq)]
pub struct IncludeStmt {
    pub merge: MergeMode,
    /// Statement text as written, used to name the included section
    pub stmt: String,
    pub terms: Vec<IncludeTerm>,
}

/// Statements of a section body
#[derive(Clone, Debug, PartialEq)]
pub enum Stmt {
    Include(IncludeStmt),
    Var(VarDef),
    VMod {
        merge: MergeMode,
        name: String,
        value: Option<Expr>,
    },
    Keycode {
        merge: MergeMode,
        name: KeyName,
        value: i64,
    },
    KeyAlias {
        merge: MergeMode,
        alias: KeyName,
        real: KeyName,
    },
    KeyType {
        merge: MergeMode,
        name: String,
        body: Vec<VarDef>,
    },
    Interp {
        merge: MergeMode,
        sym: String,
        predicate: Option<Expr>,
        body: Vec<VarDef>,
    },
    Symbols {
        merge: MergeMode,
        key_name: KeyName,
        body: Vec<VarDef>,
    },
    ModMap {
        merge: MergeMode,
        modifier: String,
        keys: Vec<Expr>,
    },
    GroupCompat {
        merge: MergeMode,
        group: i64,
        value: Expr,
    },
    IndicatorMap {
        merge: MergeMode,
        name: String,
        body: Vec<VarDef>,
    },
    IndicatorName {
        merge: MergeMode,
        index: i64,
        name: Expr,
        is_virtual: bool,
    },
}

impl Stmt {
    pub fn merge(&self) -> MergeMode {
        match self {
            Stmt::Include(inc) => inc.merge,
            Stmt::Var(def) => def.merge,
            Stmt::VMod { merge, .. }
            | Stmt::Keycode { merge, .. }
            | Stmt::KeyAlias { merge, .. }
            | Stmt::KeyType { merge, .. }
            | Stmt::Interp { merge, .. }
            | Stmt::Symbols { merge, .. }
            | Stmt::ModMap { merge, .. }
            | Stmt::GroupCompat { merge, .. }
            | Stmt::IndicatorMap { merge, .. }
            | Stmt::IndicatorName { merge, .. } => *merge,
        }
    }

    /// Apply a `augment`/`override`/... prefix parsed in front of the statement
    pub fn set_merge(&mut self, mode: MergeMode) {
        match self {
            Stmt::Include(inc) => inc.merge = mode,
            Stmt::Var(def) => def.merge = mode,
            Stmt::VMod { merge, .. }
            | Stmt::Keycode { merge, .. }
            | Stmt::KeyAlias { merge, .. }
            | Stmt::KeyType { merge, .. }
            | Stmt::Interp { merge, .. }
            | Stmt::Symbols { merge, .. }
            | Stmt::ModMap { merge, .. }
            | Stmt::GroupCompat { merge, .. }
            | Stmt::IndicatorMap { merge, .. }
            | Stmt::IndicatorName { merge, .. } => *merge = mode,
        }
    }

    /// What the statement declares, for "ignoring definition of ..." messages
    pub fn description(&self) -> &'static str {
        match self {
            Stmt::Include(_) => "an include statement",
            Stmt::Var(_) => "a global variable",
            Stmt::VMod { .. } => "virtual modifiers",
            Stmt::Keycode { .. } => "a key name",
            Stmt::KeyAlias { .. } => "a key alias",
            Stmt::KeyType { .. } => "a key type",
            Stmt::Interp { .. } => "a symbol interpretation",
            Stmt::Symbols { .. } => "key symbols",
            Stmt::ModMap { .. } => "a modifier map",
            Stmt::GroupCompat { .. } => "a group compatibility map",
            Stmt::IndicatorMap { .. } => "an indicator map",
            Stmt::IndicatorName { .. } => "an indicator name",
        }
    }
}

static NEXT_FILE_ID: AtomicU32 = AtomicU32::new(1);

/// Allocate a fresh section id; ids are unique for the process lifetime
pub fn next_file_id() -> u32 {
    NEXT_FILE_ID.fetch_add(1, Ordering::Relaxed)
}

/// A parsed section (`xkb_symbols "pc" { ... };`) or a composite keymap
#[derive(Clone, Debug, PartialEq)]
pub struct XkbFile {
    pub file_type: FileType,
    pub name: String,
    pub flags: MapFlags,
    pub id: u32,
    pub stmts: Vec<Stmt>,
    /// Component sections of a composite file
    pub sections: Vec<XkbFile>,
}

impl XkbFile {
    pub fn new(file_type: FileType, name: &str) -> Self {
        Self {
            file_type,
            name: name.to_string(),
            flags: MapFlags::default(),
            id: next_file_id(),
            stmts: Vec::new(),
            sections: Vec::new(),
        }
    }

    pub fn with_stmts(mut self, stmts: Vec<Stmt>) -> Self {
        self.stmts = stmts;
        self
    }

    pub fn is_default(&self) -> bool {
        self.flags.contains(MapFlags::IS_DEFAULT)
    }
}

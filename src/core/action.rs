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

//! src/core/action.rs
//!
//! Action resolver
//!
//! Turns `SetMods(modifiers=Shift, clearLocks)` style declarations into
//! typed [`Action`] records.
//!
//! # Architecture
//! - [`ActionKind`] names the 22 action kinds and their aliases
//! - [`ActionField`] names every field any action understands
//! - [`Action`] is the tagged result, one variant per kind
//! - [`ActionDefaults`] holds `action.x = ...` / `SetMods.x = ...`
//!   assignments that apply before the explicit arguments
//!
//! Field dispatch is a `match` over the action variant; fields an action
//! does not know are rejected with an error for that declaration only.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::ast::{BinaryOp, Expr, UnaryOp};
use crate::core::expr::{self, ExprError, SimpleLookup, GROUP_NAMES};
use crate::core::keymap::Keymap;
use crate::core::types::{Keycode, ModMask, LOCK_MASK, NUM_KBD_GROUPS};
use crate::core::vmod::{resolve_vmodmask, VirtualMods};

/// Action flag bits
pub mod flags {
    pub const CLEAR_LOCKS: u8 = 1 << 0;
    pub const LATCH_TO_LOCK: u8 = 1 << 1;
    pub const USE_MOD_MAP_MODS: u8 = 1 << 2;
    pub const GROUP_ABSOLUTE: u8 = 1 << 2;

    pub const NO_ACCELERATION: u8 = 1 << 0;
    pub const MOVE_ABSOLUTE_X: u8 = 1 << 1;
    pub const MOVE_ABSOLUTE_Y: u8 = 1 << 2;

    pub const LOCK_NO_LOCK: u8 = 1 << 0;
    pub const LOCK_NO_UNLOCK: u8 = 1 << 1;
    pub const LOCK_MASK: u8 = LOCK_NO_LOCK | LOCK_NO_UNLOCK;

    pub const ISO_DFLT_IS_GROUP: u8 = 1 << 7;
    pub const ISO_NO_AFFECT_MODS: u8 = 1 << 6;
    pub const ISO_NO_AFFECT_GROUP: u8 = 1 << 5;
    pub const ISO_NO_AFFECT_PTR: u8 = 1 << 4;
    pub const ISO_NO_AFFECT_CTRLS: u8 = 1 << 3;
    pub const ISO_AFFECT_MASK: u8 = 0x78;

    pub const SWITCH_APPLICATION: u8 = 1 << 0;
    pub const SWITCH_ABSOLUTE: u8 = 1 << 2;

    pub const MESSAGE_ON_PRESS: u8 = 1 << 0;
    pub const MESSAGE_ON_RELEASE: u8 = 1 << 1;
    pub const MESSAGE_GEN_KEY_EVENT: u8 = 1 << 2;

    pub const AFFECT_DFLT_BTN: u8 = 1;
    pub const DFLT_BTN_ABSOLUTE: u8 = 1 << 2;
}

/// Boolean keyboard controls
pub mod controls {
    pub const REPEAT_KEYS: u32 = 1 << 0;
    pub const SLOW_KEYS: u32 = 1 << 1;
    pub const BOUNCE_KEYS: u32 = 1 << 2;
    pub const STICKY_KEYS: u32 = 1 << 3;
    pub const MOUSE_KEYS: u32 = 1 << 4;
    pub const MOUSE_KEYS_ACCEL: u32 = 1 << 5;
    pub const ACCESS_X_KEYS: u32 = 1 << 6;
    pub const ACCESS_X_TIMEOUT: u32 = 1 << 7;
    pub const ACCESS_X_FEEDBACK: u32 = 1 << 8;
    pub const AUDIBLE_BELL: u32 = 1 << 9;
    pub const OVERLAY1: u32 = 1 << 10;
    pub const OVERLAY2: u32 = 1 << 11;
    pub const IGNORE_GROUP_LOCK: u32 = 1 << 12;
    pub const ALL: u32 = 0x1fff;

    /// Canonical names first; used for both parsing and printing
    pub const NAMES: &[(&str, u32)] = &[
        ("RepeatKeys", REPEAT_KEYS),
        ("SlowKeys", SLOW_KEYS),
        ("BounceKeys", BOUNCE_KEYS),
        ("StickyKeys", STICKY_KEYS),
        ("MouseKeys", MOUSE_KEYS),
        ("MouseKeysAccel", MOUSE_KEYS_ACCEL),
        ("AccessXKeys", ACCESS_X_KEYS),
        ("AccessXTimeout", ACCESS_X_TIMEOUT),
        ("AccessXFeedback", ACCESS_X_FEEDBACK),
        ("AudibleBell", AUDIBLE_BELL),
        ("Overlay1", OVERLAY1),
        ("Overlay2", OVERLAY2),
        ("IgnoreGroupLock", IGNORE_GROUP_LOCK),
        ("repeat", REPEAT_KEYS),
        ("autorepeat", REPEAT_KEYS),
        ("all", ALL),
        ("none", 0),
    ];
}

const LOCK_WHICH: &[(&str, u32)] = &[
    ("both", 0),
    ("lock", flags::LOCK_NO_UNLOCK as u32),
    ("neither", flags::LOCK_MASK as u32),
    ("unlock", flags::LOCK_NO_LOCK as u32),
];

const BUTTON_NAMES: &[(&str, u32)] = &[
    ("button1", 1),
    ("button2", 2),
    ("button3", 3),
    ("button4", 4),
    ("button5", 5),
    ("default", 0),
];

const PTR_DFLTS: &[(&str, u32)] = &[
    ("dfltbtn", flags::AFFECT_DFLT_BTN as u32),
    ("defaultbutton", flags::AFFECT_DFLT_BTN as u32),
    ("button", flags::AFFECT_DFLT_BTN as u32),
];

const ISO_NAMES: &[(&str, u32)] = &[
    ("mods", flags::ISO_NO_AFFECT_MODS as u32),
    ("modifiers", flags::ISO_NO_AFFECT_MODS as u32),
    ("group", flags::ISO_NO_AFFECT_GROUP as u32),
    ("groups", flags::ISO_NO_AFFECT_GROUP as u32),
    ("ptr", flags::ISO_NO_AFFECT_PTR as u32),
    ("pointer", flags::ISO_NO_AFFECT_PTR as u32),
    ("ctrls", flags::ISO_NO_AFFECT_CTRLS as u32),
    ("controls", flags::ISO_NO_AFFECT_CTRLS as u32),
    ("all", flags::ISO_AFFECT_MASK as u32),
    ("none", 0),
];

const EVENT_NAMES: &[(&str, u32)] = &[
    ("press", flags::MESSAGE_ON_PRESS as u32),
    ("keypress", flags::MESSAGE_ON_PRESS as u32),
    ("release", flags::MESSAGE_ON_RELEASE as u32),
    ("keyrelease", flags::MESSAGE_ON_RELEASE as u32),
    ("all", (flags::MESSAGE_ON_PRESS | flags::MESSAGE_ON_RELEASE) as u32),
    ("none", 0),
];

/// The kinds of action a key or interpretation can carry
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum ActionKind {
    NoAction,
    SetMods,
    LatchMods,
    LockMods,
    SetGroup,
    LatchGroup,
    LockGroup,
    MovePtr,
    PtrBtn,
    LockPtrBtn,
    SetPtrDflt,
    IsoLock,
    Terminate,
    SwitchScreen,
    SetControls,
    LockControls,
    ActionMessage,
    RedirectKey,
    DeviceBtn,
    LockDeviceBtn,
    DeviceValuator,
    Private,
}

impl ActionKind {
    /// Parse an action name, case-insensitively, accepting all aliases
    pub fn from_name(name: &str) -> Option<ActionKind> {
        let kind = match name.to_ascii_lowercase().as_str() {
            "noaction" => ActionKind::NoAction,
            "setmods" => ActionKind::SetMods,
            "latchmods" => ActionKind::LatchMods,
            "lockmods" => ActionKind::LockMods,
            "setgroup" => ActionKind::SetGroup,
            "latchgroup" => ActionKind::LatchGroup,
            "lockgroup" => ActionKind::LockGroup,
            "moveptr" | "movepointer" => ActionKind::MovePtr,
            "ptrbtn" | "pointerbutton" => ActionKind::PtrBtn,
            "lockptrbtn" | "lockpointerbutton" | "lockptrbutton" | "lockpointerbtn" => {
                ActionKind::LockPtrBtn
            }
            "setptrdflt" | "setpointerdefault" => ActionKind::SetPtrDflt,
            "isolock" => ActionKind::IsoLock,
            "terminate" | "terminateserver" => ActionKind::Terminate,
            "switchscreen" => ActionKind::SwitchScreen,
            "setcontrols" => ActionKind::SetControls,
            "lockcontrols" => ActionKind::LockControls,
            "actionmessage" | "messageaction" | "message" => ActionKind::ActionMessage,
            "redirect" | "redirectkey" => ActionKind::RedirectKey,
            "devbtn" | "devicebtn" | "devbutton" | "devicebutton" => ActionKind::DeviceBtn,
            "lockdevbtn" | "lockdevicebtn" | "lockdevbutton" | "lockdevicebutton" => {
                ActionKind::LockDeviceBtn
            }
            "devval" | "deviceval" | "devvaluator" | "devicevaluator" => {
                ActionKind::DeviceValuator
            }
            "private" => ActionKind::Private,
            _ => return None,
        };
        Some(kind)
    }

    /// Canonical name used when printing
    pub fn name(&self) -> &'static str {
        match self {
            ActionKind::NoAction => "NoAction",
            ActionKind::SetMods => "SetMods",
            ActionKind::LatchMods => "LatchMods",
            ActionKind::LockMods => "LockMods",
            ActionKind::SetGroup => "SetGroup",
            ActionKind::LatchGroup => "LatchGroup",
            ActionKind::LockGroup => "LockGroup",
            ActionKind::MovePtr => "MovePtr",
            ActionKind::PtrBtn => "PtrBtn",
            ActionKind::LockPtrBtn => "LockPtrBtn",
            ActionKind::SetPtrDflt => "SetPtrDflt",
            ActionKind::IsoLock => "ISOLock",
            ActionKind::Terminate => "Terminate",
            ActionKind::SwitchScreen => "SwitchScreen",
            ActionKind::SetControls => "SetControls",
            ActionKind::LockControls => "LockControls",
            ActionKind::ActionMessage => "ActionMessage",
            ActionKind::RedirectKey => "RedirectKey",
            ActionKind::DeviceBtn => "DevBtn",
            ActionKind::LockDeviceBtn => "LockDevBtn",
            ActionKind::DeviceValuator => "DevVal",
            ActionKind::Private => "Private",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Field names understood by at least one action kind
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum ActionField {
    ClearLocks,
    LatchToLock,
    GenKeyEvent,
    Report,
    Default,
    Affect,
    Increment,
    Modifiers,
    Group,
    X,
    Y,
    Accel,
    Button,
    Value,
    Controls,
    Type,
    Count,
    Screen,
    Same,
    Data,
    Device,
    Keycode,
    ModsToClear,
}

impl ActionField {
    pub fn from_name(name: &str) -> Option<ActionField> {
        let field = match name.to_ascii_lowercase().as_str() {
            "clearlocks" => ActionField::ClearLocks,
            "latchtolock" => ActionField::LatchToLock,
            "genkeyevent" | "generatekeyevent" => ActionField::GenKeyEvent,
            "report" => ActionField::Report,
            "default" => ActionField::Default,
            "affect" => ActionField::Affect,
            "increment" => ActionField::Increment,
            "mods" | "modifiers" => ActionField::Modifiers,
            "group" => ActionField::Group,
            "x" => ActionField::X,
            "y" => ActionField::Y,
            "accel" | "accelerate" | "repeat" => ActionField::Accel,
            "button" => ActionField::Button,
            "value" => ActionField::Value,
            "controls" | "ctrls" => ActionField::Controls,
            "type" => ActionField::Type,
            "count" => ActionField::Count,
            "screen" => ActionField::Screen,
            "same" | "sameserver" => ActionField::Same,
            "data" => ActionField::Data,
            "device" | "dev" => ActionField::Device,
            "key" | "keycode" | "kc" => ActionField::Keycode,
            "clearmods" | "clearmodifiers" => ActionField::ModsToClear,
            _ => return None,
        };
        Some(field)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ActionField::ClearLocks => "clearLocks",
            ActionField::LatchToLock => "latchToLock",
            ActionField::GenKeyEvent => "genKeyEvent",
            ActionField::Report => "report",
            ActionField::Default => "default",
            ActionField::Affect => "affect",
            ActionField::Increment => "increment",
            ActionField::Modifiers => "modifiers",
            ActionField::Group => "group",
            ActionField::X => "x",
            ActionField::Y => "y",
            ActionField::Accel => "accel",
            ActionField::Button => "button",
            ActionField::Value => "value",
            ActionField::Controls => "controls",
            ActionField::Type => "type",
            ActionField::Count => "count",
            ActionField::Screen => "screen",
            ActionField::Same => "same",
            ActionField::Data => "data",
            ActionField::Device => "device",
            ActionField::Keycode => "keycode",
            ActionField::ModsToClear => "clearmods",
        }
    }
}

/// SetMods / LatchMods / LockMods
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct ModAction {
    pub flags: u8,
    pub mods: ModMask,
}

/// SetGroup / LatchGroup / LockGroup
///
/// With `GROUP_ABSOLUTE` the group is a 0-based index, otherwise a
/// signed offset.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct GroupAction {
    pub flags: u8,
    pub group: i32,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct PointerAction {
    pub flags: u8,
    pub x: i32,
    pub y: i32,
}

/// PtrBtn / LockPtrBtn
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct PointerButtonAction {
    pub flags: u8,
    pub count: u8,
    pub button: u8,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct PointerDefaultAction {
    pub flags: u8,
    pub affect: u8,
    pub value: i32,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct IsoLockAction {
    pub flags: u8,
    pub mods: ModMask,
    pub group: i32,
    /// `ISO_NO_AFFECT_*` bits
    pub affect: u8,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct SwitchScreenAction {
    pub flags: u8,
    pub screen: i32,
}

/// SetControls / LockControls
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct ControlsAction {
    pub flags: u8,
    pub ctrls: u32,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct MessageAction {
    pub flags: u8,
    pub message: [u8; 6],
}

/// RedirectKey: `mods_mask` selects the modifiers the action touches and
/// `mods` gives their new state.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct RedirectKeyAction {
    pub new_key: Keycode,
    pub mods_mask: ModMask,
    pub mods: ModMask,
}

/// DevBtn / LockDevBtn
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct DeviceButtonAction {
    pub flags: u8,
    pub count: u8,
    pub button: u8,
    pub device: u8,
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct PrivateAction {
    pub action_type: u8,
    pub data: [u8; 7],
}

/// A resolved action
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub enum Action {
    #[default]
    None,
    SetMods(ModAction),
    LatchMods(ModAction),
    LockMods(ModAction),
    SetGroup(GroupAction),
    LatchGroup(GroupAction),
    LockGroup(GroupAction),
    MovePtr(PointerAction),
    PtrBtn(PointerButtonAction),
    LockPtrBtn(PointerButtonAction),
    SetPtrDflt(PointerDefaultAction),
    IsoLock(IsoLockAction),
    Terminate,
    SwitchScreen(SwitchScreenAction),
    SetControls(ControlsAction),
    LockControls(ControlsAction),
    ActionMessage(MessageAction),
    RedirectKey(RedirectKeyAction),
    DeviceBtn(DeviceButtonAction),
    LockDeviceBtn(DeviceButtonAction),
    DeviceValuator,
    Private(PrivateAction),
}

impl Action {
    /// A fresh action of `kind` with its factory defaults
    pub fn new(kind: ActionKind) -> Action {
        match kind {
            ActionKind::NoAction => Action::None,
            ActionKind::SetMods => Action::SetMods(ModAction::default()),
            ActionKind::LatchMods => Action::LatchMods(ModAction::default()),
            ActionKind::LockMods => Action::LockMods(ModAction::default()),
            ActionKind::SetGroup => Action::SetGroup(GroupAction::default()),
            ActionKind::LatchGroup => Action::LatchGroup(GroupAction::default()),
            ActionKind::LockGroup => Action::LockGroup(GroupAction::default()),
            ActionKind::MovePtr => Action::MovePtr(PointerAction::default()),
            ActionKind::PtrBtn => Action::PtrBtn(PointerButtonAction::default()),
            ActionKind::LockPtrBtn => Action::LockPtrBtn(PointerButtonAction::default()),
            ActionKind::SetPtrDflt => Action::SetPtrDflt(PointerDefaultAction {
                flags: 0,
                affect: flags::AFFECT_DFLT_BTN,
                value: 1,
            }),
            ActionKind::IsoLock => Action::IsoLock(IsoLockAction {
                mods: ModMask::new(LOCK_MASK, 0),
                ..Default::default()
            }),
            ActionKind::Terminate => Action::Terminate,
            ActionKind::SwitchScreen => Action::SwitchScreen(SwitchScreenAction::default()),
            ActionKind::SetControls => Action::SetControls(ControlsAction::default()),
            ActionKind::LockControls => Action::LockControls(ControlsAction::default()),
            ActionKind::ActionMessage => Action::ActionMessage(MessageAction::default()),
            ActionKind::RedirectKey => Action::RedirectKey(RedirectKeyAction::default()),
            ActionKind::DeviceBtn => Action::DeviceBtn(DeviceButtonAction::default()),
            ActionKind::LockDeviceBtn => Action::LockDeviceBtn(DeviceButtonAction::default()),
            ActionKind::DeviceValuator => Action::DeviceValuator,
            ActionKind::Private => Action::Private(PrivateAction::default()),
        }
    }

    pub fn kind(&self) -> ActionKind {
        match self {
            Action::None => ActionKind::NoAction,
            Action::SetMods(_) => ActionKind::SetMods,
            Action::LatchMods(_) => ActionKind::LatchMods,
            Action::LockMods(_) => ActionKind::LockMods,
            Action::SetGroup(_) => ActionKind::SetGroup,
            Action::LatchGroup(_) => ActionKind::LatchGroup,
            Action::LockGroup(_) => ActionKind::LockGroup,
            Action::MovePtr(_) => ActionKind::MovePtr,
            Action::PtrBtn(_) => ActionKind::PtrBtn,
            Action::LockPtrBtn(_) => ActionKind::LockPtrBtn,
            Action::SetPtrDflt(_) => ActionKind::SetPtrDflt,
            Action::IsoLock(_) => ActionKind::IsoLock,
            Action::Terminate => ActionKind::Terminate,
            Action::SwitchScreen(_) => ActionKind::SwitchScreen,
            Action::SetControls(_) => ActionKind::SetControls,
            Action::LockControls(_) => ActionKind::LockControls,
            Action::ActionMessage(_) => ActionKind::ActionMessage,
            Action::RedirectKey(_) => ActionKind::RedirectKey,
            Action::DeviceBtn(_) => ActionKind::DeviceBtn,
            Action::LockDeviceBtn(_) => ActionKind::LockDeviceBtn,
            Action::DeviceValuator => ActionKind::DeviceValuator,
            Action::Private(_) => ActionKind::Private,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Action::None)
    }
}

/// Failures while resolving an action declaration
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum ActionError {
    #[error("Expected an action definition, found {0}")]
    NotAnAction(&'static str),

    #[error("Unknown action {0}")]
    UnknownAction(String),

    #[error("Unknown field name {0}")]
    UnknownField(String),

    #[error("\"{0}\" is not a valid field in a NoAction action")]
    NoActionField(String),

    #[error("Cannot change defaults in an action definition (ignoring attempt to change {element}.{field})")]
    DefaultsInDefinition { element: String, field: String },

    #[error("Field {field} is not defined for an action of type {kind}")]
    IllegalField { field: &'static str, kind: ActionKind },

    #[error("The {field} field in the {kind} action is not an array")]
    NotArray { field: &'static str, kind: ActionKind },

    #[error("Value of {field} field must be of type {expected} (action {kind} definition ignored)")]
    Mismatch {
        field: &'static str,
        expected: &'static str,
        kind: ActionKind,
    },

    #[error("{0}")]
    OutOfRange(String),

    #[error("Key named {name} not found (ignoring the {field} field of a {kind} action)")]
    KeyNotFound {
        name: String,
        field: &'static str,
        kind: ActionKind,
    },

    #[error("{kind} actions are not supported")]
    Unsupported { kind: ActionKind },

    #[error(transparent)]
    Expr(#[from] ExprError),
}

/// What a field handler needs from the keymap being compiled
#[derive(Clone, Copy)]
pub struct ActionContext<'a> {
    pub keymap: &'a Keymap,
}

impl<'a> ActionContext<'a> {
    pub fn new(keymap: &'a Keymap) -> Self {
        Self { keymap }
    }

    fn vmods(&self) -> &'a VirtualMods {
        &self.keymap.vmods
    }
}

/// A recorded `<action>.field[index] = value` default
#[derive(Clone, Debug, PartialEq)]
pub struct ActionDefault {
    /// `NoAction` stands for the `action.` wildcard
    pub kind: ActionKind,
    pub field: ActionField,
    pub index: Option<Expr>,
    pub value: Expr,
}

/// Ordered defaults chain of a compat or symbols section
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ActionDefaults {
    entries: Vec<ActionDefault>,
}

impl ActionDefaults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[ActionDefault] {
        &self.entries
    }

    /// Record `element.field[index] = value`
    ///
    /// `element` is `action` for the wildcard or an action name. The value
    /// is validated only when an action using it is resolved.
    pub fn set_field(
        &mut self,
        element: &str,
        field: &str,
        index: Option<&Expr>,
        value: &Expr,
    ) -> Result<(), ActionError> {
        let kind = if element.eq_ignore_ascii_case("action") {
            ActionKind::NoAction
        } else {
            let kind = ActionKind::from_name(element)
                .ok_or_else(|| ActionError::UnknownAction(element.to_string()))?;
            if kind == ActionKind::NoAction {
                return Err(ActionError::NoActionField(field.to_string()));
            }
            kind
        };
        let field = ActionField::from_name(field)
            .ok_or_else(|| ActionError::UnknownField(field.to_string()))?;
        self.entries.push(ActionDefault {
            kind,
            field,
            index: index.cloned(),
            value: value.clone(),
        });
        Ok(())
    }

    /// Resolve an `Name(args)` expression into an action
    ///
    /// Factory defaults are applied first, then every default entry for
    /// the wildcard or for this kind, then the explicit arguments in
    /// order. Bare `arg` means `arg = true`, `!arg` means `arg = false`.
    ///
    /// # Example
    /// ```ignore
    /// let expr = Expr::Action { name: "SetMods".into(), args: vec![...] };
    /// let action = defaults.resolve(&expr, &ActionContext::new(&keymap))?;
    /// ```
    pub fn resolve(&self, expr: &Expr, ctx: &ActionContext<'_>) -> Result<Action, ActionError> {
        let Expr::Action { name, args } = expr else {
            return Err(ActionError::NotAnAction(expr.kind_name()));
        };
        let kind =
            ActionKind::from_name(name).ok_or_else(|| ActionError::UnknownAction(name.clone()))?;
        let mut action = Action::new(kind);

        if kind != ActionKind::NoAction {
            for entry in self
                .entries
                .iter()
                .filter(|e| e.kind == ActionKind::NoAction || e.kind == kind)
            {
                apply_field(&mut action, entry.field, entry.index.as_ref(), &entry.value, ctx)?;
            }
        }

        for arg in args {
            let (target, value) = match arg {
                Expr::Binary {
                    op: BinaryOp::Assign,
                    left,
                    right,
                } => (left.as_ref(), right.as_ref().clone()),
                Expr::Unary {
                    op: UnaryOp::Not | UnaryOp::Invert,
                    operand,
                } => (operand.as_ref(), Expr::Boolean(false)),
                other => (other, Expr::Boolean(true)),
            };
            let (element, field, index) = expr::resolve_lhs(target)?;
            if let Some(element) = element {
                return Err(ActionError::DefaultsInDefinition {
                    element: element.to_string(),
                    field: field.to_string(),
                });
            }
            let field = ActionField::from_name(field)
                .ok_or_else(|| ActionError::UnknownField(field.to_string()))?;
            apply_field(&mut action, field, index, &value, ctx)?;
        }

        Ok(action)
    }
}

fn mismatch(kind: ActionKind, field: ActionField, expected: &'static str) -> ActionError {
    ActionError::Mismatch {
        field: field.name(),
        expected,
        kind,
    }
}

fn illegal(kind: ActionKind, field: ActionField) -> ActionError {
    ActionError::IllegalField {
        field: field.name(),
        kind,
    }
}

fn check_not_array(
    kind: ActionKind,
    field: ActionField,
    index: Option<&Expr>,
) -> Result<(), ActionError> {
    match index {
        Some(_) => Err(ActionError::NotArray {
            field: field.name(),
            kind,
        }),
        None => Ok(()),
    }
}

/// Split a leading `+`/`-` off a value: returns (absolute, operand, negative)
fn split_sign(value: &Expr) -> (bool, &Expr, bool) {
    match value {
        Expr::Unary {
            op: UnaryOp::Negate,
            operand,
        } => (false, operand, true),
        Expr::Unary {
            op: UnaryOp::Plus,
            operand,
        } => (false, operand, false),
        other => (true, other, false),
    }
}

fn set_flag(flags: &mut u8, bit: u8, on: bool) {
    if on {
        *flags |= bit;
    } else {
        *flags &= !bit;
    }
}

fn resolve_bool(kind: ActionKind, field: ActionField, value: &Expr) -> Result<bool, ActionError> {
    expr::resolve_boolean(value, None).map_err(|_| mismatch(kind, field, "boolean"))
}

/// `clearLocks` / `latchToLock`
fn latch_lock_flag(
    kind: ActionKind,
    field: ActionField,
    value: &Expr,
    flags_inout: &mut u8,
) -> Result<(), ActionError> {
    let bit = match field {
        ActionField::ClearLocks => flags::CLEAR_LOCKS,
        ActionField::LatchToLock => flags::LATCH_TO_LOCK,
        _ => return Err(illegal(kind, field)),
    };
    let on = resolve_bool(kind, field, value)?;
    set_flag(flags_inout, bit, on);
    Ok(())
}

/// `modifiers = ...`, where `modMapMods` asks for the key's modifier map
fn modifier_field(
    kind: ActionKind,
    value: &Expr,
    flags_inout: &mut u8,
    ctx: &ActionContext<'_>,
) -> Result<ModMask, ActionError> {
    if let Expr::Ident(name) = value {
        if name.eq_ignore_ascii_case("usemodmapmods") || name.eq_ignore_ascii_case("modmapmods")
        {
            *flags_inout |= flags::USE_MOD_MAP_MODS;
            return Ok(ModMask::default());
        }
    }
    let mask = resolve_vmodmask(value, ctx.vmods())
        .map_err(|_| mismatch(kind, ActionField::Modifiers, "modifier mask"))?;
    *flags_inout &= !flags::USE_MOD_MAP_MODS;
    Ok(mask)
}

/// `group = N` (absolute) or `group = +N`/`-N` (relative), N in 1..4
fn group_field(kind: ActionKind, value: &Expr, flags_inout: &mut u8) -> Result<i32, ActionError> {
    let (absolute, operand, negative) = split_sign(value);
    set_flag(flags_inout, flags::GROUP_ABSOLUTE, absolute);
    let group = expr::resolve_integer(operand, Some(&SimpleLookup(GROUP_NAMES)))
        .map_err(|_| mismatch(kind, ActionField::Group, "integer (range 1..8)"))?;
    if !(1..=NUM_KBD_GROUPS as i64).contains(&group) {
        return Err(ActionError::OutOfRange(format!(
            "Illegal group {} (must be in the range 1..{})",
            group, NUM_KBD_GROUPS
        )));
    }
    let group = group as i32;
    Ok(match (absolute, negative) {
        (true, _) => group - 1,
        (false, true) => -group,
        (false, false) => group,
    })
}

fn lock_which(kind: ActionKind, value: &Expr, flags_inout: &mut u8) -> Result<(), ActionError> {
    let which = expr::resolve_enum(value, LOCK_WHICH)
        .map_err(|_| mismatch(kind, ActionField::Affect, "lock or unlock"))?;
    *flags_inout = (*flags_inout & !flags::LOCK_MASK) | which as u8;
    Ok(())
}

fn ranged_int(
    kind: ActionKind,
    field: ActionField,
    value: &Expr,
    table: Option<&[(&str, u32)]>,
    range: std::ops::RangeInclusive<i64>,
    message: &str,
) -> Result<i64, ActionError> {
    let lookup = table.map(SimpleLookup);
    let n = expr::resolve_integer(
        value,
        lookup.as_ref().map(|l| l as &dyn expr::Lookup),
    )
    .map_err(|_| mismatch(kind, field, "integer"))?;
    if !range.contains(&n) {
        return Err(ActionError::OutOfRange(format!("{} (got {})", message, n)));
    }
    Ok(n)
}

fn byte_data(
    kind: ActionKind,
    index: Option<&Expr>,
    value: &Expr,
    data: &mut [u8],
) -> Result<(), ActionError> {
    let len = data.len();
    match index {
        None => {
            let text = expr::resolve_string(value)
                .map_err(|_| mismatch(kind, ActionField::Data, "string"))?;
            if text.is_empty() || text.len() > len {
                tracing::warn!(kind = %kind, "action data holds only {} bytes", len);
            }
            data.fill(0);
            for (dst, src) in data.iter_mut().zip(text.bytes()) {
                *dst = src;
            }
            Ok(())
        }
        Some(index) => {
            let i = expr::resolve_integer(index, None)
                .map_err(|_| mismatch(kind, ActionField::Data, "integer"))?;
            if !(0..len as i64).contains(&i) {
                return Err(ActionError::OutOfRange(format!(
                    "Array subscript must be in the range 0..{} (got {})",
                    len - 1,
                    i
                )));
            }
            let datum = ranged_int(
                kind,
                ActionField::Data,
                value,
                None,
                0..=255,
                "Data must be in the range 0..255",
            )?;
            data[i as usize] = datum as u8;
            Ok(())
        }
    }
}

/// Apply one `field[index] = value` to an action
pub fn apply_field(
    action: &mut Action,
    field: ActionField,
    index: Option<&Expr>,
    value: &Expr,
    ctx: &ActionContext<'_>,
) -> Result<(), ActionError> {
    let kind = action.kind();
    if field != ActionField::Data {
        check_not_array(kind, field, index)?;
    }

    match action {
        Action::None | Action::Terminate => Err(illegal(kind, field)),

        Action::SetMods(act) | Action::LatchMods(act) => match field {
            ActionField::ClearLocks | ActionField::LatchToLock => {
                latch_lock_flag(kind, field, value, &mut act.flags)
            }
            ActionField::Modifiers => {
                act.mods = modifier_field(kind, value, &mut act.flags, ctx)?;
                Ok(())
            }
            _ => Err(illegal(kind, field)),
        },

        Action::LockMods(act) => match field {
            ActionField::Affect => lock_which(kind, value, &mut act.flags),
            ActionField::Modifiers => {
                act.mods = modifier_field(kind, value, &mut act.flags, ctx)?;
                Ok(())
            }
            _ => Err(illegal(kind, field)),
        },

        Action::SetGroup(act) | Action::LatchGroup(act) => match field {
            ActionField::ClearLocks | ActionField::LatchToLock => {
                latch_lock_flag(kind, field, value, &mut act.flags)
            }
            ActionField::Group => {
                act.group = group_field(kind, value, &mut act.flags)?;
                Ok(())
            }
            _ => Err(illegal(kind, field)),
        },

        Action::LockGroup(act) => match field {
            ActionField::Group => {
                act.group = group_field(kind, value, &mut act.flags)?;
                Ok(())
            }
            _ => Err(illegal(kind, field)),
        },

        Action::MovePtr(act) => match field {
            ActionField::X | ActionField::Y => {
                let (absolute, _, _) = split_sign(value);
                let n = expr::resolve_integer(value, None)
                    .map_err(|_| mismatch(kind, field, "integer"))?;
                let (slot, bit) = if field == ActionField::X {
                    (&mut act.x, flags::MOVE_ABSOLUTE_X)
                } else {
                    (&mut act.y, flags::MOVE_ABSOLUTE_Y)
                };
                *slot = n as i32;
                set_flag(&mut act.flags, bit, absolute);
                Ok(())
            }
            ActionField::Accel => {
                let on = resolve_bool(kind, field, value)?;
                set_flag(&mut act.flags, flags::NO_ACCELERATION, !on);
                Ok(())
            }
            _ => Err(illegal(kind, field)),
        },

        Action::PtrBtn(act) | Action::LockPtrBtn(act) => match field {
            ActionField::Button => {
                act.button = ranged_int(
                    kind,
                    field,
                    value,
                    Some(BUTTON_NAMES),
                    0..=5,
                    "Button must specify default or be in the range 1..5",
                )? as u8;
                Ok(())
            }
            ActionField::Affect if kind == ActionKind::LockPtrBtn => {
                lock_which(kind, value, &mut act.flags)
            }
            ActionField::Count => {
                act.count = ranged_int(
                    kind,
                    field,
                    value,
                    Some(BUTTON_NAMES),
                    0..=255,
                    "The count field must have a value in the range 0..255",
                )? as u8;
                Ok(())
            }
            _ => Err(illegal(kind, field)),
        },

        Action::SetPtrDflt(act) => match field {
            ActionField::Affect => {
                act.affect = expr::resolve_enum(value, PTR_DFLTS)
                    .map_err(|_| mismatch(kind, field, "pointer component"))?
                    as u8;
                Ok(())
            }
            ActionField::Button | ActionField::Value => {
                let (absolute, operand, negative) = split_sign(value);
                set_flag(&mut act.flags, flags::DFLT_BTN_ABSOLUTE, absolute);
                let n = ranged_int(
                    kind,
                    field,
                    operand,
                    Some(BUTTON_NAMES),
                    0..=5,
                    "New default button value must be in the range 1..5",
                )?;
                if n == 0 {
                    return Err(ActionError::OutOfRange(
                        "Cannot set default pointer button to \"default\"".to_string(),
                    ));
                }
                act.value = if negative { -n as i32 } else { n as i32 };
                Ok(())
            }
            _ => Err(illegal(kind, field)),
        },

        Action::IsoLock(act) => match field {
            ActionField::Modifiers => {
                let mut f = act.flags;
                act.mods = modifier_field(kind, value, &mut f, ctx)?;
                act.flags = f & !flags::ISO_DFLT_IS_GROUP;
                Ok(())
            }
            ActionField::Group => {
                let mut f = act.flags;
                act.group = group_field(kind, value, &mut f)?;
                act.flags = f | flags::ISO_DFLT_IS_GROUP;
                Ok(())
            }
            ActionField::Affect => {
                let mask = expr::resolve_mask(value, &SimpleLookup(ISO_NAMES))
                    .map_err(|_| mismatch(kind, field, "keyboard component"))?;
                act.affect = !(mask as u8) & flags::ISO_AFFECT_MASK;
                Ok(())
            }
            _ => Err(illegal(kind, field)),
        },

        Action::SwitchScreen(act) => match field {
            ActionField::Screen => {
                let (absolute, operand, negative) = split_sign(value);
                set_flag(&mut act.flags, flags::SWITCH_ABSOLUTE, absolute);
                let n = ranged_int(
                    kind,
                    field,
                    operand,
                    None,
                    0..=255,
                    "Screen index must be in the range 1..255",
                )?;
                act.screen = if negative { -n as i32 } else { n as i32 };
                Ok(())
            }
            ActionField::Same => {
                let same = resolve_bool(kind, field, value)?;
                set_flag(&mut act.flags, flags::SWITCH_APPLICATION, !same);
                Ok(())
            }
            _ => Err(illegal(kind, field)),
        },

        Action::SetControls(act) | Action::LockControls(act) => match field {
            ActionField::Controls => {
                act.ctrls = expr::resolve_mask(value, &SimpleLookup(controls::NAMES))
                    .map_err(|_| mismatch(kind, field, "controls mask"))?
                    & controls::ALL;
                Ok(())
            }
            ActionField::Affect if kind == ActionKind::LockControls => {
                lock_which(kind, value, &mut act.flags)
            }
            _ => Err(illegal(kind, field)),
        },

        Action::ActionMessage(act) => match field {
            ActionField::Report => {
                let mask = expr::resolve_mask(value, &SimpleLookup(EVENT_NAMES))
                    .map_err(|_| mismatch(kind, field, "key event mask"))?
                    as u8;
                let events = flags::MESSAGE_ON_PRESS | flags::MESSAGE_ON_RELEASE;
                act.flags = (act.flags & !events) | (mask & events);
                Ok(())
            }
            ActionField::GenKeyEvent => {
                let on = resolve_bool(kind, field, value)?;
                set_flag(&mut act.flags, flags::MESSAGE_GEN_KEY_EVENT, on);
                Ok(())
            }
            ActionField::Data => byte_data(kind, index, value, &mut act.message),
            _ => Err(illegal(kind, field)),
        },

        Action::RedirectKey(act) => match field {
            ActionField::Keycode => {
                let name = expr::resolve_keyname(value)
                    .map_err(|_| mismatch(kind, field, "key name"))?;
                act.new_key = ctx.keymap.find_key(name, true, 0).ok_or_else(|| {
                    ActionError::KeyNotFound {
                        name: name.to_string(),
                        field: field.name(),
                        kind,
                    }
                })?;
                Ok(())
            }
            ActionField::Modifiers | ActionField::ModsToClear => {
                let mut ignored = 0;
                let mask = modifier_field(kind, value, &mut ignored, ctx)?;
                act.mods_mask = act.mods_mask.union(mask);
                if field == ActionField::Modifiers {
                    act.mods = act.mods.union(mask);
                } else {
                    act.mods.real_mods &= !mask.real_mods;
                    act.mods.vmods &= !mask.vmods;
                }
                Ok(())
            }
            _ => Err(illegal(kind, field)),
        },

        Action::DeviceBtn(act) | Action::LockDeviceBtn(act) => match field {
            ActionField::Button => {
                act.button = ranged_int(
                    kind,
                    field,
                    value,
                    None,
                    0..=255,
                    "Button must specify default or be in the range 1..255",
                )? as u8;
                Ok(())
            }
            ActionField::Affect if kind == ActionKind::LockDeviceBtn => {
                lock_which(kind, value, &mut act.flags)
            }
            ActionField::Count => {
                act.count = ranged_int(
                    kind,
                    field,
                    value,
                    Some(BUTTON_NAMES),
                    0..=255,
                    "The count field must have a value in the range 0..255",
                )? as u8;
                Ok(())
            }
            ActionField::Device => {
                act.device = ranged_int(
                    kind,
                    field,
                    value,
                    None,
                    0..=255,
                    "Device must specify default or be in the range 1..255",
                )? as u8;
                Ok(())
            }
            _ => Err(illegal(kind, field)),
        },

        Action::DeviceValuator => Err(ActionError::Unsupported { kind }),

        Action::Private(act) => match field {
            ActionField::Type => {
                act.action_type = ranged_int(
                    kind,
                    field,
                    value,
                    None,
                    0..=255,
                    "Private action type must be in the range 0..255",
                )? as u8;
                Ok(())
            }
            ActionField::Data => byte_data(kind, index, value, &mut act.data),
            _ => Err(illegal(kind, field)),
        },
    }
}

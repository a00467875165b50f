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

//! src/core/indicators.rs
//!
//! Indicator (LED) maps
//!
//! Maps are declared by name in compat sections:
//!
//! ```text
//! indicator "Caps Lock" {
//!     whichModState = Locked;
//!     modifiers = Lock;
//! };
//! ```
//!
//! A map with an explicit `index` is bound to that LED when the compat
//! section is copied into the keymap. Maps without one are bound after all
//! sections are compiled, to the LED carrying the same name or else to the
//! first unnamed LED.

use crate::core::action::controls;
use crate::core::ast::{Expr, VarDef};
use crate::core::compiler::CompileState;
use crate::core::expr::{self, resolve_lhs, SimpleLookup};
use crate::core::keymap::{im_use, IndicatorMap, IM_LED_DRIVES_KB, IM_NO_AUTOMATIC, IM_NO_EXPLICIT};
use crate::core::merge::{should_report, Collisions, CommonInfo};
use crate::core::types::{MergeMode, ModMask, NUM_INDICATORS};
use crate::core::vmod::resolve_vmodmask;

/// Field bits of [`LedInfo::common`]
pub mod fields {
    pub const INDEX: u32 = 1 << 0;
    pub const MODS: u32 = 1 << 1;
    pub const GROUPS: u32 = 1 << 2;
    pub const CTRLS: u32 = 1 << 3;
    pub const EXPLICIT: u32 = 1 << 4;
    pub const AUTOMATIC: u32 = 1 << 5;
    pub const DRIVES_KBD: u32 = 1 << 6;
}

/// Group bits accepted by the `groups` field
pub const GROUP_MASK_NAMES: &[(&str, u32)] = &[
    ("group1", 0x01),
    ("group2", 0x02),
    ("group3", 0x04),
    ("group4", 0x08),
    ("group5", 0x10),
    ("group6", 0x20),
    ("group7", 0x40),
    ("group8", 0x80),
    ("none", 0x00),
    ("all", 0xff),
];

/// `whichGroupState` components; `compat` only applies to modifiers
const GROUP_COMPONENT_NAMES: &[(&str, u32)] = &[
    ("base", im_use::BASE as u32),
    ("latched", im_use::LATCHED as u32),
    ("locked", im_use::LOCKED as u32),
    ("effective", im_use::EFFECTIVE as u32),
    ("any", (im_use::ANY & !im_use::COMPAT) as u32),
    ("none", 0),
];

/// Working record for one indicator map
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LedInfo {
    pub common: CommonInfo,
    pub name: String,
    /// 1-based LED index, 0 while unbound
    pub index: u32,
    pub map: IndicatorMap,
}

impl LedInfo {
    fn same_content(&self, other: &LedInfo) -> bool {
        let (a, b) = (&self.map, &other.map);
        a.mods == b.mods
            && a.groups == b.groups
            && a.ctrls == b.ctrls
            && a.which_mods == b.which_mods
            && a.which_groups == b.which_groups
    }

    fn set_flag(&mut self, flag: u8, on: bool) {
        if on {
            self.map.flags |= flag;
        } else {
            self.map.flags &= !flag;
        }
    }

    fn not_array(&self, field: &str, state: &mut CompileState) -> bool {
        state
            .diag
            .error(format!(
                "The {} field of the {} indicator map is not an array",
                field, self.name
            ))
            .action("Illegal array reference ignored");
        false
    }

    fn bad_type(&self, field: &str, wanted: &str, state: &mut CompileState) -> bool {
        state.diag.error(format!(
            "The {} field of the {} indicator map must be {}",
            field, self.name, wanted
        ));
        false
    }

    /// Apply one field assignment of an indicator map body or default
    pub fn set_field(
        &mut self,
        field: &str,
        index: Option<&Expr>,
        value: &Expr,
        state: &mut CompileState,
    ) -> bool {
        let lower = field.to_ascii_lowercase();
        if index.is_some() {
            return self.not_array(field, state);
        }
        match lower.as_str() {
            "modifiers" | "mods" => match resolve_vmodmask(value, &state.keymap.vmods) {
                Ok(mask) => {
                    self.map.mods = mask;
                    self.common.set_defined(fields::MODS);
                }
                Err(_) => return self.bad_type(field, "a modifier mask", state),
            },
            "groups" => match expr::resolve_mask(value, &SimpleLookup(GROUP_MASK_NAMES)) {
                Ok(mask) => {
                    self.map.groups = mask as u8;
                    self.common.set_defined(fields::GROUPS);
                }
                Err(_) => return self.bad_type(field, "a group mask", state),
            },
            "controls" | "ctrls" => {
                match expr::resolve_mask(value, &SimpleLookup(controls::NAMES)) {
                    Ok(mask) => {
                        self.map.ctrls = mask;
                        self.common.set_defined(fields::CTRLS);
                    }
                    Err(_) => return self.bad_type(field, "a controls mask", state),
                }
            }
            "allowexplicit" => match expr::resolve_boolean(value, None) {
                Ok(allow) => {
                    self.set_flag(IM_NO_EXPLICIT, !allow);
                    self.common.set_defined(fields::EXPLICIT);
                }
                Err(_) => return self.bad_type(field, "a boolean", state),
            },
            "whichmodstate" | "whichmodifierstate" => {
                match expr::resolve_mask(value, &SimpleLookup(im_use::NAMES)) {
                    Ok(mask) => {
                        self.map.which_mods = mask as u8;
                        self.common.set_defined(fields::MODS);
                    }
                    Err(_) => {
                        return self.bad_type(field, "a mask of modifier state components", state)
                    }
                }
            }
            "whichgroupstate" => {
                match expr::resolve_mask(value, &SimpleLookup(GROUP_COMPONENT_NAMES)) {
                    Ok(mask) => {
                        self.map.which_groups = mask as u8;
                        self.common.set_defined(fields::GROUPS);
                    }
                    Err(_) => {
                        return self.bad_type(field, "a mask of group state components", state)
                    }
                }
            }
            "driveskbd" | "driveskeyboard" | "leddriveskbd" | "leddriveskeyboard"
            | "indicatordriveskbd" | "indicatordriveskeyboard" => {
                match expr::resolve_boolean(value, None) {
                    Ok(drives) => {
                        self.set_flag(IM_LED_DRIVES_KB, drives);
                        self.common.set_defined(fields::DRIVES_KBD);
                    }
                    Err(_) => return self.bad_type(field, "a boolean", state),
                }
            }
            "index" => match expr::resolve_integer(value, None) {
                Ok(index) if (1..=NUM_INDICATORS as i64).contains(&index) => {
                    self.index = index as u32;
                    self.common.set_defined(fields::INDEX);
                }
                Ok(index) => {
                    state
                        .diag
                        .error(format!(
                            "Illegal indicator index {} (range 1..{})",
                            index, NUM_INDICATORS
                        ))
                        .action(format!("Index definition for {} indicator ignored", self.name));
                    return false;
                }
                Err(_) => return self.bad_type(field, "an indicator index", state),
            },
            _ => {
                state
                    .diag
                    .error(format!("Unknown field {} in map for {} indicator", field, self.name))
                    .action("Definition ignored");
                return false;
            }
        }
        true
    }
}

/// Build an indicator map from its declaration
///
/// The map starts as a copy of the section's `indicator.x` defaults.
/// Element-qualified assignments are rejected inside a map body.
pub fn handle_indicator_map_def(
    name: &str,
    body: &[VarDef],
    dflt: &LedInfo,
    merge: MergeMode,
    state: &mut CompileState,
) -> Option<LedInfo> {
    let mut led = dflt.clone();
    led.common.merge = merge;
    led.name = name.to_string();

    let mut ok = true;
    for def in body {
        let Some(target) = def.name.as_ref() else {
            state.diag.error(format!("Unnamed value in the {} indicator map", name));
            ok = false;
            continue;
        };
        match resolve_lhs(target) {
            Ok((Some(element), field, _)) => {
                state
                    .diag
                    .error(format!(
                        "Cannot set defaults for \"{}\" element in indicator map",
                        element
                    ))
                    .action(format!("Assignment to {}.{} ignored", element, field));
                ok = false;
            }
            Ok((None, field, index)) => {
                let value = def.value.clone().unwrap_or(Expr::Boolean(true));
                ok = led.set_field(field, index, &value, state) && ok;
            }
            Err(err) => {
                state.diag.error(err.to_string());
                ok = false;
            }
        }
    }
    ok.then_some(led)
}

/// Merge `new` into a list of maps by name
pub fn add_indicator_map(leds: &mut Vec<LedInfo>, new: LedInfo, state: &mut CompileState) {
    let level = state.diag.level();
    let Some(old) = leds.iter_mut().find(|l| l.name == new.name) else {
        leds.push(new);
        return;
    };

    if old.same_content(&new) {
        old.common.defined |= new.common.defined;
        return;
    }

    if new.common.merge == MergeMode::Replace {
        if should_report(old.common.file_id, new.common.file_id, level) {
            state
                .diag
                .warn(format!("Map for indicator {} redefined", new.name))
                .action("Earlier definition ignored");
        }
        *old = new;
        return;
    }

    let mut collisions = Collisions::default();
    if collisions.check(fields::INDEX, &old.common, &new.common, level) {
        old.index = new.index;
        old.common.set_defined(fields::INDEX);
    }
    if collisions.check(fields::MODS, &old.common, &new.common, level) {
        old.map.which_mods = new.map.which_mods;
        old.map.mods = new.map.mods;
        old.common.set_defined(fields::MODS);
    }
    if collisions.check(fields::GROUPS, &old.common, &new.common, level) {
        old.map.which_groups = new.map.which_groups;
        old.map.groups = new.map.groups;
        old.common.set_defined(fields::GROUPS);
    }
    if collisions.check(fields::CTRLS, &old.common, &new.common, level) {
        old.map.ctrls = new.map.ctrls;
        old.common.set_defined(fields::CTRLS);
    }
    for (field, flag) in [
        (fields::EXPLICIT, IM_NO_EXPLICIT),
        (fields::AUTOMATIC, IM_NO_AUTOMATIC),
        (fields::DRIVES_KBD, IM_LED_DRIVES_KB),
    ] {
        if collisions.check(field, &old.common, &new.common, level) {
            old.map.flags = (old.map.flags & !flag) | (new.map.flags & flag);
            old.common.set_defined(field);
        }
    }
    if collisions.any() {
        let which = if new.common.merge == MergeMode::Augment {
            "first"
        } else {
            "last"
        };
        state
            .diag
            .warn(format!("Map for indicator {} redefined", new.name))
            .action(format!("Using {} definition for duplicate fields", which));
    }
}

/// Fill in the implied which-state components
fn effective_map(led: &LedInfo) -> IndicatorMap {
    let mut map = led.map.clone();
    if map.groups != 0 && map.which_groups == 0 {
        map.which_groups = im_use::EFFECTIVE;
    }
    if map.which_mods == 0 && map.mods != ModMask::default() {
        map.which_mods = im_use::EFFECTIVE;
    }
    map
}

/// Copy bound maps into the keymap, returning the ones left unbound
///
/// A map without an index takes the LED already carrying its name. A map
/// whose LED is named differently is reported and left unbound.
pub fn copy_indicator_maps(leds: Vec<LedInfo>, state: &mut CompileState) -> Vec<LedInfo> {
    let mut unbound = Vec::new();
    for mut led in leds {
        if led.index == 0 {
            if let Some(slot) = state
                .keymap
                .indicator_names
                .iter()
                .position(|n| n.as_deref() == Some(led.name.as_str()))
            {
                led.index = slot as u32 + 1;
            }
        }
        if led.index == 0 {
            unbound.push(led);
            continue;
        }

        let slot = (led.index - 1) as usize;
        match state.keymap.indicator_names[slot].clone() {
            Some(existing) if existing != led.name => {
                let action = format!("Using {}, ignoring {}", existing, led.name);
                state
                    .diag
                    .error(format!("Multiple names bound to indicator {}", led.index))
                    .action(action);
                led.index = 0;
                unbound.push(led);
                continue;
            }
            Some(_) => {}
            None => state.keymap.indicator_names[slot] = Some(led.name.clone()),
        }
        state.keymap.indicators[slot] = Some(effective_map(&led));
    }
    unbound
}

/// Bind maps that are still unbound once every section is compiled
///
/// Maps go to the LED carrying their name, else to the first LED without
/// a name; with no free LED left the map is dropped with a warning.
pub fn bind_indicators(unbound: Vec<LedInfo>, state: &mut CompileState) {
    for mut led in unbound {
        let names = &mut state.keymap.indicator_names;
        let slot = names
            .iter()
            .position(|n| n.as_deref() == Some(led.name.as_str()))
            .or_else(|| names.iter().position(Option::is_none));
        let Some(slot) = slot else {
            state
                .diag
                .warn("No unnamed indicators found")
                .action(format!("Virtual indicator map \"{}\" not bound", led.name));
            continue;
        };
        names[slot] = Some(led.name.clone());
        led.index = slot as u32 + 1;
        tracing::debug!(name = %led.name, index = led.index, "indicator bound");
        state.keymap.indicators[slot] = Some(effective_map(&led));
    }
}

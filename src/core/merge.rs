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

//! src/core/merge.rs
//!
//! Merge policy shared by every sub-compiler
//!
//! Each mergeable entity (key type, interpretation, indicator map, key)
//! carries a [`CommonInfo`] header recording which fields were set, the
//! section it came from and the merge mode of its statement. When two
//! entities collide, the decision is made here:
//! - field granularity through [`use_new`]
//! - entity granularity through [`replace_entity`]
//!
//! # Collision reporting
//! A collision is worth reporting when both sides come from the same
//! section and the warning level is above 0, or whenever the warning level
//! is above 9.

use crate::core::types::MergeMode;

/// Header shared by all mergeable entities
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct CommonInfo {
    /// Bitset of explicitly set fields; meaning is per entity
    pub defined: u32,
    /// Section the entity was defined in
    pub file_id: u32,
    pub merge: MergeMode,
}

impl CommonInfo {
    pub fn new(file_id: u32, merge: MergeMode) -> Self {
        Self {
            defined: 0,
            file_id,
            merge,
        }
    }

    pub fn is_defined(&self, field: u32) -> bool {
        self.defined & field != 0
    }

    pub fn set_defined(&mut self, field: u32) {
        self.defined |= field;
    }
}

/// Outcome of a field-level merge decision
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FieldMerge {
    pub use_new: bool,
    pub collision: bool,
}

/// True when a collision between `old` and `new` should be reported
pub fn should_report(old_file: u32, new_file: u32, warning_level: u32) -> bool {
    (old_file == new_file && warning_level > 0) || warning_level > 9
}

/// Decide whether the new value of `field` replaces the old one
///
/// - Defined on one side only: that side wins, no collision.
/// - Defined on both: the new side wins unless it was merged with
///   `Augment`; a collision is flagged per [`should_report`].
pub fn use_new(field: u32, old: &CommonInfo, new: &CommonInfo, warning_level: u32) -> FieldMerge {
    match (old.is_defined(field), new.is_defined(field)) {
        (true, true) => FieldMerge {
            use_new: new.merge != MergeMode::Augment,
            collision: should_report(old.file_id, new.file_id, warning_level),
        },
        (false, true) => FieldMerge {
            use_new: true,
            collision: false,
        },
        _ => FieldMerge {
            use_new: false,
            collision: false,
        },
    }
}

/// Collects field collisions across several [`use_new`] calls
#[derive(Clone, Copy, Debug, Default)]
pub struct Collisions(pub u32);

impl Collisions {
    /// Evaluate `field` and remember it if it collided
    pub fn check(&mut self, field: u32, old: &CommonInfo, new: &CommonInfo, level: u32) -> bool {
        let decision = use_new(field, old, new, level);
        if decision.collision {
            self.0 |= field;
        }
        decision.use_new
    }

    pub fn any(&self) -> bool {
        self.0 != 0
    }

    pub fn contains(&self, field: u32) -> bool {
        self.0 & field != 0
    }
}

/// Whole-entity merge: does the new entity take the old one's place?
///
/// `Replace` and `Override` replace in place; `Augment` and `Default`
/// keep the old entity.
pub fn replace_entity(merge: MergeMode) -> bool {
    matches!(merge, MergeMode::Replace | MergeMode::Override)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIELD_A: u32 = 1 << 0;
    const FIELD_B: u32 = 1 << 1;

    fn info(defined: u32, file_id: u32, merge: MergeMode) -> CommonInfo {
        CommonInfo {
            defined,
            file_id,
            merge,
        }
    }

    #[test]
    fn test_one_sided_definitions_never_collide() {
        let old = info(FIELD_A, 1, MergeMode::Override);
        let new = info(FIELD_B, 1, MergeMode::Augment);

        assert_eq!(
            use_new(FIELD_A, &old, &new, 10),
            FieldMerge {
                use_new: false,
                collision: false
            }
        );
        assert_eq!(
            use_new(FIELD_B, &old, &new, 10),
            FieldMerge {
                use_new: true,
                collision: false
            }
        );
    }

    #[test]
    fn test_augment_without_collisions_is_order_independent() {
        let a = info(FIELD_A, 1, MergeMode::Augment);
        let b = info(FIELD_B, 1, MergeMode::Augment);

        // Whichever side defines a field provides it, in either order
        for field in [FIELD_A, FIELD_B] {
            assert_eq!(use_new(field, &a, &b, 10).use_new, b.is_defined(field));
            assert_eq!(use_new(field, &b, &a, 10).use_new, a.is_defined(field));
            assert!(!use_new(field, &a, &b, 10).collision);
            assert!(!use_new(field, &b, &a, 10).collision);
        }
    }

    #[test]
    fn test_augment_keeps_old_value() {
        let old = info(FIELD_A, 1, MergeMode::Default);
        let new = info(FIELD_A, 2, MergeMode::Augment);
        let decision = use_new(FIELD_A, &old, &new, 1);
        assert!(!decision.use_new);
        // Different sections at a low warning level are not reported
        assert!(!decision.collision);
    }

    #[test]
    fn test_override_and_default_take_new_value() {
        let old = info(FIELD_A, 1, MergeMode::Default);
        for merge in [MergeMode::Override, MergeMode::Default, MergeMode::Replace] {
            let new = info(FIELD_A, 1, merge);
            let decision = use_new(FIELD_A, &old, &new, 1);
            assert!(decision.use_new);
            assert!(decision.collision);
        }
    }

    #[test]
    fn test_collision_reporting_thresholds() {
        assert!(!should_report(1, 1, 0));
        assert!(should_report(1, 1, 1));
        assert!(!should_report(1, 2, 9));
        assert!(should_report(1, 2, 10));
    }

    #[test]
    fn test_collisions_accumulate() {
        let old = info(FIELD_A | FIELD_B, 1, MergeMode::Default);
        let new = info(FIELD_A, 1, MergeMode::Override);
        let mut collisions = Collisions::default();
        assert!(collisions.check(FIELD_A, &old, &new, 5));
        assert!(!collisions.check(FIELD_B, &old, &new, 5));
        assert!(collisions.contains(FIELD_A));
        assert!(!collisions.contains(FIELD_B));
    }

    #[test]
    fn test_entity_replacement() {
        assert!(replace_entity(MergeMode::Replace));
        assert!(replace_entity(MergeMode::Override));
        assert!(!replace_entity(MergeMode::Augment));
        assert!(!replace_entity(MergeMode::Default));
    }
}

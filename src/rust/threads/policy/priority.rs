// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::threads::{
    policy::{
        Priority,
        PriorityBounds,
        RankingPolicy,
    },
    wait_set::{
        WaitRecord,
        WaitSet,
    },
};
use ::rand::rngs::SmallRng;
use ::std::cmp::Ordering;

//======================================================================================================================
// Constants
//======================================================================================================================

const PRIORITY_MINIMUM: Priority = 0;
const PRIORITY_DEFAULT: Priority = 1;
const PRIORITY_MAXIMUM: Priority = 7;

//======================================================================================================================
// Structures
//======================================================================================================================

/// Strict priority ranking. Waiters donate the highest priority among them to the owner.
#[derive(Default)]
pub struct PriorityPolicy {}

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

impl RankingPolicy for PriorityPolicy {
    fn name(&self) -> &'static str {
        "priority"
    }

    fn bounds(&self) -> PriorityBounds {
        PriorityBounds {
            min: PRIORITY_MINIMUM,
            default: PRIORITY_DEFAULT,
            max: PRIORITY_MAXIMUM,
        }
    }

    /// Highest weight first; among equals, earliest arrival first.
    fn compare(&self, a: &WaitRecord, b: &WaitRecord) -> Ordering {
        b.weight.cmp(&a.weight).then(a.arrival.cmp(&b.arrival))
    }

    fn donation(&self, waiters: &WaitSet) -> Priority {
        waiters.first().map_or(0, |record| record.weight)
    }

    fn combine(&self, effective: Priority, donation: Priority) -> Priority {
        effective.max(donation)
    }

    fn select(&self, waiters: &WaitSet, _rng: &mut SmallRng) -> Option<usize> {
        if waiters.is_empty() {
            None
        } else {
            Some(0)
        }
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================

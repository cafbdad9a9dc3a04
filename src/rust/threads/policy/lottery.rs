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
use ::rand::{
    rngs::SmallRng,
    Rng,
};
use ::std::cmp::Ordering;

//======================================================================================================================
// Constants
//======================================================================================================================

const TICKETS_MINIMUM: Priority = 0;
const TICKETS_DEFAULT: Priority = 1;
const TICKETS_MAXIMUM: Priority = Priority::MAX;

//======================================================================================================================
// Structures
//======================================================================================================================

/// Weighted lottery. Waiters donate the sum of their tickets to the owner.
///
/// Every waiter holds one ticket on top of its weight, so a waiter with zero tickets still wins now and then. Shares
/// are therefore not exactly proportional to the weights when these are small.
#[derive(Default)]
pub struct LotteryPolicy {}

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

impl RankingPolicy for LotteryPolicy {
    fn name(&self) -> &'static str {
        "lottery"
    }

    fn bounds(&self) -> PriorityBounds {
        PriorityBounds {
            min: TICKETS_MINIMUM,
            default: TICKETS_DEFAULT,
            max: TICKETS_MAXIMUM,
        }
    }

    /// Arrival order only. The draw does not depend on the ranking.
    fn compare(&self, a: &WaitRecord, b: &WaitRecord) -> Ordering {
        a.arrival.cmp(&b.arrival)
    }

    fn donation(&self, waiters: &WaitSet) -> Priority {
        Priority::try_from(waiters.weight_sum()).unwrap_or(Priority::MAX)
    }

    fn combine(&self, effective: Priority, donation: Priority) -> Priority {
        effective.saturating_add(donation)
    }

    fn select(&self, waiters: &WaitSet, rng: &mut SmallRng) -> Option<usize> {
        if waiters.is_empty() {
            return None;
        }
        let total: u64 = waiters.weight_sum() + waiters.len() as u64;
        let mut draw: u64 = rng.gen_range(0..total);
        for (index, record) in waiters.iter().enumerate() {
            let tickets: u64 = u64::from(record.weight) + 1;
            if draw < tickets {
                return Some(index);
            }
            draw -= tickets;
        }
        panic!("select(): ticket sum out of sync (total={:?})", total);
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================

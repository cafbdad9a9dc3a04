// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

mod lottery;
mod priority;

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::{
    runtime::fail::Fail,
    threads::wait_set::{
        WaitRecord,
        WaitSet,
    },
};
use ::rand::rngs::SmallRng;
use ::std::{
    cmp::Ordering,
    fmt,
    str::FromStr,
};

//======================================================================================================================
// Exports
//======================================================================================================================

pub use self::{
    lottery::LotteryPolicy,
    priority::PriorityPolicy,
};

//======================================================================================================================
// Structures
//======================================================================================================================

/// Scheduling value of a thread: a priority level or a number of lottery tickets.
pub type Priority = u32;

/// Range of base priorities that a policy accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PriorityBounds {
    pub min: Priority,
    pub default: Priority,
    pub max: Priority,
}

/// Dispatch policy of a kernel. Exactly one is active at a time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SchedulingPolicy {
    /// Highest effective priority first, donation by maximum.
    #[default]
    Priority,
    /// Weighted lottery, donation by sum of tickets.
    Lottery,
}

//======================================================================================================================
// Traits
//======================================================================================================================

/// Ranking strategy of a wait queue.
pub trait RankingPolicy {
    fn name(&self) -> &'static str;

    fn bounds(&self) -> PriorityBounds;

    /// Order in which records are kept in a wait set.
    fn compare(&self, a: &WaitRecord, b: &WaitRecord) -> Ordering;

    /// Value that the waiters of a transferring queue donate to its owner.
    fn donation(&self, waiters: &WaitSet) -> Priority;

    /// Folds one donation into an effective value.
    fn combine(&self, effective: Priority, donation: Priority) -> Priority;

    /// Picks the index of the record that gets the queue next. Returns `None` if the wait set is empty.
    fn select(&self, waiters: &WaitSet, rng: &mut SmallRng) -> Option<usize>;
}

//======================================================================================================================
// Associate Functions
//======================================================================================================================

impl PriorityBounds {
    pub fn contains(&self, priority: Priority) -> bool {
        self.min <= priority && priority <= self.max
    }
}

impl SchedulingPolicy {
    /// Instantiates the ranking strategy of this policy.
    pub fn ranking(&self) -> Box<dyn RankingPolicy> {
        match self {
            SchedulingPolicy::Priority => Box::new(PriorityPolicy::default()),
            SchedulingPolicy::Lottery => Box::new(LotteryPolicy::default()),
        }
    }
}

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

impl FromStr for SchedulingPolicy {
    type Err = Fail;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "priority" => Ok(SchedulingPolicy::Priority),
            "lottery" => Ok(SchedulingPolicy::Lottery),
            _ => {
                let cause: String = format!("unknown scheduling policy (name={:?})", s);
                error!("from_str(): {}", cause);
                Err(Fail::new(libc::EINVAL, &cause))
            },
        }
    }
}

impl fmt::Display for SchedulingPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedulingPolicy::Priority => write!(f, "priority"),
            SchedulingPolicy::Lottery => write!(f, "lottery"),
        }
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================

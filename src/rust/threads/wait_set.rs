// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::{
    runtime::scheduler::ThreadId,
    threads::policy::{
        Priority,
        RankingPolicy,
    },
};
use ::std::{
    cmp::Ordering,
    slice::Iter,
};

//======================================================================================================================
// Structures
//======================================================================================================================

/// Membership of a thread in a wait queue.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WaitRecord {
    pub thread: ThreadId,
    /// Effective value of the thread when the record was last ranked.
    pub weight: Priority,
    /// Enqueue sequence number. Unique per scheduling table.
    pub arrival: u64,
}

/// Records of a wait queue, kept sorted by the ranking policy, with the sum of their weights.
#[derive(Default, Debug)]
pub struct WaitSet {
    records: Vec<WaitRecord>,
    weight_sum: u64,
}

//======================================================================================================================
// Associate Functions
//======================================================================================================================

impl WaitRecord {
    pub fn new(thread: ThreadId, weight: Priority, arrival: u64) -> Self {
        Self {
            thread,
            weight,
            arrival,
        }
    }
}

impl WaitSet {
    /// Inserts `record` after every record that does not rank below it.
    pub fn insert(&mut self, record: WaitRecord, policy: &dyn RankingPolicy) {
        let index: usize = self
            .records
            .partition_point(|other| policy.compare(other, &record) != Ordering::Greater);
        self.records.insert(index, record);
        self.weight_sum += u64::from(record.weight);
    }

    /// Removes the record of `thread`, if any.
    pub fn remove(&mut self, thread: ThreadId) -> Option<WaitRecord> {
        let index: usize = self.records.iter().position(|record| record.thread == thread)?;
        let record: WaitRecord = self.records.remove(index);
        self.weight_sum -= u64::from(record.weight);
        Some(record)
    }

    pub fn get(&self, index: usize) -> Option<&WaitRecord> {
        self.records.get(index)
    }

    pub fn first(&self) -> Option<&WaitRecord> {
        self.records.first()
    }

    pub fn find(&self, thread: ThreadId) -> Option<&WaitRecord> {
        self.records.iter().find(|record| record.thread == thread)
    }

    pub fn iter(&self) -> Iter<'_, WaitRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Exact sum of the weights of all records.
    pub fn weight_sum(&self) -> u64 {
        self.weight_sum
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================

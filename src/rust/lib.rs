// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

#![cfg_attr(feature = "strict", deny(warnings))]
#![deny(clippy::all)]

#[macro_use]
extern crate log;

pub mod runtime;
pub mod threads;

//======================================================================================================================
// Exports
//======================================================================================================================

pub use self::{
    runtime::{
        config::Config,
        fail::Fail,
        interrupt::{
            InterruptGuard,
            InterruptLevel,
        },
        scheduler::ThreadId,
        SharedKernel,
    },
    threads::{
        alarm::Alarm,
        condition::SharedCondition,
        lock::SharedLock,
        policy::{
            Priority,
            PriorityBounds,
            SchedulingPolicy,
        },
        queue::WaitQueue,
    },
};

//======================================================================================================================
// Macros
//======================================================================================================================

/// Ensures that two expressions are equal. Bails out of the enclosing function with an [anyhow::Error] otherwise.
#[macro_export]
macro_rules! ensure_eq {
    ($left:expr, $right:expr $(,)?) => {{
        match (&$left, &$right) {
            (left_val, right_val) => {
                if !(*left_val == *right_val) {
                    ::anyhow::bail!(
                        "ensure failed: `(left == right)` left: `{:?}`, right: `{:?}` ({}:{})",
                        left_val,
                        right_val,
                        file!(),
                        line!()
                    );
                }
            },
        }
    }};
}

/// Ensures that two expressions are not equal. Bails out of the enclosing function with an [anyhow::Error] otherwise.
#[macro_export]
macro_rules! ensure_neq {
    ($left:expr, $right:expr $(,)?) => {{
        match (&$left, &$right) {
            (left_val, right_val) => {
                if *left_val == *right_val {
                    ::anyhow::bail!(
                        "ensure failed: `(left != right)` left: `{:?}`, right: `{:?}` ({}:{})",
                        left_val,
                        right_val,
                        file!(),
                        line!()
                    );
                }
            },
        }
    }};
}

// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

mod scheduler;
mod task;
mod waker;
mod yielder;

//==============================================================================
// Exports
//==============================================================================

pub use self::{
    scheduler::{
        Scheduler,
        ThreadSlot,
    },
    task::{
        ThreadCoroutine,
        ThreadId,
        ThreadTask,
    },
    waker::ThreadWaker,
    yielder::{
        Yield,
        Yielder,
        YielderHandle,
    },
};

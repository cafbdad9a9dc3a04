// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//==============================================================================
// Imports
//==============================================================================

use ::futures::future::FusedFuture;
use ::std::{
    fmt,
    future::Future,
    pin::Pin,
    task::{
        Context,
        Poll,
    },
};

//==============================================================================
// Structures
//==============================================================================

/// Externally visible thread identifier. Identifiers are handed out in increasing order and never reused.
#[derive(Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord, Debug)]
pub struct ThreadId(pub u64);

/// Coroutine that a thread runs to completion.
pub type ThreadCoroutine = Pin<Box<dyn FusedFuture<Output = ()>>>;

/// A thread of the kernel: a named coroutine. Thus, it implements Future but never directly returns anything.
pub struct ThreadTask {
    /// Thread name, used for tracing.
    name: String,
    /// Thread identifier.
    id: ThreadId,
    /// Underlying coroutine to run.
    coroutine: ThreadCoroutine,
}

//==============================================================================
// Associate Functions
//==============================================================================

impl ThreadTask {
    /// Instantiates a new thread.
    pub fn new(name: String, id: ThreadId, coroutine: ThreadCoroutine) -> Self {
        Self { name, id, coroutine }
    }

    pub fn get_name(&self) -> &str {
        &self.name
    }

    pub fn get_id(&self) -> ThreadId {
        self.id
    }
}

//==============================================================================
// Trait Implementations
//==============================================================================

impl From<u64> for ThreadId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<ThreadId> for u64 {
    fn from(value: ThreadId) -> Self {
        value.0
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "thread-{}", self.0)
    }
}

/// The Future trait for threads.
impl Future for ThreadTask {
    type Output = ();

    /// Polls the coroutine.
    fn poll(self: Pin<&mut Self>, ctx: &mut Context) -> Poll<()> {
        let self_: &mut Self = self.get_mut();
        if self_.coroutine.is_terminated() {
            debug!("poll(): thread already terminated (name={:?})", self_.name);
            return Poll::Ready(());
        }
        Future::poll(self_.coroutine.as_mut(), ctx)
    }
}

impl FusedFuture for ThreadTask {
    fn is_terminated(&self) -> bool {
        self.coroutine.is_terminated()
    }
}

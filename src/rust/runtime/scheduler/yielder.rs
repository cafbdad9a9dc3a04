// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::runtime::SharedObject;
use ::std::{
    future::Future,
    pin::Pin,
    task::{
        Context,
        Poll,
        Waker,
    },
};

//======================================================================================================================
// Structures
//======================================================================================================================

/// Yield is a future that lets the currently running thread cooperatively give up the processor. Threads are expected
/// to use the async functions of [Yielder] to create yield points.
pub struct Yield {
    /// Should we give up the processor for a single dispatch only? If false, then we yield until a wake signal.
    once: bool,
    /// Has this future already suspended its thread once?
    yielded: bool,
    /// Shared references to wake a yielded thread.
    yielder_handle: YielderHandle,
}

/// Yield Handle
///
/// This is used to wake a yielded thread. There is exactly one handle per thread, shared by all of its yield points.
#[derive(Clone)]
pub struct YielderHandle {
    woken: SharedObject<bool>,
    waker_handle: SharedObject<Option<Waker>>,
}

/// Yielder lets a single thread yield to the kernel. The yield handle can be used to wake the thread.
pub struct Yielder {
    yielder_handle: YielderHandle,
}

//======================================================================================================================
// Associate Functions
//======================================================================================================================

impl Yield {
    /// Create new Yield future that can be used to yield.
    fn new(once: bool, yielder_handle: YielderHandle) -> Self {
        Self {
            once,
            yielded: false,
            yielder_handle,
        }
    }
}

impl YielderHandle {
    pub fn new() -> Self {
        Self {
            woken: SharedObject::new(false),
            waker_handle: SharedObject::new(None),
        }
    }

    /// Wakes the yielded thread. Waking a thread that already has a pending wake signal does nothing, so a thread is
    /// announced to the kernel at most once per suspension.
    pub fn wake(&mut self) {
        if *self.woken {
            trace!("wake(): already woken");
            return;
        }
        *self.woken = true;
        if let Some(waker) = self.waker_handle.take() {
            waker.wake();
        }
    }

    /// Has this thread been woken since it last resumed?
    pub fn is_woken(&self) -> bool {
        *self.woken
    }

    /// Consumes the wake signal.
    fn take_woken(&mut self) -> bool {
        let woken: bool = *self.woken;
        *self.woken = false;
        woken
    }

    /// Set the waker for this Yielder.
    fn set_waker(&mut self, waker: Waker) {
        *self.waker_handle = Some(waker);
    }
}

impl Yielder {
    /// Create a new Yielder object for a specific thread to yield.
    pub fn new() -> Self {
        Self {
            yielder_handle: YielderHandle::new(),
        }
    }

    /// Return a handle to this Yielder for waking the yielded thread.
    pub fn get_handle(&self) -> YielderHandle {
        self.yielder_handle.clone()
    }

    /// Create a Yield Future that gives up the processor for one dispatch. The thread stays runnable.
    pub fn yield_once(&self) -> Yield {
        Yield::new(true, self.yielder_handle.clone())
    }

    /// Create a Yield Future that yields until woken with a signal.
    pub fn yield_until_wake(&self) -> Yield {
        Yield::new(false, self.yielder_handle.clone())
    }
}

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

impl Default for YielderHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for Yielder {
    fn default() -> Self {
        Self::new()
    }
}

impl Future for Yield {
    type Output = ();

    /// Polls the underlying operation.
    fn poll(self: Pin<&mut Self>, context: &mut Context) -> Poll<Self::Output> {
        let self_: &mut Self = self.get_mut();

        // A wake signal only resumes a thread that has actually suspended here.
        let woken: bool = self_.yielder_handle.take_woken();
        if self_.yielded && woken {
            return Poll::Ready(());
        }

        // Stash the waker.
        self_.yielder_handle.set_waker(context.waker().clone());
        self_.yielded = true;

        // A single yield makes the thread runnable again right away.
        if self_.once {
            self_.yielder_handle.wake();
        }

        Poll::Pending
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================

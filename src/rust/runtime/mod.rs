// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Exports
//======================================================================================================================

pub mod config;
pub mod fail;
pub mod interrupt;
pub mod logging;
pub mod scheduler;
pub mod timer;

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::{
    runtime::{
        config::Config,
        fail::Fail,
        interrupt::{
            InterruptGuard,
            InterruptLevel,
        },
        scheduler::{
            Scheduler,
            ThreadId,
            ThreadTask,
            Yield,
            YielderHandle,
        },
        timer::{
            Clock,
            TimerInterrupt,
        },
    },
    threads::{
        policy::{
            Priority,
            PriorityBounds,
            SchedulingPolicy,
        },
        table::{
            QueueId,
            SchedulingTable,
        },
    },
};
use ::futures::FutureExt;
use ::std::{
    convert::{
        AsMut,
        AsRef,
    },
    future::Future,
    mem,
    ops::{
        Deref,
        DerefMut,
    },
    pin::Pin,
    rc::Rc,
    task::{
        Context,
        Poll,
        Waker,
    },
};

//======================================================================================================================
// Structures
//======================================================================================================================

/// Kernel of the thread scheduler. Owns every thread, the scheduling table, the clock and the interrupt level.
pub struct Kernel {
    /// Thread registry.
    scheduler: Scheduler,
    /// Scheduling state of threads and wait queues.
    table: SchedulingTable,
    /// Active dispatch policy.
    policy: SchedulingPolicy,
    /// Interrupt level of whoever is running: the dispatch loop or the current thread.
    interrupts: InterruptLevel,
    /// Simulated time.
    clock: Clock,
    /// Ticks charged for every dispatch.
    ticks_per_dispatch: u64,
    /// Runnable threads, ranked by the active policy.
    ready_queue: QueueId,
    /// Timer interrupt handlers.
    timer_handlers: Vec<Box<dyn TimerInterrupt>>,
}

#[derive(Clone)]
pub struct SharedKernel(SharedObject<Kernel>);

/// Shared object across coroutines. Coroutines run one at a time, so an object is never mutated concurrently.
pub struct SharedObject<T>(Rc<T>);

//======================================================================================================================
// Associate Functions
//======================================================================================================================

/// Associate Functions for the Kernel
impl SharedKernel {
    pub fn new(config: &Config) -> Result<Self, Fail> {
        let policy: SchedulingPolicy = config.scheduling_policy()?;
        let seed: Option<u64> = config.rng_seed()?;
        let clock: Clock = Clock::new(config.timer_interval()?);
        let ticks_per_dispatch: u64 = config.ticks_per_dispatch()?;
        let mut table: SchedulingTable = SchedulingTable::new(policy.ranking(), seed);
        let ready_queue: QueueId = table.create_queue(false);
        info!(
            "new(): policy={:?}, timer_interval={:?}, ticks_per_dispatch={:?}, seed={:?}",
            policy,
            clock.interval(),
            ticks_per_dispatch,
            seed
        );
        Ok(Self(SharedObject::<Kernel>::new(Kernel {
            scheduler: Scheduler::default(),
            table,
            policy,
            interrupts: InterruptLevel::Enabled,
            clock,
            ticks_per_dispatch,
            ready_queue,
            timer_handlers: Vec::new(),
        })))
    }

    pub fn policy(&self) -> SchedulingPolicy {
        self.policy
    }

    //==================================================================================================================
    // Atomic Region
    //==================================================================================================================

    /// Disables interrupts. Returns the previous level, to be handed back to [Self::exit_atomic_region].
    pub fn enter_atomic_region(&mut self) -> InterruptLevel {
        mem::replace(&mut self.interrupts, InterruptLevel::Disabled)
    }

    /// Restores the interrupt level returned by the matching [Self::enter_atomic_region].
    pub fn exit_atomic_region(&mut self, previous: InterruptLevel) {
        self.interrupts = previous;
    }

    /// Enters the atomic region until the returned guard is dropped.
    pub fn atomic_region(&self) -> InterruptGuard {
        InterruptGuard::new(self.clone())
    }

    pub fn in_atomic_region(&self) -> bool {
        self.interrupts == InterruptLevel::Disabled
    }

    /// Panics unless interrupts are disabled.
    pub fn assert_atomic_region(&self, operation: &str) {
        if !self.in_atomic_region() {
            panic!("{}: must be called inside an atomic region", operation);
        }
    }

    //==================================================================================================================
    // Threads
    //==================================================================================================================

    /// Current time, in ticks.
    pub fn now(&self) -> u64 {
        self.clock.now()
    }

    /// Returns the running thread. Panics outside of a thread.
    pub fn current_thread(&self) -> ThreadId {
        match self.scheduler.current() {
            Some(thread) => thread,
            None => panic!("current_thread(): no thread is running"),
        }
    }

    /// Returns the running thread, if any.
    pub fn try_current_thread(&self) -> Option<ThreadId> {
        self.scheduler.current()
    }

    /// Whether `thread` has not retired yet.
    pub fn is_alive(&self, thread: ThreadId) -> bool {
        self.scheduler.contains(thread)
    }

    /// Number of threads that have not retired yet.
    pub fn num_threads(&self) -> usize {
        self.scheduler.len()
    }

    /// Creates a thread that runs `coroutine` and places it in the ready set. The new thread has the default
    /// priority.
    pub fn spawn<F>(&mut self, name: &str, coroutine: F) -> ThreadId
    where
        F: Future<Output = ()> + 'static,
    {
        let previous: InterruptLevel = self.enter_atomic_region();
        let join_queue: QueueId = self.table.create_queue(true);
        let thread: ThreadId = self.scheduler.insert(name, Box::pin(coroutine.fuse()), join_queue);
        self.table.acquire(join_queue, thread);
        let ready_queue: QueueId = self.ready_queue;
        self.table.wait_for_access(ready_queue, thread);
        self.exit_atomic_region(previous);
        trace!("spawn(): thread={:?}, name={:?}", thread, name);
        thread
    }

    /// Waits until `thread` retires. The caller donates its priority to `thread` while it waits.
    pub fn join(&self, thread: ThreadId) -> impl Future<Output = ()> {
        let mut kernel: SharedKernel = self.clone();
        async move {
            let current: ThreadId = kernel.current_thread();
            if current == thread {
                panic!("join(): thread {:?} cannot join itself", thread);
            }
            let _guard: InterruptGuard = kernel.atomic_region();
            let join_queue: QueueId = match kernel.scheduler.get(thread) {
                Some(slot) => slot.join_queue(),
                None => {
                    trace!("join(): thread already retired (thread={:?})", thread);
                    return;
                },
            };
            trace!("join(): current={:?}, thread={:?}", current, thread);
            kernel.table.wait_for_access(join_queue, current);
            kernel.block_current_thread().await;
        }
    }

    /// Returns a future that suspends the current thread until another party calls [Self::mark_ready] on it. Must be
    /// called inside the atomic region.
    pub fn block_current_thread(&self) -> Yield {
        self.assert_atomic_region("block_current_thread()");
        let current: ThreadId = self.current_thread();
        trace!("block_current_thread(): thread={:?}", current);
        match self.scheduler.get(current) {
            Some(slot) => slot.yielder().yield_until_wake(),
            None => panic!("block_current_thread(): running thread is not registered"),
        }
    }

    /// Returns a future that gives up the processor once. The current thread stays runnable.
    pub fn yield_current_thread(&self) -> Yield {
        let current: ThreadId = self.current_thread();
        match self.scheduler.get(current) {
            Some(slot) => slot.yielder().yield_once(),
            None => panic!("yield_current_thread(): running thread is not registered"),
        }
    }

    /// Makes a blocked thread runnable. Must be called inside the atomic region.
    pub fn mark_ready(&mut self, thread: ThreadId) {
        self.assert_atomic_region("mark_ready()");
        if self.scheduler.current() == Some(thread) {
            panic!("mark_ready(): thread {:?} is running", thread);
        }
        let mut handle: YielderHandle = match self.scheduler.get(thread) {
            Some(slot) => slot.get_handle(),
            None => panic!("mark_ready(): unknown thread {:?}", thread),
        };
        trace!("mark_ready(): thread={:?}", thread);
        handle.wake();
    }

    //==================================================================================================================
    // Wait Queues
    //==================================================================================================================

    pub fn create_queue(&mut self, transfer: bool) -> QueueId {
        self.table.create_queue(transfer)
    }

    /// Drops a wait queue, detaching its waiters and revoking its owner.
    pub fn destroy_queue(&mut self, queue: QueueId) {
        let previous: InterruptLevel = self.enter_atomic_region();
        self.table.destroy_queue(queue);
        self.exit_atomic_region(previous);
    }

    pub fn wait_for_access(&mut self, queue: QueueId, thread: ThreadId) {
        self.assert_atomic_region("wait_for_access()");
        self.table.wait_for_access(queue, thread);
    }

    pub fn acquire(&mut self, queue: QueueId, thread: ThreadId) {
        self.assert_atomic_region("acquire()");
        self.table.acquire(queue, thread);
    }

    pub fn next_thread(&mut self, queue: QueueId) -> Option<ThreadId> {
        self.assert_atomic_region("next_thread()");
        self.table.next_thread(queue)
    }

    pub fn queue_owner(&self, queue: QueueId) -> Option<ThreadId> {
        self.table.owner(queue)
    }

    pub fn num_waiters(&self, queue: QueueId) -> usize {
        self.table.num_waiters(queue)
    }

    //==================================================================================================================
    // Priorities
    //==================================================================================================================

    pub fn priority_bounds(&self) -> PriorityBounds {
        self.table.bounds()
    }

    pub fn get_priority(&self, thread: ThreadId) -> Priority {
        self.assert_atomic_region("get_priority()");
        self.table.priority(thread)
    }

    pub fn get_effective_priority(&self, thread: ThreadId) -> Priority {
        self.assert_atomic_region("get_effective_priority()");
        self.table.effective_priority(thread)
    }

    /// Sets the base priority of `thread`. Out-of-range values are fatal.
    pub fn set_priority(&mut self, thread: ThreadId, priority: Priority) {
        self.assert_atomic_region("set_priority()");
        self.table.set_priority(thread, priority);
    }

    /// Raises the base priority of the current thread by one. Returns false if it already is at the maximum.
    pub fn increase_priority(&mut self) -> bool {
        let previous: InterruptLevel = self.enter_atomic_region();
        let current: ThreadId = self.current_thread();
        let priority: Priority = self.table.priority(current);
        let changed: bool = priority < self.table.bounds().max;
        if changed {
            self.table.set_priority(current, priority + 1);
        }
        self.exit_atomic_region(previous);
        changed
    }

    /// Lowers the base priority of the current thread by one. Returns false if it already is at the minimum.
    pub fn decrease_priority(&mut self) -> bool {
        let previous: InterruptLevel = self.enter_atomic_region();
        let current: ThreadId = self.current_thread();
        let priority: Priority = self.table.priority(current);
        let changed: bool = priority > self.table.bounds().min;
        if changed {
            self.table.set_priority(current, priority - 1);
        }
        self.exit_atomic_region(previous);
        changed
    }

    //==================================================================================================================
    // Timer
    //==================================================================================================================

    pub fn register_timer_handler(&mut self, handler: Box<dyn TimerInterrupt>) {
        self.timer_handlers.push(handler);
    }

    /// Delivers the timer interrupt if it is due.
    fn deliver_timer_interrupt(&mut self) {
        if !self.clock.take_tick() {
            return;
        }
        trace!("deliver_timer_interrupt(): now={:?}", self.clock.now());
        let previous: InterruptLevel = self.enter_atomic_region();
        // Handlers get the kernel itself, so they are moved out while they run.
        let mut handlers: Vec<Box<dyn TimerInterrupt>> = mem::take(&mut self.timer_handlers);
        for handler in handlers.iter_mut() {
            handler.on_timer_tick(self);
        }
        let registered: Vec<Box<dyn TimerInterrupt>> = mem::replace(&mut self.timer_handlers, handlers);
        self.timer_handlers.extend(registered);
        self.exit_atomic_region(previous);
    }

    fn has_pending_timers(&self) -> bool {
        self.timer_handlers.iter().any(|handler| handler.has_pending())
    }

    //==================================================================================================================
    // Dispatch
    //==================================================================================================================

    /// Runs threads until all of them have retired. Fails with `EDEADLK` if threads remain but none of them can ever
    /// become runnable again.
    pub fn run(&mut self) -> Result<(), Fail> {
        if let Some(current) = self.scheduler.current() {
            panic!("run(): called from thread {:?}", current);
        }
        loop {
            self.deliver_timer_interrupt();

            let previous: InterruptLevel = self.enter_atomic_region();
            self.admit_woken_threads();
            let ready_queue: QueueId = self.ready_queue;
            let next: Option<ThreadId> = self.table.next_thread(ready_queue);
            self.exit_atomic_region(previous);

            match next {
                Some(thread) => {
                    self.dispatch(thread);
                    let ticks: u64 = self.ticks_per_dispatch;
                    self.clock.advance(ticks);
                },
                None if self.scheduler.is_empty() => {
                    debug!("run(): all threads retired (now={:?})", self.clock.now());
                    return Ok(());
                },
                None if self.has_pending_timers() => self.clock.fast_forward(),
                None => {
                    let cause: String = format!(
                        "no runnable threads left (blocked={:?}, now={:?})",
                        self.scheduler.len(),
                        self.clock.now()
                    );
                    error!("run(): {}", cause);
                    return Err(Fail::new(libc::EDEADLK, &cause));
                },
            }
        }
    }

    /// Moves threads that were woken since the last dispatch into the ready set.
    fn admit_woken_threads(&mut self) {
        let ready_queue: QueueId = self.ready_queue;
        for thread in self.scheduler.drain_woken() {
            if !self.scheduler.contains(thread) {
                trace!("admit_woken_threads(): thread already retired (thread={:?})", thread);
                continue;
            }
            if self.table.waiting_queue(thread) == Some(ready_queue) {
                continue;
            }
            self.table.wait_for_access(ready_queue, thread);
        }
    }

    /// Polls `thread` once, running it until it suspends or finishes.
    fn dispatch(&mut self, thread: ThreadId) {
        let (mut task, waker, level): (ThreadTask, Waker, InterruptLevel) = match self.scheduler.get_mut(thread) {
            Some(slot) => match slot.take_task() {
                Some(task) => (task, slot.waker(), slot.interrupts()),
                None => panic!("dispatch(): thread {:?} is already running", thread),
            },
            None => {
                warn!("dispatch(): thread is gone (thread={:?})", thread);
                return;
            },
        };
        trace!("dispatch(): thread={:?}, name={:?}", thread, task.get_name());

        // The interrupt level is part of the thread's context.
        let loop_level: InterruptLevel = mem::replace(&mut self.interrupts, level);
        self.scheduler.set_current(Some(thread));
        let mut ctx: Context = Context::from_waker(&waker);
        let poll: Poll<()> = Future::poll(Pin::new(&mut task), &mut ctx);
        self.scheduler.set_current(None);
        let thread_level: InterruptLevel = mem::replace(&mut self.interrupts, loop_level);

        match poll {
            Poll::Pending => match self.scheduler.get_mut(thread) {
                Some(slot) => {
                    slot.set_interrupts(thread_level);
                    slot.put_task(task);
                },
                None => panic!("dispatch(): thread {:?} vanished while running", thread),
            },
            Poll::Ready(()) => {
                if thread_level == InterruptLevel::Disabled {
                    warn!("dispatch(): thread finished inside an atomic region (thread={:?})", thread);
                }
                self.retire(thread);
                // Whatever the coroutine still owns may call back into the kernel.
                drop(task);
            },
        }
    }

    /// Removes a finished thread. Joiners become runnable.
    fn retire(&mut self, thread: ThreadId) {
        let join_queue: QueueId = match self.scheduler.get(thread) {
            Some(slot) => slot.join_queue(),
            None => panic!("retire(): unknown thread {:?}", thread),
        };
        let previous: InterruptLevel = self.enter_atomic_region();
        while let Some(joiner) = self.table.next_thread(join_queue) {
            self.mark_ready(joiner);
        }
        self.table.destroy_queue(join_queue);
        let ready_queue: QueueId = self.ready_queue;
        if self.table.owner(ready_queue) == Some(thread) {
            self.table.release_ownership(ready_queue);
        }
        self.table.remove_thread(thread);
        self.scheduler.remove(thread);
        self.exit_atomic_region(previous);
        trace!("retire(): thread={:?}", thread);
    }
}

impl<T> SharedObject<T> {
    pub fn new(object: T) -> Self {
        Self(Rc::new(object))
    }
}

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

impl Deref for SharedKernel {
    type Target = Kernel;

    fn deref(&self) -> &Self::Target {
        self.0.deref()
    }
}

impl DerefMut for SharedKernel {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.0.deref_mut()
    }
}

impl<T> Deref for SharedObject<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        self.0.deref()
    }
}

/// Dereferences a mutable reference to a shared object for use. This breaks Rust's ownership model because it allows
/// more than one mutable dereference of a shared object at a time. The kernel requires this because every thread
/// holds mutable references to the kernel at the same time; however, the kernel also ensures that only one thread
/// runs at a time. Shared objects should be used judiciously across threads with the understanding that the shared
/// object may change whenever the thread suspends.
impl<T> DerefMut for SharedObject<T> {
    fn deref_mut<'a>(&'a mut self) -> &'a mut Self::Target {
        let ptr: *mut T = Rc::as_ptr(&self.0) as *mut T;
        unsafe { &mut *ptr }
    }
}

/// Returns a reference to the interior object, which is borrowed for directly accessing the value. Generally deref
/// should be used unless you absolutely need to borrow the reference.
impl<T> AsRef<T> for SharedObject<T> {
    fn as_ref(&self) -> &T {
        self.0.as_ref()
    }
}

/// Returns a mutable reference to the interior object. Similar to DerefMut, this breaks Rust's ownership properties
/// and should be considered unsafe. However, it is safe to use here if and only if we only run one thread at a time.
impl<T> AsMut<T> for SharedObject<T> {
    fn as_mut<'a>(&'a mut self) -> &'a mut T {
        let ptr: *mut T = Rc::as_ptr(&self.0) as *mut T;
        unsafe { &mut *ptr }
    }
}

impl<T> Clone for SharedObject<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================

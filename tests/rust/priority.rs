// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

mod common;

//======================================================================================================================
// Imports
//======================================================================================================================

use ::anyhow::Result;
use ::cosched::{
    ensure_eq,
    Priority,
    SchedulingPolicy,
    SharedCondition,
    SharedKernel,
    SharedLock,
    ThreadId,
};
use common::Trace;

//======================================================================================================================
// Tests
//======================================================================================================================

/// A low priority lock holder inherits the priority of a high priority waiter, so a medium priority thread cannot
/// starve both.
#[test]
fn lock_holder_inherits_waiter_priority() -> Result<()> {
    let mut kernel: SharedKernel = common::kernel(SchedulingPolicy::Priority)?;
    let lock: SharedLock = SharedLock::new(kernel.clone());
    let trace: Trace<String> = common::trace();

    let mut kernel_: SharedKernel = kernel.clone();
    let mut lock_: SharedLock = lock.clone();
    let trace_: Trace<String> = trace.clone();
    kernel.spawn("low", async move {
        lock_.acquire().await;
        trace_.borrow_mut().push("low acquired".to_string());

        let kernel_m: SharedKernel = kernel_.clone();
        let trace_m: Trace<String> = trace_.clone();
        let medium: ThreadId = kernel_.spawn("medium", async move {
            for _ in 0..3 {
                trace_m.borrow_mut().push("medium".to_string());
                kernel_m.yield_current_thread().await;
            }
        });
        let mut lock_h: SharedLock = lock_.clone();
        let trace_h: Trace<String> = trace_.clone();
        let high: ThreadId = kernel_.spawn("high", async move {
            lock_h.acquire().await;
            trace_h.borrow_mut().push("high acquired".to_string());
            lock_h.release();
        });
        common::set_priority(&mut kernel_, medium, 4);
        common::set_priority(&mut kernel_, high, 7);

        kernel_.yield_current_thread().await;
        let effective: Priority = {
            let _guard = kernel_.atomic_region();
            kernel_.get_effective_priority(kernel_.current_thread())
        };
        trace_.borrow_mut().push(format!("low effective {}", effective));
        lock_.release();

        let base: Priority = {
            let _guard = kernel_.atomic_region();
            kernel_.get_effective_priority(kernel_.current_thread())
        };
        trace_.borrow_mut().push(format!("low released {}", base));
    });
    kernel.run()?;

    ensure_eq!(
        *trace.borrow(),
        vec![
            "low acquired",
            "low effective 7",
            "low released 1",
            "high acquired",
            "medium",
            "medium",
            "medium"
        ]
    );
    Ok(())
}

/// A high priority thread that joins a low priority thread donates its priority to it.
#[test]
fn joiner_donates_to_joinee() -> Result<()> {
    let mut kernel: SharedKernel = common::kernel(SchedulingPolicy::Priority)?;
    let trace: Trace<&'static str> = common::trace();

    let kernel_: SharedKernel = kernel.clone();
    let trace_: Trace<&'static str> = trace.clone();
    let low: ThreadId = kernel.spawn("low", async move {
        for _ in 0..3 {
            trace_.borrow_mut().push("low");
            kernel_.yield_current_thread().await;
        }
    });
    let kernel_: SharedKernel = kernel.clone();
    let trace_: Trace<&'static str> = trace.clone();
    let medium: ThreadId = kernel.spawn("medium", async move {
        for _ in 0..3 {
            trace_.borrow_mut().push("medium");
            kernel_.yield_current_thread().await;
        }
    });
    let kernel_: SharedKernel = kernel.clone();
    let trace_: Trace<&'static str> = trace.clone();
    let high: ThreadId = kernel.spawn("high", async move {
        kernel_.join(low).await;
        trace_.borrow_mut().push("high");
    });
    common::set_priority(&mut kernel, medium, 4);
    common::set_priority(&mut kernel, high, 7);
    kernel.run()?;

    ensure_eq!(
        *trace.borrow(),
        vec!["low", "low", "low", "high", "medium", "medium", "medium"]
    );
    Ok(())
}

/// The ready set dispatches higher priorities first, and equal priorities in arrival order.
#[test]
fn ready_set_follows_priorities() -> Result<()> {
    let mut kernel: SharedKernel = common::kernel(SchedulingPolicy::Priority)?;
    let trace: Trace<Priority> = common::trace();

    for priority in [2, 5, 3, 5, 0] {
        let trace_: Trace<Priority> = trace.clone();
        let thread: ThreadId = kernel.spawn("worker", async move {
            trace_.borrow_mut().push(priority);
        });
        common::set_priority(&mut kernel, thread, priority);
    }
    kernel.run()?;

    ensure_eq!(*trace.borrow(), vec![5, 5, 3, 2, 0]);
    Ok(())
}

/// Priorities move by one step and stop at the bounds.
#[test]
fn increase_and_decrease_stop_at_bounds() -> Result<()> {
    let mut kernel: SharedKernel = common::kernel(SchedulingPolicy::Priority)?;
    let steps: Trace<usize> = common::trace();

    let mut kernel_: SharedKernel = kernel.clone();
    let steps_: Trace<usize> = steps.clone();
    kernel.spawn("climber", async move {
        let mut up: usize = 0;
        while kernel_.increase_priority() {
            up += 1;
        }
        let mut down: usize = 0;
        while kernel_.decrease_priority() {
            down += 1;
        }
        steps_.borrow_mut().push(up);
        steps_.borrow_mut().push(down);
    });
    kernel.run()?;

    ensure_eq!(*steps.borrow(), vec![6, 7]);
    Ok(())
}

/// A run in which every thread blocks forever reports a deadlock.
#[test]
fn blocked_forever_is_a_deadlock() -> Result<()> {
    let mut kernel: SharedKernel = common::kernel(SchedulingPolicy::Priority)?;
    let lock: SharedLock = SharedLock::new(kernel.clone());
    let condition: SharedCondition = SharedCondition::new(kernel.clone(), lock.clone());

    let mut lock_: SharedLock = lock.clone();
    let mut condition_: SharedCondition = condition.clone();
    kernel.spawn("sleeper", async move {
        lock_.acquire().await;
        condition_.sleep().await;
        lock_.release();
    });

    match kernel.run() {
        Err(e) => ensure_eq!(e.errno, libc::EDEADLK),
        Ok(()) => anyhow::bail!("run() should fail"),
    }
    ensure_eq!(kernel.num_threads(), 1);
    Ok(())
}

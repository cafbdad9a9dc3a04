// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

mod common;

//======================================================================================================================
// Imports
//======================================================================================================================

use ::anyhow::Result;
use ::cosched::{
    ensure_eq,
    ensure_neq,
    Priority,
    SchedulingPolicy,
    SharedKernel,
    ThreadId,
};
use ::std::{
    cell::RefCell,
    rc::Rc,
};
use common::Trace;

//======================================================================================================================
// Constants
//======================================================================================================================

/// Upper bound of dispatches spent waiting for another thread to show up.
const MAX_YIELDS: usize = 10_000;

//======================================================================================================================
// Tests
//======================================================================================================================

/// Joiners donate the sum of their tickets to the joinee.
#[test]
fn joiners_donate_ticket_sum() -> Result<()> {
    let mut kernel: SharedKernel = common::kernel(SchedulingPolicy::Lottery)?;
    let observed: Trace<Priority> = common::trace();

    let kernel_: SharedKernel = kernel.clone();
    let observed_: Trace<Priority> = observed.clone();
    let target: ThreadId = kernel.spawn("target", async move {
        for _ in 0..MAX_YIELDS {
            let effective: Priority = {
                let _guard = kernel_.atomic_region();
                kernel_.get_effective_priority(kernel_.current_thread())
            };
            if effective == 31 {
                observed_.borrow_mut().push(effective);
                return;
            }
            kernel_.yield_current_thread().await;
        }
    });
    for tickets in [10, 20] {
        let kernel_: SharedKernel = kernel.clone();
        let joiner: ThreadId = kernel.spawn("joiner", async move {
            kernel_.join(target).await;
        });
        common::set_priority(&mut kernel, joiner, tickets);
    }
    kernel.run()?;

    ensure_eq!(*observed.borrow(), vec![31]);
    Ok(())
}

/// Dispatch shares follow ticket counts, each thread holding one bonus ticket.
#[test]
fn dispatch_share_follows_tickets() -> Result<()> {
    const DISPATCHES: usize = 20_000;
    let mut kernel: SharedKernel = common::kernel(SchedulingPolicy::Lottery)?;
    let total: Rc<RefCell<usize>> = Rc::new(RefCell::new(0));
    let counts: Rc<RefCell<[usize; 2]>> = Rc::new(RefCell::new([0, 0]));

    for (index, tickets) in [(0, 1), (1, 99)] {
        let kernel_: SharedKernel = kernel.clone();
        let total_: Rc<RefCell<usize>> = total.clone();
        let counts_: Rc<RefCell<[usize; 2]>> = counts.clone();
        let thread: ThreadId = kernel.spawn("spinner", async move {
            while *total_.borrow() < DISPATCHES {
                *total_.borrow_mut() += 1;
                counts_.borrow_mut()[index] += 1;
                kernel_.yield_current_thread().await;
            }
        });
        common::set_priority(&mut kernel, thread, tickets);
    }
    kernel.run()?;

    // Expected share of the low thread is 2 / 102.
    let counts: [usize; 2] = *counts.borrow();
    let share: f64 = counts[0] as f64 / (counts[0] + counts[1]) as f64;
    ensure_eq!(share > 0.01 && share < 0.03, true);
    Ok(())
}

/// A thread without tickets still gets the processor.
#[test]
fn zero_tickets_are_not_starved() -> Result<()> {
    let mut kernel: SharedKernel = common::kernel(SchedulingPolicy::Lottery)?;
    let trace: Trace<&'static str> = common::trace();

    let trace_: Trace<&'static str> = trace.clone();
    let poor: ThreadId = kernel.spawn("poor", async move {
        trace_.borrow_mut().push("poor");
    });
    common::set_priority(&mut kernel, poor, 0);
    let kernel_: SharedKernel = kernel.clone();
    let trace_: Trace<&'static str> = trace.clone();
    let rich: ThreadId = kernel.spawn("rich", async move {
        for _ in 0..1_000 {
            kernel_.yield_current_thread().await;
        }
        trace_.borrow_mut().push("rich");
    });
    common::set_priority(&mut kernel, rich, 5);
    kernel.run()?;

    ensure_eq!(*trace.borrow(), vec!["poor", "rich"]);
    Ok(())
}

/// Ticket counts go up to the largest value and donations saturate there.
#[test]
fn ticket_donation_saturates() -> Result<()> {
    let mut kernel: SharedKernel = common::kernel(SchedulingPolicy::Lottery)?;
    let observed: Trace<Priority> = common::trace();

    let kernel_: SharedKernel = kernel.clone();
    let observed_: Trace<Priority> = observed.clone();
    let target: ThreadId = kernel.spawn("target", async move {
        for _ in 0..MAX_YIELDS {
            let effective: Priority = {
                let _guard = kernel_.atomic_region();
                kernel_.get_effective_priority(kernel_.current_thread())
            };
            if effective == Priority::MAX {
                observed_.borrow_mut().push(effective);
                return;
            }
            kernel_.yield_current_thread().await;
        }
    });
    for _ in 0..2 {
        let kernel_: SharedKernel = kernel.clone();
        let joiner: ThreadId = kernel.spawn("joiner", async move {
            kernel_.join(target).await;
        });
        common::set_priority(&mut kernel, joiner, Priority::MAX);
    }
    ensure_neq!(kernel.priority_bounds().max, 7);
    kernel.run()?;

    ensure_eq!(*observed.borrow(), vec![Priority::MAX]);
    Ok(())
}

// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

mod common;

//======================================================================================================================
// Imports
//======================================================================================================================

use ::anyhow::Result;
use ::cosched::{
    ensure_eq,
    Alarm,
    SchedulingPolicy,
    SharedKernel,
};
use common::Trace;

//======================================================================================================================
// Constants
//======================================================================================================================

/// Ticks between two timer interrupts.
const TIMER_INTERVAL: u64 = 500;

//======================================================================================================================
// Tests
//======================================================================================================================

/// A sleeper is released no earlier than its deadline and by the first timer interrupt after it.
#[test]
fn sleeper_wakes_after_deadline() -> Result<()> {
    let mut kernel: SharedKernel = common::kernel(SchedulingPolicy::Priority)?;
    let alarm: Alarm = Alarm::new(kernel.clone());
    let elapsed: Trace<u64> = common::trace();

    let kernel_: SharedKernel = kernel.clone();
    let elapsed_: Trace<u64> = elapsed.clone();
    kernel.spawn("sleeper", async move {
        let start: u64 = kernel_.now();
        alarm.wait_until(500).await;
        elapsed_.borrow_mut().push(kernel_.now() - start);
    });
    kernel.run()?;

    let elapsed: u64 = elapsed.borrow()[0];
    ensure_eq!(elapsed >= 500, true);
    ensure_eq!(elapsed <= 500 + TIMER_INTERVAL, true);
    Ok(())
}

/// Independent sleepers are released in deadline order, while other threads keep running.
#[test]
fn sleepers_wake_in_deadline_order() -> Result<()> {
    let mut kernel: SharedKernel = common::kernel(SchedulingPolicy::Priority)?;
    let alarm: Alarm = Alarm::new(kernel.clone());
    let woken: Trace<(u64, u64)> = common::trace();

    for i in [3u64, 0, 4, 1, 2] {
        let kernel_: SharedKernel = kernel.clone();
        let alarm_: Alarm = alarm.clone();
        let woken_: Trace<(u64, u64)> = woken.clone();
        kernel.spawn("sleeper", async move {
            let deadline: u64 = kernel_.now() + 500 + i * 500;
            alarm_.wait_until(500 + i * 500).await;
            woken_.borrow_mut().push((deadline, kernel_.now()));
        });
    }
    let kernel_: SharedKernel = kernel.clone();
    kernel.spawn("busy", async move {
        for _ in 0..100 {
            kernel_.yield_current_thread().await;
        }
    });
    kernel.run()?;

    let woken: Vec<(u64, u64)> = woken.borrow().clone();
    ensure_eq!(woken.len(), 5);
    for pair in woken.windows(2) {
        ensure_eq!(pair[0].0 <= pair[1].0, true);
    }
    for (deadline, now) in woken {
        ensure_eq!(now >= deadline, true);
    }
    ensure_eq!(alarm.num_sleepers(), 0);
    Ok(())
}

/// A zero wait still lasts until the next timer interrupt.
#[test]
fn zero_wait_blocks_until_next_interrupt() -> Result<()> {
    let mut kernel: SharedKernel = common::kernel(SchedulingPolicy::Priority)?;
    let alarm: Alarm = Alarm::new(kernel.clone());
    let woken: Trace<u64> = common::trace();

    let kernel_: SharedKernel = kernel.clone();
    let woken_: Trace<u64> = woken.clone();
    kernel.spawn("sleeper", async move {
        alarm.wait_until(0).await;
        woken_.borrow_mut().push(kernel_.now());
    });
    kernel.run()?;

    ensure_eq!(*woken.borrow(), vec![TIMER_INTERVAL]);
    Ok(())
}

/// The alarm follows the configured timer interval.
#[test]
fn timer_interval_is_configurable() -> Result<()> {
    let mut kernel: SharedKernel = common::kernel_with(SchedulingPolicy::Lottery, "  timer_interval: 50\n")?;
    let alarm: Alarm = Alarm::new(kernel.clone());
    let woken: Trace<u64> = common::trace();

    let kernel_: SharedKernel = kernel.clone();
    let woken_: Trace<u64> = woken.clone();
    kernel.spawn("sleeper", async move {
        alarm.wait_until(120).await;
        woken_.borrow_mut().push(kernel_.now());
    });
    kernel.run()?;

    ensure_eq!(*woken.borrow(), vec![150]);
    Ok(())
}

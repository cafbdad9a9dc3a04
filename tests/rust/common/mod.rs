// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use ::anyhow::Result;
use ::cosched::{
    runtime::logging,
    Config,
    SchedulingPolicy,
    SharedKernel,
};
use ::std::{
    cell::RefCell,
    rc::Rc,
};

//======================================================================================================================
// Constants
//======================================================================================================================

/// Seed of the lottery draw, so that runs are reproducible.
pub const RNG_SEED: u64 = 1234;

//======================================================================================================================
// Structures
//======================================================================================================================

/// Log of events shared between the threads of a test.
pub type Trace<T> = Rc<RefCell<Vec<T>>>;

//======================================================================================================================
// Standalone Functions
//======================================================================================================================

/// Creates a kernel that dispatches with `policy`.
pub fn kernel(policy: SchedulingPolicy) -> Result<SharedKernel> {
    kernel_with(policy, "")
}

/// Creates a kernel that dispatches with `policy`. `extra` holds additional options of the scheduler section.
pub fn kernel_with(policy: SchedulingPolicy, extra: &str) -> Result<SharedKernel> {
    logging::initialize();
    let config: Config = Config::from_yaml_str(&format!(
        "scheduler:\n  scheduling_policy: {}\n  rng_seed: {}\n{}",
        policy, RNG_SEED, extra
    ))?;
    let kernel: SharedKernel = SharedKernel::new(&config)?;
    anyhow::ensure!(
        kernel.policy() == policy,
        "SCHEDULING_POLICY overrides the policy under test ({})",
        policy
    );
    Ok(kernel)
}

#[allow(dead_code)]
pub fn trace<T>() -> Trace<T> {
    Rc::new(RefCell::new(Vec::new()))
}

/// Sets the base priority of `thread` from outside of any thread.
#[allow(dead_code)]
pub fn set_priority(kernel: &mut SharedKernel, thread: ::cosched::ThreadId, priority: ::cosched::Priority) {
    let _guard = kernel.atomic_region();
    kernel.set_priority(thread, priority);
}

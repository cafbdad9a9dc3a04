// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//======================================================================================================================
// Imports
//======================================================================================================================

use crate::runtime::SharedKernel;

//======================================================================================================================
// Structures
//======================================================================================================================

/// Interrupt level of the processor. Code that runs with interrupts disabled is inside the atomic region.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum InterruptLevel {
    #[default]
    Enabled,
    Disabled,
}

/// Scoped atomic region. Restores the interrupt level it found when dropped, so regions nest.
pub struct InterruptGuard {
    kernel: SharedKernel,
    previous: InterruptLevel,
}

//======================================================================================================================
// Associate Functions
//======================================================================================================================

impl InterruptGuard {
    /// Disables interrupts on `kernel` until the guard is dropped.
    pub fn new(mut kernel: SharedKernel) -> Self {
        let previous: InterruptLevel = kernel.enter_atomic_region();
        Self { kernel, previous }
    }

    /// Level that is restored when this guard goes away.
    pub fn previous(&self) -> InterruptLevel {
        self.previous
    }
}

//======================================================================================================================
// Trait Implementations
//======================================================================================================================

impl Drop for InterruptGuard {
    fn drop(&mut self) {
        self.kernel.exit_atomic_region(self.previous);
    }
}

//======================================================================================================================
// Unit Tests
//======================================================================================================================

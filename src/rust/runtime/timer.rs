// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

//==============================================================================
// Imports
//==============================================================================

use crate::runtime::SharedKernel;

//==============================================================================
// Structures
//==============================================================================

/// Simulated clock of the kernel, in ticks. The hardware timer raises an interrupt every `interval` ticks.
pub struct Clock {
    now: u64,
    interval: u64,
    next_tick: u64,
}

//======================================================================================================================
// Traits
//======================================================================================================================

/// Handler of the periodic timer interrupt. Handlers run inside the atomic region, between two dispatches.
pub trait TimerInterrupt {
    fn on_timer_tick(&mut self, kernel: &mut SharedKernel);

    /// Whether a future tick may still make a thread runnable.
    fn has_pending(&self) -> bool;
}

//==============================================================================
// Associate Functions
//==============================================================================

impl Clock {
    pub fn new(interval: u64) -> Self {
        assert!(interval > 0, "Clock::new(): timer interval must be positive");
        Self {
            now: 0,
            interval,
            next_tick: interval,
        }
    }

    pub fn now(&self) -> u64 {
        self.now
    }

    pub fn interval(&self) -> u64 {
        self.interval
    }

    /// Time of the next timer interrupt.
    pub fn next_tick(&self) -> u64 {
        self.next_tick
    }

    pub fn advance(&mut self, ticks: u64) {
        self.now = self.now.saturating_add(ticks);
    }

    /// Jumps to the next timer interrupt. Used when no thread is runnable.
    pub fn fast_forward(&mut self) {
        if self.now < self.next_tick {
            self.now = self.next_tick;
        }
    }

    /// Acknowledges a due timer interrupt and schedules the next one. Returns false if none is due. Interrupts that
    /// were missed while a thread ran are coalesced into one.
    pub fn take_tick(&mut self) -> bool {
        if self.now < self.next_tick {
            return false;
        }
        let missed: u64 = (self.now - self.next_tick) / self.interval;
        self.next_tick += (missed + 1) * self.interval;
        true
    }
}

//==============================================================================
// Unit Tests
//==============================================================================

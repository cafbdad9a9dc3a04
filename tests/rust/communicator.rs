// Copyright (c) Microsoft Corporation.
// Licensed under the MIT license.

mod common;

//======================================================================================================================
// Imports
//======================================================================================================================

use ::anyhow::Result;
use ::cosched::{
    ensure_eq,
    SchedulingPolicy,
    SharedCondition,
    SharedKernel,
    SharedLock,
};
use ::std::{
    cell::RefCell,
    rc::Rc,
};
use common::Trace;

//======================================================================================================================
// Structures
//======================================================================================================================

struct Mailbox {
    /// Word handed from a speaker to a listener.
    buffer: Option<i32>,
    /// Number of completed transfers.
    transfers: u64,
}

/// Synchronous rendezvous: a speaker returns only once a listener took its word.
#[derive(Clone)]
struct Communicator {
    lock: SharedLock,
    speakers: SharedCondition,
    listeners: SharedCondition,
    acks: SharedCondition,
    mailbox: Rc<RefCell<Mailbox>>,
}

//======================================================================================================================
// Associate Functions
//======================================================================================================================

impl Communicator {
    fn new(kernel: SharedKernel) -> Self {
        let lock: SharedLock = SharedLock::new(kernel.clone());
        Self {
            speakers: SharedCondition::new(kernel.clone(), lock.clone()),
            listeners: SharedCondition::new(kernel.clone(), lock.clone()),
            acks: SharedCondition::new(kernel, lock.clone()),
            lock,
            mailbox: Rc::new(RefCell::new(Mailbox {
                buffer: None,
                transfers: 0,
            })),
        }
    }

    async fn speak(&mut self, word: i32) {
        self.lock.acquire().await;
        while self.mailbox.borrow().buffer.is_some() {
            self.speakers.sleep().await;
        }
        let transfers: u64 = {
            let mut mailbox = self.mailbox.borrow_mut();
            mailbox.buffer = Some(word);
            mailbox.transfers
        };
        self.listeners.wake();
        while self.mailbox.borrow().transfers == transfers {
            self.acks.sleep().await;
        }
        self.lock.release();
    }

    async fn listen(&mut self) -> i32 {
        self.lock.acquire().await;
        let word: i32 = loop {
            let word: Option<i32> = self.mailbox.borrow_mut().buffer.take();
            match word {
                Some(word) => break word,
                None => self.listeners.sleep().await,
            }
        };
        self.mailbox.borrow_mut().transfers += 1;
        self.acks.wake_all();
        self.speakers.wake();
        self.lock.release();
        word
    }
}

//======================================================================================================================
// Helper Functions
//======================================================================================================================

/// Runs `speakers` speakers and `listeners` listeners, each one moving `words` words. Returns the words spoken and the
/// words heard.
fn exchange(
    policy: SchedulingPolicy,
    speakers: usize,
    listeners: usize,
    words: usize,
) -> Result<(Vec<i32>, Vec<i32>)> {
    let mut kernel: SharedKernel = common::kernel(policy)?;
    let communicator: Communicator = Communicator::new(kernel.clone());
    let spoken: Trace<i32> = common::trace();
    let heard: Trace<i32> = common::trace();

    for speaker in 0..speakers {
        let mut communicator_: Communicator = communicator.clone();
        let spoken_: Trace<i32> = spoken.clone();
        kernel.spawn("speaker", async move {
            for index in 0..words {
                let word: i32 = (speaker * 1000 + index) as i32;
                communicator_.speak(word).await;
                spoken_.borrow_mut().push(word);
            }
        });
    }
    for _ in 0..listeners {
        let mut communicator_: Communicator = communicator.clone();
        let heard_: Trace<i32> = heard.clone();
        kernel.spawn("listener", async move {
            for _ in 0..words {
                let word: i32 = communicator_.listen().await;
                heard_.borrow_mut().push(word);
            }
        });
    }
    kernel.run()?;

    let mut spoken: Vec<i32> = spoken.borrow().clone();
    let mut heard: Vec<i32> = heard.borrow().clone();
    spoken.sort_unstable();
    heard.sort_unstable();
    Ok((spoken, heard))
}

//======================================================================================================================
// Tests
//======================================================================================================================

#[test]
fn one_speaker_one_listener() -> Result<()> {
    let (spoken, heard): (Vec<i32>, Vec<i32>) = exchange(SchedulingPolicy::Priority, 1, 1, 1)?;
    ensure_eq!(spoken, vec![0]);
    ensure_eq!(heard, vec![0]);
    Ok(())
}

#[test]
fn many_speakers_many_listeners() -> Result<()> {
    let (spoken, heard): (Vec<i32>, Vec<i32>) = exchange(SchedulingPolicy::Priority, 10, 10, 10)?;
    ensure_eq!(spoken.len(), 100);
    ensure_eq!(spoken, heard);
    Ok(())
}

#[test]
fn many_speakers_many_listeners_with_lottery() -> Result<()> {
    let (spoken, heard): (Vec<i32>, Vec<i32>) = exchange(SchedulingPolicy::Lottery, 10, 10, 10)?;
    ensure_eq!(spoken.len(), 100);
    ensure_eq!(spoken, heard);
    Ok(())
}

/// Listeners that show up first wait for the speakers.
#[test]
fn listeners_before_speakers() -> Result<()> {
    let mut kernel: SharedKernel = common::kernel(SchedulingPolicy::Priority)?;
    let communicator: Communicator = Communicator::new(kernel.clone());
    let heard: Trace<i32> = common::trace();

    for _ in 0..3 {
        let mut communicator_: Communicator = communicator.clone();
        let heard_: Trace<i32> = heard.clone();
        kernel.spawn("listener", async move {
            let word: i32 = communicator_.listen().await;
            heard_.borrow_mut().push(word);
        });
    }
    let kernel_: SharedKernel = kernel.clone();
    let mut communicator_: Communicator = communicator.clone();
    kernel.spawn("speaker", async move {
        for _ in 0..10 {
            kernel_.yield_current_thread().await;
        }
        for word in [7, 8, 9] {
            communicator_.speak(word).await;
        }
    });
    kernel.run()?;

    let mut heard: Vec<i32> = heard.borrow().clone();
    heard.sort_unstable();
    ensure_eq!(heard, vec![7, 8, 9]);
    Ok(())
}

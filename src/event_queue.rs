//! Completion mailbox between transfer-done interrupts and the scheduler.
//!
//! Interrupt handlers only record that a transfer left the wire; the
//! channel pool applies the events on its next `poll`, so channel state
//! is only ever written from the main loop. An interrupt cannot wait for
//! room, so a push into a full mailbox is counted and the event dropped.
//! The affected channel then falls back to `poll_complete` or the drain
//! timeout.

use core::cell::RefCell;

use critical_section::Mutex;
use heapless::Deque;

/// Event rejected because the mailbox was full
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFull<T>(pub T);

struct Mailbox<T, const SIZE: usize> {
    events: Deque<T, SIZE>,
    dropped: u32,
}

/// Bounded interrupt-safe event mailbox, placeable in a `static`.
///
/// Size it to the channel count: each channel has at most one transfer
/// in flight, so `SIZE >= K` never drops an event.
pub struct EventQueue<T, const SIZE: usize> {
    inner: Mutex<RefCell<Mailbox<T, SIZE>>>,
}

impl<T, const SIZE: usize> EventQueue<T, SIZE> {
    pub const fn new() -> Self {
        Self {
            inner: Mutex::new(RefCell::new(Mailbox {
                events: Deque::new(),
                dropped: 0,
            })),
        }
    }

    /// Handle given to interrupt handlers
    pub const fn sender(&self) -> EventSender<'_, T, SIZE> {
        EventSender { queue: self }
    }

    /// Handle given to the channel pool
    pub const fn receiver(&self) -> EventReceiver<'_, T, SIZE> {
        EventReceiver { queue: self }
    }

    /// Push an event, handing it back if the mailbox is full
    pub fn try_push(&self, value: T) -> Result<(), QueueFull<T>> {
        critical_section::with(|cs| {
            let mut mailbox = self.inner.borrow(cs).borrow_mut();
            mailbox.events.push_back(value).map_err(QueueFull)
        })
    }

    /// Push from interrupt context; a full mailbox drops the event and
    /// bumps [`dropped`](Self::dropped). Returns whether it was stored.
    pub fn notify(&self, value: T) -> bool {
        critical_section::with(|cs| {
            let mut mailbox = self.inner.borrow(cs).borrow_mut();
            if mailbox.events.push_back(value).is_ok() {
                return true;
            }
            mailbox.dropped = mailbox.dropped.saturating_add(1);
            false
        })
    }

    /// Oldest pending event
    pub fn try_pop(&self) -> Option<T> {
        critical_section::with(|cs| self.inner.borrow(cs).borrow_mut().events.pop_front())
    }

    /// Events waiting to be applied
    pub fn len(&self) -> usize {
        critical_section::with(|cs| self.inner.borrow(cs).borrow().events.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Events lost to a full mailbox since creation
    pub fn dropped(&self) -> u32 {
        critical_section::with(|cs| self.inner.borrow(cs).borrow().dropped)
    }
}

impl<T, const SIZE: usize> Default for EventQueue<T, SIZE> {
    fn default() -> Self {
        Self::new()
    }
}

/// Interrupt-side handle of an [`EventQueue`]
#[derive(Clone, Copy)]
pub struct EventSender<'a, T, const SIZE: usize> {
    queue: &'a EventQueue<T, SIZE>,
}

impl<T, const SIZE: usize> EventSender<'_, T, SIZE> {
    pub fn try_push(&self, value: T) -> Result<(), QueueFull<T>> {
        self.queue.try_push(value)
    }

    /// See [`EventQueue::notify`]
    pub fn notify(&self, value: T) -> bool {
        self.queue.notify(value)
    }
}

/// Scheduler-side handle of an [`EventQueue`]
#[derive(Clone, Copy)]
pub struct EventReceiver<'a, T, const SIZE: usize> {
    queue: &'a EventQueue<T, SIZE>,
}

impl<T, const SIZE: usize> EventReceiver<'_, T, SIZE> {
    pub fn try_pop(&self) -> Option<T> {
        self.queue.try_pop()
    }

    pub fn dropped(&self) -> u32 {
        self.queue.dropped()
    }
}

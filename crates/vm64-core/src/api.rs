//! Public host-facing configuration and integration types.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::io;
use std::rc::{Rc, Weak};

use log::LevelFilter;
use thiserror::Error;

use crate::Fault;

/// Default base address of the interrupt vector table.
pub const DEFAULT_INTERRUPT_VECTOR_BASE: u64 = 0x1000_0000;

/// Default initial value of both SP and FP.
pub const DEFAULT_STACK_POINTER: u64 = 0xFFFF_FFFF - 1;

/// Number of distinct interrupt lines selectable through the mask register.
pub const INTERRUPT_LINES: u16 = 64;

/// Top-level immutable configuration for a core instance.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct CoreConfig {
    /// Base address of the interrupt vector table (one 8-byte handler per line).
    pub interrupt_vector_base: u64,
    /// Initial SP and FP.
    pub initial_stack_pointer: u64,
    /// Throttles [`Cpu::run`](crate::Cpu::run) to this many steps per second when set.
    pub target_steps_per_second: Option<u32>,
    /// Logs a register dump at debug level after every step of
    /// [`Cpu::run`](crate::Cpu::run). Applies even when `log_level` is below
    /// debug; only the host's logger can still drop it.
    pub debug_each_step: bool,
    /// Most verbose diagnostic level the core and its bus will emit.
    pub log_level: LevelFilter,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            interrupt_vector_base: DEFAULT_INTERRUPT_VECTOR_BASE,
            initial_stack_pointer: DEFAULT_STACK_POINTER,
            target_steps_per_second: None,
            debug_each_step: false,
            log_level: LevelFilter::Warn,
        }
    }
}

pub(crate) type InterruptQueue = Rc<RefCell<VecDeque<u16>>>;

/// Non-owning handle a device uses to signal the core that owns its bus.
///
/// Holding a link never keeps the core alive. Requests raised through it are
/// delivered one per step, before the next fetch.
#[derive(Debug, Clone, Default)]
pub struct CoreLink {
    pending: Weak<RefCell<VecDeque<u16>>>,
}

impl CoreLink {
    pub(crate) fn new(queue: &InterruptQueue) -> Self {
        Self {
            pending: Rc::downgrade(queue),
        }
    }

    /// A link that is not bound to any core.
    #[must_use]
    pub fn detached() -> Self {
        Self::default()
    }

    /// Returns `true` while the owning core is alive.
    #[must_use]
    pub fn is_attached(&self) -> bool {
        self.pending.strong_count() > 0
    }

    /// Queues interrupt `vector` on the owning core.
    ///
    /// Returns `false` when the core no longer exists.
    pub fn raise(&self, vector: u16) -> bool {
        self.pending.upgrade().is_some_and(|queue| {
            queue.borrow_mut().push_back(vector);
            true
        })
    }
}

/// Summary of a completed [`Cpu::run`](crate::Cpu::run).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct RunOutcome {
    /// Executed instructions, not counting the final halt.
    pub steps: u64,
}

/// Failures surfaced by an interactive debugger session.
#[derive(Debug, Error)]
pub enum DebuggerError {
    /// Reading commands or writing output failed.
    #[error("debugger i/o failed: {0}")]
    Io(#[from] io::Error),
    /// The core faulted while stepping.
    #[error(transparent)]
    Fault(#[from] Fault),
}

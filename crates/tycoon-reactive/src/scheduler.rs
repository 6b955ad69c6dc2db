#![forbid(unsafe_code)]

//! Single-threaded run-to-completion scheduler.
//!
//! # Design
//!
//! [`Scheduler`] is a small explicit event loop with two queues:
//!
//! - **Microtasks** run at the end of the current synchronous unit of work,
//!   before any timer. A microtask that queues another microtask gets it run
//!   in the same drain.
//! - **Timers** run on a virtual clock, in deadline order (ties in scheduling
//!   order), each one followed by a full microtask drain. One timer plus its
//!   drain is a *turn*.
//!
//! The clock only moves through [`Scheduler::advance`] and
//! [`Scheduler::run_until_idle`], which keeps every test deterministic.
//!
//! Handles are cheap clones of the same loop. Pass one to every consumer
//! that needs to defer work; there is no ambient global loop.
//!
//! # Failure Modes
//!
//! - **Panicking task**: contained, logged at `error`, counted in
//!   [`SchedulerStats::tasks_panicked`]; the loop keeps going.
//! - **Runaway microtasks**: a drain stops after
//!   [`SchedulerConfig::max_microtasks_per_drain`] tasks and reports
//!   [`SchedulerError::MicrotaskBudgetExceeded`]; the rest stay queued.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use crate::config::SchedulerConfig;
use crate::error::SchedulerError;
use crate::panic_guard::contain;

type Task = Box<dyn FnOnce()>;

/// Handle returned by [`Scheduler::set_timeout`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

/// Counters describing what the loop has done so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    /// Microtasks executed (including ones that panicked).
    pub microtasks_run: u64,
    /// Timers executed (including ones that panicked).
    pub timers_fired: u64,
    /// Tasks of either kind that panicked.
    pub tasks_panicked: u64,
    /// Completed microtask drains that ran at least one task.
    pub drains: u64,
}

struct SchedulerInner {
    config: SchedulerConfig,
    now: Duration,
    microtasks: VecDeque<Task>,
    timers: BTreeMap<(Duration, TimerId), Task>,
    deadlines: HashMap<TimerId, Duration>,
    next_timer: u64,
    stats: SchedulerStats,
}

/// Explicit cooperative event loop.
#[derive(Clone)]
pub struct Scheduler {
    inner: Rc<RefCell<SchedulerInner>>,
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Scheduler")
            .field("now", &inner.now)
            .field("microtasks", &inner.microtasks.len())
            .field("timers", &inner.timers.len())
            .field("stats", &inner.stats)
            .finish()
    }
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Copy)]
enum TaskKind {
    Microtask,
    Timer,
}

impl Scheduler {
    /// Scheduler with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(SchedulerConfig::default())
    }

    /// Scheduler with an explicit configuration.
    #[must_use]
    pub fn with_config(config: SchedulerConfig) -> Self {
        Self {
            inner: Rc::new(RefCell::new(SchedulerInner {
                config,
                now: Duration::ZERO,
                microtasks: VecDeque::new(),
                timers: BTreeMap::new(),
                deadlines: HashMap::new(),
                next_timer: 0,
                stats: SchedulerStats::default(),
            })),
        }
    }

    /// Active configuration.
    #[must_use]
    pub fn config(&self) -> SchedulerConfig {
        self.inner.borrow().config.clone()
    }

    /// Current virtual time.
    #[must_use]
    pub fn now(&self) -> Duration {
        self.inner.borrow().now
    }

    /// Activity counters.
    #[must_use]
    pub fn stats(&self) -> SchedulerStats {
        self.inner.borrow().stats
    }

    /// Queued microtasks.
    #[must_use]
    pub fn pending_microtasks(&self) -> usize {
        self.inner.borrow().microtasks.len()
    }

    /// Armed timers.
    #[must_use]
    pub fn pending_timers(&self) -> usize {
        self.inner.borrow().timers.len()
    }

    /// Nothing queued on either queue.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        let inner = self.inner.borrow();
        inner.microtasks.is_empty() && inner.timers.is_empty()
    }

    /// Queue `task` to run at the end of the current synchronous unit of
    /// work, ahead of every timer.
    pub fn queue_microtask(&self, task: impl FnOnce() + 'static) {
        self.inner.borrow_mut().microtasks.push_back(Box::new(task));
    }

    /// Arm a timer that runs `task` once `delay` of virtual time has passed.
    pub fn set_timeout(&self, delay: Duration, task: impl FnOnce() + 'static) -> TimerId {
        let mut inner = self.inner.borrow_mut();
        let id = TimerId(inner.next_timer);
        inner.next_timer += 1;
        let deadline = inner.now.saturating_add(delay);
        inner.timers.insert((deadline, id), Box::new(task));
        inner.deadlines.insert(id, deadline);
        id
    }

    /// Disarm a timer. Returns `false` if it already fired or was cleared.
    pub fn clear_timeout(&self, id: TimerId) -> bool {
        let task = {
            let mut inner = self.inner.borrow_mut();
            let Some(deadline) = inner.deadlines.remove(&id) else {
                return false;
            };
            inner.timers.remove(&(deadline, id))
        };
        // Dropping the task may run destructors that call back into the
        // scheduler, so the borrow must be released first.
        let found = task.is_some();
        drop(task);
        found
    }

    /// Drain the microtask queue, including microtasks queued while
    /// draining. Returns how many ran.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::MicrotaskBudgetExceeded`] when the drain hits the
    /// configured budget with work still queued.
    pub fn run_microtasks(&self) -> Result<usize, SchedulerError> {
        let limit = self.inner.borrow().config.max_microtasks_per_drain;
        let mut ran = 0;
        loop {
            let task = {
                let mut inner = self.inner.borrow_mut();
                if inner.microtasks.is_empty() {
                    break;
                }
                if ran >= limit {
                    tracing::warn!(limit, queued = inner.microtasks.len(), "microtask budget exceeded");
                    return Err(SchedulerError::MicrotaskBudgetExceeded { limit });
                }
                inner.microtasks.pop_front()
            };
            if let Some(task) = task {
                self.run_task(task, TaskKind::Microtask);
                ran += 1;
            }
        }
        if ran > 0 {
            self.inner.borrow_mut().stats.drains += 1;
        }
        Ok(ran)
    }

    /// Move the clock forward by `by`, firing every timer that falls due,
    /// each followed by a microtask drain. Microtasks already queued run
    /// first. Returns the number of timers fired.
    ///
    /// # Errors
    ///
    /// Propagates [`SchedulerError`] from any drain; the clock is left at
    /// the deadline of the timer that was running.
    pub fn advance(&self, by: Duration) -> Result<usize, SchedulerError> {
        self.run_microtasks()?;
        let target = self.now().saturating_add(by);
        let mut fired = 0;
        while let Some(task) = self.pop_due_timer(target) {
            self.run_task(task, TaskKind::Timer);
            fired += 1;
            self.run_microtasks()?;
        }
        self.inner.borrow_mut().now = target;
        Ok(fired)
    }

    /// Run until both queues are empty, jumping the clock to each timer's
    /// deadline in turn. Returns the number of timers fired.
    ///
    /// # Errors
    ///
    /// Propagates [`SchedulerError`] from any drain.
    pub fn run_until_idle(&self) -> Result<usize, SchedulerError> {
        self.run_microtasks()?;
        let mut fired = 0;
        while let Some(task) = self.pop_due_timer(Duration::MAX) {
            self.run_task(task, TaskKind::Timer);
            fired += 1;
            self.run_microtasks()?;
        }
        Ok(fired)
    }

    /// Pop the earliest timer due at or before `limit`, moving the clock to
    /// its deadline.
    fn pop_due_timer(&self, limit: Duration) -> Option<Task> {
        let mut inner = self.inner.borrow_mut();
        let (&(deadline, id), _) = inner.timers.first_key_value()?;
        if deadline > limit {
            return None;
        }
        let task = inner.timers.remove(&(deadline, id))?;
        inner.deadlines.remove(&id);
        if deadline > inner.now {
            inner.now = deadline;
        }
        Some(task)
    }

    fn run_task(&self, task: Task, kind: TaskKind) {
        let outcome = contain(task);
        let mut inner = self.inner.borrow_mut();
        match kind {
            TaskKind::Microtask => inner.stats.microtasks_run += 1,
            TaskKind::Timer => inner.stats.timers_fired += 1,
        }
        if let Err(panic) = outcome {
            inner.stats.tasks_panicked += 1;
            let kind = match kind {
                TaskKind::Microtask => "microtask",
                TaskKind::Timer => "timer",
            };
            tracing::error!(kind, panic = %panic, "scheduled task panicked");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

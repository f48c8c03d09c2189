//! # Scene Barrier
//!
//! Reentrant exclusive lock coordinating the engine phases with bulk scene
//! mutation, built on a readers-writer lock:
//!
//! - **Phases** (render, simulation, synchronize, update) are readers. A
//!   thread calls [`SceneBarrier::begin_phase`] before phase work and drops
//!   the returned guard after it. Any number of phases run concurrently.
//! - **Exclusive access** is the writer. [`SceneBarrier::lock`] waits until
//!   no phase is active on another thread; while it is held or pending,
//!   `begin_phase` on other threads waits.
//!
//! The owner thread may lock again (the depth counts up) and may begin
//! phases freely. A thread that locks from inside its own phase yields that
//! phase for the duration of the lock and gets it back, atomically, when the
//! outermost guard drops.
//!
//! Guards are tied to the thread that created them.

use std::marker::PhantomData;
use std::sync::Arc;
use std::thread::{self, ThreadId};

use parking_lot::lock_api::{ArcRwLockReadGuard, ArcRwLockWriteGuard};
use parking_lot::{Mutex, RawRwLock, RwLock};

type ReadGuard = ArcRwLockReadGuard<RawRwLock, ()>;
type WriteGuard = ArcRwLockWriteGuard<RawRwLock, ()>;

/// Engine phase that may run on its own thread
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    /// Frame rendering
    Render,
    /// Physics stepping
    Simulation,
    /// Transform flush
    Synchronize,
    /// Component updates and event draining
    Update,
}

impl Phase {
    /// Every phase in slot order
    pub const ALL: [Self; 4] = [Self::Render, Self::Simulation, Self::Synchronize, Self::Update];

    fn slot(self) -> usize {
        match self {
            Self::Render => 0,
            Self::Simulation => 1,
            Self::Synchronize => 2,
            Self::Update => 3,
        }
    }
}

struct Occupant {
    thread: ThreadId,
    /// One occupant per thread holds the thread's read guard
    guard: Option<ReadGuard>,
}

struct Owner {
    thread: ThreadId,
    depth: usize,
    guard: WriteGuard,
}

#[derive(Default)]
struct BarrierState {
    owner: Option<Owner>,
    slots: [Vec<Occupant>; 4],
}

impl BarrierState {
    fn occupants_of(&mut self, thread: ThreadId) -> impl Iterator<Item = &mut Occupant> {
        self.slots
            .iter_mut()
            .flatten()
            .filter(move |occupant| occupant.thread == thread)
    }

    fn holds_guard(&self, thread: ThreadId) -> bool {
        self.slots
            .iter()
            .flatten()
            .any(|occupant| occupant.thread == thread && occupant.guard.is_some())
    }
}

/// Reentrant cross-thread barrier
pub struct SceneBarrier {
    lock: Arc<RwLock<()>>,
    state: Mutex<BarrierState>,
}

impl Default for SceneBarrier {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneBarrier {
    /// Create an unlocked barrier with no active phase
    pub fn new() -> Self {
        Self {
            lock: Arc::new(RwLock::new(())),
            state: Mutex::new(BarrierState::default()),
        }
    }

    /// Acquire exclusive access, blocking while another thread holds it or
    /// any other thread is inside a phase
    pub fn lock(&self) -> BarrierGuard<'_> {
        let me = thread::current().id();

        let yielded: Vec<ReadGuard> = {
            let mut state = self.state.lock();
            if let Some(owner) = state.owner.as_mut().filter(|owner| owner.thread == me) {
                owner.depth += 1;
                return BarrierGuard::new(self);
            }
            state.occupants_of(me).filter_map(|occupant| occupant.guard.take()).collect()
        };
        if !yielded.is_empty() {
            log::trace!("Barrier lock yields {} phase guard(s)", yielded.len());
        }
        drop(yielded);

        let guard = self.lock.write_arc();
        self.state.lock().owner = Some(Owner {
            thread: me,
            depth: 1,
            guard,
        });
        BarrierGuard::new(self)
    }

    fn unlock(&self) {
        let me = thread::current().id();
        let mut state = self.state.lock();
        let Some(owner) = state.owner.as_mut().filter(|owner| owner.thread == me) else {
            log::error!("Barrier unlocked by a thread that does not own it");
            return;
        };
        owner.depth -= 1;
        if owner.depth > 0 {
            return;
        }

        let Some(owner) = state.owner.take() else {
            return;
        };
        // Hand the lock back to this thread's phases without letting a
        // waiting writer in between
        let next = state.occupants_of(me).next();
        match next {
            Some(occupant) => occupant.guard = Some(ArcRwLockWriteGuard::downgrade(owner.guard)),
            None => drop(owner),
        }
    }

    /// Enter a phase, blocking while another thread holds or waits for
    /// exclusive access
    pub fn begin_phase(&self, phase: Phase) -> PhaseGuard<'_> {
        let me = thread::current().id();
        {
            let mut state = self.state.lock();
            let owns = state.owner.as_ref().is_some_and(|owner| owner.thread == me);
            if owns || state.holds_guard(me) {
                state.slots[phase.slot()].push(Occupant {
                    thread: me,
                    guard: None,
                });
                return PhaseGuard::new(self, phase);
            }
        }

        let guard = self.lock.read_arc();
        self.state.lock().slots[phase.slot()].push(Occupant {
            thread: me,
            guard: Some(guard),
        });
        PhaseGuard::new(self, phase)
    }

    fn end_phase(&self, phase: Phase) {
        let me = thread::current().id();
        let released = {
            let mut state = self.state.lock();
            let slot = &mut state.slots[phase.slot()];
            let Some(position) = slot.iter().rposition(|occupant| occupant.thread == me) else {
                log::error!("Phase {phase:?} ended on a thread that did not begin it");
                return;
            };
            let occupant = slot.remove(position);
            let next = state.occupants_of(me).next();
            let released = match (occupant.guard, next) {
                (Some(guard), Some(other)) => {
                    other.guard = Some(guard);
                    None
                }
                (guard, _) => guard,
            };
            released
        };
        drop(released);
    }

    /// Whether any thread holds exclusive access
    pub fn is_locked(&self) -> bool {
        self.state.lock().owner.is_some()
    }

    /// Whether the calling thread holds exclusive access
    pub fn is_owned_by_current(&self) -> bool {
        let me = thread::current().id();
        self.state.lock().owner.as_ref().is_some_and(|owner| owner.thread == me)
    }

    /// Reentrancy depth of the current owner (0 when unlocked)
    pub fn depth(&self) -> usize {
        self.state.lock().owner.as_ref().map_or(0, |owner| owner.depth)
    }

    /// Number of active occupants of a phase across all threads
    pub fn occupants(&self, phase: Phase) -> usize {
        self.state.lock().slots[phase.slot()].len()
    }
}

/// Exclusive access; released when the outermost guard drops
#[must_use = "the barrier is released when the guard is dropped"]
pub struct BarrierGuard<'a> {
    barrier: &'a SceneBarrier,
    _not_send: PhantomData<*const ()>,
}

impl<'a> BarrierGuard<'a> {
    fn new(barrier: &'a SceneBarrier) -> Self {
        Self {
            barrier,
            _not_send: PhantomData,
        }
    }
}

impl Drop for BarrierGuard<'_> {
    fn drop(&mut self) {
        self.barrier.unlock();
    }
}

/// Active phase; ends when dropped
#[must_use = "the phase ends when the guard is dropped"]
pub struct PhaseGuard<'a> {
    barrier: &'a SceneBarrier,
    phase: Phase,
    _not_send: PhantomData<*const ()>,
}

impl<'a> PhaseGuard<'a> {
    fn new(barrier: &'a SceneBarrier, phase: Phase) -> Self {
        Self {
            barrier,
            phase,
            _not_send: PhantomData,
        }
    }

    /// Phase held by this guard
    pub fn phase(&self) -> Phase {
        self.phase
    }
}

impl Drop for PhaseGuard<'_> {
    fn drop(&mut self) {
        self.barrier.end_phase(self.phase);
    }
}

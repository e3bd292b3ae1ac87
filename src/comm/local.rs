use super::{GroupFault, ProcessGroup};
use std::cell::Cell;
use std::collections::HashMap;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Payload a rank leaves at a rendezvous point.
#[derive(Clone)]
enum Deposit {
    Ints(Vec<i32>),
    Flag(bool),
    Unit,
}

/// One collective in flight. Collectives are numbered per rank in program
/// order, and the numbering is identical across ranks by the protocol's
/// nature, so call `n` on every rank addresses the same cell. The cell stays
/// alive until every rank has read its result, which keeps a fast rank's
/// next collective from trampling a slow rank's pending read.
struct CallCell {
    kind: &'static str,
    deposits: Vec<Option<Deposit>>,
    deposited: usize,
    readers_left: usize,
}

struct State {
    cells: HashMap<u64, CallCell>,
    aborted: Option<i32>,
}

struct Shared {
    state: Mutex<State>,
    arrivals: Condvar,
    size: usize,
    timeout: Option<Duration>,
}

/// In-process process group: one handle per rank, all sharing the rendezvous
/// state. This is the collaborator behind the `run` subcommand and the test
/// suite. Unlike a real MPI runtime it can refuse to hang: give it a timeout
/// and divergent participation in a collective comes back as
/// [`GroupFault::RendezvousTimeout`] instead of blocking forever.
pub struct LocalGroup {
    rank: usize,
    calls: Cell<u64>,
    shared: Arc<Shared>,
}

impl LocalGroup {
    /// Create the handles for a `size`-rank world. Hand each one to its own
    /// thread; dropping them all tears the world down.
    pub fn spawn_world(size: usize, timeout: Option<Duration>) -> Vec<LocalGroup> {
        let shared = Arc::new(Shared {
            state: Mutex::new(State {
                cells: HashMap::new(),
                aborted: None,
            }),
            arrivals: Condvar::new(),
            size,
            timeout,
        });
        (0..size)
            .map(|rank| LocalGroup {
                rank,
                calls: Cell::new(0),
                shared: Arc::clone(&shared),
            })
            .collect()
    }

    /// Deposit a payload at the current rendezvous point, wait until every
    /// rank has deposited, then derive this rank's result from the full cell.
    fn run_collective<T>(
        &self,
        kind: &'static str,
        deposit: Deposit,
        collect: impl FnOnce(&CallCell) -> T,
    ) -> Result<T, GroupFault> {
        let call_id = self.calls.get();
        self.calls.set(call_id + 1);

        let size = self.shared.size;
        let mut state = lock(&self.shared.state);

        if let Some(code) = state.aborted {
            return Err(GroupFault::Aborted { code });
        }

        let cell = state.cells.entry(call_id).or_insert_with(|| CallCell {
            kind,
            deposits: vec![None; size],
            deposited: 0,
            readers_left: size,
        });
        if cell.kind != kind {
            return Err(GroupFault::CollectiveMismatch {
                rank: self.rank,
                expected: cell.kind,
                got: kind,
            });
        }
        if let Deposit::Ints(mine) = &deposit {
            let group_len = cell.deposits.iter().flatten().find_map(|d| match d {
                Deposit::Ints(theirs) => Some(theirs.len()),
                _ => None,
            });
            if let Some(expected) = group_len {
                if mine.len() != expected {
                    return Err(GroupFault::LengthMismatch {
                        rank: self.rank,
                        expected,
                        got: mine.len(),
                    });
                }
            }
        }
        cell.deposits[self.rank] = Some(deposit);
        cell.deposited += 1;
        if cell.deposited == size {
            self.shared.arrivals.notify_all();
        }

        let deadline = self.shared.timeout.map(|t| (t, Instant::now() + t));
        loop {
            if let Some(code) = state.aborted {
                return Err(GroupFault::Aborted { code });
            }
            let arrived = match state.cells.get(&call_id) {
                Some(cell) => cell.deposited,
                // Unreachable while our read is outstanding; treat as abort.
                None => return Err(GroupFault::Aborted { code: 1 }),
            };
            if arrived == size {
                break;
            }
            state = match deadline {
                None => wait(&self.shared.arrivals, state),
                Some((timeout, deadline)) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(GroupFault::RendezvousTimeout {
                            waited_ms: timeout.as_millis() as u64,
                            arrived,
                            size,
                        });
                    }
                    wait_until(&self.shared.arrivals, state, deadline - now)
                }
            };
        }

        let result = match state.cells.get_mut(&call_id) {
            Some(cell) => {
                let result = collect(cell);
                cell.readers_left -= 1;
                if cell.readers_left == 0 {
                    state.cells.remove(&call_id);
                }
                result
            }
            None => return Err(GroupFault::Aborted { code: 1 }),
        };
        Ok(result)
    }
}

impl ProcessGroup for LocalGroup {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.shared.size
    }

    fn barrier(&self) -> Result<(), GroupFault> {
        self.run_collective("barrier", Deposit::Unit, |_| ())
    }

    fn gather(&self, send: &[i32], coordinator: usize) -> Result<Option<Vec<i32>>, GroupFault> {
        let me = self.rank;
        self.run_collective("gather", Deposit::Ints(send.to_vec()), move |cell| {
            if me != coordinator {
                return None;
            }
            let mut full = Vec::with_capacity(send.len() * cell.deposits.len());
            for deposit in cell.deposits.iter().flatten() {
                if let Deposit::Ints(block) = deposit {
                    full.extend_from_slice(block);
                }
            }
            Some(full)
        })
    }

    fn agree(&self, vote: bool) -> Result<bool, GroupFault> {
        self.run_collective("agree", Deposit::Flag(vote), |cell| {
            cell.deposits.iter().flatten().all(|deposit| match deposit {
                Deposit::Flag(vote) => *vote,
                _ => true,
            })
        })
    }

    fn abort_all(&self, code: i32) -> GroupFault {
        let mut state = lock(&self.shared.state);
        let code = *state.aborted.get_or_insert(code);
        self.shared.arrivals.notify_all();
        GroupFault::Aborted { code }
    }
}

// Poisoning can only come from a rank that panicked outside a rendezvous
// (deposits are single assignments under the lock), so the state is sound;
// recover the guard instead of compounding one rank's panic into everyone's.
fn lock<'a>(mutex: &'a Mutex<State>) -> MutexGuard<'a, State> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn wait<'a>(cv: &Condvar, guard: MutexGuard<'a, State>) -> MutexGuard<'a, State> {
    cv.wait(guard).unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn wait_until<'a>(
    cv: &Condvar,
    guard: MutexGuard<'a, State>,
    remaining: Duration,
) -> MutexGuard<'a, State> {
    cv.wait_timeout(guard, remaining)
        .map(|(guard, _)| guard)
        .unwrap_or_else(|poisoned| poisoned.into_inner().0)
}

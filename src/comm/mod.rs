use thiserror::Error;

pub mod local;
#[cfg(feature = "mpi")]
pub mod mpi;

pub use local::LocalGroup;
#[cfg(feature = "mpi")]
pub use mpi::MpiGroup;

/// Faults surfaced by a process-group collaborator. The in-process group
/// reports all of these; the MPI adapter only ever produces `Aborted`
/// (everything else is the MPI runtime's problem, including hanging).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GroupFault {
    #[error("process group aborted with exit code {code}")]
    Aborted { code: i32 },

    #[error(
        "collective rendezvous timed out after {waited_ms} ms: {arrived} of {size} ranks arrived"
    )]
    RendezvousTimeout {
        waited_ms: u64,
        arrived: usize,
        size: usize,
    },

    #[error("gather length mismatch: group sends {expected} elements, rank {rank} sent {got}")]
    LengthMismatch {
        rank: usize,
        expected: usize,
        got: usize,
    },

    #[error("collective mismatch: rank {rank} entered {got} while the group is running {expected}")]
    CollectiveMismatch {
        rank: usize,
        expected: &'static str,
        got: &'static str,
    },
}

/// The external process-group collaborator: a fixed-size set of participants
/// with stable integer identities and the collective primitives the pipeline
/// consumes. Lifecycle is RAII on both implementations (thread spawn/join for
/// [`local::LocalGroup`], `mpi::initialize`/`Universe` drop for the MPI
/// adapter), so teardown is reachable on every exit path.
pub trait ProcessGroup {
    /// This participant's identity, in `[0, size)`.
    fn rank(&self) -> usize;

    /// Number of participants in the group.
    fn size(&self) -> usize;

    /// Block until every participant has reached the corresponding call.
    fn barrier(&self) -> Result<(), GroupFault>;

    /// All-to-one gather. Every participant must call this with a same-length
    /// partition; only `coordinator` receives `Some` concatenation, in rank
    /// order. The result never aliases any sender's memory.
    fn gather(&self, send: &[i32], coordinator: usize) -> Result<Option<Vec<i32>>, GroupFault>;

    /// Collective logical AND of every participant's vote.
    fn agree(&self, vote: bool) -> Result<bool, GroupFault>;

    /// Request immediate termination of the whole group. Returns the fault
    /// describing the abort so callers can propagate it; the MPI adapter
    /// never actually returns.
    fn abort_all(&self, code: i32) -> GroupFault;
}

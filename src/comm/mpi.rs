use super::{GroupFault, ProcessGroup};
use anyhow::{Context, Result};
use mpi::collective::SystemOperation;
use mpi::environment::Universe;
use mpi::topology::SimpleCommunicator;
use mpi::traits::*;

/// Process group backed by a real MPI world. One OS process per rank,
/// launched externally (`mpirun -n 4 gathergate mpi`). The universe is held
/// so the runtime is finalized when the group is dropped.
pub struct MpiGroup {
    world: SimpleCommunicator,
    _universe: Universe,
}

impl MpiGroup {
    pub fn init() -> Result<Self> {
        let universe = mpi::initialize()
            .context("MPI runtime failed to initialize (was it initialized twice?)")?;
        let world = universe.world();
        Ok(MpiGroup {
            world,
            _universe: universe,
        })
    }
}

impl ProcessGroup for MpiGroup {
    fn rank(&self) -> usize {
        self.world.rank() as usize
    }

    fn size(&self) -> usize {
        self.world.size() as usize
    }

    fn barrier(&self) -> Result<(), GroupFault> {
        self.world.barrier();
        Ok(())
    }

    fn gather(&self, send: &[i32], coordinator: usize) -> Result<Option<Vec<i32>>, GroupFault> {
        let root = self.world.process_at_rank(coordinator as i32);
        if self.rank() == coordinator {
            let mut full = vec![0i32; send.len() * self.size()];
            root.gather_into_root(send, &mut full[..]);
            Ok(Some(full))
        } else {
            root.gather_into(send);
            Ok(None)
        }
    }

    fn agree(&self, vote: bool) -> Result<bool, GroupFault> {
        let mine = vote as i32;
        let mut all = 0i32;
        self.world
            .all_reduce_into(&mine, &mut all, SystemOperation::logical_and());
        Ok(all != 0)
    }

    fn abort_all(&self, code: i32) -> GroupFault {
        self.world.abort(code)
    }
}

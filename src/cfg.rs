//! Structural view of a routine's control-flow graph.

use crate::error::{CheckError, CheckResult};
use crate::ir::{BlockId, Routine};

/// Validated CFG with successor lists and a reverse postorder.
#[derive(Debug)]
pub struct Cfg<'r> {
    routine: &'r Routine,
    successors: Vec<Vec<BlockId>>,
    predecessors: Vec<Vec<BlockId>>,
    /// Reachable blocks in reverse postorder, entry first.
    rpo: Vec<BlockId>,
}

impl<'r> Cfg<'r> {
    pub fn new(routine: &'r Routine) -> CheckResult<Self> {
        if routine.blocks.is_empty() {
            return Err(CheckError::malformed_cfg(&routine.name, "routine has no blocks"));
        }

        let n = routine.blocks.len();
        let mut successors = Vec::with_capacity(n);
        let mut predecessors = vec![Vec::new(); n];
        for (idx, block) in routine.blocks.iter().enumerate() {
            if block.id.index() != idx {
                return Err(CheckError::malformed_cfg(
                    &routine.name,
                    format!("block at position {idx} has id {}", block.id.index()),
                ));
            }
            let succs = block.terminator.successors();
            for succ in &succs {
                if succ.index() >= n {
                    return Err(CheckError::malformed_cfg(
                        &routine.name,
                        format!("block {idx} jumps to missing block {}", succ.index()),
                    ));
                }
                predecessors[succ.index()].push(block.id);
            }
            successors.push(succs);
        }

        let rpo = reverse_postorder(&successors);
        Ok(Self {
            routine,
            successors,
            predecessors,
            rpo,
        })
    }

    pub fn routine(&self) -> &'r Routine {
        self.routine
    }

    pub fn entry(&self) -> BlockId {
        BlockId(0)
    }

    pub fn len(&self) -> usize {
        self.routine.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routine.blocks.is_empty()
    }

    pub fn successors(&self, id: BlockId) -> &[BlockId] {
        &self.successors[id.index()]
    }

    pub fn predecessors(&self, id: BlockId) -> &[BlockId] {
        &self.predecessors[id.index()]
    }

    pub fn reverse_postorder(&self) -> &[BlockId] {
        &self.rpo
    }

    pub fn is_reachable(&self, id: BlockId) -> bool {
        self.rpo.contains(&id)
    }
}

fn reverse_postorder(successors: &[Vec<BlockId>]) -> Vec<BlockId> {
    let mut visited = vec![false; successors.len()];
    let mut postorder = Vec::with_capacity(successors.len());
    // (block, next successor to visit)
    let mut stack = vec![(0usize, 0usize)];
    visited[0] = true;

    while let Some((block, next)) = stack.last_mut() {
        let block = *block;
        if let Some(succ) = successors[block].get(*next) {
            *next += 1;
            let succ = succ.index();
            if !visited[succ] {
                visited[succ] = true;
                stack.push((succ, 0));
            }
        } else {
            postorder.push(BlockId(block));
            stack.pop();
        }
    }

    postorder.reverse();
    postorder
}

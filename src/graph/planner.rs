//! Graph memory planner.
//!
//! Walks a [`Graph`] in execution order, driving an [`OffsetAllocator`]:
//! a tensor is allocated when it becomes live and freed right after its last
//! consumer runs. The finished plan is materialized into one buffer and every
//! tensor is bound to a range of it.

use std::collections::HashMap;

use crate::config::PlannerConfig;
use crate::error::{PlanError, PlanResult};
use crate::graph::{Graph, TensorId, TensorKind};
use crate::memory::{AllocatorStats, Block, MaterializedAllocator, OffsetAllocator};
use crate::runtime::{HostBuffer, Runtime};

/// Plans the storage of whole graphs.
#[derive(Debug, Clone, Default)]
pub struct GraphPlanner {
    config: PlannerConfig,
}

impl GraphPlanner {
    /// # Errors
    /// - If the configuration is invalid
    pub fn new(config: PlannerConfig) -> PlanResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Plan and materialize storage for every tensor in `graph`.
    ///
    /// # Lifetimes
    /// - `Input` tensors are allocated before the first node
    /// - other tensors are allocated when their producing node runs
    /// - `Output` tensors are never freed
    /// - everything else is freed after its last consumer (or right after
    ///   its producer, when nothing consumes it)
    ///
    /// Zero-byte tensors get no storage and bind to an empty range.
    pub fn plan<R: Runtime>(&self, graph: &Graph, runtime: R) -> PlanResult<GraphPlan<R>> {
        graph.validate()?;

        let dying = dying_after_each_node(graph);
        let mut allocator = OffsetAllocator::with_config(runtime, self.config.clone())?;
        let mut bindings: HashMap<TensorId, Block> = HashMap::with_capacity(graph.tensors().len());

        for desc in graph.tensors().iter().filter(|t| t.kind == TensorKind::Input) {
            bind(&mut allocator, &mut bindings, desc.id, desc.byte_size())?;
        }

        for (index, node) in graph.nodes().iter().enumerate() {
            for &id in &node.outputs {
                bind(&mut allocator, &mut bindings, id, graph.tensor(id)?.byte_size())?;
            }

            for &id in &dying[index] {
                let block = bindings
                    .get(&id)
                    .copied()
                    .ok_or(PlanError::UnknownTensor(id.0))?;
                if block.size > 0 {
                    allocator.free(block.address, block.size)?;
                }
            }

            tracing::trace!(
                node = %node.name,
                freed = dying[index].len(),
                used = allocator.used(),
                peak = allocator.peak(),
                "planned node"
            );
        }

        tracing::debug!(
            "Planned {} tensors over {} nodes: peak {} bytes, max used {} bytes",
            bindings.len(),
            graph.nodes().len(),
            allocator.peak(),
            allocator.max_used()
        );

        let materialized = allocator.materialize()?;
        Ok(GraphPlan {
            bindings,
            materialized,
        })
    }
}

fn bind<R: Runtime>(
    allocator: &mut OffsetAllocator<R>,
    bindings: &mut HashMap<TensorId, Block>,
    id: TensorId,
    size: usize,
) -> PlanResult<()> {
    let address = if size == 0 { 0 } else { allocator.alloc(size)? };
    bindings.insert(id, Block::new(address, size));
    Ok(())
}

/// For each node index, the tensors whose storage can be released after it runs.
fn dying_after_each_node(graph: &Graph) -> Vec<Vec<TensorId>> {
    let mut last_use: HashMap<TensorId, usize> = HashMap::new();
    for (index, node) in graph.nodes().iter().enumerate() {
        for &id in node.inputs.iter().chain(node.outputs.iter()) {
            last_use.insert(id, index);
        }
    }

    let mut dying = vec![Vec::new(); graph.nodes().len()];
    for desc in graph.tensors() {
        if desc.kind == TensorKind::Output {
            continue;
        }
        if let Some(&index) = last_use.get(&desc.id) {
            dying[index].push(desc.id);
        }
    }
    dying
}

/// Materialized storage plan for a graph.
#[derive(Debug)]
pub struct GraphPlan<R: Runtime> {
    bindings: HashMap<TensorId, Block>,
    materialized: MaterializedAllocator<R>,
}

impl<R: Runtime> GraphPlan<R> {
    /// Byte offset of a tensor's storage
    pub fn offset(&self, id: TensorId) -> Option<usize> {
        self.bindings.get(&id).map(|b| b.address)
    }

    /// Byte range bound to a tensor (unaligned tensor size)
    pub fn binding(&self, id: TensorId) -> PlanResult<Block> {
        self.bindings
            .get(&id)
            .copied()
            .ok_or(PlanError::UnknownTensor(id.0))
    }

    /// All bindings, sorted by tensor id
    pub fn offsets(&self) -> Vec<(TensorId, usize)> {
        let mut offsets: Vec<(TensorId, usize)> = self
            .bindings
            .iter()
            .map(|(&id, block)| (id, block.address))
            .collect();
        offsets.sort_by_key(|&(id, _)| id);
        offsets
    }

    pub fn peak(&self) -> usize {
        self.materialized.peak()
    }

    pub fn stats(&self) -> &AllocatorStats {
        self.materialized.stats()
    }

    pub fn buffer(&self) -> &R::Buffer {
        self.materialized.buffer()
    }

    pub fn materialized(&self) -> &MaterializedAllocator<R> {
        &self.materialized
    }
}

impl<R> GraphPlan<R>
where
    R: Runtime<Buffer = HostBuffer>,
{
    /// The slice of host memory bound to a tensor
    pub fn tensor_bytes(&self, id: TensorId) -> PlanResult<&[u8]> {
        let block = self.binding(id)?;
        self.materialized.buffer().slice(block.address, block.size)
    }

    pub fn tensor_bytes_mut(&mut self, id: TensorId) -> PlanResult<&mut [u8]> {
        let block = self.binding(id)?;
        self.materialized
            .buffer_mut()
            .slice_mut(block.address, block.size)
    }
}

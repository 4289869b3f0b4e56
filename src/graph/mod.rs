//! Tensor graphs whose storage gets planned.
//!
//! A [`Graph`] is an ordered list of nodes over tensor descriptors. Node
//! order is execution order; the planner derives every tensor's lifetime
//! from it.

pub mod planner;
pub mod tensor;

pub use planner::{GraphPlan, GraphPlanner};
pub use tensor::{DType, TensorDesc, TensorId, TensorKind};

use std::collections::HashMap;

use crate::error::{PlanError, PlanResult};
use crate::graph_error;

#[derive(Debug, Clone)]
pub struct Node {
    pub name: String,
    pub inputs: Vec<TensorId>,
    pub outputs: Vec<TensorId>,
}

#[derive(Debug, Default, Clone)]
pub struct Graph {
    tensors: Vec<TensorDesc>,
    nodes: Vec<Node>,
    /// Tensor -> index of the node producing it
    producers: HashMap<TensorId, usize>,
}

impl Graph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_tensor(&mut self, mut desc: TensorDesc) -> TensorId {
        let id = TensorId(self.tensors.len());
        desc.id = id;
        self.tensors.push(desc);
        id
    }

    /// Append a node. Nodes run in the order they are added.
    ///
    /// # Errors
    /// - If any tensor id is unknown
    /// - If an input has not been produced yet and is not a graph input
    /// - If an output is a graph input or is already produced by another node
    pub fn add_node(
        &mut self,
        name: impl Into<String>,
        inputs: Vec<TensorId>,
        outputs: Vec<TensorId>,
    ) -> PlanResult<usize> {
        let name = name.into();

        for &id in &inputs {
            let desc = self.tensor(id)?;
            if desc.kind != TensorKind::Input && !self.producers.contains_key(&id) {
                return Err(graph_error!(
                    "node '{}' reads {} ('{}') before it is produced",
                    name,
                    id,
                    desc.name
                ));
            }
        }

        for (i, &id) in outputs.iter().enumerate() {
            let desc = self.tensor(id)?;
            if desc.kind == TensorKind::Input {
                return Err(graph_error!(
                    "node '{}' writes graph input {} ('{}')",
                    name,
                    id,
                    desc.name
                ));
            }
            if self.producers.contains_key(&id) || outputs[..i].contains(&id) {
                return Err(graph_error!(
                    "{} ('{}') is produced more than once",
                    id,
                    desc.name
                ));
            }
        }

        let index = self.nodes.len();
        for &id in &outputs {
            self.producers.insert(id, index);
        }
        self.nodes.push(Node {
            name,
            inputs,
            outputs,
        });
        Ok(index)
    }

    pub fn tensor(&self, id: TensorId) -> PlanResult<&TensorDesc> {
        self.tensors.get(id.0).ok_or(PlanError::UnknownTensor(id.0))
    }

    pub fn tensors(&self) -> &[TensorDesc] {
        &self.tensors
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Index of the node producing `id`, if any
    pub fn producer(&self, id: TensorId) -> Option<usize> {
        self.producers.get(&id).copied()
    }

    /// Check every non-input tensor is produced by some node
    pub fn validate(&self) -> PlanResult<()> {
        for desc in &self.tensors {
            if desc.kind != TensorKind::Input && !self.producers.contains_key(&desc.id) {
                return Err(graph_error!(
                    "{} ('{}') is never produced",
                    desc.id,
                    desc.name
                ));
            }
        }
        Ok(())
    }
}

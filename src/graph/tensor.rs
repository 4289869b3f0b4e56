//! Tensor descriptors for planned graphs.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TensorId(pub usize);

impl fmt::Display for TensorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DType {
    F32,
    F16,
    I32,
    I64,
    U8,
}

impl DType {
    /// Element size in bytes
    pub fn size(&self) -> usize {
        match self {
            DType::F16 => 2,
            DType::F32 | DType::I32 => 4,
            DType::I64 => 8,
            DType::U8 => 1,
        }
    }
}

/// How long a tensor's storage must stay live
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TensorKind {
    /// Provided before the first node runs; freed after its last consumer
    Input,
    /// Produced and consumed inside the graph
    #[default]
    Intermediate,
    /// Read back after execution; never freed
    Output,
}

#[derive(Debug, Clone)]
pub struct TensorDesc {
    pub id: TensorId,
    pub name: String,
    pub shape: Vec<usize>,
    pub dtype: DType,
    pub kind: TensorKind,
}

impl TensorDesc {
    pub fn new(name: impl Into<String>, shape: Vec<usize>, dtype: DType) -> Self {
        Self {
            id: TensorId(0),
            name: name.into(),
            shape,
            dtype,
            kind: TensorKind::Intermediate,
        }
    }

    pub fn input(name: impl Into<String>, shape: Vec<usize>, dtype: DType) -> Self {
        Self::new(name, shape, dtype).with_kind(TensorKind::Input)
    }

    pub fn output(name: impl Into<String>, shape: Vec<usize>, dtype: DType) -> Self {
        Self::new(name, shape, dtype).with_kind(TensorKind::Output)
    }

    pub fn with_kind(mut self, kind: TensorKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn element_count(&self) -> usize {
        self.shape.iter().copied().fold(1usize, usize::saturating_mul)
    }

    /// Storage size in bytes (saturates instead of overflowing)
    pub fn byte_size(&self) -> usize {
        self.element_count().saturating_mul(self.dtype.size())
    }
}

use crate::{Column, Slice};

/// One write inside an atomic [`Batch`].
pub enum Operation {
    Put {
        column: Column,
        key: Vec<u8>,
        value: Vec<u8>,
    },
    Delete {
        column: Column,
        key: Vec<u8>,
    },
}

/// A sequence of writes committed atomically by [`crate::Database::apply`]
/// (spec.md §4.1.2 / §6.1 `put_batch`).
#[derive(Default)]
pub struct Batch {
    ops: Vec<Operation>,
}

impl Batch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, column: Column, key: impl Into<Slice<'static>>, value: impl Into<Slice<'static>>) {
        self.ops.push(Operation::Put {
            column,
            key: key.into().into_vec(),
            value: value.into().into_vec(),
        });
    }

    pub fn delete(&mut self, column: Column, key: impl Into<Slice<'static>>) {
        self.ops.push(Operation::Delete {
            column,
            key: key.into().into_vec(),
        });
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    #[must_use]
    pub fn into_ops(self) -> Vec<Operation> {
        self.ops
    }
}

use crate::document::DocumentState;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

/// Operation id. Later lamport time wins; ties go to the higher replica id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OpId {
    pub lamport: u64,
    pub replica: Uuid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Op {
    pub id: OpId,
    pub key: String,
    /// `None` removes the key.
    pub value: Option<Value>,
}

/// Last-writer-wins map built from an operation log.
#[derive(Debug)]
pub struct OpLog {
    replica: Uuid,
    clock: u64,
    ops: BTreeMap<OpId, Op>,
    winners: HashMap<String, OpId>,
}

impl Default for OpLog {
    fn default() -> Self {
        Self::new()
    }
}

impl OpLog {
    pub fn new() -> Self {
        Self::with_replica(Uuid::new_v4())
    }

    pub fn with_replica(replica: Uuid) -> Self {
        Self {
            replica,
            clock: 0,
            ops: BTreeMap::new(),
            winners: HashMap::new(),
        }
    }

    pub fn replica(&self) -> Uuid {
        self.replica
    }

    /// Sets `key` locally and returns the update to publish.
    pub fn set(&mut self, key: impl Into<String>, value: Value) -> Vec<u8> {
        self.local_op(key.into(), Some(value))
    }

    pub fn remove(&mut self, key: impl Into<String>) -> Vec<u8> {
        self.local_op(key.into(), None)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        let id = self.winners.get(key)?;
        self.ops.get(id)?.value.as_ref()
    }

    /// Live keys and their winning values.
    pub fn entries(&self) -> BTreeMap<String, Value> {
        self.winners
            .iter()
            .filter_map(|(key, id)| {
                let value = self.ops.get(id)?.value.clone()?;
                Some((key.clone(), value))
            })
            .collect()
    }

    pub fn op_count(&self) -> usize {
        self.ops.len()
    }

    fn local_op(&mut self, key: String, value: Option<Value>) -> Vec<u8> {
        self.clock += 1;
        let op = Op {
            id: OpId {
                lamport: self.clock,
                replica: self.replica,
            },
            key,
            value,
        };
        let update = encode_ops(std::slice::from_ref(&op));
        self.insert(op);
        update
    }

    fn insert(&mut self, op: Op) -> bool {
        if self.ops.contains_key(&op.id) {
            return false;
        }

        self.clock = self.clock.max(op.id.lamport);
        let wins = self
            .winners
            .get(&op.key)
            .is_none_or(|current| op.id > *current);
        if wins {
            self.winners.insert(op.key.clone(), op.id);
        }
        self.ops.insert(op.id, op);
        true
    }
}

impl DocumentState for OpLog {
    fn apply_update(&mut self, update: &[u8]) -> Result<bool> {
        let ops: Vec<Op> = serde_json::from_slice(update).context("Malformed document update")?;
        let mut changed = false;
        for op in ops {
            changed |= self.insert(op);
        }
        Ok(changed)
    }

    fn write(&mut self, key: &str, value: Option<Value>) -> Result<Vec<u8>> {
        Ok(self.local_op(key.to_owned(), value))
    }

    fn encode_state(&self) -> Vec<u8> {
        let ops: Vec<Op> = self.ops.values().cloned().collect();
        encode_ops(&ops)
    }

    fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}

fn encode_ops(ops: &[Op]) -> Vec<u8> {
    // Ops hold only strings and JSON values, which always serialize
    serde_json::to_vec(ops).unwrap_or_default()
}

//! Metadata nodes.
//!
//! Uniqued nodes are deduplicated by their operand list. Distinct nodes have
//! identity and may be mutated after creation, so they can form cycles.

use std::collections::HashMap;

use cranelift_entity::PrimaryMap;

use crate::refs::{ConstRef, MdRef};

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum MdOperand {
    Node(MdRef),
    Value(ConstRef),
    String(String),
}

#[derive(Clone, Debug)]
pub struct MdNode {
    pub operands: Vec<MdOperand>,
    pub distinct: bool,
}

pub struct MetadataArena {
    nodes: PrimaryMap<MdRef, MdNode>,
    uniqued: HashMap<Vec<MdOperand>, MdRef>,
}

impl MetadataArena {
    pub fn new() -> Self {
        Self {
            nodes: PrimaryMap::new(),
            uniqued: HashMap::default(),
        }
    }

    /// Get or create the uniqued node with these operands.
    pub fn node(&mut self, operands: Vec<MdOperand>) -> MdRef {
        if let Some(&existing) = self.uniqued.get(&operands) {
            return existing;
        }
        let r = self.nodes.push(MdNode {
            operands: operands.clone(),
            distinct: false,
        });
        self.uniqued.insert(operands, r);
        r
    }

    /// Create a fresh distinct node.
    pub fn distinct(&mut self, operands: Vec<MdOperand>) -> MdRef {
        self.nodes.push(MdNode {
            operands,
            distinct: true,
        })
    }

    pub fn get(&self, md: MdRef) -> &MdNode {
        &self.nodes[md]
    }

    /// Replace the operands of a distinct node.
    ///
    /// # Panics
    ///
    /// Panics if `md` is uniqued; uniqued nodes are immutable.
    pub fn set_operands(&mut self, md: MdRef, operands: Vec<MdOperand>) {
        let node = &mut self.nodes[md];
        assert!(node.distinct, "set_operands: {md} is a uniqued node");
        node.operands = operands;
    }
}

impl Default for MetadataArena {
    fn default() -> Self {
        Self::new()
    }
}

//! Memo of optimized sub-plans.
//!
//! The memo interns logical nodes by identity: two structurally equal
//! subtrees built as separate values occupy separate groups. A memo is only
//! meaningful for the single logical tree it was filled from and must not
//! be reused across `optimize` calls.

use std::collections::HashMap;

use crate::plan::logical::LogicalPlan;

use super::cost::Cost;
use super::node::PhysicalPlan;

/// Identifier of a memo group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GroupId(usize);

impl GroupId {
    /// Returns the raw index.
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0
    }
}

/// The best physical plan found for one logical node.
#[derive(Debug, Clone)]
pub struct Group {
    /// The winning plan.
    pub best: PhysicalPlan,
    /// Its cost.
    pub cost: Cost,
}

/// Identity-keyed memo table.
#[derive(Debug, Default)]
pub struct Memo {
    index: HashMap<usize, GroupId>,
    groups: Vec<Group>,
    hits: usize,
}

fn identity(plan: &LogicalPlan) -> usize {
    plan as *const LogicalPlan as usize
}

impl Memo {
    /// Creates an empty memo.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the group recorded for this exact node, counting a hit.
    pub fn lookup(&mut self, plan: &LogicalPlan) -> Option<&Group> {
        let id = *self.index.get(&identity(plan))?;
        self.hits += 1;
        self.groups.get(id.0)
    }

    /// Records the winner for a node and returns its group.
    pub fn insert(&mut self, plan: &LogicalPlan, best: PhysicalPlan) -> GroupId {
        let id = GroupId(self.groups.len());
        let cost = best.cost();
        self.groups.push(Group { best, cost });
        self.index.insert(identity(plan), id);
        id
    }

    /// Returns a group by ID.
    #[must_use]
    pub fn group(&self, id: GroupId) -> Option<&Group> {
        self.groups.get(id.0)
    }

    /// Returns the number of groups.
    #[must_use]
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Returns how many lookups found an existing group.
    #[must_use]
    pub const fn hits(&self) -> usize {
        self.hits
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use evolvdb_core::{Column, DataType, Schema};

    use super::*;
    use crate::plan::physical::SeqScanNode;

    fn scan(table: &str) -> LogicalPlan {
        LogicalPlan::scan(table, Schema::new(vec![Column::new("id", DataType::Int)]))
    }

    fn physical(table: &str) -> PhysicalPlan {
        let schema = Arc::new(Schema::new(vec![Column::new("id", DataType::Int)]));
        PhysicalPlan::SeqScan(Box::new(
            SeqScanNode::new(table, schema).with_cost(Cost::new(10.0, 10.0, 1.0)),
        ))
    }

    #[test]
    fn memo_is_keyed_by_identity() {
        let a = scan("t");
        let b = scan("t");
        assert_eq!(a, b);

        let mut memo = Memo::new();
        let id = memo.insert(&a, physical("t"));

        assert!(memo.lookup(&a).is_some());
        assert!(memo.lookup(&b).is_none());
        assert_eq!(memo.hits(), 1);
        assert_eq!(memo.group_count(), 1);
        assert_eq!(memo.group(id).map(|g| g.cost.total()), Some(21.0));
    }
}

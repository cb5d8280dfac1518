//! Deletion impact planner
//!
//! Previews what deleting one row would do, walking [`FOREIGN_KEYS`](crate::policy::FOREIGN_KEYS)
//! breadth-first from the row against the live data:
//! - cascade edges pull the child rows into the delete and are walked further
//! - set-null edges count the references that would be cleared
//! - restrict edges with child rows block the delete
//!
//! The planner only reads. The delete itself is still enforced by SQLite.

use crate::policy::{children_of, DeletePolicy, ForeignKey, RowKey, Table};
use crate::storage::SqliteStore;
use crate::{Error, Result};
use serde::Serialize;
use std::collections::{HashSet, VecDeque};

/// One relationship touched by a planned delete
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImpactEntry {
    /// Child table holding the affected rows
    pub table: Table,
    /// Reference column on the child table
    pub column: &'static str,
    pub policy: DeletePolicy,
    /// Number of child rows affected through this relationship
    pub rows: usize,
    /// Distance from the deleted row (1 = direct child)
    pub depth: usize,
}

impl ImpactEntry {
    pub fn is_direct(&self) -> bool {
        self.depth == 1
    }
}

/// Result of planning a delete
#[derive(Debug, Clone, Serialize)]
pub struct DeletionPlan {
    pub table: Table,
    pub key: RowKey,
    pub effects: Vec<ImpactEntry>,
}

impl DeletionPlan {
    /// True if a restrict relationship would reject the delete
    pub fn is_blocked(&self) -> bool {
        self.blockers().next().is_some()
    }

    pub fn blockers(&self) -> impl Iterator<Item = &ImpactEntry> {
        self.with_policy(DeletePolicy::Restrict)
    }

    pub fn cascades(&self) -> impl Iterator<Item = &ImpactEntry> {
        self.with_policy(DeletePolicy::Cascade)
    }

    pub fn nullifications(&self) -> impl Iterator<Item = &ImpactEntry> {
        self.with_policy(DeletePolicy::SetNull)
    }

    /// Rows removed along with the target, excluding the target itself
    pub fn cascaded_rows(&self) -> usize {
        self.cascades().map(|e| e.rows).sum()
    }

    pub fn nulled_rows(&self) -> usize {
        self.nullifications().map(|e| e.rows).sum()
    }

    fn with_policy(&self, policy: DeletePolicy) -> impl Iterator<Item = &ImpactEntry> {
        self.effects.iter().filter(move |e| e.policy == policy)
    }

    fn record(&mut self, fk: &ForeignKey, rows: usize, depth: usize) {
        if rows == 0 {
            return;
        }
        match self
            .effects
            .iter_mut()
            .find(|e| e.table == fk.child && e.column == fk.column && e.policy == fk.on_delete)
        {
            Some(entry) => {
                entry.rows += rows;
                entry.depth = entry.depth.min(depth);
            }
            None => self.effects.push(ImpactEntry {
                table: fk.child,
                column: fk.column,
                policy: fk.on_delete,
                rows,
                depth,
            }),
        }
    }
}

/// Read-only planner over the referential ruleset
pub struct ImpactPlanner<'a> {
    store: &'a SqliteStore,
}

impl<'a> ImpactPlanner<'a> {
    pub fn new(store: &'a SqliteStore) -> Self {
        Self { store }
    }

    /// Plan the delete of `key` in `table`
    pub fn plan(&self, table: Table, key: RowKey) -> Result<DeletionPlan> {
        if !self.store.row_exists(table, key)? {
            return Err(Error::not_found(table.as_str(), key));
        }

        let mut plan = DeletionPlan { table, key, effects: Vec::new() };
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();

        visited.insert((table, key));
        queue.push_back((table, key, 0usize));

        while let Some((current, current_key, depth)) = queue.pop_front() {
            for fk in children_of(current) {
                match fk.on_delete {
                    DeletePolicy::Cascade => {
                        let children = self.child_keys(fk, current_key)?;
                        let mut fresh = 0;
                        for child in children {
                            if visited.insert((fk.child, child)) {
                                fresh += 1;
                                queue.push_back((fk.child, child, depth + 1));
                            }
                        }
                        plan.record(fk, fresh, depth + 1);
                    }
                    DeletePolicy::SetNull | DeletePolicy::Restrict => {
                        let rows = self.count_children(fk, current_key)?;
                        plan.record(fk, rows, depth + 1);
                    }
                }
            }
        }

        tracing::debug!(
            "Planned delete of {} {}: {} cascaded, {} nulled, blocked={}",
            table,
            key,
            plan.cascaded_rows(),
            plan.nulled_rows(),
            plan.is_blocked()
        );
        Ok(plan)
    }

    fn child_keys(&self, fk: &ForeignKey, parent: RowKey) -> Result<Vec<RowKey>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = ?1",
            fk.child.key_column(),
            fk.child,
            fk.column
        );
        let mut stmt = self.store.connection().prepare(&sql)?;
        let keys = if fk.child.has_uuid_key() {
            let raw = stmt
                .query_map([parent], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            raw.iter()
                .map(|k| fk.child.parse_key(k))
                .collect::<Result<Vec<_>>>()?
        } else {
            stmt.query_map([parent], |row| row.get::<_, i64>(0))?
                .map(|k| k.map(RowKey::Id))
                .collect::<rusqlite::Result<Vec<_>>>()?
        };
        Ok(keys)
    }

    fn count_children(&self, fk: &ForeignKey, parent: RowKey) -> Result<usize> {
        let count: i64 = self.store.connection().query_row(
            &format!("SELECT COUNT(*) FROM {} WHERE {} = ?1", fk.child, fk.column),
            [parent],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

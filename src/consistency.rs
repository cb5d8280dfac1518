//! Role consistency audit
//!
//! The role triggers reject a profile that disagrees with its user's role,
//! but nothing in SQL can force a user to have a profile at all. This audit
//! reports both kinds of drift.

use crate::model::Role;
use crate::storage::{rows, SqliteStore};
use crate::Result;
use serde::Serialize;
use uuid::Uuid;

/// Kind of inconsistency found for a user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InconsistencyKind {
    /// No row in the role's specialization table
    MissingProfile,
    /// A row in a specialization table of another role
    ForeignProfile,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleInconsistency {
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
    pub kind: InconsistencyKind,
    /// Specialization table involved
    pub table: &'static str,
}

impl std::fmt::Display for RoleInconsistency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            InconsistencyKind::MissingProfile => {
                write!(f, "{} ({}) has no row in {}", self.email, self.role, self.table)
            }
            InconsistencyKind::ForeignProfile => {
                write!(f, "{} ({}) has a row in {}", self.email, self.role, self.table)
            }
        }
    }
}

/// Check every user against the three specialization tables
pub fn audit_roles(store: &SqliteStore) -> Result<Vec<RoleInconsistency>> {
    let mut findings = Vec::new();

    for role in Role::all() {
        let profile_table = role.profile_table();

        // Users of this role without their profile row
        let missing = query_users(
            store,
            &format!(
                "SELECT u.id, u.email FROM users u \
                 WHERE u.role = ?1 AND NOT EXISTS (SELECT 1 FROM {} p WHERE p.user_id = u.id) \
                 ORDER BY u.email",
                profile_table
            ),
            role.as_str(),
        )?;
        for (user_id, email) in missing {
            findings.push(RoleInconsistency {
                user_id,
                email,
                role: *role,
                kind: InconsistencyKind::MissingProfile,
                table: profile_table.as_str(),
            });
        }

        // Rows in this role's table owned by users of another role
        let foreign = query_users_with_role(
            store,
            &format!(
                "SELECT u.id, u.email, u.role FROM {} p JOIN users u ON u.id = p.user_id \
                 WHERE u.role <> ?1 ORDER BY u.email",
                profile_table
            ),
            role.as_str(),
        )?;
        for (user_id, email, owner_role) in foreign {
            findings.push(RoleInconsistency {
                user_id,
                email,
                role: owner_role,
                kind: InconsistencyKind::ForeignProfile,
                table: profile_table.as_str(),
            });
        }
    }

    for finding in &findings {
        tracing::warn!("Role inconsistency: {}", finding);
    }
    Ok(findings)
}

fn query_users(store: &SqliteStore, sql: &str, role: &str) -> Result<Vec<(Uuid, String)>> {
    let mut stmt = store.connection().prepare(sql)?;
    let users = stmt
        .query_map([role], |row| Ok((rows::uuid(row, 0)?, row.get(1)?)))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(users)
}

fn query_users_with_role(store: &SqliteStore, sql: &str, role: &str) -> Result<Vec<(Uuid, String, Role)>> {
    let mut stmt = store.connection().prepare(sql)?;
    let raw = stmt
        .query_map([role], |row| {
            Ok((rows::uuid(row, 0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    raw.into_iter()
        .map(|(id, email, role)| role.parse().map(|role| (id, email, role)))
        .collect()
}

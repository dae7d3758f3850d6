//! Change-aware record repository

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::models::{ChangeState, Entity};
use rusqlite::{params, Connection, OptionalExtension};

/// Existing local records keyed by id, as handed to
/// [`EntityRepository::save_from_remote`].
pub type ExistingItems<T> = HashMap<String, T>;

/// Trait for synced record storage operations
pub trait EntityRepository {
    /// Get a record by id, including soft-deleted records
    fn get<T: Entity>(&self, id: &str) -> Result<Option<T>>;

    /// List records of a type
    fn list<T: Entity>(&self, include_deleted: bool) -> Result<Vec<T>>;

    /// List records listed under a parent record
    fn list_for_scope<T: Entity>(&self, scope_id: &str, include_deleted: bool) -> Result<Vec<T>>;

    /// List records that are new, soft-deleted, or carry changed fields
    fn list_dirty<T: Entity>(&self) -> Result<Vec<T>>;

    /// Insert or replace a record and its change state
    fn save<T: Entity>(&self, item: &T) -> Result<()>;

    /// Store records fetched from the server without losing local edits.
    ///
    /// Returns `false` when at least one incoming record was skipped because
    /// the local copy is pending deletion.
    fn save_from_remote<T: Entity>(
        &self,
        items: Vec<T>,
        existing: Option<ExistingItems<T>>,
        delete_orphans: bool,
    ) -> Result<bool>;

    /// Mark a record as known to the server after a successful create.
    fn clear_new_flag<T: Entity>(&self, pushed: &T) -> Result<Option<T>>;

    /// Drop changed fields the server now agrees with after a push.
    fn clear_changed_fields<T: Entity>(&self, pushed: &T) -> Result<Option<T>>;

    /// Soft delete locally; the remote delete happens on the next dirty sync
    fn mark_deleted<T: Entity>(&self, id: &str) -> Result<()>;

    /// Remove a record from the local store
    fn delete<T: Entity>(&self, id: &str) -> Result<()>;
}

/// `SQLite` implementation of `EntityRepository`
pub struct SqliteEntityRepository<'a> {
    conn: &'a Connection,
}

const SELECT_COLUMNS: &str = "SELECT payload, is_new, is_deleted, changed_fields FROM entities";

impl<'a> SqliteEntityRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Index records under `scope_id` by id, ready for `save_from_remote`
    pub fn existing_for_scope<T: Entity>(&self, scope_id: &str) -> Result<ExistingItems<T>> {
        Ok(self
            .list_for_scope::<T>(scope_id, true)?
            .into_iter()
            .map(|item| (item.id().to_string(), item))
            .collect())
    }

    /// Delete records the server no longer returns.
    ///
    /// Records created locally and not pushed yet are kept unless they were
    /// also deleted locally.
    fn delete_orphans<T: Entity>(&self, orphans: impl IntoIterator<Item = T>) -> Result<usize> {
        let mut deleted = 0;
        for orphan in orphans {
            if orphan.is_new() && !orphan.is_deleted() {
                continue;
            }
            self.delete::<T>(orphan.id())?;
            deleted += 1;
        }
        Ok(deleted)
    }

    fn query<T: Entity>(&self, sql: &str, params: impl rusqlite::Params) -> Result<Vec<T>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt
            .query_map(params, Self::parse_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        rows.into_iter().map(Self::decode::<T>).collect()
    }

    fn parse_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredRow> {
        Ok(StoredRow {
            payload: row.get(0)?,
            is_new: row.get::<_, i32>(1)? != 0,
            is_deleted: row.get::<_, i32>(2)? != 0,
            changed_fields: row.get(3)?,
        })
    }

    fn decode<T: Entity>(row: StoredRow) -> Result<T> {
        let mut item: T = serde_json::from_str(&row.payload)?;
        *item.change_state_mut() =
            ChangeState::from_storage(row.is_new, row.is_deleted, &row.changed_fields);
        Ok(item)
    }

    fn require<T: Entity>(&self, id: &str) -> Result<T> {
        self.get::<T>(id)?
            .ok_or_else(|| Error::NotFound(format!("{} {id}", T::ENTITY_TYPE)))
    }
}

struct StoredRow {
    payload: String,
    is_new: bool,
    is_deleted: bool,
    changed_fields: String,
}

impl EntityRepository for SqliteEntityRepository<'_> {
    fn get<T: Entity>(&self, id: &str) -> Result<Option<T>> {
        let row = self
            .conn
            .query_row(
                &format!("{SELECT_COLUMNS} WHERE entity_type = ? AND id = ?"),
                params![T::ENTITY_TYPE, id],
                Self::parse_row,
            )
            .optional()?;
        row.map(Self::decode::<T>).transpose()
    }

    fn list<T: Entity>(&self, include_deleted: bool) -> Result<Vec<T>> {
        self.query(
            &format!(
                "{SELECT_COLUMNS} WHERE entity_type = ? AND (? OR is_deleted = 0) ORDER BY id"
            ),
            params![T::ENTITY_TYPE, include_deleted],
        )
    }

    fn list_for_scope<T: Entity>(&self, scope_id: &str, include_deleted: bool) -> Result<Vec<T>> {
        self.query(
            &format!(
                "{SELECT_COLUMNS} WHERE entity_type = ? AND scope_id = ? AND (? OR is_deleted = 0)
                 ORDER BY id"
            ),
            params![T::ENTITY_TYPE, scope_id, include_deleted],
        )
    }

    fn list_dirty<T: Entity>(&self) -> Result<Vec<T>> {
        self.query(
            &format!(
                "{SELECT_COLUMNS} WHERE entity_type = ?
                 AND (is_new = 1 OR is_deleted = 1 OR changed_fields != '')
                 ORDER BY id"
            ),
            params![T::ENTITY_TYPE],
        )
    }

    fn save<T: Entity>(&self, item: &T) -> Result<()> {
        let payload = serde_json::to_string(item)?;
        let state = item.change_state();
        self.conn.execute(
            "INSERT OR REPLACE INTO entities
                (entity_type, id, scope_id, payload, is_new, is_deleted, changed_fields)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                T::ENTITY_TYPE,
                item.id(),
                item.scope_id(),
                payload,
                i32::from(state.is_new),
                i32::from(state.is_deleted),
                state.changed_fields().to_storage_string(),
            ],
        )?;
        Ok(())
    }

    fn save_from_remote<T: Entity>(
        &self,
        items: Vec<T>,
        mut existing: Option<ExistingItems<T>>,
        delete_orphans: bool,
    ) -> Result<bool> {
        let mut clean = true;

        for mut item in items {
            let local = match existing.as_mut().and_then(|map| map.remove(item.id())) {
                Some(local) => Some(local),
                None => self.get::<T>(item.id())?,
            };

            if let Some(local) = local {
                if local.is_deleted() {
                    tracing::debug!(
                        entity_type = T::ENTITY_TYPE,
                        id = item.id(),
                        "Skipping server copy of locally deleted record"
                    );
                    clean = false;
                    continue;
                }
                if local.has_changed_fields() {
                    item.merge_changed_fields(&local);
                }
            }

            self.save(&item)?;
        }

        if delete_orphans {
            if let Some(orphans) = existing {
                let deleted = self.delete_orphans(orphans.into_values())?;
                if deleted > 0 {
                    tracing::debug!(
                        entity_type = T::ENTITY_TYPE,
                        deleted,
                        "Removed records missing from server"
                    );
                }
            }
        }

        Ok(clean)
    }

    fn clear_new_flag<T: Entity>(&self, pushed: &T) -> Result<Option<T>> {
        let Some(mut stored) = self.get::<T>(pushed.id())? else {
            return Ok(None);
        };
        stored.set_new(false);
        stored.clear_changed_fields_matching(pushed);
        self.save(&stored)?;
        Ok(Some(stored))
    }

    fn clear_changed_fields<T: Entity>(&self, pushed: &T) -> Result<Option<T>> {
        let Some(mut stored) = self.get::<T>(pushed.id())? else {
            return Ok(None);
        };
        stored.clear_changed_fields_matching(pushed);
        self.save(&stored)?;
        Ok(Some(stored))
    }

    fn mark_deleted<T: Entity>(&self, id: &str) -> Result<()> {
        let mut stored = self.require::<T>(id)?;
        stored.set_deleted(true);
        self.save(&stored)
    }

    fn delete<T: Entity>(&self, id: &str) -> Result<()> {
        self.conn.execute(
            "DELETE FROM entities WHERE entity_type = ? AND id = ?",
            params![T::ENTITY_TYPE, id],
        )?;
        Ok(())
    }
}

//! SQLite-backed store implementation.

use std::cmp::Ordering;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSqlOutput, ValueRef};
use rusqlite::{params, Connection, OptionalExtension, ToSql};
use tracing::debug;

use super::{
    ModuleLock, ModuleLocks, ModuleVersionState, ModuleVersionStateUpdate, PackageVersionState,
    SearchDocument, Store, StoreError, VersionMapEntry,
};
use crate::build_context::{self, BuildContext};
use crate::fetch::Status;
use crate::latest::{LatestModuleVersions, LatestStatus, Retraction};
use crate::model::{Documentation, Module, ModuleInfo, Package};
use crate::version;

/// SQLite-backed store.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    locks: ModuleLocks,
}

impl SqliteStore {
    /// Create a new SQLite store, creating the database file and tables if needed.
    pub fn new(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            locks: ModuleLocks::new(),
        })
    }

    /// Create an in-memory SQLite store (useful for testing).
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            locks: ModuleLocks::new(),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), StoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS modules (
                module_path TEXT NOT NULL,
                version TEXT NOT NULL,
                commit_time TEXT,
                has_go_mod INTEGER NOT NULL DEFAULT 0,
                declared_path TEXT,
                incomplete INTEGER NOT NULL DEFAULT 0,
                deprecated INTEGER NOT NULL DEFAULT 0,
                deprecation_comment TEXT,
                retracted INTEGER NOT NULL DEFAULT 0,
                retraction_rationale TEXT,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (module_path, version)
            );

            CREATE TABLE IF NOT EXISTS packages (
                path TEXT NOT NULL,
                module_path TEXT NOT NULL,
                version TEXT NOT NULL,
                name TEXT NOT NULL,
                synopsis TEXT NOT NULL,
                PRIMARY KEY (path, module_path, version)
            );

            CREATE TABLE IF NOT EXISTS documentation (
                package_path TEXT NOT NULL,
                module_path TEXT NOT NULL,
                version TEXT NOT NULL,
                goos TEXT NOT NULL,
                goarch TEXT NOT NULL,
                synopsis TEXT NOT NULL,
                contents TEXT NOT NULL,
                PRIMARY KEY (package_path, module_path, version, goos, goarch)
            );

            CREATE TABLE IF NOT EXISTS search_documents (
                package_path TEXT PRIMARY KEY,
                module_path TEXT NOT NULL,
                version TEXT NOT NULL,
                synopsis TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS module_version_states (
                module_path TEXT NOT NULL,
                version TEXT NOT NULL,
                status TEXT NOT NULL,
                error TEXT,
                try_count INTEGER NOT NULL DEFAULT 0,
                index_timestamp TEXT,
                created_at TEXT NOT NULL,
                last_processed_at TEXT,
                next_processed_after TEXT,
                go_mod_path TEXT,
                has_go_mod INTEGER NOT NULL DEFAULT 0,
                num_packages INTEGER,
                PRIMARY KEY (module_path, version)
            );

            CREATE TABLE IF NOT EXISTS package_version_states (
                package_path TEXT NOT NULL,
                module_path TEXT NOT NULL,
                version TEXT NOT NULL,
                status TEXT NOT NULL,
                error TEXT,
                PRIMARY KEY (package_path, module_path, version)
            );

            CREATE TABLE IF NOT EXISTS version_map (
                module_path TEXT NOT NULL,
                requested_version TEXT NOT NULL,
                resolved_version TEXT,
                status TEXT NOT NULL,
                error TEXT,
                go_mod_path TEXT,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (module_path, requested_version)
            );

            CREATE TABLE IF NOT EXISTS latest_module_versions (
                module_path TEXT PRIMARY KEY,
                status TEXT NOT NULL,
                raw_version TEXT,
                cooked_version TEXT,
                good_version TEXT,
                deprecated INTEGER NOT NULL DEFAULT 0,
                deprecation_message TEXT,
                retractions TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS excluded_prefixes (
                prefix TEXT PRIMARY KEY,
                created_by TEXT NOT NULL,
                reason TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_search_documents_module ON search_documents(module_path);
            CREATE INDEX IF NOT EXISTS idx_mvs_next_processed ON module_version_states(next_processed_after);
            "#,
        )?;
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Database("connection mutex poisoned".to_string()))
    }

    fn row_to_module_info(row: &rusqlite::Row) -> rusqlite::Result<ModuleInfo> {
        Ok(ModuleInfo {
            module_path: row.get(0)?,
            version: row.get(1)?,
            commit_time: parse_ts(row.get(2)?),
            has_go_mod: row.get(3)?,
            declared_path: row.get(4)?,
            incomplete: row.get(5)?,
            deprecated: row.get(6)?,
            deprecation_comment: row.get(7)?,
            retracted: row.get(8)?,
            retraction_rationale: row.get(9)?,
        })
    }

    fn row_to_state(row: &rusqlite::Row) -> rusqlite::Result<ModuleVersionState> {
        let created_at: String = row.get(6)?;
        Ok(ModuleVersionState {
            module_path: row.get(0)?,
            version: row.get(1)?,
            status: row.get(2)?,
            error: row.get(3)?,
            try_count: row.get(4)?,
            index_timestamp: parse_ts(row.get(5)?),
            created_at: parse_ts(Some(created_at)).unwrap_or_else(Utc::now),
            last_processed_at: parse_ts(row.get(7)?),
            next_processed_after: parse_ts(row.get(8)?),
            go_mod_path: row.get(9)?,
            has_go_mod: row.get(10)?,
            num_packages: row.get(11)?,
        })
    }
}

fn parse_ts(value: Option<String>) -> Option<DateTime<Utc>> {
    value
        .and_then(|s| DateTime::parse_from_rfc3339(&s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

fn ts(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

impl ToSql for Status {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl FromSql for Status {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: String| FromSqlError::Other(e.into()))
    }
}

impl ToSql for LatestStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(self.as_str().into())
    }
}

impl FromSql for LatestStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value.as_str()? {
            "found" => Ok(LatestStatus::Found),
            "not_found" => Ok(LatestStatus::NotFound),
            other => Err(FromSqlError::Other(
                format!("unknown latest status: {other}").into(),
            )),
        }
    }
}

fn read_latest(
    conn: &Connection,
    module_path: &str,
) -> Result<Option<LatestModuleVersions>, StoreError> {
    let row = conn
        .query_row(
            "SELECT module_path, status, raw_version, cooked_version, good_version, deprecated, deprecation_message, retractions FROM latest_module_versions WHERE module_path = ?",
            params![module_path],
            |row| {
                Ok((
                    LatestModuleVersions {
                        module_path: row.get(0)?,
                        status: row.get(1)?,
                        raw_version: row.get(2)?,
                        cooked_version: row.get(3)?,
                        good_version: row.get(4)?,
                        deprecated: row.get(5)?,
                        deprecation_message: row.get(6)?,
                        retractions: Vec::new(),
                    },
                    row.get::<_, String>(7)?,
                ))
            },
        )
        .optional()?;

    match row {
        Some((mut latest, retractions_json)) => {
            latest.retractions = serde_json::from_str(&retractions_json)?;
            Ok(Some(latest))
        }
        None => Ok(None),
    }
}

/// Newest stored version of `module_path` not covered by `retractions`.
fn compute_good_version(
    conn: &Connection,
    module_path: &str,
    retractions: &[Retraction],
) -> Result<Option<String>, StoreError> {
    let mut stmt = conn.prepare("SELECT version FROM modules WHERE module_path = ?")?;
    let versions = stmt
        .query_map(params![module_path], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;

    let candidates = versions
        .iter()
        .filter(|v| !retractions.iter().any(|r| r.contains(v)))
        .map(String::as_str);
    Ok(version::latest_of(candidates).map(str::to_string))
}

/// Recomputes the good version against the stored retractions and writes it
/// to the latest record, if one exists.
fn write_good_version(conn: &Connection, module_path: &str) -> Result<Option<String>, StoreError> {
    let retractions = read_latest(conn, module_path)?
        .map(|l| l.retractions)
        .unwrap_or_default();
    let good = compute_good_version(conn, module_path, &retractions)?;
    conn.execute(
        "UPDATE latest_module_versions SET good_version = ?1, updated_at = ?2 WHERE module_path = ?3 AND good_version IS NOT ?1",
        params![good, ts(&Utc::now()), module_path],
    )?;
    Ok(good)
}

fn delete_module_rows(conn: &Connection, module_path: &str, version: &str) -> Result<(), StoreError> {
    for table in ["modules", "packages", "documentation"] {
        conn.execute(
            &format!("DELETE FROM {table} WHERE module_path = ?1 AND version = ?2"),
            params![module_path, version],
        )?;
    }
    Ok(())
}

#[async_trait]
impl Store for SqliteStore {
    async fn lock_module(&self, module_path: &str) -> ModuleLock {
        self.locks.lock(module_path).await
    }

    async fn insert_module(&self, module: &Module) -> Result<bool, StoreError> {
        let _lock = self.locks.lock(module.module_path()).await;
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let info = &module.info;
        let now = ts(&Utc::now());

        delete_module_rows(&tx, &info.module_path, &info.version)?;
        tx.execute(
            "INSERT INTO modules (module_path, version, commit_time, has_go_mod, declared_path, incomplete, deprecated, deprecation_comment, retracted, retraction_rationale, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                info.module_path,
                info.version,
                info.commit_time.as_ref().map(ts),
                info.has_go_mod,
                info.declared_path,
                info.incomplete,
                info.deprecated,
                info.deprecation_comment,
                info.retracted,
                info.retraction_rationale,
                now,
            ],
        )?;

        for pkg in &module.packages {
            tx.execute(
                "INSERT OR REPLACE INTO packages (path, module_path, version, name, synopsis) VALUES (?, ?, ?, ?, ?)",
                params![pkg.path, info.module_path, info.version, pkg.name, pkg.synopsis],
            )?;
            for doc in pkg
                .documentation
                .iter()
                .filter(|d| d.build_context.is_registered())
            {
                tx.execute(
                    "INSERT OR REPLACE INTO documentation (package_path, module_path, version, goos, goarch, synopsis, contents) VALUES (?, ?, ?, ?, ?, ?, ?)",
                    params![
                        pkg.path,
                        info.module_path,
                        info.version,
                        doc.build_context.goos,
                        doc.build_context.goarch,
                        doc.synopsis,
                        doc.contents,
                    ],
                )?;
            }
        }

        let good = write_good_version(&tx, &info.module_path)?;
        let is_latest = good.as_deref() == Some(info.version.as_str());
        if is_latest {
            tx.execute(
                "DELETE FROM search_documents WHERE module_path = ?",
                params![info.module_path],
            )?;
            for pkg in &module.packages {
                tx.execute(
                    "INSERT OR REPLACE INTO search_documents (package_path, module_path, version, synopsis, updated_at) VALUES (?, ?, ?, ?, ?)",
                    params![pkg.path, info.module_path, info.version, pkg.synopsis, now],
                )?;
            }
        }

        tx.commit()?;
        debug!(
            module_path = %info.module_path,
            version = %info.version,
            packages = module.packages.len(),
            is_latest,
            "Inserted module"
        );
        Ok(is_latest)
    }

    async fn get_module(
        &self,
        module_path: &str,
        version: &str,
    ) -> Result<Option<Module>, StoreError> {
        let conn = self.conn()?;

        let info = conn
            .query_row(
                "SELECT module_path, version, commit_time, has_go_mod, declared_path, incomplete, deprecated, deprecation_comment, retracted, retraction_rationale FROM modules WHERE module_path = ?1 AND version = ?2",
                params![module_path, version],
                Self::row_to_module_info,
            )
            .optional()?;
        let Some(info) = info else {
            return Ok(None);
        };

        let mut stmt = conn.prepare(
            "SELECT path, name, synopsis FROM packages WHERE module_path = ?1 AND version = ?2 ORDER BY path",
        )?;
        let mut packages = stmt
            .query_map(params![module_path, version], |row| {
                Ok(Package {
                    path: row.get(0)?,
                    name: row.get(1)?,
                    synopsis: row.get(2)?,
                    documentation: Vec::new(),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut doc_stmt = conn.prepare(
            "SELECT goos, goarch, synopsis, contents FROM documentation WHERE package_path = ?1 AND module_path = ?2 AND version = ?3",
        )?;
        for pkg in &mut packages {
            let mut docs = doc_stmt
                .query_map(params![pkg.path, module_path, version], |row| {
                    Ok(Documentation {
                        build_context: BuildContext::new(
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                        ),
                        synopsis: row.get(2)?,
                        contents: row.get(3)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            docs.sort_by(|a, b| build_context::compare(&a.build_context, &b.build_context));
            pkg.documentation = docs;
        }

        Ok(Some(Module { info, packages }))
    }

    async fn delete_module(&self, module_path: &str, version: &str) -> Result<(), StoreError> {
        let _lock = self.locks.lock(module_path).await;
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        delete_module_rows(&tx, module_path, version)?;
        tx.execute(
            "DELETE FROM search_documents WHERE module_path = ?1 AND version = ?2",
            params![module_path, version],
        )?;
        tx.commit()?;
        debug!(module_path, version, "Deleted module");
        Ok(())
    }

    async fn recompute_good_version(
        &self,
        module_path: &str,
    ) -> Result<Option<String>, StoreError> {
        let _lock = self.locks.lock(module_path).await;
        let conn = self.conn()?;
        write_good_version(&conn, module_path)
    }

    async fn get_latest_module_versions(
        &self,
        module_path: &str,
    ) -> Result<Option<LatestModuleVersions>, StoreError> {
        let conn = self.conn()?;
        read_latest(&conn, module_path)
    }

    async fn update_latest_module_versions(
        &self,
        latest: &LatestModuleVersions,
    ) -> Result<LatestModuleVersions, StoreError> {
        let _lock = self.locks.lock(&latest.module_path).await;
        let conn = self.conn()?;

        let mut merged = latest.clone();
        merged.good_version =
            compute_good_version(&conn, &latest.module_path, &latest.retractions)?;

        if read_latest(&conn, &latest.module_path)?.as_ref() == Some(&merged) {
            debug!(module_path = %latest.module_path, "Latest versions unchanged");
            return Ok(merged);
        }

        conn.execute(
            "INSERT OR REPLACE INTO latest_module_versions (module_path, status, raw_version, cooked_version, good_version, deprecated, deprecation_message, retractions, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            params![
                merged.module_path,
                merged.status,
                merged.raw_version,
                merged.cooked_version,
                merged.good_version,
                merged.deprecated,
                merged.deprecation_message,
                serde_json::to_string(&merged.retractions)?,
                ts(&Utc::now()),
            ],
        )?;
        debug!(
            module_path = %merged.module_path,
            raw = ?merged.raw_version,
            cooked = ?merged.cooked_version,
            good = ?merged.good_version,
            "Updated latest versions"
        );
        Ok(merged)
    }

    async fn upsert_version_map(&self, entry: &VersionMapEntry) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO version_map (module_path, requested_version, resolved_version, status, error, go_mod_path, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?)",
            params![
                entry.module_path,
                entry.requested_version,
                entry.resolved_version,
                entry.status,
                entry.error,
                entry.go_mod_path,
                ts(&entry.updated_at),
            ],
        )?;
        Ok(())
    }

    async fn get_version_map(
        &self,
        module_path: &str,
        requested_version: &str,
    ) -> Result<Option<VersionMapEntry>, StoreError> {
        let conn = self.conn()?;
        let entry = conn
            .query_row(
                "SELECT module_path, requested_version, resolved_version, status, error, go_mod_path, updated_at FROM version_map WHERE module_path = ?1 AND requested_version = ?2",
                params![module_path, requested_version],
                |row| {
                    Ok(VersionMapEntry {
                        module_path: row.get(0)?,
                        requested_version: row.get(1)?,
                        resolved_version: row.get(2)?,
                        status: row.get(3)?,
                        error: row.get(4)?,
                        go_mod_path: row.get(5)?,
                        updated_at: parse_ts(row.get(6)?).unwrap_or_else(Utc::now),
                    })
                },
            )
            .optional()?;
        Ok(entry)
    }

    async fn upsert_module_version_state(
        &self,
        update: &ModuleVersionStateUpdate,
    ) -> Result<(), StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let now = Utc::now();
        let next_processed_after = update.status.is_retryable().then(|| ts(&now));

        tx.execute(
            r#"
            INSERT INTO module_version_states (
                module_path, version, status, error, try_count, index_timestamp,
                created_at, last_processed_at, next_processed_after,
                go_mod_path, has_go_mod, num_packages
            ) VALUES (?1, ?2, ?3, ?4, 1, ?5, ?6, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT(module_path, version) DO UPDATE SET
                status = excluded.status,
                error = excluded.error,
                try_count = try_count + 1,
                index_timestamp = COALESCE(excluded.index_timestamp, index_timestamp),
                last_processed_at = excluded.last_processed_at,
                next_processed_after = excluded.next_processed_after,
                go_mod_path = excluded.go_mod_path,
                has_go_mod = excluded.has_go_mod,
                num_packages = excluded.num_packages
            "#,
            params![
                update.module_path,
                update.version,
                update.status,
                update.error,
                update.index_timestamp.as_ref().map(ts),
                ts(&now),
                next_processed_after,
                update.go_mod_path,
                update.has_go_mod,
                update.num_packages,
            ],
        )?;

        tx.execute(
            "DELETE FROM package_version_states WHERE module_path = ?1 AND version = ?2",
            params![update.module_path, update.version],
        )?;
        for pkg in &update.package_states {
            tx.execute(
                "INSERT OR REPLACE INTO package_version_states (package_path, module_path, version, status, error) VALUES (?, ?, ?, ?, ?)",
                params![
                    pkg.package_path,
                    update.module_path,
                    update.version,
                    pkg.status,
                    pkg.error
                ],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    async fn get_module_version_state(
        &self,
        module_path: &str,
        version: &str,
    ) -> Result<Option<ModuleVersionState>, StoreError> {
        let conn = self.conn()?;
        let state = conn
            .query_row(
                "SELECT module_path, version, status, error, try_count, index_timestamp, created_at, last_processed_at, next_processed_after, go_mod_path, has_go_mod, num_packages FROM module_version_states WHERE module_path = ?1 AND version = ?2",
                params![module_path, version],
                Self::row_to_state,
            )
            .optional()?;
        Ok(state)
    }

    async fn get_package_version_states(
        &self,
        module_path: &str,
        version: &str,
    ) -> Result<Vec<PackageVersionState>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT package_path, module_path, version, status, error FROM package_version_states WHERE module_path = ?1 AND version = ?2 ORDER BY package_path",
        )?;
        let states = stmt
            .query_map(params![module_path, version], |row| {
                Ok(PackageVersionState {
                    package_path: row.get(0)?,
                    module_path: row.get(1)?,
                    version: row.get(2)?,
                    status: row.get(3)?,
                    error: row.get(4)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(states)
    }

    async fn is_excluded(&self, module_path: &str, version: &str) -> Result<bool, StoreError> {
        let conn = self.conn()?;
        let hit = conn
            .query_row(
                "SELECT 1 FROM excluded_prefixes WHERE prefix = ?1 OR prefix = ?1 || '@' || ?2 OR substr(?1, 1, length(prefix) + 1) = prefix || '/' LIMIT 1",
                params![module_path, version],
                |_| Ok(()),
            )
            .optional()?;
        Ok(hit.is_some())
    }

    async fn insert_excluded_prefix(
        &self,
        prefix: &str,
        created_by: &str,
        reason: &str,
    ) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO excluded_prefixes (prefix, created_by, reason, created_at) VALUES (?, ?, ?, ?)",
            params![prefix, created_by, reason, ts(&Utc::now())],
        )?;
        Ok(())
    }

    async fn delete_older_versions_from_search(
        &self,
        module_path: &str,
        version: &str,
    ) -> Result<usize, StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let rows = {
            let mut stmt = tx.prepare(
                "SELECT package_path, version FROM search_documents WHERE module_path = ?",
            )?;
            let rows = stmt
                .query_map(params![module_path], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })?
                .collect::<Result<Vec<_>, _>>()?;
            rows
        };

        let mut deleted = 0;
        for (package_path, row_version) in rows {
            if version::compare(&row_version, version) == Ordering::Less {
                deleted += tx.execute(
                    "DELETE FROM search_documents WHERE package_path = ?",
                    params![package_path],
                )?;
            }
        }
        tx.commit()?;

        debug!(module_path, version, deleted, "Deleted older search documents");
        Ok(deleted)
    }

    async fn search_documents_for(
        &self,
        module_path: &str,
    ) -> Result<Vec<SearchDocument>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT package_path, module_path, version, synopsis FROM search_documents WHERE module_path = ? ORDER BY package_path",
        )?;
        let docs = stmt
            .query_map(params![module_path], |row| {
                Ok(SearchDocument {
                    package_path: row.get(0)?,
                    module_path: row.get(1)?,
                    version: row.get(2)?,
                    synopsis: row.get(3)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(docs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures;

    fn latest(module_path: &str, raw: &str, retractions: Vec<Retraction>) -> LatestModuleVersions {
        LatestModuleVersions {
            status: LatestStatus::Found,
            raw_version: Some(raw.to_string()),
            cooked_version: Some(raw.to_string()),
            retractions,
            ..LatestModuleVersions::not_found(module_path)
        }
    }

    fn state_update(status: Status) -> ModuleVersionStateUpdate {
        ModuleVersionStateUpdate {
            module_path: "example.com/mod".to_string(),
            version: "v1.0.0".to_string(),
            status,
            error: None,
            index_timestamp: None,
            go_mod_path: Some("example.com/mod".to_string()),
            has_go_mod: true,
            num_packages: Some(1),
            package_states: vec![PackageVersionState {
                package_path: "example.com/mod/pkg".to_string(),
                module_path: "example.com/mod".to_string(),
                version: "v1.0.0".to_string(),
                status,
                error: None,
            }],
        }
    }

    #[tokio::test]
    async fn test_insert_and_get_module() {
        let store = SqliteStore::in_memory().unwrap();
        let mut module = fixtures::module("example.com/mod", "v1.0.0");
        module.packages[0].documentation.push(Documentation {
            build_context: BuildContext::new("plan9", "386"),
            synopsis: "unregistered".to_string(),
            contents: String::new(),
        });

        assert!(store.insert_module(&module).await.unwrap());

        let stored = store
            .get_module("example.com/mod", "v1.0.0")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.info, module.info);
        assert_eq!(stored.packages.len(), 1);
        assert!(stored.packages[0]
            .documentation
            .iter()
            .all(|d| d.build_context.is_registered()));

        assert!(store
            .get_module("example.com/mod", "v9.9.9")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_is_latest_only_for_newest() {
        let store = SqliteStore::in_memory().unwrap();
        assert!(store
            .insert_module(&fixtures::module("example.com/mod", "v1.2.0"))
            .await
            .unwrap());
        assert!(!store
            .insert_module(&fixtures::module("example.com/mod", "v1.1.0"))
            .await
            .unwrap());
        assert!(!store
            .insert_module(&fixtures::module("example.com/mod", "v1.3.0-rc.1"))
            .await
            .unwrap());

        let docs = store.search_documents_for("example.com/mod").await.unwrap();
        assert!(docs.iter().all(|d| d.version == "v1.2.0"));
    }

    #[tokio::test]
    async fn test_good_version_skips_retracted() {
        let store = SqliteStore::in_memory().unwrap();
        store
            .update_latest_module_versions(&latest(
                "example.com/mod",
                "v1.2.0",
                vec![Retraction::single("v1.2.0", "bad")],
            ))
            .await
            .unwrap();

        store
            .insert_module(&fixtures::module("example.com/mod", "v1.1.0"))
            .await
            .unwrap();
        let is_latest = store
            .insert_module(&fixtures::module("example.com/mod", "v1.2.0"))
            .await
            .unwrap();
        assert!(!is_latest);

        let stored = store
            .get_latest_module_versions("example.com/mod")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.good_version.as_deref(), Some("v1.1.0"));
    }

    #[tokio::test]
    async fn test_delete_and_recompute_good_version() {
        let store = SqliteStore::in_memory().unwrap();
        store
            .update_latest_module_versions(&latest("example.com/mod", "v1.1.0", vec![]))
            .await
            .unwrap();
        for v in ["v1.0.0", "v1.1.0"] {
            store
                .insert_module(&fixtures::module("example.com/mod", v))
                .await
                .unwrap();
        }

        store.delete_module("example.com/mod", "v1.1.0").await.unwrap();
        assert!(store
            .search_documents_for("example.com/mod")
            .await
            .unwrap()
            .is_empty());

        let good = store.recompute_good_version("example.com/mod").await.unwrap();
        assert_eq!(good.as_deref(), Some("v1.0.0"));
        let stored = store
            .get_latest_module_versions("example.com/mod")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.good_version.as_deref(), Some("v1.0.0"));
    }

    #[tokio::test]
    async fn test_update_latest_writes_only_on_change() {
        let store = SqliteStore::in_memory().unwrap();
        let record = latest("example.com/mod", "v1.0.0", vec![]);

        store.update_latest_module_versions(&record).await.unwrap();
        let first: String = store
            .conn()
            .unwrap()
            .query_row(
                "SELECT updated_at FROM latest_module_versions WHERE module_path = ?",
                params!["example.com/mod"],
                |row| row.get(0),
            )
            .unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        store.update_latest_module_versions(&record).await.unwrap();
        let second: String = store
            .conn()
            .unwrap()
            .query_row(
                "SELECT updated_at FROM latest_module_versions WHERE module_path = ?",
                params!["example.com/mod"],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(first, second);

        let changed = LatestModuleVersions {
            deprecated: true,
            deprecation_message: Some("gone".to_string()),
            ..record
        };
        let stored = store.update_latest_module_versions(&changed).await.unwrap();
        assert!(stored.deprecated);
        assert_eq!(
            store
                .get_latest_module_versions("example.com/mod")
                .await
                .unwrap()
                .unwrap(),
            stored
        );
    }

    #[tokio::test]
    async fn test_module_version_state_try_count() {
        let store = SqliteStore::in_memory().unwrap();

        store
            .upsert_module_version_state(&state_update(Status::InternalError))
            .await
            .unwrap();
        let first = store
            .get_module_version_state("example.com/mod", "v1.0.0")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.try_count, 1);
        assert_eq!(first.status, Status::InternalError);
        assert!(first.next_processed_after.is_some());

        store
            .upsert_module_version_state(&state_update(Status::Success))
            .await
            .unwrap();
        let second = store
            .get_module_version_state("example.com/mod", "v1.0.0")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(second.try_count, 2);
        assert_eq!(second.status, Status::Success);
        assert!(second.next_processed_after.is_none());
        assert_eq!(second.created_at, first.created_at);

        let packages = store
            .get_package_version_states("example.com/mod", "v1.0.0")
            .await
            .unwrap();
        assert_eq!(packages.len(), 1);
        assert_eq!(packages[0].status, Status::Success);
    }

    #[tokio::test]
    async fn test_version_map_round_trip() {
        let store = SqliteStore::in_memory().unwrap();
        let entry = VersionMapEntry {
            module_path: "example.com/mod".to_string(),
            requested_version: "master".to_string(),
            resolved_version: Some("v1.0.1-0.20240301100000-abcdefabcdef".to_string()),
            status: Status::Success,
            error: None,
            go_mod_path: Some("example.com/mod".to_string()),
            updated_at: Utc::now(),
        };
        store.upsert_version_map(&entry).await.unwrap();

        let stored = store
            .get_version_map("example.com/mod", "master")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.resolved_version, entry.resolved_version);
        assert_eq!(stored.status, Status::Success);
    }

    #[tokio::test]
    async fn test_exclusion_matching() {
        let store = SqliteStore::in_memory().unwrap();
        store
            .insert_excluded_prefix("github.com/bad", "admin", "spam")
            .await
            .unwrap();
        store
            .insert_excluded_prefix("example.com/mod@v1.0.0", "admin", "license")
            .await
            .unwrap();

        assert!(store.is_excluded("github.com/bad", "v1.0.0").await.unwrap());
        assert!(store.is_excluded("github.com/bad/repo", "v1.0.0").await.unwrap());
        assert!(!store.is_excluded("github.com/badger", "v1.0.0").await.unwrap());
        assert!(store.is_excluded("example.com/mod", "v1.0.0").await.unwrap());
        assert!(!store.is_excluded("example.com/mod", "v1.0.1").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_older_versions_from_search() {
        let store = SqliteStore::in_memory().unwrap();
        store
            .insert_module(&fixtures::module("example.com/mod", "v1.0.0"))
            .await
            .unwrap();

        assert_eq!(
            store
                .delete_older_versions_from_search("example.com/mod", "v1.0.0")
                .await
                .unwrap(),
            0
        );
        assert_eq!(
            store
                .delete_older_versions_from_search("example.com/mod", "v1.1.0")
                .await
                .unwrap(),
            1
        );
        assert!(store
            .search_documents_for("example.com/mod")
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_on_disk_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("modfetch.db");
        {
            let store = SqliteStore::new(&path).unwrap();
            store
                .insert_module(&fixtures::module("example.com/mod", "v1.0.0"))
                .await
                .unwrap();
        }
        let store = SqliteStore::new(&path).unwrap();
        assert!(store
            .get_module("example.com/mod", "v1.0.0")
            .await
            .unwrap()
            .is_some());
    }
}

use std::path::Path;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use regex::{Regex, RegexBuilder};
use rusqlite::functions::FunctionFlags;
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params, params_from_iter};
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::schema::SCHEMA;
use super::{
    BuildQuery, FileQuery, Listing, Page, PluginQuery, ProjectQuery, ResourceQuery, Store,
};
use crate::error::{Error, Result};
use crate::types::*;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path)?;

        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        register_regexp(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// A private database that lives as long as the store. Used by tests.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        register_regexp(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn get_doc<T: DeserializeOwned>(&self, table: &str, filter: Filter) -> Result<Option<T>> {
        let conn = self.conn();
        let sql = format!("SELECT doc FROM {table}{} LIMIT 1", filter.where_clause());
        let doc: Option<String> = conn
            .query_row(&sql, params_from_iter(filter.params.iter()), |row| {
                row.get(0)
            })
            .optional()?;
        doc.map(|d| serde_json::from_str(&d).map_err(Error::from))
            .transpose()
    }

    fn list_docs<T>(
        &self,
        table: &str,
        filter: Filter,
        page: Page,
        parse: impl Fn(String) -> Result<T>,
    ) -> Result<Listing<T>> {
        let conn = self.conn();
        let where_clause = filter.where_clause();

        let total: i64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM {table}{where_clause}"),
            params_from_iter(filter.params.iter()),
            |row| row.get(0),
        )?;

        let mut values = filter.params.clone();
        values.push(SqlValue::Integer(page.limit.unwrap_or(-1)));
        values.push(SqlValue::Integer(page.index.max(0)));

        let mut stmt = conn.prepare(&format!(
            "SELECT doc FROM {table}{where_clause} ORDER BY rowid LIMIT ? OFFSET ?"
        ))?;
        let docs = stmt
            .query_map(params_from_iter(values.iter()), |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let items = docs.into_iter().map(parse).collect::<Result<Vec<_>>>()?;
        Ok(Listing { items, total })
    }

    fn insert_doc<T: Serialize>(&self, table: &str, id: &str, doc: &T) -> Result<()> {
        let doc = serde_json::to_string(doc)?;
        let result = self.conn().execute(
            &format!("INSERT INTO {table} (id, doc) VALUES (?1, ?2)"),
            params![id, doc],
        );
        map_constraint(result).map(|_| ())
    }

    fn replace_doc<T: Serialize>(&self, table: &str, doc: &T, filter: Filter) -> Result<bool> {
        let mut values = vec![SqlValue::Text(serde_json::to_string(doc)?)];
        values.extend(filter.params.iter().cloned());
        let rows = self.conn().execute(
            &format!("UPDATE {table} SET doc = ?{}", filter.where_clause()),
            params_from_iter(values.iter()),
        )?;
        Ok(rows > 0)
    }

    fn delete_where(&self, table: &str, filter: Filter) -> Result<usize> {
        let rows = self.conn().execute(
            &format!("DELETE FROM {table}{}", filter.where_clause()),
            params_from_iter(filter.params.iter()),
        )?;
        Ok(rows)
    }
}

/// Conjunction of SQL conditions with their positional parameters.
#[derive(Debug, Default)]
struct Filter {
    clauses: Vec<String>,
    params: Vec<SqlValue>,
}

impl Filter {
    fn new() -> Self {
        Self::default()
    }

    fn eq(mut self, column: &str, value: impl Into<SqlValue>) -> Self {
        self.clauses.push(format!("{column} = ?"));
        self.params.push(value.into());
        self
    }

    fn eq_opt(self, column: &str, value: Option<&String>) -> Self {
        match value {
            Some(v) => self.eq(column, v.clone()),
            None => self,
        }
    }

    fn flag(mut self, column: &str, enabled: bool) -> Self {
        if enabled {
            self.clauses.push(format!("{column} = 1"));
        }
        self
    }

    fn any_of(mut self, column: &str, values: &[String]) -> Self {
        let marks = vec!["?"; values.len()].join(", ");
        self.clauses.push(format!("{column} IN ({marks})"));
        self.params
            .extend(values.iter().map(|v| SqlValue::Text(v.clone())));
        self
    }

    /// Case-insensitive regex match anywhere in `name`.
    fn name_matches(mut self, search: Option<&String>) -> Result<Self> {
        if let Some(pattern) = search_pattern(search)? {
            self.clauses.push("name REGEXP ?".to_string());
            self.params.push(SqlValue::Text(pattern));
        }
        Ok(self)
    }

    fn where_clause(&self) -> String {
        if self.clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clauses.join(" AND "))
        }
    }
}

/// Turns a search term into a case-insensitive pattern, rejecting terms
/// that do not compile.
fn search_pattern(search: Option<&String>) -> Result<Option<String>> {
    let Some(search) = search.filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    let pattern = format!("(?i){search}");
    Regex::new(&pattern)
        .map_err(|_| Error::BadRequest(format!("Invalid search expression '{search}'")))?;
    Ok(Some(pattern))
}

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Backs the `X REGEXP Y` operator, which sqlite calls as `regexp(Y, X)`.
/// The compiled pattern is cached per statement.
fn register_regexp(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        "regexp",
        2,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let re: Arc<Regex> =
                ctx.get_or_create_aux(0, |pattern| -> std::result::Result<Regex, BoxError> {
                    Ok(RegexBuilder::new(pattern.as_str()?).build()?)
                })?;
            let text: Option<String> = ctx.get(1)?;
            Ok(text.is_some_and(|t| re.is_match(&t)))
        },
    )
}

fn map_constraint(result: rusqlite::Result<usize>) -> Result<usize> {
    match result {
        Ok(rows) => Ok(rows),
        Err(rusqlite::Error::SqliteFailure(err, _))
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            Err(Error::AlreadyExists)
        }
        Err(e) => Err(Error::from(e)),
    }
}

fn parse_json<T: DeserializeOwned>(doc: String) -> Result<T> {
    serde_json::from_str(&doc).map_err(Error::from)
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // Handle SQLite's default datetime format: "YYYY-MM-DD HH:MM:SS"
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            tracing::error!("Invalid datetime in database: '{}' - {}", s, e);
            Utc::now()
        })
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

fn token_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Token> {
    let tier: i64 = row.get(4)?;
    Ok(Token {
        id: row.get(0)?,
        token_hash: row.get(1)?,
        token_lookup: row.get(2)?,
        username: row.get(3)?,
        privileges: PrivilegeTier::try_from(tier).unwrap_or(PrivilegeTier::Regular),
        created_at: parse_datetime(&row.get::<_, String>(5)?),
        expires_at: row.get::<_, Option<String>>(6)?.map(|s| parse_datetime(&s)),
        last_used_at: row.get::<_, Option<String>>(7)?.map(|s| parse_datetime(&s)),
    })
}

impl Store for SqliteStore {
    fn initialize(&self) -> Result<()> {
        self.conn().execute_batch(SCHEMA)?;
        Ok(())
    }

    // Project operations

    fn create_project(&self, project: &Project, max_owned: Option<i64>) -> Result<()> {
        let doc = serde_json::to_string(project)?;
        let mut conn = self.conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        if let Some(max) = max_owned {
            let owned: i64 = tx.query_row(
                "SELECT COUNT(*) FROM projects WHERE owner = ?1",
                params![project.user],
                |row| row.get(0),
            )?;
            if owned >= max {
                return Err(Error::QuotaExceeded);
            }
        }

        map_constraint(tx.execute(
            "INSERT INTO projects (id, doc) VALUES (?1, ?2)",
            params![project.id, doc],
        ))?;
        tx.commit()?;
        Ok(())
    }

    fn get_project(&self, id: &str) -> Result<Option<Project>> {
        self.get_doc("projects", Filter::new().eq("id", id.to_string()))
    }

    fn get_user_project(&self, id: &str, user: &str) -> Result<Option<Project>> {
        self.get_doc(
            "projects",
            Filter::new()
                .eq("id", id.to_string())
                .eq("owner", user.to_string()),
        )
    }

    fn list_projects(&self, query: &ProjectQuery, page: Page) -> Result<Listing<Project>> {
        let filter = Filter::new()
            .eq_opt("owner", query.user.as_ref())
            .eq_opt("id", query.id.as_ref())
            .name_matches(query.search.as_ref())?;
        self.list_docs("projects", filter, page, parse_json)
    }

    fn count_user_projects(&self, user: &str) -> Result<i64> {
        let conn = self.conn();
        let count = conn.query_row(
            "SELECT COUNT(*) FROM projects WHERE owner = ?1",
            params![user],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    fn list_user_project_ids(&self, user: &str) -> Result<Vec<String>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT id FROM projects WHERE owner = ?1 ORDER BY rowid")?;
        let rows = stmt.query_map(params![user], |row| row.get(0))?;
        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn update_project(&self, project: &Project) -> Result<bool> {
        self.replace_doc(
            "projects",
            project,
            Filter::new()
                .eq("id", project.id.clone())
                .eq("owner", project.user.clone()),
        )
    }

    fn set_project_build(&self, project_id: &str, build_id: &str) -> Result<bool> {
        let rows = self.conn().execute(
            "UPDATE projects SET doc = json_set(doc, '$.build', ?1, '$.lastModified', ?2)
             WHERE id = ?3",
            params![build_id, now_millis(), project_id],
        )?;
        Ok(rows > 0)
    }

    fn delete_project(&self, id: &str, user: &str) -> Result<bool> {
        let rows = self.delete_where(
            "projects",
            Filter::new()
                .eq("id", id.to_string())
                .eq("owner", user.to_string()),
        )?;
        Ok(rows > 0)
    }

    // Build operations

    fn create_build(&self, build: &Build) -> Result<()> {
        self.insert_doc("builds", &build.id, build)
    }

    fn get_build(&self, id: &str) -> Result<Option<Build>> {
        self.get_doc("builds", Filter::new().eq("id", id.to_string()))
    }

    fn list_builds(&self, query: &BuildQuery, page: Page) -> Result<Listing<Build>> {
        let filter = Filter::new()
            .eq("owner", query.user.clone())
            .eq("project_id", query.project_id.clone())
            .eq_opt("id", query.id.as_ref());
        self.list_docs("builds", filter, page, parse_json)
    }

    fn update_build(&self, build: &Build) -> Result<bool> {
        let mut filter = Filter::new().eq("id", build.id.clone());
        if let Some(project_id) = &build.project_id {
            filter = filter.eq("project_id", project_id.clone());
        }
        self.replace_doc("builds", build, filter)
    }

    fn set_build_project(&self, build_id: &str, project_id: &str) -> Result<bool> {
        let rows = self.conn().execute(
            "UPDATE builds SET doc = json_set(doc, '$.projectId', ?1, '$.lastModified', ?2)
             WHERE id = ?3",
            params![project_id, now_millis(), build_id],
        )?;
        Ok(rows > 0)
    }

    fn delete_builds(&self, ids: &[String], user: &str) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        self.delete_where(
            "builds",
            Filter::new().eq("owner", user.to_string()).any_of("id", ids),
        )
    }

    fn delete_builds_by_project(&self, project_id: &str, user: &str) -> Result<usize> {
        self.delete_where(
            "builds",
            Filter::new()
                .eq("project_id", project_id.to_string())
                .eq("owner", user.to_string()),
        )
    }

    fn delete_builds_by_user(&self, user: &str) -> Result<usize> {
        self.delete_where("builds", Filter::new().eq("owner", user.to_string()))
    }

    // Resource operations

    fn create_resource(&self, resource: &mut Resource) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let next: i64 = tx.query_row(
            "SELECT COALESCE(MAX(shallow_id), 0) + 1 FROM resources
             WHERE kind = ?1 AND project_id = ?2",
            params![resource.kind.as_str(), resource.base.project_id],
            |row| row.get(0),
        )?;
        resource.base.shallow_id = next;

        let doc = serde_json::to_string(&*resource)?;
        map_constraint(tx.execute(
            "INSERT INTO resources (id, kind, doc) VALUES (?1, ?2, ?3)",
            params![resource.base.id, resource.kind.as_str(), doc],
        ))?;
        tx.commit()?;
        Ok(())
    }

    fn get_resource(&self, kind: ResourceKind, id: &str) -> Result<Option<Resource>> {
        let doc: Option<serde_json::Value> = self.get_doc(
            "resources",
            Filter::new()
                .eq("kind", kind.as_str().to_string())
                .eq("id", id.to_string()),
        )?;
        doc.map(|d| Resource::from_document(kind, d)).transpose()
    }

    fn list_resources(&self, query: &ResourceQuery, page: Page) -> Result<Listing<Resource>> {
        let kind = query.kind;
        let filter = Filter::new()
            .eq("kind", kind.as_str().to_string())
            .eq_opt("project_id", query.project_id.as_ref())
            .eq_opt("id", query.id.as_ref())
            .name_matches(query.search.as_ref())?;
        self.list_docs("resources", filter, page, |doc| {
            Resource::from_document(kind, serde_json::from_str(&doc)?)
        })
    }

    fn update_resource(&self, resource: &Resource) -> Result<bool> {
        self.replace_doc(
            "resources",
            resource,
            Filter::new()
                .eq("kind", resource.kind.as_str().to_string())
                .eq("id", resource.base.id.clone())
                .eq("project_id", resource.base.project_id.clone()),
        )
    }

    fn delete_resources(
        &self,
        kind: ResourceKind,
        project_id: &str,
        user: &str,
        ids: &[String],
    ) -> Result<usize> {
        if ids.is_empty() {
            return Ok(0);
        }
        self.delete_where(
            "resources",
            Filter::new()
                .eq("kind", kind.as_str().to_string())
                .eq("project_id", project_id.to_string())
                .eq("owner", user.to_string())
                .any_of("id", ids),
        )
    }

    fn delete_resources_by_project(&self, project_id: &str) -> Result<usize> {
        self.delete_where(
            "resources",
            Filter::new().eq("project_id", project_id.to_string()),
        )
    }

    fn delete_resources_by_user(&self, user: &str) -> Result<usize> {
        self.delete_where("resources", Filter::new().eq("owner", user.to_string()))
    }

    // Plugin operations

    fn create_plugin(&self, plugin: &Plugin) -> Result<()> {
        self.insert_doc("plugins", &plugin.id, plugin)
    }

    fn get_plugin(&self, id: &str) -> Result<Option<Plugin>> {
        self.get_doc("plugins", Filter::new().eq("id", id.to_string()))
    }

    fn list_plugins(&self, query: &PluginQuery, page: Page) -> Result<Listing<Plugin>> {
        let filter = Filter::new()
            .flag("is_public", query.public_only)
            .eq_opt("id", query.id.as_ref())
            .name_matches(query.search.as_ref())?;
        self.list_docs("plugins", filter, page, parse_json)
    }

    fn update_plugin(&self, plugin: &Plugin) -> Result<bool> {
        self.replace_doc("plugins", plugin, Filter::new().eq("id", plugin.id.clone()))
    }

    fn delete_plugin(&self, id: &str) -> Result<bool> {
        let rows = self.delete_where("plugins", Filter::new().eq("id", id.to_string()))?;
        Ok(rows > 0)
    }

    // User details operations

    fn create_user_meta(&self, meta: &UserMeta) -> Result<bool> {
        let doc = serde_json::to_string(meta)?;
        let rows = self.conn().execute(
            "INSERT OR IGNORE INTO user_meta (id, doc) VALUES (?1, ?2)",
            params![meta.id, doc],
        )?;
        Ok(rows > 0)
    }

    fn get_user_meta(&self, user: &str) -> Result<Option<UserMeta>> {
        self.get_doc("user_meta", Filter::new().eq("owner", user.to_string()))
    }

    fn update_user_meta(&self, meta: &UserMeta) -> Result<bool> {
        self.replace_doc(
            "user_meta",
            meta,
            Filter::new().eq("owner", meta.user.clone()),
        )
    }

    fn delete_user_meta(&self, user: &str) -> Result<bool> {
        let rows = self.delete_where("user_meta", Filter::new().eq("owner", user.to_string()))?;
        Ok(rows > 0)
    }

    // File operations

    fn create_file(&self, file: &FileEntry) -> Result<()> {
        self.insert_doc("files", &file.id, file)
    }

    fn get_file(&self, id: &str) -> Result<Option<FileEntry>> {
        self.get_doc("files", Filter::new().eq("id", id.to_string()))
    }

    fn get_file_by_identifier(&self, identifier: &str) -> Result<Option<FileEntry>> {
        self.get_doc(
            "files",
            Filter::new().eq("identifier", identifier.to_string()),
        )
    }

    fn list_files(&self, query: &FileQuery, page: Page) -> Result<Listing<FileEntry>> {
        let mut filter = Filter::new()
            .eq("owner", query.user.clone())
            .eq_opt("project_id", query.project_id.as_ref())
            .flag("browsable", true)
            .flag("favourite", query.favourite_only)
            .flag("global", query.global_only)
            .eq_opt("bucket_name", query.bucket.as_ref());

        if let Some(pattern) = search_pattern(query.search.as_ref())? {
            filter.clauses.push(
                "(name REGEXP ? OR EXISTS \
                 (SELECT 1 FROM json_each(doc, '$.tags') WHERE value REGEXP ?))"
                    .to_string(),
            );
            filter.params.push(SqlValue::Text(pattern.clone()));
            filter.params.push(SqlValue::Text(pattern));
        }

        self.list_docs("files", filter, page, parse_json)
    }

    fn update_file(&self, file: &FileEntry) -> Result<bool> {
        self.replace_doc(
            "files",
            file,
            Filter::new()
                .eq("id", file.id.clone())
                .eq("owner", file.user.clone()),
        )
    }

    fn delete_files_by_identifier(&self, identifier: &str) -> Result<usize> {
        self.delete_where(
            "files",
            Filter::new().eq("identifier", identifier.to_string()),
        )
    }

    fn delete_files_by_user(&self, user: &str) -> Result<usize> {
        self.delete_where("files", Filter::new().eq("owner", user.to_string()))
    }

    // Token operations

    fn create_token(&self, token: &Token) -> Result<()> {
        let result = self.conn().execute(
            "INSERT INTO tokens (id, token_hash, token_lookup, username, privileges, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                token.id,
                token.token_hash,
                token.token_lookup,
                token.username,
                i64::from(token.privileges),
                format_datetime(&token.created_at),
                token.expires_at.as_ref().map(format_datetime),
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(Error::TokenLookupCollision)
            }
            Err(e) => Err(Error::from(e)),
        }
    }

    fn get_token_by_lookup(&self, lookup: &str) -> Result<Option<Token>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, token_hash, token_lookup, username, privileges, created_at, expires_at, last_used_at
             FROM tokens WHERE token_lookup = ?1",
            params![lookup],
            token_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn update_token_last_used(&self, id: &str) -> Result<()> {
        self.conn().execute(
            "UPDATE tokens SET last_used_at = ?1 WHERE id = ?2",
            params![format_datetime(&Utc::now()), id],
        )?;
        Ok(())
    }

    fn delete_user_tokens(&self, username: &str) -> Result<usize> {
        let rows = self
            .conn()
            .execute("DELETE FROM tokens WHERE username = ?1", params![username])?;
        Ok(rows)
    }

    fn has_admin_token(&self) -> Result<bool> {
        let conn = self.conn();
        let count: i32 = conn.query_row(
            "SELECT COUNT(*) FROM tokens WHERE privileges = ?1",
            params![i64::from(PrivilegeTier::SuperAdmin)],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn open() -> (TempDir, SqliteStore) {
        let temp = TempDir::new().unwrap();
        let store = SqliteStore::new(temp.path().join("test.db")).unwrap();
        store.initialize().unwrap();
        (temp, store)
    }

    fn asset(project_id: &str, name: &str) -> Resource {
        let now = Utc::now();
        Resource {
            kind: ResourceKind::Asset,
            base: ResourceBase {
                id: new_id(),
                project_id: project_id.to_string(),
                user: "george".to_string(),
                shallow_id: 0,
                name: name.to_string(),
                created_on: now,
                last_modified: now,
            },
            body: ResourceBody::from_value(ResourceKind::Asset, json!({ "className": "C" }))
                .unwrap(),
        }
    }

    #[test]
    fn test_initialize_creates_tables() {
        let (_temp, store) = open();

        let conn = store.conn();
        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<std::result::Result<Vec<_>, _>>()
            .unwrap();

        for table in [
            "projects",
            "builds",
            "resources",
            "plugins",
            "user_meta",
            "files",
            "tokens",
        ] {
            assert!(tables.contains(&table.to_string()), "missing {table}");
        }
    }

    #[test]
    fn test_project_crud() {
        let (_temp, store) = open();
        let mut project = Project::new("george", "Test project", Utc::now());
        store.create_project(&project, None).unwrap();

        assert!(store.get_user_project(&project.id, "george").unwrap().is_some());
        assert!(store.get_user_project(&project.id, "jane").unwrap().is_none());

        project.name = "Renamed".to_string();
        assert!(store.update_project(&project).unwrap());
        let fetched = store.get_project(&project.id).unwrap().unwrap();
        assert_eq!(fetched.name, "Renamed");

        let build_id = new_id();
        assert!(store.set_project_build(&project.id, &build_id).unwrap());
        let fetched = store.get_project(&project.id).unwrap().unwrap();
        assert_eq!(fetched.build.as_deref(), Some(build_id.as_str()));

        assert!(!store.delete_project(&project.id, "jane").unwrap());
        assert!(store.delete_project(&project.id, "george").unwrap());
        assert!(store.get_project(&project.id).unwrap().is_none());
    }

    #[test]
    fn test_create_project_enforces_quota() {
        let (_temp, store) = open();
        store
            .create_project(&Project::new("george", "One", Utc::now()), Some(2))
            .unwrap();
        store
            .create_project(&Project::new("george", "Two", Utc::now()), Some(2))
            .unwrap();

        let result = store.create_project(&Project::new("george", "Three", Utc::now()), Some(2));
        assert!(matches!(result, Err(Error::QuotaExceeded)));
        assert_eq!(store.count_user_projects("george").unwrap(), 2);

        // Other owners are counted separately
        store
            .create_project(&Project::new("jane", "One", Utc::now()), Some(1))
            .unwrap();
    }

    #[test]
    fn test_list_projects_search_and_page() {
        let (_temp, store) = open();
        for name in ["Alpha", "alphabet", "Beta", "50%_off"] {
            store
                .create_project(&Project::new("george", name, Utc::now()), None)
                .unwrap();
        }

        let query = ProjectQuery {
            user: Some("george".to_string()),
            search: Some("ALPHA".to_string()),
            ..Default::default()
        };
        let listing = store.list_projects(&query, Page::default()).unwrap();
        assert_eq!(listing.total, 2);

        let query = ProjectQuery {
            search: Some("%_".to_string()),
            ..Default::default()
        };
        let listing = store.list_projects(&query, Page::default()).unwrap();
        assert_eq!(listing.total, 1);
        assert_eq!(listing.items[0].name, "50%_off");

        let query = ProjectQuery {
            search: Some("^alpha$".to_string()),
            ..Default::default()
        };
        let listing = store.list_projects(&query, Page::default()).unwrap();
        assert_eq!(listing.total, 1);
        assert_eq!(listing.items[0].name, "Alpha");

        let query = ProjectQuery {
            search: Some("[alpha".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            store.list_projects(&query, Page::default()),
            Err(Error::BadRequest(_))
        ));

        let page = Page {
            index: 1,
            limit: Some(2),
        };
        let listing = store.list_projects(&ProjectQuery::default(), page).unwrap();
        assert_eq!(listing.total, 4);
        assert_eq!(listing.items.len(), 2);
        assert_eq!(listing.items[0].name, "alphabet");
    }

    #[test]
    fn test_build_removal_is_user_scoped() {
        let (_temp, store) = open();
        let project_id = new_id();
        let mine = Build::new("george", Some(project_id.clone()), Utc::now());
        let theirs = Build::new("jane", Some(project_id.clone()), Utc::now());
        store.create_build(&mine).unwrap();
        store.create_build(&theirs).unwrap();

        assert_eq!(store.delete_builds(&[theirs.id.clone()], "george").unwrap(), 0);
        assert_eq!(store.delete_builds_by_project(&project_id, "george").unwrap(), 1);
        assert_eq!(store.delete_builds_by_project(&project_id, "george").unwrap(), 0);
        assert!(store.get_build(&theirs.id).unwrap().is_some());
    }

    #[test]
    fn test_link_build() {
        let (_temp, store) = open();
        let build = Build::new("george", None, Utc::now());
        store.create_build(&build).unwrap();

        let project_id = new_id();
        assert!(store.set_build_project(&build.id, &project_id).unwrap());
        let fetched = store.get_build(&build.id).unwrap().unwrap();
        assert_eq!(fetched.project_id.as_deref(), Some(project_id.as_str()));
        assert!(!store.set_build_project(&new_id(), &project_id).unwrap());
    }

    #[test]
    fn test_shallow_ids_are_sequential_per_project_and_kind() {
        let (_temp, store) = open();
        let p1 = new_id();
        let p2 = new_id();

        let mut a = asset(&p1, "a");
        let mut b = asset(&p1, "b");
        let mut c = asset(&p2, "c");
        store.create_resource(&mut a).unwrap();
        store.create_resource(&mut b).unwrap();
        store.create_resource(&mut c).unwrap();
        assert_eq!((a.base.shallow_id, b.base.shallow_id, c.base.shallow_id), (1, 2, 1));

        store
            .delete_resources(ResourceKind::Asset, &p1, "george", &[a.base.id.clone()])
            .unwrap();
        let mut d = asset(&p1, "d");
        store.create_resource(&mut d).unwrap();
        assert_eq!(d.base.shallow_id, 3);

        let fetched = store
            .get_resource(ResourceKind::Asset, &d.base.id)
            .unwrap()
            .unwrap();
        assert_eq!(fetched.base.shallow_id, 3);
        assert!(store.get_resource(ResourceKind::Group, &d.base.id).unwrap().is_none());
    }

    #[test]
    fn test_user_meta_insert_is_idempotent() {
        let (_temp, store) = open();
        assert!(store.create_user_meta(&UserMeta::new("george", 5)).unwrap());
        assert!(!store.create_user_meta(&UserMeta::new("george", 9)).unwrap());
        assert_eq!(store.get_user_meta("george").unwrap().unwrap().max_projects, 5);
        assert!(store.delete_user_meta("george").unwrap());
        assert!(store.get_user_meta("george").unwrap().is_none());
    }

    #[test]
    fn test_plugin_visibility() {
        let (_temp, store) = open();
        let now = Utc::now();
        for (name, public) in [("Hidden", false), ("Shown", true)] {
            let plugin: Plugin = serde_json::from_value(json!({
                "_id": new_id(),
                "name": name,
                "isPublic": public,
                "createdOn": now.timestamp_millis(),
                "lastModified": now.timestamp_millis(),
            }))
            .unwrap();
            store.create_plugin(&plugin).unwrap();
        }

        let public = PluginQuery {
            public_only: true,
            ..Default::default()
        };
        let listing = store.list_plugins(&public, Page::default()).unwrap();
        assert_eq!(listing.total, 1);
        assert_eq!(listing.items[0].name, "Shown");

        let all = store
            .list_plugins(&PluginQuery::default(), Page::default())
            .unwrap();
        assert_eq!(all.total, 2);
    }

    #[test]
    fn test_file_filters() {
        let (_temp, store) = open();
        let now = Utc::now().timestamp_millis();
        let files = [
            ("photo.png", true, true, vec!["holiday"]),
            ("notes.txt", true, false, vec![]),
            ("hidden.bin", false, true, vec![]),
        ];
        for (name, browsable, favourite, tags) in files {
            let file: FileEntry = serde_json::from_value(json!({
                "_id": new_id(),
                "name": name,
                "bucketId": "b1",
                "bucketName": "george-bucket",
                "browsable": browsable,
                "favourite": favourite,
                "tags": tags,
                "user": "george",
                "identifier": new_id(),
                "createdOn": now,
                "lastModified": now,
            }))
            .unwrap();
            store.create_file(&file).unwrap();
        }

        let base = FileQuery {
            user: "george".to_string(),
            ..Default::default()
        };
        assert_eq!(store.list_files(&base, Page::default()).unwrap().total, 2);

        let favourites = FileQuery {
            favourite_only: true,
            ..base.clone()
        };
        assert_eq!(store.list_files(&favourites, Page::default()).unwrap().total, 1);

        let by_tag = FileQuery {
            search: Some("HOLI".to_string()),
            ..base.clone()
        };
        let listing = store.list_files(&by_tag, Page::default()).unwrap();
        assert_eq!(listing.items[0].name, "photo.png");

        let other_bucket = FileQuery {
            bucket: Some("nope".to_string()),
            ..base
        };
        assert_eq!(store.list_files(&other_bucket, Page::default()).unwrap().total, 0);
    }

    #[test]
    fn test_token_lookup_collision() {
        let (_temp, store) = open();

        let token1 = Token {
            id: "token-1".to_string(),
            token_hash: "hash1".to_string(),
            token_lookup: "lookup123".to_string(),
            username: "admin".to_string(),
            privileges: PrivilegeTier::SuperAdmin,
            created_at: Utc::now(),
            expires_at: None,
            last_used_at: None,
        };
        store.create_token(&token1).unwrap();
        assert!(store.has_admin_token().unwrap());

        let token2 = Token {
            id: "token-2".to_string(),
            token_lookup: "lookup123".to_string(), // Same lookup
            ..token1.clone()
        };

        let result = store.create_token(&token2);
        assert!(matches!(result, Err(Error::TokenLookupCollision)));

        let fetched = store.get_token_by_lookup("lookup123").unwrap().unwrap();
        assert_eq!(fetched.privileges, PrivilegeTier::SuperAdmin);
        assert_eq!(store.delete_user_tokens("admin").unwrap(), 1);
    }
}

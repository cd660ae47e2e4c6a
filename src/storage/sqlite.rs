//! SQLite storage backend

use super::traits::{OpenStore, RecordFilter, RecordStore, StorageError, StorageResult};
use crate::record::{FieldValue, ModelSchema, Record, RecordId};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// SQLite-backed record store
///
/// All models share a single `records` table; field values are stored as a
/// JSON object keyed by field name. Thread-safe via internal mutex on the
/// connection.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Initialize the database schema
    fn init_schema(conn: &Connection) -> StorageResult<()> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS records (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                model TEXT NOT NULL,
                fields_json TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_records_model
                ON records(model);

            -- WAL keeps readers unblocked while an import writes
            PRAGMA journal_mode = WAL;
            "#,
        )?;
        Ok(())
    }

    fn from_connection(conn: Connection) -> StorageResult<Self> {
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> StorageResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| StorageError::LockPoisoned)
    }

    fn row_to_record(
        schema: &Arc<ModelSchema>,
        id: i64,
        fields_json: &str,
    ) -> StorageResult<Record> {
        let stored: BTreeMap<String, FieldValue> = serde_json::from_str(fields_json)?;
        Ok(Record::from_stored(schema.clone(), RecordId::new(id), stored))
    }

    /// Translate a filter into `json_extract` conditions on `fields_json`.
    ///
    /// Each condition pins the stored variant tag and, where it is a string,
    /// integer or bool, the payload too. Float payloads are only compared
    /// after decoding, so SQLite's own float parsing never decides a match.
    fn filter_clause(filter: &RecordFilter, sql: &mut String, args: &mut Vec<Value>) -> StorageResult<()> {
        for (field, expected) in filter.conditions() {
            if field.contains('"') {
                continue;
            }
            let base = format!("$.\"{}\"", field);
            if expected.is_null() {
                sql.push_str(" AND coalesce(json_extract(fields_json, ?), 'null') = 'null'");
                args.push(Value::Text(format!("{}.type", base)));
                continue;
            }

            let tagged = serde_json::to_value(expected)?;
            if let Some(kind) = tagged.get("type").and_then(|t| t.as_str()) {
                sql.push_str(" AND json_extract(fields_json, ?) = ?");
                args.push(Value::Text(format!("{}.type", base)));
                args.push(Value::Text(kind.to_string()));
            }
            Self::payload_clause(&format!("{}.value", base), tagged.get("value"), sql, args);
        }
        Ok(())
    }

    fn payload_clause(
        path: &str,
        payload: Option<&serde_json::Value>,
        sql: &mut String,
        args: &mut Vec<Value>,
    ) {
        use serde_json::Value as Json;

        let bound = match payload {
            Some(Json::String(s)) => Value::Text(s.clone()),
            Some(Json::Bool(b)) => Value::Integer(i64::from(*b)),
            Some(Json::Number(n)) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => return,
            },
            Some(Json::Object(members)) => {
                for (key, member) in members {
                    if !key.contains('"') {
                        let nested = format!("{}.\"{}\"", path, key);
                        Self::payload_clause(&nested, Some(member), sql, args);
                    }
                }
                return;
            }
            _ => return,
        };
        sql.push_str(" AND json_extract(fields_json, ?) = ?");
        args.push(Value::Text(path.to_string()));
        args.push(bound);
    }
}

impl OpenStore for SqliteStore {
    fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::from_connection(Connection::open(path)?)
    }

    fn open_in_memory() -> StorageResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }
}

impl RecordStore for SqliteStore {
    fn find(&self, schema: &Arc<ModelSchema>, filter: &RecordFilter) -> StorageResult<Vec<Record>> {
        let mut sql = String::from("SELECT id, fields_json FROM records WHERE model = ?");
        let mut args = vec![Value::Text(schema.name.clone())];
        Self::filter_clause(filter, &mut sql, &mut args)?;
        sql.push_str(" ORDER BY id");

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(args), |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (id, fields_json) = row?;
            let record = Self::row_to_record(schema, id, &fields_json)?;
            // Final exact check on decoded values (covers float payloads)
            if filter.matches(record.values()) {
                records.push(record);
            }
        }
        Ok(records)
    }

    fn load(&self, schema: &Arc<ModelSchema>, id: RecordId) -> StorageResult<Option<Record>> {
        let conn = self.conn()?;
        let fields_json: Option<String> = conn
            .query_row(
                "SELECT fields_json FROM records WHERE model = ?1 AND id = ?2",
                params![schema.name, id.get()],
                |row| row.get(0),
            )
            .optional()?;

        match fields_json {
            Some(json) => Ok(Some(Self::row_to_record(schema, id.get(), &json)?)),
            None => Ok(None),
        }
    }

    fn save(&self, record: &mut Record) -> StorageResult<RecordId> {
        record.validate().map_err(|source| StorageError::Validation {
            model: record.model().to_string(),
            source,
        })?;

        let fields_json = serde_json::to_string(record.values())?;
        let now = chrono::Utc::now().to_rfc3339();
        let conn = self.conn()?;

        match record.id() {
            Some(id) => {
                let rows = conn.execute(
                    "UPDATE records SET fields_json = ?1, updated_at = ?2
                     WHERE model = ?3 AND id = ?4",
                    params![fields_json, now, record.model(), id.get()],
                )?;
                if rows == 0 {
                    return Err(StorageError::RecordNotFound {
                        model: record.model().to_string(),
                        id,
                    });
                }
                Ok(id)
            }
            None => {
                conn.execute(
                    "INSERT INTO records (model, fields_json, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?3)",
                    params![record.model(), fields_json, now],
                )?;
                let id = RecordId::new(conn.last_insert_rowid());
                record.assign_id(id);
                Ok(id)
            }
        }
    }

    fn delete(&self, model: &str, id: RecordId) -> StorageResult<bool> {
        let conn = self.conn()?;
        let rows = conn.execute(
            "DELETE FROM records WHERE model = ?1 AND id = ?2",
            params![model, id.get()],
        )?;
        Ok(rows > 0)
    }

    fn count(&self, model: &str) -> StorageResult<usize> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM records WHERE model = ?1",
            params![model],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

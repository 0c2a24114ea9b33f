//! SQLite implementation of the store registry contract.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite::{self, OptionalExtension};

use super::connection::CacheDb;
use super::{CacheStorage, NamedStore, StoredResponse};
use crate::Error;

fn ensure_store(conn: &rusqlite::Connection, name: &str) -> Result<(), Error> {
    conn.execute(
        "INSERT OR IGNORE INTO stores (name, created_at) VALUES (?1, ?2)",
        params![name, Utc::now().to_rfc3339()],
    )?;
    Ok(())
}

fn parse_cached_at(raw: Option<String>) -> Option<DateTime<Utc>> {
    let raw = raw?;
    match DateTime::parse_from_rfc3339(&raw) {
        Ok(ts) => Some(ts.with_timezone(&Utc)),
        Err(e) => {
            tracing::warn!(cached_at = %raw, error = %e, "unparsable cached_at, treating entry as expired");
            None
        }
    }
}

#[async_trait]
impl CacheStorage for CacheDb {
    async fn open(&self, name: &str) -> Result<NamedStore, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<NamedStore, Error> {
                ensure_store(conn, &name)?;
                Ok(NamedStore::new(name))
            })
            .await
            .map_err(Error::from)
    }

    async fn get(&self, store: &NamedStore, key: &str) -> Result<Option<StoredResponse>, Error> {
        let store = store.name().to_string();
        let key = key.to_string();
        let row = self
            .conn
            .call(move |conn| -> Result<_, Error> {
                let row = conn
                    .query_row(
                        "SELECT status, status_text, headers_json, body, cached_at
                         FROM entries WHERE store = ?1 AND key = ?2",
                        params![store, key],
                        |row| {
                            Ok((
                                row.get::<_, u16>(0)?,
                                row.get::<_, String>(1)?,
                                row.get::<_, String>(2)?,
                                row.get::<_, Vec<u8>>(3)?,
                                row.get::<_, Option<String>>(4)?,
                            ))
                        },
                    )
                    .optional()?;
                Ok(row)
            })
            .await
            .map_err(Error::from)?;

        let Some((status, status_text, headers_json, body, cached_at)) = row else {
            return Ok(None);
        };
        let headers: BTreeMap<String, String> = serde_json::from_str(&headers_json)?;

        Ok(Some(StoredResponse { status, status_text, headers, body, cached_at: parse_cached_at(cached_at) }))
    }

    async fn put(&self, store: &NamedStore, key: &str, response: &StoredResponse) -> Result<(), Error> {
        let store = store.name().to_string();
        let key = key.to_string();
        let headers_json = serde_json::to_string(&response.headers)?;
        let response = response.clone();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                ensure_store(&tx, &store)?;
                tx.execute("DELETE FROM entries WHERE store = ?1 AND key = ?2", params![store, key])?;
                tx.execute(
                    "INSERT INTO entries (store, key, status, status_text, headers_json, body, cached_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        store,
                        key,
                        response.status,
                        response.status_text,
                        headers_json,
                        response.body,
                        response.cached_at.map(|ts| ts.to_rfc3339()),
                    ],
                )?;
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn delete_entry(&self, store: &NamedStore, key: &str) -> Result<bool, Error> {
        let store = store.name().to_string();
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM entries WHERE store = ?1 AND key = ?2", params![store, key])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    async fn list_keys(&self, store: &NamedStore) -> Result<Vec<String>, Error> {
        let store = store.name().to_string();
        self.conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT key FROM entries WHERE store = ?1 ORDER BY seq ASC")?;
                let keys = stmt
                    .query_map(params![store], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(keys)
            })
            .await
            .map_err(Error::from)
    }

    async fn evict_oldest(&self, store: &NamedStore, max_entries: usize) -> Result<usize, Error> {
        let store = store.name().to_string();
        let keep = i64::try_from(max_entries).unwrap_or(i64::MAX);
        self.conn
            .call(move |conn| -> Result<usize, Error> {
                let tx = conn.transaction()?;
                let count: i64 = tx.query_row("SELECT COUNT(*) FROM entries WHERE store = ?1", params![store], |row| {
                    row.get(0)
                })?;
                let excess = count - keep;
                if excess <= 0 {
                    return Ok(0);
                }
                let evicted = tx.execute(
                    "DELETE FROM entries WHERE seq IN (
                        SELECT seq FROM entries WHERE store = ?1 ORDER BY seq ASC LIMIT ?2
                    )",
                    params![store, excess],
                )?;
                tx.commit()?;
                Ok(evicted)
            })
            .await
            .map_err(Error::from)
    }

    async fn delete_store(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM stores WHERE name = ?1", params![name])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    async fn list_store_names(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM stores ORDER BY name ASC")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_response(body: &str) -> StoredResponse {
        StoredResponse::new(200, "OK", body)
            .with_header("Content-Type", "text/plain")
            .stamped(Utc::now())
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let store = db.open("stash-static-v1").await.unwrap();
        let response = make_response("console.log(1)");

        db.put(&store, "https://app.test/app.js", &response).await.unwrap();

        let retrieved = db.get(&store, "https://app.test/app.js").await.unwrap().unwrap();
        assert_eq!(retrieved.body, response.body);
        assert_eq!(retrieved.headers.get("content-type").unwrap(), "text/plain");
        assert_eq!(retrieved.cached_at.unwrap().timestamp(), response.cached_at.unwrap().timestamp());
    }

    #[tokio::test]
    async fn test_get_missing() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let store = db.open("stash-static-v1").await.unwrap();
        assert!(db.get(&store, "nonexistent").await.unwrap().is_none());

        let unopened = NamedStore::new("never-opened");
        assert!(db.get(&unopened, "nonexistent").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_open_idempotent() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let first = db.open("stash-html-v1").await.unwrap();
        db.put(&first, "/", &make_response("home")).await.unwrap();
        let second = db.open("stash-html-v1").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(db.list_store_names().await.unwrap(), vec!["stash-html-v1"]);
        assert!(db.get(&second, "/").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_put_overwrites_and_reorders() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let store = db.open("stash-dynamic-v1").await.unwrap();
        db.put(&store, "a", &make_response("a1")).await.unwrap();
        db.put(&store, "b", &make_response("b1")).await.unwrap();
        db.put(&store, "a", &make_response("a2")).await.unwrap();

        assert_eq!(db.list_keys(&store).await.unwrap(), vec!["b", "a"]);
        assert_eq!(db.get(&store, "a").await.unwrap().unwrap().body_text(), "a2");
    }

    #[tokio::test]
    async fn test_unstamped_round_trips_as_none() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let store = db.open("stash-dynamic-v1").await.unwrap();
        db.put(&store, "raw", &StoredResponse::new(200, "OK", "x")).await.unwrap();
        assert!(db.get(&store, "raw").await.unwrap().unwrap().cached_at.is_none());
    }

    #[tokio::test]
    async fn test_delete_entry() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let store = db.open("stash-static-v1").await.unwrap();
        db.put(&store, "k", &make_response("v")).await.unwrap();

        assert!(db.delete_entry(&store, "k").await.unwrap());
        assert!(!db.delete_entry(&store, "k").await.unwrap());
        assert!(db.list_keys(&store).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_store_cascades() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let old = db.open("stash-static-v0").await.unwrap();
        let current = db.open("stash-static-v1").await.unwrap();
        db.put(&old, "k", &make_response("old")).await.unwrap();
        db.put(&current, "k", &make_response("new")).await.unwrap();

        assert!(db.delete_store("stash-static-v0").await.unwrap());
        assert!(!db.delete_store("stash-static-v0").await.unwrap());

        assert_eq!(db.list_store_names().await.unwrap(), vec!["stash-static-v1"]);
        assert!(db.get(&old, "k").await.unwrap().is_none());
        assert_eq!(db.get(&current, "k").await.unwrap().unwrap().body_text(), "new");
    }

    #[tokio::test]
    async fn test_evict_oldest_respects_reput_order() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let store = db.open("stash-dynamic-v1").await.unwrap();
        let other = db.open("stash-static-v1").await.unwrap();
        for key in ["a", "b", "c", "d"] {
            db.put(&store, key, &make_response(key)).await.unwrap();
        }
        db.put(&store, "a", &make_response("a2")).await.unwrap();
        db.put(&other, "x", &make_response("x")).await.unwrap();

        assert_eq!(db.evict_oldest(&store, 2).await.unwrap(), 2);
        assert_eq!(db.list_keys(&store).await.unwrap(), vec!["d", "a"]);
        assert_eq!(db.list_keys(&other).await.unwrap(), vec!["x"]);

        assert_eq!(db.evict_oldest(&store, 2).await.unwrap(), 0);
        assert_eq!(db.evict_oldest(&NamedStore::new("never-opened"), 0).await.unwrap(), 0);
    }
}

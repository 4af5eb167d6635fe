//! MemberStore — redb-backed member table.
//!
//! Members are JSON-serialized into redb's `&[u8]` value column, keyed by
//! member ID. The store supports both on-disk and in-memory backends (the
//! latter for testing).

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable};
use tracing::debug;

use quorum_core::{Endpoint, Member, member_id};

use crate::error::{EngineError, EngineResult};
use crate::tables::MEMBERS;

/// Convert any `Display` error into an `EngineError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| EngineError::$variant(e.to_string())
    };
}

/// Thread-safe member store backed by redb.
#[derive(Clone)]
pub struct MemberStore {
    db: Arc<Database>,
}

impl fmt::Debug for MemberStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemberStore").finish_non_exhaustive()
    }
}

impl MemberStore {
    /// Open (or create) a persistent store at the given path.
    pub fn open(path: &Path) -> EngineResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "member store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory store (for testing).
    pub fn open_in_memory() -> EngineResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        Ok(store)
    }

    fn ensure_tables(&self) -> EngineResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        txn.open_table(MEMBERS).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Insert or replace a member.
    pub fn put_member(&self, member: &Member) -> EngineResult<()> {
        let value = serde_json::to_vec(member).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(MEMBERS).map_err(map_err!(Table))?;
            table
                .insert(member.id, value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(member_id = member.id, name = %member.name, "member stored");
        Ok(())
    }

    /// Insert a member unless one with the same ID exists. Returns true if
    /// it was inserted.
    pub fn put_member_if_absent(&self, member: &Member) -> EngineResult<bool> {
        if self.get_member(member.id)?.is_some() {
            return Ok(false);
        }
        self.put_member(member)?;
        Ok(true)
    }

    pub fn get_member(&self, id: u64) -> EngineResult<Option<Member>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(MEMBERS).map_err(map_err!(Table))?;
        match table.get(id).map_err(map_err!(Read))? {
            Some(guard) => {
                let member: Member =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(member))
            }
            None => Ok(None),
        }
    }

    /// All members, ordered by ID.
    pub fn list_members(&self) -> EngineResult<Vec<Member>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(MEMBERS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let member: Member =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(member);
        }
        Ok(results)
    }

    /// Register a new member for the given peer URLs.
    ///
    /// The member is named after the `host:port` of its first peer URL. A
    /// peer URL already owned by another member is a conflict.
    pub fn add_member(&self, peer_urls: Vec<String>) -> EngineResult<Member> {
        let first = peer_urls
            .first()
            .ok_or_else(|| EngineError::InvalidRequest("peer_urls is empty".to_string()))?;
        let name = Endpoint::parse(first)
            .map_err(|e| EngineError::InvalidRequest(e.to_string()))?
            .host_port();
        for url in &peer_urls[1..] {
            Endpoint::parse(url).map_err(|e| EngineError::InvalidRequest(e.to_string()))?;
        }

        let member = Member {
            id: member_id(&name),
            name,
            peer_urls,
            client_urls: Vec::new(),
        };
        let value = serde_json::to_vec(&member).map_err(map_err!(Serialize))?;

        // Conflict check and insert share one write transaction.
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(MEMBERS).map_err(map_err!(Table))?;
            for entry in table.iter().map_err(map_err!(Read))? {
                let (_, existing) = entry.map_err(map_err!(Read))?;
                let existing: Member =
                    serde_json::from_slice(existing.value()).map_err(map_err!(Deserialize))?;
                if let Some(url) = member
                    .peer_urls
                    .iter()
                    .find(|url| existing.peer_urls.contains(url))
                {
                    return Err(EngineError::Conflict(url.clone()));
                }
                if existing.id == member.id {
                    return Err(EngineError::Conflict(member.name.clone()));
                }
            }
            table
                .insert(member.id, value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;

        debug!(member_id = member.id, name = %member.name, "member added");
        Ok(member)
    }

    /// Remove a member by ID, returning it.
    pub fn remove_member(&self, id: u64) -> EngineResult<Member> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let removed = {
            let mut table = txn.open_table(MEMBERS).map_err(map_err!(Table))?;
            let guard = table.remove(id).map_err(map_err!(Write))?;
            match guard {
                Some(value) => {
                    let member: Member = serde_json::from_slice(value.value())
                        .map_err(map_err!(Deserialize))?;
                    Some(member)
                }
                None => None,
            }
        };
        txn.commit().map_err(map_err!(Transaction))?;

        match removed {
            Some(member) => {
                debug!(member_id = id, name = %member.name, "member removed");
                Ok(member)
            }
            None => Err(EngineError::NotFound(id)),
        }
    }

    /// Record the client URLs a member advertises.
    pub fn set_client_urls(&self, id: u64, client_urls: Vec<String>) -> EngineResult<()> {
        let mut member = self.get_member(id)?.ok_or(EngineError::NotFound(id))?;
        member.client_urls = client_urls;
        self.put_member(&member)
    }
}

//! redb table definitions for the member store.

use redb::TableDefinition;

/// Cluster members keyed by member ID, JSON-serialized `Member` values.
pub const MEMBERS: TableDefinition<u64, &[u8]> = TableDefinition::new("members");

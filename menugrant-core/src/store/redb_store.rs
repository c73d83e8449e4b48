#![forbid(unsafe_code)]

use async_trait::async_trait;
use redb::{Database, ReadableTable, TableDefinition};
use std::path::Path;
use std::sync::Arc;

use super::{AssignmentRecord, AssignmentStore};
use crate::serializer::AssignmentRequest;
use crate::source::PersistenceService;
use crate::{Error, Result};

const ASSIGNMENTS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("role_assignments");

pub struct RedbStorage {
    db: Arc<Database>,
}

impl RedbStorage {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let db = Database::create(path).map_err(|e| Error::Storage(e.to_string()))?;

        {
            let wtxn = db
                .begin_write()
                .map_err(|e| Error::Storage(e.to_string()))?;
            wtxn.open_table(ASSIGNMENTS_TABLE)
                .map_err(|e| Error::Storage(e.to_string()))?;
            wtxn.commit().map_err(|e| Error::Storage(e.to_string()))?;
        }

        Ok(Self { db: Arc::new(db) })
    }

    pub fn assignment_store(&self) -> RedbAssignmentStore {
        RedbAssignmentStore {
            db: Arc::clone(&self.db),
        }
    }
}

pub struct RedbAssignmentStore {
    db: Arc<Database>,
}

#[async_trait]
impl AssignmentStore for RedbAssignmentStore {
    async fn put(&self, request: &AssignmentRequest) -> Result<AssignmentRecord> {
        let record = AssignmentRecord::from_request(request);
        let value = bincode::serialize(&record)?;

        let wtxn = self
            .db
            .begin_write()
            .map_err(|e| Error::Storage(e.to_string()))?;
        {
            let mut table = wtxn
                .open_table(ASSIGNMENTS_TABLE)
                .map_err(|e| Error::Storage(e.to_string()))?;
            table
                .insert(record.role_code.as_str(), value.as_slice())
                .map_err(|e| Error::Storage(e.to_string()))?;
        }
        wtxn.commit().map_err(|e| Error::Storage(e.to_string()))?;

        tracing::debug!(
            role = %record.role_code,
            count = record.menu_ids.len(),
            "Stored role assignment"
        );
        Ok(record)
    }

    async fn get(&self, role_code: &str) -> Result<Option<AssignmentRecord>> {
        let rtxn = self
            .db
            .begin_read()
            .map_err(|e| Error::Storage(e.to_string()))?;
        let table = rtxn
            .open_table(ASSIGNMENTS_TABLE)
            .map_err(|e| Error::Storage(e.to_string()))?;

        match table
            .get(role_code)
            .map_err(|e| Error::Storage(e.to_string()))?
        {
            Some(value) => {
                let record: AssignmentRecord = bincode::deserialize(value.value())?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    async fn delete(&self, role_code: &str) -> Result<()> {
        let wtxn = self
            .db
            .begin_write()
            .map_err(|e| Error::Storage(e.to_string()))?;
        {
            let mut table = wtxn
                .open_table(ASSIGNMENTS_TABLE)
                .map_err(|e| Error::Storage(e.to_string()))?;
            table
                .remove(role_code)
                .map_err(|e| Error::Storage(e.to_string()))?;
        }
        wtxn.commit().map_err(|e| Error::Storage(e.to_string()))?;
        Ok(())
    }

    async fn list_role_codes(&self) -> Result<Vec<String>> {
        let rtxn = self
            .db
            .begin_read()
            .map_err(|e| Error::Storage(e.to_string()))?;
        let table = rtxn
            .open_table(ASSIGNMENTS_TABLE)
            .map_err(|e| Error::Storage(e.to_string()))?;

        let mut codes = Vec::new();
        for entry in table.iter().map_err(|e| Error::Storage(e.to_string()))? {
            let (key, _) = entry.map_err(|e| Error::Storage(e.to_string()))?;
            codes.push(key.value().to_string());
        }
        Ok(codes)
    }
}

#[async_trait]
impl PersistenceService for RedbAssignmentStore {
    async fn save_assignment(&self, request: &AssignmentRequest) -> Result<bool> {
        self.put(request).await?;
        Ok(true)
    }
}

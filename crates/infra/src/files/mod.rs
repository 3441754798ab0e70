//! Uploaded file registry.
//!
//! Stands in for the document storage used by employee importation: a file is
//! registered with its already-parsed data rows and referenced from queue
//! settings by id.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value as JsonValue;

use payforge_core::{FileId, TenantId};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    pub id: FileId,
    pub tenant_id: TenantId,
    pub name: String,
    pub rows: Vec<JsonValue>,
    pub created_at: DateTime<Utc>,
}

/// Existence check used before a queue referencing a file is accepted.
#[async_trait]
pub trait FileLookup: Send + Sync {
    async fn exists(&self, tenant_id: TenantId, file_id: FileId) -> anyhow::Result<bool>;
}

#[derive(Debug, Default)]
pub struct InMemoryFileStore {
    files: RwLock<HashMap<FileId, UploadedFile>>,
}

impl InMemoryFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upload(&self, tenant_id: TenantId, name: impl Into<String>, rows: Vec<JsonValue>) -> anyhow::Result<UploadedFile> {
        let file = UploadedFile {
            id: FileId::new(),
            tenant_id,
            name: name.into(),
            rows,
            created_at: Utc::now(),
        };
        self.files
            .write()
            .map_err(|_| anyhow::anyhow!("file store lock poisoned"))?
            .insert(file.id, file.clone());
        Ok(file)
    }

    /// Tenant-scoped; another tenant's file is reported as absent.
    pub fn get(&self, tenant_id: TenantId, file_id: FileId) -> anyhow::Result<Option<UploadedFile>> {
        let files = self
            .files
            .read()
            .map_err(|_| anyhow::anyhow!("file store lock poisoned"))?;
        Ok(files.get(&file_id).filter(|f| f.tenant_id == tenant_id).cloned())
    }
}

#[async_trait]
impl FileLookup for InMemoryFileStore {
    async fn exists(&self, tenant_id: TenantId, file_id: FileId) -> anyhow::Result<bool> {
        Ok(self.get(tenant_id, file_id)?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn files_are_tenant_scoped() {
        let store = InMemoryFileStore::new();
        let tenant = TenantId::new();
        let file = store.upload(tenant, "employees.xlsx", vec![json!({ "employeeNo": "E-1" })]).unwrap();

        assert!(store.exists(tenant, file.id).await.unwrap());
        assert!(!store.exists(TenantId::new(), file.id).await.unwrap());
        assert!(!store.exists(tenant, FileId::new()).await.unwrap());
        assert_eq!(store.get(tenant, file.id).unwrap().unwrap().rows.len(), 1);
    }
}

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::RwLock;

/// Job record as owned by the external interview-job service. Only the
/// access password matters to the signaling core; everything else about the
/// job stays with the service.
#[derive(Debug, Clone, Deserialize)]
pub struct JobRecord {
    #[serde(rename = "interviewCode")]
    pub interview_code: String,
    pub password: String,
}

#[derive(Debug, thiserror::Error)]
pub enum JobStoreError {
    #[error("job service request failed: {0}")]
    Request(String),

    #[error("job service returned a malformed record: {0}")]
    Malformed(String),
}

/// Read-only lookup into the external job record store. The core never
/// mutates job records.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Looks up the job carrying `room_code`. `Ok(None)` when no job does.
    async fn find_by_room_code(
        &self,
        room_code: &str,
    ) -> Result<Option<JobRecord>, JobStoreError>;
}

/// Job store backed by the external CRUD service over HTTP.
pub struct HttpJobStore {
    client: reqwest::Client,
    base_url: String,
}

impl HttpJobStore {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl JobStore for HttpJobStore {
    async fn find_by_room_code(
        &self,
        room_code: &str,
    ) -> Result<Option<JobRecord>, JobStoreError> {
        let url = format!(
            "{}/api/interviewJob/byCode/{}",
            self.base_url.trim_end_matches('/'),
            room_code
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| JobStoreError::Request(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let response = response
            .error_for_status()
            .map_err(|e| JobStoreError::Request(e.to_string()))?;

        let record = response
            .json::<JobRecord>()
            .await
            .map_err(|e| JobStoreError::Malformed(e.to_string()))?;

        Ok(Some(record))
    }
}

/// In-memory store for tests and local runs without the job service.
#[derive(Default)]
pub struct InMemoryJobStore {
    records: RwLock<HashMap<String, JobRecord>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, record: JobRecord) {
        let mut records = self.records.write().await;
        records.insert(record.interview_code.clone(), record);
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn find_by_room_code(
        &self,
        room_code: &str,
    ) -> Result<Option<JobRecord>, JobStoreError> {
        let records = self.records.read().await;
        Ok(records.get(room_code).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_lookup() {
        let store = InMemoryJobStore::new();
        store
            .insert(JobRecord {
                interview_code: "R1".to_string(),
                password: "secret".to_string(),
            })
            .await;

        let found = store.find_by_room_code("R1").await.unwrap();
        assert_eq!(found.unwrap().password, "secret");

        let missing = store.find_by_room_code("R2").await.unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn test_job_record_wire_field_names() {
        let record: JobRecord = serde_json::from_str(
            r#"{"interviewCode":"R1","password":"pw","title":"Backend Engineer"}"#,
        )
        .unwrap();
        assert_eq!(record.interview_code, "R1");
        assert_eq!(record.password, "pw");
    }
}

//! Per-user checklist documents on top of a [`ChecklistStore`].
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::memory::ChecklistStore;

pub type ChecklistDocument = Map<String, Value>;

#[derive(Debug, Clone, PartialEq)]
pub enum ChecklistRead {
    Present(ChecklistDocument),
    Absent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    AlreadyAbsent,
}

pub struct ChecklistService {
    store: Arc<dyn ChecklistStore>,
}

impl ChecklistService {
    pub fn new(store: Arc<dyn ChecklistStore>) -> Self {
        Self { store }
    }

    /// Stored documents that are not a JSON object read as absent.
    pub async fn read_checklist(&self, user_id: &str) -> anyhow::Result<ChecklistRead> {
        let Some(row) = self.store.select_checklist(user_id).await? else {
            return Ok(ChecklistRead::Absent);
        };
        match serde_json::from_str::<Value>(&row.document) {
            Ok(Value::Object(document)) => Ok(ChecklistRead::Present(document)),
            Ok(other) => {
                warn!(
                    "Stored checklist for user {} is not an object ({}); treating as absent",
                    user_id,
                    json_kind(&other)
                );
                Ok(ChecklistRead::Absent)
            }
            Err(e) => {
                warn!("Stored checklist for user {} is not valid JSON: {}", user_id, e);
                Ok(ChecklistRead::Absent)
            }
        }
    }

    /// Replace the user's checklist wholesale. A missing `title` gets a default one.
    pub async fn write_checklist(
        &self,
        user_id: &str,
        mut document: ChecklistDocument,
    ) -> anyhow::Result<ChecklistDocument> {
        if !document.contains_key("title") {
            debug!("Checklist for user {} has no title; using default", user_id);
            document.insert(
                "title".to_string(),
                Value::String(format!("Checklist for {}", user_id)),
            );
        }
        let serialized = serde_json::to_string(&document)?;
        self.store.upsert_checklist(user_id, &serialized).await?;
        info!("Checklist written for user {}", user_id);
        Ok(document)
    }

    pub async fn delete_checklist(&self, user_id: &str) -> anyhow::Result<DeleteOutcome> {
        if self.store.delete_checklist(user_id).await? {
            info!("Checklist deleted for user {}", user_id);
            Ok(DeleteOutcome::Deleted)
        } else {
            debug!("No checklist to delete for user {}", user_id);
            Ok(DeleteOutcome::AlreadyAbsent)
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryStore;
    use serde_json::json;

    fn service() -> (ChecklistService, InMemoryStore) {
        let store = InMemoryStore::new();
        (ChecklistService::new(Arc::new(store.clone())), store)
    }

    fn object(value: Value) -> ChecklistDocument {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[tokio::test]
    async fn test_write_read_delete_cycle() {
        let (service, _) = service();
        let document = object(json!({"title": "Trip", "items": []}));

        service.write_checklist("u1", document.clone()).await.unwrap();
        assert_eq!(
            service.read_checklist("u1").await.unwrap(),
            ChecklistRead::Present(document)
        );

        assert_eq!(service.delete_checklist("u1").await.unwrap(), DeleteOutcome::Deleted);
        assert_eq!(service.read_checklist("u1").await.unwrap(), ChecklistRead::Absent);
    }

    #[tokio::test]
    async fn test_delete_when_absent_is_success() {
        let (service, _) = service();
        assert_eq!(
            service.delete_checklist("nobody").await.unwrap(),
            DeleteOutcome::AlreadyAbsent
        );
    }

    #[tokio::test]
    async fn test_missing_title_gets_default() {
        let (service, _) = service();
        let written = service
            .write_checklist("u1", object(json!({"items": ["passport"]})))
            .await
            .unwrap();
        assert_eq!(written["title"], "Checklist for u1");
        assert_eq!(written["items"], json!(["passport"]));
    }

    #[tokio::test]
    async fn test_malformed_stored_documents_read_as_absent() {
        let (service, store) = service();
        store.upsert_checklist("u1", "[1, 2, 3]").await.unwrap();
        store.upsert_checklist("u2", "not json").await.unwrap();

        assert_eq!(service.read_checklist("u1").await.unwrap(), ChecklistRead::Absent);
        assert_eq!(service.read_checklist("u2").await.unwrap(), ChecklistRead::Absent);
    }

    #[tokio::test]
    async fn test_write_replaces_wholesale() {
        let (service, _) = service();
        service
            .write_checklist("u1", object(json!({"title": "A", "items": ["x"], "notes": "n"})))
            .await
            .unwrap();
        service
            .write_checklist("u1", object(json!({"title": "B", "items": []})))
            .await
            .unwrap();

        let ChecklistRead::Present(doc) = service.read_checklist("u1").await.unwrap() else {
            panic!("expected checklist");
        };
        assert_eq!(Value::Object(doc), json!({"title": "B", "items": []}));
    }
}

//! In-memory document store and session driver shared by the integration tests.
#![allow(dead_code)]

use std::collections::{BTreeMap, HashSet};
use std::io::Cursor;
use std::sync::Mutex;

use async_trait::async_trait;
use docmaint::{Console, Session, SessionOptions};
use docmaint_core::config::ContainerConfig;
use docmaint_core::store::{ContainerInfo, PartitionKeyDefinition};
use docmaint_core::{
    ContainerShape, DocumentStore, FieldSampling, QueryPage, StoreError, ValueCoercion,
};
use serde_json::{json, Value};

#[derive(Debug, Default, Clone)]
pub struct CallLog {
    pub queries: Vec<String>,
    pub upserts: usize,
    pub deletes: usize,
}

/// Single-partition-per-document store keyed by `id`.
///
/// Understands `SELECT * FROM c` and `SELECT * FROM c WHERE c.<field> = <literal>`;
/// anything else is a 400, like a gateway rejecting bad syntax.
pub struct MemoryStore {
    containers: Vec<String>,
    docs: Mutex<BTreeMap<String, Value>>,
    page_size: usize,
    fail_upserts: HashSet<String>,
    fail_deletes: HashSet<String>,
    container_error: Option<(u16, String)>,
    calls: Mutex<CallLog>,
}

impl MemoryStore {
    pub fn new(containers: &[&str], docs: Vec<Value>) -> Self {
        let docs = docs
            .into_iter()
            .map(|d| (d["id"].as_str().expect("doc id").to_string(), d))
            .collect();
        Self {
            containers: containers.iter().map(|c| c.to_string()).collect(),
            docs: Mutex::new(docs),
            page_size: 2,
            fail_upserts: HashSet::new(),
            fail_deletes: HashSet::new(),
            container_error: None,
            calls: Mutex::new(CallLog::default()),
        }
    }

    pub fn failing_upserts(mut self, ids: &[&str]) -> Self {
        self.fail_upserts = ids.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn failing_deletes(mut self, ids: &[&str]) -> Self {
        self.fail_deletes = ids.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn container_error(mut self, status: u16, message: &str) -> Self {
        self.container_error = Some((status, message.to_string()));
        self
    }

    pub fn snapshot(&self) -> BTreeMap<String, Value> {
        self.docs.lock().unwrap().clone()
    }

    pub fn doc(&self, id: &str) -> Option<Value> {
        self.docs.lock().unwrap().get(id).cloned()
    }

    pub fn calls(&self) -> CallLog {
        self.calls.lock().unwrap().clone()
    }

    fn check_container(&self, container: &str) -> Result<(), StoreError> {
        if self.containers.iter().any(|c| c == container) {
            Ok(())
        } else {
            Err(StoreError::Api {
                status: 404,
                message: format!("Resource Not Found: {}", container),
            })
        }
    }

    fn evaluate(&self, query: &str) -> Result<Vec<Value>, StoreError> {
        let normalized = query.split_whitespace().collect::<Vec<_>>().join(" ");
        let all: Vec<Value> = self.docs.lock().unwrap().values().cloned().collect();

        if normalized == "SELECT * FROM c" {
            return Ok(all);
        }

        let condition = normalized
            .strip_prefix("SELECT * FROM c WHERE c.")
            .and_then(|rest| rest.split_once(" = "));
        let Some((field, literal)) = condition else {
            return Err(bad_request(query));
        };

        let expected = match literal
            .strip_prefix('\'')
            .and_then(|l| l.strip_suffix('\''))
        {
            Some(s) => Value::String(s.to_string()),
            None => serde_json::from_str(literal).map_err(|_| bad_request(query))?,
        };

        Ok(all
            .into_iter()
            .filter(|doc| doc.get(field) == Some(&expected))
            .collect())
    }
}

fn bad_request(query: &str) -> StoreError {
    StoreError::Api {
        status: 400,
        message: format!("Syntax error, incorrect syntax near '{}'.", query),
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn read_container(&self, container: &str) -> Result<ContainerInfo, StoreError> {
        if let Some((status, message)) = &self.container_error {
            return Err(StoreError::Api {
                status: *status,
                message: message.clone(),
            });
        }
        self.check_container(container)?;
        Ok(ContainerInfo {
            id: container.to_string(),
            partition_key: Some(PartitionKeyDefinition {
                paths: vec!["/id".to_string()],
            }),
        })
    }

    async fn read_item(
        &self,
        container: &str,
        id: &str,
        _partition_key: &str,
    ) -> Result<Value, StoreError> {
        self.check_container(container)?;
        self.doc(id).ok_or_else(|| StoreError::Api {
            status: 404,
            message: "Entity with the specified id does not exist in the system.".to_string(),
        })
    }

    async fn query_page(
        &self,
        container: &str,
        query: &str,
        continuation: Option<&str>,
    ) -> Result<QueryPage, StoreError> {
        self.check_container(container)?;
        self.calls.lock().unwrap().queries.push(query.to_string());

        let results = self.evaluate(query)?;
        let start: usize = continuation.and_then(|c| c.parse().ok()).unwrap_or(0);
        let end = (start + self.page_size).min(results.len());
        let documents = results.get(start..end).map(<[Value]>::to_vec).unwrap_or_default();

        Ok(QueryPage {
            documents,
            continuation: (end < results.len()).then(|| end.to_string()),
        })
    }

    async fn upsert_item(
        &self,
        container: &str,
        partition_key: &str,
        item: &Value,
    ) -> Result<(), StoreError> {
        self.check_container(container)?;
        self.calls.lock().unwrap().upserts += 1;
        if self.fail_upserts.contains(partition_key) {
            return Err(StoreError::Api {
                status: 412,
                message: "Operation cannot be performed because one of the specified precondition is not met.".to_string(),
            });
        }
        let id = item["id"].as_str().unwrap_or_default().to_string();
        self.docs.lock().unwrap().insert(id, item.clone());
        Ok(())
    }

    async fn delete_item(
        &self,
        container: &str,
        id: &str,
        _partition_key: &str,
    ) -> Result<(), StoreError> {
        self.check_container(container)?;
        self.calls.lock().unwrap().deletes += 1;
        if self.fail_deletes.contains(id) {
            return Err(StoreError::Api {
                status: 403,
                message: "Request blocked by resource lock".to_string(),
            });
        }
        match self.docs.lock().unwrap().remove(id) {
            Some(_) => Ok(()),
            None => Err(StoreError::Api {
                status: 404,
                message: "Entity with the specified id does not exist in the system.".to_string(),
            }),
        }
    }

    fn name(&self) -> &str {
        "memory"
    }
}

pub fn usage_doc(id: &str, status: &str) -> Value {
    json!({
        "businessKey": format!("bk-{}", id),
        "referenceId": "ref-1",
        "referenceType": "Assistant",
        "sourceId": "src-1",
        "sourceType": "SessionItem",
        "createdOn": "2024-01-01T00:00:00Z",
        "createdBy": "ops",
        "id": id,
        "isActive": true,
        "isDeleted": false,
        "metricId": "metric-1",
        "modifiedOn": "2024-01-01T00:00:00Z",
        "physicalKey": format!("pk-{}", id),
        "status": status,
        "clientId": "client-1",
        "value": 1.5,
        "timestamp": "2024-01-01T00:00:00Z"
    })
}

pub fn options() -> SessionOptions {
    SessionOptions {
        containers: vec![
            ContainerConfig {
                name: "UsageRecords".to_string(),
                shape: ContainerShape::UsageRecord,
            },
            ContainerConfig {
                name: "Settings".to_string(),
                shape: ContainerShape::Open,
            },
        ],
        field_sampling: FieldSampling::FirstRecord,
        value_coercion: ValueCoercion::Verbatim,
    }
}

pub fn console(lines: &[&str]) -> Console<Cursor<Vec<u8>>, Vec<u8>> {
    let mut input = lines.join("\n");
    input.push('\n');
    Console::new(Cursor::new(input.into_bytes()), Vec::new())
}

pub fn output_of(console: Console<Cursor<Vec<u8>>, Vec<u8>>) -> String {
    String::from_utf8(console.into_output()).expect("utf8 output")
}

/// Drive a whole session with scripted operator answers; returns the transcript.
pub async fn run_session(store: &MemoryStore, options: SessionOptions, lines: &[&str]) -> String {
    let mut session = Session::new(store, options, console(lines));
    session.run().await.expect("session ends cleanly");
    output_of(session.into_console())
}

//! Batch mutator: applies a confirmed plan to every item of a result set.
//!
//! Items are processed one at a time, each with its own store call. A failed
//! item is reported and recorded, then the batch moves on; nothing is rolled
//! back. The partition key is always the item's `id`.

use std::io::{self, BufRead, Write};

use docmaint_core::{DocumentStore, Record, ValueCoercion};

use crate::console::Console;
use crate::subsystems::planner::MutationPlan;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    pub id: String,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub succeeded: Vec<String>,
    pub failed: Vec<ItemFailure>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.succeeded.len() + self.failed.len()
    }

    fn fail(&mut self, id: &str, error: impl ToString) {
        self.failed.push(ItemFailure {
            id: id.to_string(),
            error: error.to_string(),
        });
    }
}

pub async fn apply_plan<R: Record, I: BufRead, W: Write>(
    store: &dyn DocumentStore,
    container: &str,
    items: &[R],
    plan: &MutationPlan,
    coercion: ValueCoercion,
    console: &mut Console<I, W>,
) -> io::Result<BatchReport> {
    let report = match plan {
        MutationPlan::Delete => delete_all(store, container, items, console).await?,
        MutationPlan::UpdateField { field, raw_value } => {
            update_all(store, container, items, field, raw_value, coercion, console).await?
        }
    };

    tracing::info!(
        container = container,
        succeeded = report.succeeded.len(),
        failed = report.failed.len(),
        "Batch finished"
    );

    Ok(report)
}

pub async fn delete_all<R: Record, I: BufRead, W: Write>(
    store: &dyn DocumentStore,
    container: &str,
    items: &[R],
    console: &mut Console<I, W>,
) -> io::Result<BatchReport> {
    let mut report = BatchReport::default();

    for item in items {
        let id = item.id();
        match store.delete_item(container, id, id).await {
            Ok(()) => {
                console.blank()?;
                console.say(format!("Deleted item with id: {}", id))?;
                report.succeeded.push(id.to_string());
            }
            Err(e) => {
                tracing::warn!(id = id, error = %e, "Delete failed");
                console.blank()?;
                console.say(format!("Failed to delete item with id: {}. Error: {}", id, e))?;
                report.fail(id, e);
            }
        }
    }

    Ok(report)
}

/// Set `field` on each item and upsert it before moving to the next one.
pub async fn update_all<R: Record, I: BufRead, W: Write>(
    store: &dyn DocumentStore,
    container: &str,
    items: &[R],
    field: &str,
    raw_value: &str,
    coercion: ValueCoercion,
    console: &mut Console<I, W>,
) -> io::Result<BatchReport> {
    let mut report = BatchReport::default();

    for original in items {
        let mut item = original.clone();
        let previous = item.get_field(field);

        let outcome = match item.set_field(field, raw_value, coercion) {
            Ok(()) => match serde_json::to_value(&item) {
                Ok(document) => store
                    .upsert_item(container, item.id(), &document)
                    .await
                    .map_err(|e| e.to_string()),
                Err(e) => Err(e.to_string()),
            },
            Err(e) => Err(e.to_string()),
        };

        let id = original.id();
        match outcome {
            Ok(()) => {
                tracing::debug!(
                    id = id,
                    field = field,
                    previous = ?previous,
                    current = ?item.get_field(field),
                    "Item updated"
                );
                console.blank()?;
                console.say(format!("Updated item with id: {}", id))?;
                report.succeeded.push(id.to_string());
            }
            Err(error) => {
                tracing::warn!(id = id, field = field, error = %error, "Update failed");
                console.blank()?;
                console.say(format!("Failed to update item with id: {}. Error: {}", id, error))?;
                report.fail(id, error);
            }
        }
    }

    Ok(report)
}

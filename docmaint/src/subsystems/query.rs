//! Query subsystem: runs an operator filter and materialises the result set.
//!
//! - Drains every continuation page into one ordered `Vec`
//! - Decodes each document into the container's record shape
//! - Rejects documents without an `id` (they cannot be addressed for mutation)

use std::io::{self, BufRead, Write};

use docmaint_core::{DocumentStore, Record};

use crate::console::Console;
use crate::error::QueryError;

pub async fn fetch_items<R: Record>(
    store: &dyn DocumentStore,
    container: &str,
    filter: &str,
) -> Result<Vec<R>, QueryError> {
    let filter = filter.trim();
    if filter.is_empty() {
        return Err(QueryError::EmptyFilter);
    }

    let mut items = Vec::new();
    let mut continuation: Option<String> = None;
    let mut pages = 0usize;

    loop {
        let page = store
            .query_page(container, filter, continuation.as_deref())
            .await?;
        pages += 1;

        for document in page.documents {
            let index = items.len();
            let item: R = serde_json::from_value(document)
                .map_err(|source| QueryError::Decode { index, source })?;
            if item.id().is_empty() {
                return Err(QueryError::MissingId { index });
            }
            items.push(item);
        }

        match page.continuation {
            Some(token) => continuation = Some(token),
            None => break,
        }
    }

    tracing::info!(
        container = container,
        store = store.name(),
        pages = pages,
        items = items.len(),
        "Query drained"
    );

    Ok(items)
}

/// Print each item as compact JSON, one `Item:` line apiece.
pub fn echo_items<R: Record, I: BufRead, W: Write>(
    console: &mut Console<I, W>,
    items: &[R],
) -> io::Result<()> {
    for item in items {
        let json = serde_json::to_string(item)
            .unwrap_or_else(|e| format!("<unprintable item {}: {}>", item.id(), e));
        console.blank()?;
        console.say(format!("Item: {}", json))?;
    }
    Ok(())
}

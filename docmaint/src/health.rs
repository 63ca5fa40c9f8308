use docmaint_core::store::ContainerInfo;
use docmaint_core::{DocumentStore, StoreError};

use crate::session::SessionOptions;

/// Read the metadata of every declared container, in declaration order.
pub async fn check_containers(
    store: &dyn DocumentStore,
    options: &SessionOptions,
) -> Vec<(String, Result<ContainerInfo, StoreError>)> {
    let mut results = Vec::with_capacity(options.containers.len());
    for container in &options.containers {
        let result = store.read_container(&container.name).await;
        if let Err(e) = &result {
            tracing::warn!(container = %container.name, error = %e, "Container check failed");
        }
        results.push((container.name.clone(), result));
    }
    results
}

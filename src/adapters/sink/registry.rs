//! Single-flight table registry
//!
//! Every pipeline asks for its table before each append. The first caller for a
//! `(project, dataset, table)` key starts the create call; everyone else awaits the
//! same shared future and receives the same handle (or the same error). A resolved
//! entry stays in the map and serves as the created-table cache. A failed entry is
//! evicted so a later call can try again.

use super::traits::{DatasetHandle, SinkConnector, SinkResult, TableHandle};
use crate::domain::{DatasetId, TableId};
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

type TableKey = (String, DatasetId, TableId);
type PendingTable = Shared<BoxFuture<'static, SinkResult<TableHandle>>>;

pub struct TableRegistry {
    sink: Arc<dyn SinkConnector>,
    tables: Mutex<HashMap<TableKey, PendingTable>>,
}

impl TableRegistry {
    pub fn new(sink: Arc<dyn SinkConnector>) -> Self {
        Self {
            sink,
            tables: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the table, creating it on first use
    pub async fn ensure_table(
        &self,
        dataset: &DatasetHandle,
        table: &TableId,
    ) -> SinkResult<TableHandle> {
        let key = (
            dataset.project.clone(),
            dataset.dataset.clone(),
            table.clone(),
        );

        let pending = {
            let mut tables = self.tables.lock().unwrap_or_else(PoisonError::into_inner);
            tables
                .entry(key.clone())
                .or_insert_with(|| {
                    tracing::debug!(table = %table, "Creating sink table");
                    let sink = Arc::clone(&self.sink);
                    let dataset = dataset.clone();
                    let table = table.clone();
                    async move { sink.create_table(&dataset, &table).await }
                        .boxed()
                        .shared()
                })
                .clone()
        };

        let result = pending.clone().await;

        if let Err(ref e) = result {
            let mut tables = self.tables.lock().unwrap_or_else(PoisonError::into_inner);
            if tables.get(&key).is_some_and(|entry| entry.ptr_eq(&pending)) {
                tables.remove(&key);
                tracing::warn!(table = %table, error = %e, "Table creation failed, entry evicted");
            }
        }

        result
    }

    /// Number of tables created or in flight
    pub fn len(&self) -> usize {
        self.tables
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

//! Interactive maintenance session.
//!
//! One iteration walks: container → filter → operation → confirmation →
//! batch → report, then asks whether to start over. Each failure is contained
//! at the nearest prompt loop; only end of input or a broken console ends the
//! session early.

use std::io::{BufRead, Write};

use docmaint_core::config::ContainerConfig;
use docmaint_core::{
    ContainerShape, DocmaintConfig, DocumentStore, FieldSampling, OpenRecord, Record,
    UsageRecord, ValueCoercion,
};

use crate::console::Console;
use crate::error::{QueryError, SessionError};
use crate::subsystems::mutate::{self, BatchReport};
use crate::subsystems::planner::{self, MutationPlan, Operation};
use crate::subsystems::{query, schema};

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub containers: Vec<ContainerConfig>,
    pub field_sampling: FieldSampling,
    pub value_coercion: ValueCoercion,
}

impl From<&DocmaintConfig> for SessionOptions {
    fn from(config: &DocmaintConfig) -> Self {
        Self {
            containers: config.containers.clone(),
            field_sampling: config.workflow.field_sampling,
            value_coercion: config.workflow.value_coercion,
        }
    }
}

impl SessionOptions {
    pub fn shape_of(&self, name: &str) -> Option<ContainerShape> {
        self.containers
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.shape)
    }
}

enum Iteration {
    Finished,
    RetryContainer,
    Exit,
}

pub struct Session<'a, I, W> {
    store: &'a dyn DocumentStore,
    options: SessionOptions,
    console: Console<I, W>,
}

impl<'a, I: BufRead, W: Write> Session<'a, I, W> {
    pub fn new(store: &'a dyn DocumentStore, options: SessionOptions, console: Console<I, W>) -> Self {
        Self {
            store,
            options,
            console,
        }
    }

    pub fn into_console(self) -> Console<I, W> {
        self.console
    }

    /// Run until the operator declines to restart or input ends.
    pub async fn run(&mut self) -> Result<(), SessionError> {
        loop {
            self.console.say("\n*** Cosmos DB Operations ***\n")?;

            match self.run_iteration().await {
                Ok(Iteration::Finished) => {}
                Ok(Iteration::RetryContainer) => continue,
                Ok(Iteration::Exit) | Err(SessionError::Aborted) => return self.exit(),
                Err(e @ SessionError::Io(_)) => return Err(e),
                Err(e) => {
                    tracing::error!(error = %e, "Session iteration failed");
                    self.console.say(format!("Unexpected error: {}", e))?;
                }
            }

            match self.console.confirm("\nDo you want to restart the program? (Y/N)") {
                Ok(true) => continue,
                Ok(false) | Err(SessionError::Aborted) => return self.exit(),
                Err(e) => return Err(e),
            }
        }
    }

    fn exit(&mut self) -> Result<(), SessionError> {
        self.console.say("Exiting the program...")?;
        Ok(())
    }

    async fn run_iteration(&mut self) -> Result<Iteration, SessionError> {
        let container = self
            .console
            .prompt("Enter the Container you want to query: ")?
            .trim()
            .to_string();

        let shape = match self.options.shape_of(&container) {
            Some(shape) => self
                .container_exists(&container)
                .await?
                .then_some(shape),
            None => None,
        };
        let Some(shape) = shape else {
            self.console.blank()?;
            let retry = self.console.confirm(format!(
                "This Cosmos DataBase doesn't have the container {}. Want to try again? (Y/N)",
                container
            ))?;
            return Ok(if retry {
                Iteration::RetryContainer
            } else {
                Iteration::Exit
            });
        };

        match shape {
            ContainerShape::UsageRecord => self.maintain::<UsageRecord>(&container).await?,
            ContainerShape::Open => self.maintain::<OpenRecord>(&container).await?,
        }
        Ok(Iteration::Finished)
    }

    async fn container_exists(&self, container: &str) -> Result<bool, SessionError> {
        match self.store.read_container(container).await {
            Ok(info) => {
                let paths = info.partition_key_paths();
                if !paths.is_empty() && paths != ["/id"] {
                    tracing::warn!(
                        container = container,
                        partition_key = ?paths,
                        "Container is not partitioned by /id; writes use id as the partition key"
                    );
                }
                Ok(true)
            }
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn maintain<R: Record>(&mut self, container: &str) -> Result<(), SessionError> {
        let items = self.await_items::<R>(container).await?;

        let plan = match self.select_operation()? {
            Operation::Update => self.plan_update(&items)?,
            Operation::Delete => self.plan_delete()?,
        };

        let Some(plan) = plan else {
            self.console.blank()?;
            self.console.say("Operation canceled.")?;
            return Ok(());
        };

        let report = mutate::apply_plan(
            self.store,
            container,
            &items,
            &plan,
            self.options.value_coercion,
            &mut self.console,
        )
        .await?;
        self.summarize(&report)?;
        Ok(())
    }

    /// Prompt for filters until one returns at least one item.
    async fn await_items<R: Record>(&mut self, container: &str) -> Result<Vec<R>, SessionError> {
        loop {
            let filter = self.console.prompt(
                "Enter SQL query to filter items (e.g., SELECT * FROM c WHERE c.id = '<id>'):",
            )?;

            match query::fetch_items::<R>(self.store, container, &filter).await {
                Ok(items) if items.is_empty() => {
                    self.console.blank()?;
                    self.console.say("No items found. Try another query.")?;
                }
                Ok(items) => {
                    query::echo_items(&mut self.console, &items)?;
                    self.console.blank()?;
                    self.console.say(format!("Found {} item(s).", items.len()))?;
                    return Ok(items);
                }
                Err(QueryError::Store(e)) => {
                    tracing::warn!(container = container, error = %e, "Query rejected");
                    self.console.blank()?;
                    self.console.say(format!("Error querying Cosmos DB: {}", e))?;
                    self.console.blank()?;
                }
                Err(e) => {
                    self.console.blank()?;
                    self.console.say(format!("Invalid query. Error: {}", e))?;
                }
            }
        }
    }

    fn select_operation(&mut self) -> Result<Operation, SessionError> {
        loop {
            let answer = self.console.prompt(
                "Choose operation: UPDATE (new properties and values) or DELETE (records)",
            )?;
            match planner::parse_operation(&answer) {
                Some(operation) => return Ok(operation),
                None => {
                    self.console.blank()?;
                    self.console.say("Invalid operation. Please try again.")?;
                }
            }
        }
    }

    fn plan_update<R: Record>(&mut self, items: &[R]) -> Result<Option<MutationPlan>, SessionError> {
        let fields = schema::updatable_fields(items, self.options.field_sampling);
        if fields.is_empty() {
            self.console.blank()?;
            self.console.say("No updatable properties found on the selected items.")?;
            return Ok(None);
        }

        let field = loop {
            self.console.blank()?;
            self.console.say(format!("Available properties: {}", fields))?;
            self.console.blank()?;
            let name = self.console.prompt("Enter the property to update:")?;
            match planner::validate_field(&fields, name.trim()) {
                Ok(field) => break field,
                Err(e) => {
                    self.console.blank()?;
                    self.console.say(format!("{}. Please try Again.", e))?;
                }
            }
        };

        let raw_value = loop {
            let raw = self.console.prompt("Enter the new value for the property:")?;
            match planner::validate_value(items, &field, &raw, self.options.value_coercion) {
                Ok(()) => break raw,
                Err(e) => {
                    self.console.blank()?;
                    self.console.say(format!("{}. Please try Again.", e))?;
                    self.console.blank()?;
                }
            }
        };

        self.console.blank()?;
        if !self
            .console
            .confirm("This operation will UPDATE all selected items. Proceed? (Y/N)")?
        {
            return Ok(None);
        }
        Ok(Some(MutationPlan::UpdateField { field, raw_value }))
    }

    fn plan_delete(&mut self) -> Result<Option<MutationPlan>, SessionError> {
        self.console.blank()?;
        if !self
            .console
            .confirm("This operation will DELETE all selected items. Proceed? (Y/N)")?
        {
            return Ok(None);
        }
        Ok(Some(MutationPlan::Delete))
    }

    fn summarize(&mut self, report: &BatchReport) -> Result<(), SessionError> {
        self.console.blank()?;
        self.console.say(format!(
            "{} item(s) processed: {} succeeded, {} failed.",
            report.total(),
            report.succeeded.len(),
            report.failed.len()
        ))?;
        Ok(())
    }
}

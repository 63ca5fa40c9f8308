pub mod config;
pub mod cosmos;
pub mod error;
pub mod models;
pub mod record;
pub mod store;

pub use config::{ContainerShape, DocmaintConfig, FieldSampling};
pub use cosmos::CosmosClient;
pub use error::{FieldError, StoreError};
pub use models::usage_record::{UsageRecord, UsageReferenceType, UsageSourceType, UsageStatus};
pub use record::{FieldKind, OpenRecord, Record, ValueCoercion, ID_FIELD};
pub use store::{ContainerInfo, DocumentStore, QueryPage};

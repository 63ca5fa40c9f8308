pub mod mutate;
pub mod planner;
pub mod query;
pub mod schema;

// Pure calculations over fetched records
pub mod aggregation;
pub mod costs;
pub mod ledger;

// Backend-facing workflows
pub mod entrances;
pub mod exits;
pub mod reports;

// Service factory for dependency injection
pub mod factory;

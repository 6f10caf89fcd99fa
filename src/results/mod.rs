//! Results module
//!
//! Aggregation of per-subject results, run reports, storage of aggregated
//! tables and comparison of two stored tables.

pub mod aggregate;
pub mod compare;
pub mod report;
pub mod storage;

pub use aggregate::aggregate;
pub use compare::{compare_tables, TableComparison};
pub use report::{RunReport, SubjectOutcome};
pub use storage::{load_table, save_table};

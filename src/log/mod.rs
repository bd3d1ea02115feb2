//! Local history
//!
//! Push and commit attempts are appended to a JSONL file in the project's
//! `.flowctl` directory so earlier submissions can be reviewed.

pub mod jsonl;

pub use jsonl::{HistoryLog, Operation, PushRecord};

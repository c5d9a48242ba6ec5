//! Test support: an in-memory scripted connection and row helpers.
//!
//! Enabled with the `test-utils` feature.

mod scripted;
mod test_helpers;

pub use scripted::{
    CallMode, Journal, RecordedCall, ScriptedConnection, ScriptedResponse, TxEvent,
};
pub use test_helpers::create_test_rows;

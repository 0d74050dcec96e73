//! Board E2E test suite.
//!
//! Drives the full `/api/v1` surface against a scripted in-memory results
//! service. No network access is needed.
//!
//! Run with: cargo test --test board_e2e

mod mock_source;
mod test_helpers;

mod test_board;
mod test_runnable;
mod test_selection;

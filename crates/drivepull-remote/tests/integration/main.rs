//! Integration tests for the destination client

mod common;
mod test_entries;

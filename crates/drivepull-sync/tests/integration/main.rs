//! Integration tests for drivepull-sync
//!
//! Drives the full engine against in-memory source and destination
//! filesystems and checks the end state of the destination, the call
//! counts, and the reported statistics.


mod test_pull;

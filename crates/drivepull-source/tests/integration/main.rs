//! Integration tests for the source API client

mod common;
mod test_attr;
mod test_content;

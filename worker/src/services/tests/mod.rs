//! Service-specific tests

mod connection;

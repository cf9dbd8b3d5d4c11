//! Service implementations

pub mod connection;

#[cfg(test)]
mod tests;

pub use connection::UpstreamConnection;

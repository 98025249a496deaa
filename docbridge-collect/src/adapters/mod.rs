//! Document-source adapters.
//!
//! One adapter per wire-compatible backend. MongoDB, Azure Cosmos DB's
//! Mongo API, and AWS DocumentDB all speak the same protocol, so a single
//! driver-backed adapter covers the supported targets.

pub mod mongodb;

pub use mongodb::MongoSource;

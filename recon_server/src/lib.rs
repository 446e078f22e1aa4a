//! # Reconciliation server
//! This crate hosts the HTTP front end of the reconciliation engine. It is responsible for:
//! Accepting reconciliation requests for a merchant's split contract.
//! Serving the classified transaction history of a split contract.
//! Triggering a reconciliation when the split indexer reports new activity.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `/health`: A health check route that returns a 200 OK response.
//! * `POST /reconcile`: Matches payments into a split contract against the merchant's open receipts.
//! * `GET /transactions`: The classified transactions of a split contract, with cumulative totals.
//! * `POST /webhook/split`: Called by the split indexer. Runs a (possibly targeted) reconciliation.
//!
//! Every response carries an `x-correlation-id` header.
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod helpers;
pub mod middleware;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;

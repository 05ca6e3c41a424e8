/// Campus Report - university issue reporting portal
///
/// Students file complaints, staff triage and resolve them, and
/// super-admins manage accounts, reference data, settings and analytics.

pub mod account;
pub mod admin;
pub mod analytics;
pub mod api;
pub mod auth;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod issues;
pub mod metrics;
pub mod server;
pub mod store;

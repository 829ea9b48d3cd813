//! Pre-alert matching and company invitation core for a multi-tenant package
//! forwarding service.
//!
//! Every tenant-owned read or write takes a [`tenancy::CompanyScope`]; the
//! in-memory stores under [`storage`] apply it through one helper so a query path
//! cannot skip the company filter.

pub mod clock;
pub mod config;
pub mod error;
pub mod http;
pub mod pagination;
pub mod security;
pub mod storage;
pub mod telemetry;
pub mod tenancy;
pub mod workflows;

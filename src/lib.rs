//! Storesight - Merchant Analytics Platform Backend
//!
//! This crate implements the entitlement resolution and billing-state
//! access-control engine: plan policy loading, billing state
//! classification, access rule evaluation, entitlement caching, and
//! billing webhook transition handling.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

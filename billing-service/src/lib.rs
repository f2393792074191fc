//! Billing lifecycle service.
//!
//! A billing is an open aggregation of monetary line items for a user.
//! A per-billing workflow absorbs add-line-item and close signals, fires a
//! scheduled auto-close timer, coordinates retryable datastore activities,
//! and produces exactly one immutable summary on closure.

pub mod config;
pub mod http;
pub mod models;
pub mod services;
pub mod startup;
pub mod usecases;
pub mod workflow;

//! Receivables Service - Dues tracking and split-payment reconciliation for club billing.

pub mod config;
pub mod dtos;
pub mod handlers;
pub mod models;
pub mod services;
pub mod startup;

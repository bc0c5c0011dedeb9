//! Follow-up scheduling, ranking, and notification engine for the CRM desk.

pub mod agent;
pub mod config;
pub mod customers;
pub mod error;
pub mod telemetry;

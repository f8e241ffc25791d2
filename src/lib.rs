//! Desk Concierge - Conversational Workflow Intake Engine
//!
//! Implements a deterministic slot-filling dialogue core that turns
//! free-form conversation turns into validated workflow payloads and
//! gates every real-world side effect on a complete, valid payload.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

//! Sluice Core
//!
//! Core types shared by the Sluice build-pipeline services.
//!
//! This crate contains:
//! - Domain types: pipeline definitions, push notifications, runs and stage output
//! - DTOs: request/response bodies exchanged between the orchestrator and its clients

pub mod domain;
pub mod dto;

#![doc = "lawbot-core: core logic library for lawbot."]

//! This crate contains the synchronisation engine for lawbot: the wiki API
//! contract, session handling, revision fetching, the idempotency gate, the
//! external transform pipeline, publishing and per-title orchestration.
//!
//! # Usage
//! The `lawbot` binary crate supplies a concrete [`contract::WikiApi`]
//! implementation and configuration; everything else lives here.

pub mod config;
pub mod contract;
pub mod error;
pub mod fetch;
pub mod gate;
pub mod pipeline;
pub mod provenance;
pub mod publish;
pub mod session;
pub mod synchronise;
pub mod title;

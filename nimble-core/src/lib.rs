//! Nimble Core
//!
//! Core types shared by the Nimble coordinator client and the training worker.
//!
//! This crate contains:
//! - Domain types: worker identity, task descriptors and the artifact layout
//! - DTOs: request and response bodies exchanged with the coordinator

pub mod domain;
pub mod dto;

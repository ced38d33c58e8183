// SPDX-License-Identifier: Apache-2.0

//! PazPaz core: PHI encryption, RAG retrieval, and payment orchestration for
//! a multi-tenant clinical practice backend.

#![forbid(unsafe_op_in_unsafe_fn)]
#![warn(
    absolute_paths_not_starting_with_crate,
    deprecated_in_future,
    future_incompatible,
    clippy::cargo_common_metadata,
    clippy::future_not_send,
    clippy::missing_errors_doc
)]
#![allow(clippy::enum_glob_use, clippy::enum_variant_names)]

pub mod audit;
pub mod circuit_breaker;
pub mod clients;
pub mod config;
pub mod crypto;
pub mod db;
pub mod error;
pub mod http;
pub mod identity;
pub mod ids;
pub mod kv;
pub mod payments;
pub mod rag;
pub mod ratelimit;
pub mod sessions;
pub mod telemetry;
pub mod time_util;
pub mod vector;
pub mod workspace;
pub mod appointments;
pub mod users;

pub use error::{Error, Result};

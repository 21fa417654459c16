// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Durable Storage Module
//!
//! Persistence for provisioned account records and the audit trail.
//!
//! ## Storage Layout
//!
//! ```text
//! {DATA_DIR}/
//!   accounts.redb        # Embedded ACID account database
//!   audit/
//!     {date}.jsonl       # Daily audit logs
//! ```

pub mod accounts;
pub mod audit;

pub use accounts::{Account, AccountDatabase, AccountStatus, AccountStore, StoreError, StoreResult};
pub use audit::{AuditError, AuditEvent, AuditEventType, AuditSink, JsonlAuditSink};

//! Token presale purchase-recording and stage-accounting engine.
//!
//! This crate validates purchase submissions against a multi-stage pricing
//! schedule, computes referral and promotional bonuses in fixed-point integer
//! arithmetic, and commits each accepted purchase to an append-only receipt
//! ledger as one atomic unit behind a single-writer lock.

#![deny(unsafe_code)]

pub mod access;
pub mod bonus;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod ledger;
pub mod lifecycle;
pub mod stage;
pub mod types;
pub mod validate;

pub use access::{AccessGate, AllowAllGate, Capability, StaticAccessGate};
pub use bonus::{BonusBreakdown, BonusCalculator};
pub use config::PresaleConfig;
pub use engine::PresaleEngine;
pub use error::PresaleError;
pub use event::PresaleEvent;
pub use ledger::{GlobalTotals, PurchaseBook};
pub use lifecycle::LifecycleState;
pub use stage::{Stage, StageCompletion, StageRegistry};
pub use types::{
    AccountId, BasisPoints, PresaleStats, PurchaseOutcome, PurchaseRequest, Receipt, ReferralInfo,
    StageId, StageInfo, TokenAmount, UsdAmount, UserAggregate, UserStats, BPS_DENOMINATOR,
    TOKEN_UNIT, USD_UNIT,
};
pub use validate::{PurchaseValidator, ValidatedPurchase};

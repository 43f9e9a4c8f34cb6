use crate::access::{AccessGate, Capability};
use crate::bonus::BonusCalculator;
use crate::config::PresaleConfig;
use crate::error::PresaleError;
use crate::event::PresaleEvent;
use crate::ledger::{commit_purchase, GlobalTotals, PurchaseBook};
use crate::lifecycle::LifecycleState;
use crate::stage::StageRegistry;
use crate::types::{
    AccountId, BasisPoints, PresaleStats, PurchaseOutcome, PurchaseRequest, Receipt,
    ReferralInfo, StageId, StageInfo, TokenAmount, UsdAmount, UserStats,
};
use crate::validate::PurchaseValidator;
use chrono::Utc;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{info, warn};

struct LedgerState {
    stages: StageRegistry,
    book: PurchaseBook,
    totals: GlobalTotals,
    lifecycle: LifecycleState,
}

/// Single-writer presale engine.
///
/// Every mutating operation holds the write half of one ledger lock for
/// its whole validate-and-commit span, so mutations are totally ordered
/// and can never observe or produce a partially applied write. Queries
/// share the read half and return snapshots of committed state.
pub struct PresaleEngine {
    config: PresaleConfig,
    bonus: BonusCalculator,
    gate: Arc<dyn AccessGate>,
    state: RwLock<LedgerState>,
}

impl PresaleEngine {
    pub fn new(config: PresaleConfig, gate: Arc<dyn AccessGate>) -> Self {
        let bonus = BonusCalculator::new(&config);
        let state = LedgerState {
            stages: StageRegistry::default(),
            book: PurchaseBook::default(),
            totals: GlobalTotals::new(config.default_max_promo_bps),
            lifecycle: LifecycleState::default(),
        };
        Self {
            config,
            bonus,
            gate,
            state: RwLock::new(state),
        }
    }

    pub fn config(&self) -> &PresaleConfig {
        &self.config
    }

    fn read_state(&self) -> Result<RwLockReadGuard<'_, LedgerState>, PresaleError> {
        self.state
            .read()
            .map_err(|_| PresaleError::Internal("ledger lock poisoned".to_string()))
    }

    fn write_state(&self) -> Result<RwLockWriteGuard<'_, LedgerState>, PresaleError> {
        self.state
            .write()
            .map_err(|_| PresaleError::Internal("ledger lock poisoned".to_string()))
    }

    fn authorize(&self, actor: &AccountId, capability: Capability) -> Result<(), PresaleError> {
        if !self.gate.allows(actor, capability) {
            warn!(actor = %actor, capability = %capability, "operation rejected by access gate");
            return Err(PresaleError::Unauthorized(capability));
        }
        Ok(())
    }

    fn record(
        &self,
        actor: &AccountId,
        request: PurchaseRequest,
    ) -> Result<PurchaseOutcome, PresaleError> {
        self.authorize(actor, Capability::Recorder)?;
        let mut guard = self.write_state()?;
        let state = &mut *guard;
        let validated = PurchaseValidator::new(&self.config, &self.bonus)
            .validate(&state.lifecycle, &state.stages, &state.totals, &request)
            .map_err(|err| {
                warn!(buyer = %request.buyer, usd = request.usd, error = %err, "purchase rejected");
                err
            })?;
        let outcome = commit_purchase(
            &mut state.book,
            &mut state.totals,
            &mut state.stages,
            validated,
            Utc::now(),
        )?;
        info!(
            buyer = %outcome.buyer,
            stage_id = outcome.stage_id,
            usd = request.usd,
            receipts = outcome.receipts.len(),
            new_buyer = outcome.new_buyer,
            "purchase recorded"
        );
        Ok(outcome)
    }

    pub fn record_purchase(
        &self,
        actor: &AccountId,
        buyer: AccountId,
        usd: UsdAmount,
        tokens: TokenAmount,
    ) -> Result<PurchaseOutcome, PresaleError> {
        self.record(
            actor,
            PurchaseRequest {
                buyer,
                usd,
                tokens,
                referrer: None,
                promo_bps: None,
            },
        )
    }

    pub fn record_purchase_with_referral(
        &self,
        actor: &AccountId,
        buyer: AccountId,
        usd: UsdAmount,
        tokens: TokenAmount,
        referrer: AccountId,
    ) -> Result<PurchaseOutcome, PresaleError> {
        self.record(
            actor,
            PurchaseRequest {
                buyer,
                usd,
                tokens,
                referrer: Some(referrer),
                promo_bps: None,
            },
        )
    }

    pub fn record_purchase_with_promo(
        &self,
        actor: &AccountId,
        buyer: AccountId,
        usd: UsdAmount,
        tokens: TokenAmount,
        promo_bps: BasisPoints,
    ) -> Result<PurchaseOutcome, PresaleError> {
        self.record(
            actor,
            PurchaseRequest {
                buyer,
                usd,
                tokens,
                referrer: None,
                promo_bps: Some(promo_bps),
            },
        )
    }

    pub fn record_purchase_with_promo_and_referral(
        &self,
        actor: &AccountId,
        buyer: AccountId,
        usd: UsdAmount,
        tokens: TokenAmount,
        promo_bps: BasisPoints,
        referrer: AccountId,
    ) -> Result<PurchaseOutcome, PresaleError> {
        self.record(
            actor,
            PurchaseRequest {
                buyer,
                usd,
                tokens,
                referrer: Some(referrer),
                promo_bps: Some(promo_bps),
            },
        )
    }

    /// Writes a stage snapshot. Allowed after finalization so the
    /// schedule can be corrected for audit purposes, recording against
    /// it still requires an open presale.
    pub fn configure_stage(
        &self,
        actor: &AccountId,
        stage_id: StageId,
        price_per_token: UsdAmount,
        tokens_allocated: TokenAmount,
        usd_target: UsdAmount,
    ) -> Result<Vec<PresaleEvent>, PresaleError> {
        self.authorize(actor, Capability::StageManager)?;
        let mut guard = self.write_state()?;
        guard.stages.configure(
            &self.config,
            stage_id,
            price_per_token,
            tokens_allocated,
            usd_target,
        )?;
        info!(stage_id, price_per_token, usd_target, "stage configured");
        Ok(vec![PresaleEvent::StageConfigured {
            stage_id,
            price_per_token,
            tokens_allocated,
            usd_target,
        }])
    }

    pub fn activate_stage(
        &self,
        actor: &AccountId,
        stage_id: StageId,
    ) -> Result<Vec<PresaleEvent>, PresaleError> {
        self.authorize(actor, Capability::StageManager)?;
        let mut guard = self.write_state()?;
        if guard.lifecycle.finalized {
            return Err(PresaleError::PresaleFinalised);
        }
        let deactivated = guard.stages.activate(&self.config, stage_id)?;
        info!(stage_id, ?deactivated, "stage activated");
        Ok(vec![PresaleEvent::StageActivated {
            stage_id,
            deactivated,
        }])
    }

    pub fn pause(&self, actor: &AccountId) -> Result<Vec<PresaleEvent>, PresaleError> {
        self.authorize(actor, Capability::Admin)?;
        self.write_state()?.lifecycle.pause()?;
        info!("presale paused");
        Ok(vec![PresaleEvent::PresalePaused])
    }

    pub fn unpause(&self, actor: &AccountId) -> Result<Vec<PresaleEvent>, PresaleError> {
        self.authorize(actor, Capability::Admin)?;
        self.write_state()?.lifecycle.unpause()?;
        info!("presale unpaused");
        Ok(vec![PresaleEvent::PresaleUnpaused])
    }

    /// One-way close. Forces the paused flag on and pins both flags.
    pub fn finalize(&self, actor: &AccountId) -> Result<Vec<PresaleEvent>, PresaleError> {
        self.authorize(actor, Capability::Finalizer)?;
        let mut guard = self.write_state()?;
        guard.lifecycle.finalize()?;
        let totals = guard.totals;
        info!(
            total_usd = totals.total_usd,
            unique_buyers = totals.unique_buyer_count,
            "presale finalised"
        );
        Ok(vec![PresaleEvent::PresaleFinalised {
            total_usd: totals.total_usd,
            total_tokens: totals.total_tokens,
        }])
    }

    /// Adjusts the promo ceiling. 10000 bps (100%) is the hard upper
    /// bound; 0 disables promo purchases entirely.
    pub fn set_max_promo_bps(
        &self,
        actor: &AccountId,
        new_cap: BasisPoints,
    ) -> Result<Vec<PresaleEvent>, PresaleError> {
        self.authorize(actor, Capability::Admin)?;
        if new_cap > 10_000 {
            return Err(PresaleError::InvalidPromoBps {
                bps: new_cap,
                max_bps: 10_000,
            });
        }
        let mut guard = self.write_state()?;
        let previous = guard.totals.max_promo_bps;
        guard.totals.max_promo_bps = new_cap;
        info!(previous, current = new_cap, "promo ceiling updated");
        Ok(vec![PresaleEvent::MaxPromoBpsUpdated {
            previous,
            current: new_cap,
        }])
    }

    pub fn stage_info(&self, stage_id: StageId) -> Result<Option<StageInfo>, PresaleError> {
        Ok(self.read_state()?.stages.info(stage_id))
    }

    pub fn current_stage_info(&self) -> Result<Option<StageInfo>, PresaleError> {
        Ok(self.read_state()?.stages.current_info())
    }

    pub fn user_stats(&self, account: &AccountId) -> Result<UserStats, PresaleError> {
        Ok(self.read_state()?.book.user_stats(account))
    }

    pub fn receipt_count(&self, account: &AccountId) -> Result<usize, PresaleError> {
        Ok(self.read_state()?.book.receipt_count(account))
    }

    pub fn receipts_paginated(
        &self,
        account: &AccountId,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Receipt>, PresaleError> {
        Ok(self.read_state()?.book.receipts_page(account, offset, limit))
    }

    pub fn referral_info(&self, account: &AccountId) -> Result<ReferralInfo, PresaleError> {
        Ok(self.read_state()?.book.referral_info(account))
    }

    pub fn presale_stats(&self) -> Result<PresaleStats, PresaleError> {
        let state = self.read_state()?;
        Ok(PresaleStats {
            total_usd: state.totals.total_usd,
            total_tokens: state.totals.total_tokens,
            unique_buyer_count: state.totals.unique_buyer_count,
            current_stage: state.stages.current_id(),
            finalized: state.lifecycle.finalized,
            paused: state.lifecycle.paused,
            max_promo_bps: state.totals.max_promo_bps,
        })
    }
}

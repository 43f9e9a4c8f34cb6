use crate::bonus::{BonusBreakdown, BonusCalculator};
use crate::config::PresaleConfig;
use crate::error::PresaleError;
use crate::ledger::GlobalTotals;
use crate::lifecycle::LifecycleState;
use crate::stage::StageRegistry;
use crate::types::{
    AccountId, BasisPoints, PurchaseRequest, StageId, TokenAmount, UsdAmount, TOKEN_UNIT,
};

/// A purchase that has passed every precondition, carrying the token
/// projections the commit step applies verbatim.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedPurchase {
    pub(crate) buyer: AccountId,
    pub(crate) usd: UsdAmount,
    pub(crate) stage_id: StageId,
    pub(crate) breakdown: BonusBreakdown,
    pub(crate) buyer_tokens: TokenAmount,
    pub(crate) required_tokens: TokenAmount,
    pub(crate) referrer_arg: Option<AccountId>,
    pub(crate) promo_bps: Option<BasisPoints>,
}

/// Stateless precondition pipeline. Checks run in a fixed order and the
/// first violation aborts the call, so error precedence is part of the
/// public contract.
pub struct PurchaseValidator<'a> {
    config: &'a PresaleConfig,
    bonus: &'a BonusCalculator,
}

impl<'a> PurchaseValidator<'a> {
    pub fn new(config: &'a PresaleConfig, bonus: &'a BonusCalculator) -> Self {
        Self { config, bonus }
    }

    /// Checks, in order: address, amounts, per-purchase cap, global USD
    /// cap, lifecycle and stage activation, stage token capacity, price
    /// consistency, stage USD soft target, global token cap, referral
    /// arguments, promo range. Bonus projections use the supplied promo
    /// basis points even though their range check runs last.
    pub fn validate(
        &self,
        lifecycle: &LifecycleState,
        registry: &StageRegistry,
        totals: &GlobalTotals,
        request: &PurchaseRequest,
    ) -> Result<ValidatedPurchase, PresaleError> {
        if request.buyer.is_null() {
            return Err(PresaleError::InvalidAddress);
        }
        if request.usd == 0 || request.tokens == 0 {
            return Err(PresaleError::InvalidAmount);
        }
        if request.usd > self.config.max_purchase_usd {
            return Err(PresaleError::ExceedsMaxPurchase {
                requested: request.usd,
                limit: self.config.max_purchase_usd,
            });
        }
        let projected_usd = totals
            .total_usd
            .checked_add(request.usd)
            .ok_or(PresaleError::Overflow("total usd"))?;
        if projected_usd > self.config.max_total_usd {
            return Err(PresaleError::ExceedsTotalLimit {
                projected: projected_usd,
                cap: self.config.max_total_usd,
            });
        }

        lifecycle.ensure_recording_open()?;
        let (stage_id, stage) = registry
            .current_active()
            .ok_or(PresaleError::StageNotActive)?;

        let breakdown = self.bonus.breakdown(
            request.tokens,
            request.promo_bps,
            request.referrer.is_some(),
        )?;
        let buyer_tokens = breakdown.buyer_total()?;
        let required_tokens = breakdown.required_tokens()?;

        if stage.tokens_allocated > 0 {
            let projected_sold = stage
                .tokens_sold
                .checked_add(required_tokens)
                .ok_or(PresaleError::Overflow("stage tokens"))?;
            if projected_sold > stage.tokens_allocated {
                return Err(PresaleError::InsufficientStageTokens {
                    stage_id,
                    required: required_tokens,
                    available: stage.tokens_allocated - stage.tokens_sold,
                });
            }
        }

        let expected = price_implied_usd(request.tokens, stage.price_per_token)?;
        if request.usd.abs_diff(expected) > self.config.price_tolerance_usd {
            return Err(PresaleError::PriceMismatch {
                usd: request.usd,
                expected,
                tolerance: self.config.price_tolerance_usd,
            });
        }

        let projected_raised = stage
            .usd_raised
            .checked_add(request.usd)
            .ok_or(PresaleError::Overflow("stage usd"))?;
        if projected_raised > stage.usd_target.saturating_add(self.config.price_tolerance_usd) {
            return Err(PresaleError::StageUsdOverTarget {
                stage_id,
                raised: stage.usd_raised,
                incoming: request.usd,
                target: stage.usd_target,
            });
        }

        let projected_tokens = totals
            .total_tokens
            .checked_add(required_tokens)
            .ok_or(PresaleError::Overflow("presale tokens"))?;
        if projected_tokens > self.config.presale_token_cap {
            return Err(PresaleError::PresaleTokenCapExceeded {
                projected: projected_tokens,
                cap: self.config.presale_token_cap,
            });
        }

        if let Some(referrer) = &request.referrer {
            if referrer.is_null() {
                return Err(PresaleError::InvalidReferrer);
            }
            if *referrer == request.buyer {
                return Err(PresaleError::SelfReferral);
            }
        }

        if let Some(bps) = request.promo_bps {
            if bps == 0 || bps > totals.max_promo_bps {
                return Err(PresaleError::InvalidPromoBps {
                    bps,
                    max_bps: totals.max_promo_bps,
                });
            }
        }

        Ok(ValidatedPurchase {
            buyer: request.buyer.clone(),
            usd: request.usd,
            stage_id,
            breakdown,
            buyer_tokens,
            required_tokens,
            referrer_arg: request.referrer.clone(),
            promo_bps: request.promo_bps,
        })
    }
}

/// USD amount the active price implies for `tokens`, floor-rounded to
/// the 6-decimal USD scale.
fn price_implied_usd(tokens: TokenAmount, price: UsdAmount) -> Result<UsdAmount, PresaleError> {
    let wide = tokens
        .checked_mul(u128::from(price))
        .ok_or(PresaleError::Overflow("price implied usd"))?
        / TOKEN_UNIT;
    u64::try_from(wide).map_err(|_| PresaleError::Overflow("price implied usd"))
}

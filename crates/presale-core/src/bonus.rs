use crate::config::PresaleConfig;
use crate::error::PresaleError;
use crate::types::{BasisPoints, TokenAmount, BPS_DENOMINATOR};

/// Token amounts produced by one purchase, split by destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BonusBreakdown {
    pub base: TokenAmount,
    pub promo: TokenAmount,
    pub referee: TokenAmount,
    pub referrer: TokenAmount,
}

impl BonusBreakdown {
    /// Everything credited to the buyer.
    pub fn buyer_total(&self) -> Result<TokenAmount, PresaleError> {
        self.base
            .checked_add(self.promo)
            .and_then(|total| total.checked_add(self.referee))
            .ok_or(PresaleError::Overflow("buyer token total"))
    }

    /// Stage and global consumption: buyer total plus the referrer side.
    pub fn required_tokens(&self) -> Result<TokenAmount, PresaleError> {
        self.buyer_total()?
            .checked_add(self.referrer)
            .ok_or(PresaleError::Overflow("required token total"))
    }
}

/// Pure basis-points arithmetic for referral and promo bonuses. Wide
/// multiply, floor division, no state.
#[derive(Debug, Clone, Copy)]
pub struct BonusCalculator {
    referrer_bps: BasisPoints,
    referee_bps: BasisPoints,
}

impl BonusCalculator {
    pub fn new(config: &PresaleConfig) -> Self {
        Self {
            referrer_bps: config.referrer_bonus_bps,
            referee_bps: config.referee_bonus_bps,
        }
    }

    /// Referrer-side share of a purchase.
    pub fn referral_bonus(&self, tokens: TokenAmount) -> Result<TokenAmount, PresaleError> {
        bps_share(tokens, self.referrer_bps)
    }

    /// Referee-side share of a purchase.
    pub fn referee_bonus(&self, tokens: TokenAmount) -> Result<TokenAmount, PresaleError> {
        bps_share(tokens, self.referee_bps)
    }

    /// Promo share at the caller-supplied rate.
    pub fn promo_bonus(
        &self,
        tokens: TokenAmount,
        promo_bps: BasisPoints,
    ) -> Result<TokenAmount, PresaleError> {
        bps_share(tokens, promo_bps)
    }

    /// Full split for one purchase: optional promo, optional referral.
    pub fn breakdown(
        &self,
        tokens: TokenAmount,
        promo_bps: Option<BasisPoints>,
        with_referral: bool,
    ) -> Result<BonusBreakdown, PresaleError> {
        let promo = match promo_bps {
            Some(bps) => self.promo_bonus(tokens, bps)?,
            None => 0,
        };
        let (referee, referrer) = if with_referral {
            (self.referee_bonus(tokens)?, self.referral_bonus(tokens)?)
        } else {
            (0, 0)
        };
        Ok(BonusBreakdown {
            base: tokens,
            promo,
            referee,
            referrer,
        })
    }
}

fn bps_share(tokens: TokenAmount, bps: BasisPoints) -> Result<TokenAmount, PresaleError> {
    tokens
        .checked_mul(u128::from(bps))
        .map(|wide| wide / BPS_DENOMINATOR)
        .ok_or(PresaleError::Overflow("bps share"))
}

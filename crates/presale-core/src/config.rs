use crate::types::{BasisPoints, StageId, TokenAmount, UsdAmount, TOKEN_UNIT, USD_UNIT};

/// Hard limits and bonus rates enforced by the engine. Stage-level
/// targets live on the stages themselves; everything here is global.
#[derive(Debug, Clone)]
pub struct PresaleConfig {
    /// Highest configurable stage id; ids run 1..=max_stages.
    pub max_stages: StageId,
    /// Per-purchase USD ceiling (micro-USD).
    pub max_purchase_usd: UsdAmount,
    /// Hard cap on cumulative base USD (micro-USD).
    pub max_total_usd: UsdAmount,
    /// Ceiling on tokens allocated across all stages, bonuses included.
    pub presale_token_cap: TokenAmount,
    /// Absolute price-consistency tolerance (micro-USD).
    pub price_tolerance_usd: UsdAmount,
    /// Referrer-side bonus rate.
    pub referrer_bonus_bps: BasisPoints,
    /// Referee-side bonus rate.
    pub referee_bonus_bps: BasisPoints,
    /// Starting ceiling for per-purchase promo rates.
    pub default_max_promo_bps: BasisPoints,
}

impl Default for PresaleConfig {
    fn default() -> Self {
        Self {
            max_stages: 10,
            // $50,000 per recorded purchase.
            max_purchase_usd: 50_000 * USD_UNIT,
            // $10,000,000 across the whole presale.
            max_total_usd: 10_000_000 * USD_UNIT,
            // One billion whole tokens.
            presale_token_cap: 1_000_000_000 * TOKEN_UNIT,
            // One dollar.
            price_tolerance_usd: USD_UNIT,
            referrer_bonus_bps: 700,
            referee_bonus_bps: 500,
            default_max_promo_bps: 5_000,
        }
    }
}

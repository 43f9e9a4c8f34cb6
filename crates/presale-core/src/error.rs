use crate::access::Capability;
use crate::types::{BasisPoints, StageId, TokenAmount, UsdAmount};
use thiserror::Error;

/// Typed outcomes of failed engine operations. Every variant is a
/// synchronous validation result; a failing operation leaves no side
/// effects behind.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PresaleError {
    #[error("Buyer or beneficiary is the null address")]
    InvalidAddress,

    #[error("Usd and token amounts must both be positive")]
    InvalidAmount,

    #[error("Promo bps {bps} outside (0, {max_bps}]")]
    InvalidPromoBps { bps: BasisPoints, max_bps: BasisPoints },

    #[error("Stage price must be positive")]
    InvalidPrice,

    #[error("Stage usd target must be positive")]
    InvalidUsdTarget,

    #[error("Purchase of {requested} micro-usd exceeds the per-purchase limit {limit}")]
    ExceedsMaxPurchase { requested: UsdAmount, limit: UsdAmount },

    #[error("Purchase would lift total usd to {projected}, above the hard cap {cap}")]
    ExceedsTotalLimit { projected: UsdAmount, cap: UsdAmount },

    #[error("Stage {stage_id} has {available} token units left, {required} required")]
    InsufficientStageTokens {
        stage_id: StageId,
        required: TokenAmount,
        available: TokenAmount,
    },

    #[error("Purchase would lift total tokens to {projected}, above the presale cap {cap}")]
    PresaleTokenCapExceeded { projected: TokenAmount, cap: TokenAmount },

    #[error("Stage {stage_id} usd target exceeded: raised {raised} plus incoming {incoming} is past target {target}")]
    StageUsdOverTarget {
        stage_id: StageId,
        raised: UsdAmount,
        incoming: UsdAmount,
        target: UsdAmount,
    },

    #[error("Usd {usd} does not match the price-implied {expected} within tolerance {tolerance}")]
    PriceMismatch {
        usd: UsdAmount,
        expected: UsdAmount,
        tolerance: UsdAmount,
    },

    #[error("Referrer is the null address")]
    InvalidReferrer,

    #[error("Buyer cannot refer themselves")]
    SelfReferral,

    #[error("Stage id {0} outside the configurable range")]
    InvalidStage(StageId),

    #[error("No active stage accepts purchases")]
    StageNotActive,

    #[error("Stage {0} is already active")]
    StageAlreadyActive(StageId),

    #[error("Stage {0} has recorded sales and cannot be reconfigured")]
    StageAlreadyUsed(StageId),

    #[error("Presale is finalized")]
    PresaleFinalised,

    #[error("Presale is paused")]
    PresalePaused,

    #[error("Caller lacks the {0} capability")]
    Unauthorized(Capability),

    #[error("Arithmetic overflow computing {0}")]
    Overflow(&'static str),

    #[error("Internal engine error: {0}")]
    Internal(String),
}

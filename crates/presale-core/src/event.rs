use crate::types::{AccountId, BasisPoints, StageId, TokenAmount, UsdAmount};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Domain events returned, in causal order, from every mutating
/// operation. The engine never broadcasts; callers forward or index the
/// returned list.
///
/// Purchase operations emit `ReferrerSet` (first binding only), then
/// `PurchaseRecorded`, then `PromoUsed` and/or `ReferralBonusAwarded`,
/// then `StageProgress`, then `StageCompleted` on a threshold crossing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresaleEvent {
    ReferrerSet {
        buyer: AccountId,
        referrer: AccountId,
    },
    PurchaseRecorded {
        buyer: AccountId,
        stage_id: StageId,
        usd: UsdAmount,
        tokens: TokenAmount,
        new_buyer: bool,
        timestamp: DateTime<Utc>,
    },
    PromoUsed {
        buyer: AccountId,
        promo_bps: BasisPoints,
        bonus_tokens: TokenAmount,
    },
    ReferralBonusAwarded {
        buyer: AccountId,
        referrer: AccountId,
        referee_tokens: TokenAmount,
        referrer_tokens: TokenAmount,
    },
    StageProgress {
        stage_id: StageId,
        tokens_sold: TokenAmount,
        tokens_allocated: TokenAmount,
        usd_raised: UsdAmount,
        usd_target: UsdAmount,
    },
    StageCompleted {
        stage_id: StageId,
        usd_target_reached: bool,
        token_cap_reached: bool,
    },
    StageConfigured {
        stage_id: StageId,
        price_per_token: UsdAmount,
        tokens_allocated: TokenAmount,
        usd_target: UsdAmount,
    },
    StageActivated {
        stage_id: StageId,
        deactivated: Option<StageId>,
    },
    PresalePaused,
    PresaleUnpaused,
    PresaleFinalised {
        total_usd: UsdAmount,
        total_tokens: TokenAmount,
    },
    MaxPromoBpsUpdated {
        previous: BasisPoints,
        current: BasisPoints,
    },
}

use crate::error::PresaleError;
use crate::event::PresaleEvent;
use crate::stage::StageRegistry;
use crate::types::{
    AccountId, BasisPoints, PurchaseOutcome, Receipt, ReferralInfo, TokenAmount, UsdAmount,
    UserAggregate, UserStats,
};
use crate::validate::ValidatedPurchase;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Append-only receipt history plus the per-account aggregates derived
/// from it.
#[derive(Debug, Default)]
pub struct PurchaseBook {
    receipts: HashMap<AccountId, Vec<Receipt>>,
    aggregates: HashMap<AccountId, UserAggregate>,
    referrals: HashMap<AccountId, ReferralInfo>,
    promo_usage: HashMap<AccountId, TokenAmount>,
}

impl PurchaseBook {
    pub fn receipt_count(&self, account: &AccountId) -> usize {
        self.receipts.get(account).map_or(0, Vec::len)
    }

    /// A stable slice of the account's receipt history. Receipts are
    /// only ever appended, so a page never shifts under the reader.
    pub fn receipts_page(&self, account: &AccountId, offset: usize, limit: usize) -> Vec<Receipt> {
        self.receipts
            .get(account)
            .map(|all| all.iter().skip(offset).take(limit).cloned().collect())
            .unwrap_or_default()
    }

    pub fn referral_info(&self, account: &AccountId) -> ReferralInfo {
        self.referrals.get(account).cloned().unwrap_or_default()
    }

    pub fn promo_tokens(&self, account: &AccountId) -> TokenAmount {
        self.promo_usage.get(account).copied().unwrap_or(0)
    }

    pub fn user_stats(&self, account: &AccountId) -> UserStats {
        let aggregate = self.aggregates.get(account).copied().unwrap_or_default();
        UserStats {
            account: account.clone(),
            usd_spent: aggregate.usd_spent,
            tokens_allocated: aggregate.tokens_allocated,
            receipt_count: self.receipt_count(account),
            promo_tokens: self.promo_tokens(account),
        }
    }

    fn append(&mut self, account: &AccountId, receipt: Receipt) {
        self.receipts.entry(account.clone()).or_default().push(receipt);
    }
}

/// Presale-wide counters and the adjustable promo ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalTotals {
    /// Base USD only; bonus receipts carry no USD.
    pub total_usd: UsdAmount,
    /// Includes every bonus token minted alongside purchases.
    pub total_tokens: TokenAmount,
    pub unique_buyer_count: u64,
    pub max_promo_bps: BasisPoints,
}

impl GlobalTotals {
    pub fn new(max_promo_bps: BasisPoints) -> Self {
        Self {
            total_usd: 0,
            total_tokens: 0,
            unique_buyer_count: 0,
            max_promo_bps,
        }
    }
}

/// Applies a validated purchase to the ledger as one unit. The stage
/// lookup is the only fallible step and runs before any other mutation,
/// so a failure leaves no partial write behind.
pub(crate) fn commit_purchase(
    book: &mut PurchaseBook,
    totals: &mut GlobalTotals,
    registry: &mut StageRegistry,
    validated: ValidatedPurchase,
    now: DateTime<Utc>,
) -> Result<PurchaseOutcome, PresaleError> {
    let ValidatedPurchase {
        buyer,
        usd,
        stage_id,
        breakdown,
        buyer_tokens,
        required_tokens,
        referrer_arg,
        promo_bps,
    } = validated;

    let (stage_after, completion) = registry
        .record_sale(stage_id, required_tokens, usd)
        .ok_or_else(|| {
            PresaleError::Internal(format!("active stage {stage_id} vanished mid-commit"))
        })?;

    // Additions below stay in range: every projection was bounded during
    // validation and per-account totals never exceed the global ones.
    let mut events = Vec::new();
    let mut receipts = Vec::new();

    let new_buyer = book.receipt_count(&buyer) == 0;

    // A stored referrer wins over the argument; the first referred
    // purchase binds it for good.
    let referrer = match referrer_arg {
        Some(arg) => {
            let info = book.referrals.entry(buyer.clone()).or_default();
            let bound_now = info.referrer.is_none();
            if bound_now {
                info.referrer = Some(arg);
            }
            let beneficiary = info.referrer.clone();
            if bound_now {
                if let Some(referrer) = &beneficiary {
                    book.referrals
                        .entry(referrer.clone())
                        .or_default()
                        .referral_count += 1;
                    events.push(PresaleEvent::ReferrerSet {
                        buyer: buyer.clone(),
                        referrer: referrer.clone(),
                    });
                }
            }
            beneficiary
        }
        None => None,
    };

    events.push(PresaleEvent::PurchaseRecorded {
        buyer: buyer.clone(),
        stage_id,
        usd,
        tokens: breakdown.base,
        new_buyer,
        timestamp: now,
    });

    let base_receipt = Receipt {
        usd,
        tokens: breakdown.base,
        timestamp: now,
        stage_id,
        is_bonus: false,
    };
    book.append(&buyer, base_receipt.clone());
    receipts.push(base_receipt);

    if let Some(bps) = promo_bps {
        let promo_receipt = Receipt {
            usd: 0,
            tokens: breakdown.promo,
            timestamp: now,
            stage_id,
            is_bonus: true,
        };
        book.append(&buyer, promo_receipt.clone());
        receipts.push(promo_receipt);
        *book.promo_usage.entry(buyer.clone()).or_default() += breakdown.promo;
        events.push(PresaleEvent::PromoUsed {
            buyer: buyer.clone(),
            promo_bps: bps,
            bonus_tokens: breakdown.promo,
        });
    }

    if let Some(referrer) = &referrer {
        let referee_receipt = Receipt {
            usd: 0,
            tokens: breakdown.referee,
            timestamp: now,
            stage_id,
            is_bonus: true,
        };
        book.append(&buyer, referee_receipt.clone());
        receipts.push(referee_receipt);

        let referrer_receipt = Receipt {
            usd: 0,
            tokens: breakdown.referrer,
            timestamp: now,
            stage_id,
            is_bonus: true,
        };
        book.append(referrer, referrer_receipt.clone());
        receipts.push(referrer_receipt);

        book.referrals
            .entry(buyer.clone())
            .or_default()
            .bonus_earned_as_referee += breakdown.referee;
        book.referrals
            .entry(referrer.clone())
            .or_default()
            .bonus_earned_as_referrer += breakdown.referrer;
        book.aggregates
            .entry(referrer.clone())
            .or_default()
            .tokens_allocated += breakdown.referrer;

        events.push(PresaleEvent::ReferralBonusAwarded {
            buyer: buyer.clone(),
            referrer: referrer.clone(),
            referee_tokens: breakdown.referee,
            referrer_tokens: breakdown.referrer,
        });
    }

    let aggregate = book.aggregates.entry(buyer.clone()).or_default();
    aggregate.usd_spent += usd;
    aggregate.tokens_allocated += buyer_tokens;

    totals.total_usd += usd;
    totals.total_tokens += required_tokens;
    if new_buyer {
        totals.unique_buyer_count += 1;
    }

    events.push(PresaleEvent::StageProgress {
        stage_id,
        tokens_sold: stage_after.tokens_sold,
        tokens_allocated: stage_after.tokens_allocated,
        usd_raised: stage_after.usd_raised,
        usd_target: stage_after.usd_target,
    });
    if let Some(completion) = completion {
        events.push(PresaleEvent::StageCompleted {
            stage_id,
            usd_target_reached: completion.usd_target_reached,
            token_cap_reached: completion.token_cap_reached,
        });
    }

    Ok(PurchaseOutcome {
        buyer,
        stage_id,
        new_buyer,
        receipts,
        events,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bonus::BonusCalculator;
    use crate::config::PresaleConfig;
    use crate::lifecycle::LifecycleState;
    use crate::types::{PurchaseRequest, TOKEN_UNIT, USD_UNIT};
    use crate::validate::PurchaseValidator;

    struct Harness {
        config: PresaleConfig,
        registry: StageRegistry,
        book: PurchaseBook,
        totals: GlobalTotals,
    }

    impl Harness {
        fn new() -> Self {
            let config = PresaleConfig::default();
            let mut registry = StageRegistry::default();
            registry
                .configure(&config, 1, 270, 200_000_000 * TOKEN_UNIT, 54_000 * USD_UNIT)
                .unwrap();
            registry.activate(&config, 1).unwrap();
            let totals = GlobalTotals::new(config.default_max_promo_bps);
            Self {
                config,
                registry,
                book: PurchaseBook::default(),
                totals,
            }
        }

        fn record(&mut self, request: PurchaseRequest) -> PurchaseOutcome {
            self.try_record(request).unwrap()
        }

        fn try_record(&mut self, request: PurchaseRequest) -> Result<PurchaseOutcome, PresaleError> {
            let bonus = BonusCalculator::new(&self.config);
            let validated = PurchaseValidator::new(&self.config, &bonus).validate(
                &LifecycleState::default(),
                &self.registry,
                &self.totals,
                &request,
            )?;
            commit_purchase(
                &mut self.book,
                &mut self.totals,
                &mut self.registry,
                validated,
                Utc::now(),
            )
        }
    }

    fn buyer() -> AccountId {
        AccountId::from("buyer-1")
    }

    fn referrer() -> AccountId {
        AccountId::from("ref-1")
    }

    fn tokens_for(usd: UsdAmount) -> TokenAmount {
        u128::from(usd) * TOKEN_UNIT / 270
    }

    fn plain(usd_dollars: u64) -> PurchaseRequest {
        PurchaseRequest {
            buyer: buyer(),
            usd: usd_dollars * USD_UNIT,
            tokens: tokens_for(usd_dollars * USD_UNIT),
            referrer: None,
            promo_bps: None,
        }
    }

    #[test]
    fn base_purchase_writes_one_receipt_and_all_counters() {
        let mut harness = Harness::new();
        let outcome = harness.record(plain(27));

        assert!(outcome.new_buyer);
        assert_eq!(outcome.receipts.len(), 1);
        assert_eq!(outcome.receipts[0].usd, 27 * USD_UNIT);
        assert_eq!(outcome.receipts[0].tokens, 100_000 * TOKEN_UNIT);
        assert!(!outcome.receipts[0].is_bonus);

        assert_eq!(harness.totals.total_usd, 27 * USD_UNIT);
        assert_eq!(harness.totals.total_tokens, 100_000 * TOKEN_UNIT);
        assert_eq!(harness.totals.unique_buyer_count, 1);

        let stage = *harness.registry.get(1).unwrap();
        assert_eq!(stage.usd_raised, 27 * USD_UNIT);
        assert_eq!(stage.tokens_sold, 100_000 * TOKEN_UNIT);

        let stats = harness.book.user_stats(&buyer());
        assert_eq!(stats.usd_spent, 27 * USD_UNIT);
        assert_eq!(stats.tokens_allocated, 100_000 * TOKEN_UNIT);
        assert_eq!(stats.receipt_count, 1);
    }

    #[test]
    fn referral_awards_both_sides_and_consumes_112_percent() {
        let mut harness = Harness::new();
        let base = tokens_for(100 * USD_UNIT);
        let mut request = plain(100);
        request.referrer = Some(referrer());
        let outcome = harness.record(request);

        let referee_bonus = base * 500 / 10_000;
        let referrer_bonus = base * 700 / 10_000;
        assert_eq!(outcome.receipts.len(), 3);
        assert_eq!(outcome.receipts[1].tokens, referee_bonus);
        assert_eq!(outcome.receipts[2].tokens, referrer_bonus);
        assert!(outcome.receipts[1].is_bonus && outcome.receipts[2].is_bonus);

        let stage = *harness.registry.get(1).unwrap();
        assert_eq!(stage.tokens_sold, base + referee_bonus + referrer_bonus);
        assert_eq!(stage.usd_raised, 100 * USD_UNIT);

        let buyer_stats = harness.book.user_stats(&buyer());
        assert_eq!(buyer_stats.tokens_allocated, base + referee_bonus);

        let referrer_stats = harness.book.user_stats(&referrer());
        assert_eq!(referrer_stats.usd_spent, 0);
        assert_eq!(referrer_stats.tokens_allocated, referrer_bonus);
        assert_eq!(referrer_stats.receipt_count, 1);

        let info = harness.book.referral_info(&buyer());
        assert_eq!(info.referrer, Some(referrer()));
        assert_eq!(info.bonus_earned_as_referee, referee_bonus);
        let referrer_info = harness.book.referral_info(&referrer());
        assert_eq!(referrer_info.referral_count, 1);
        assert_eq!(referrer_info.bonus_earned_as_referrer, referrer_bonus);
    }

    #[test]
    fn stored_referrer_wins_over_a_later_argument() {
        let mut harness = Harness::new();
        let mut first = plain(27);
        first.referrer = Some(referrer());
        harness.record(first);

        let other = AccountId::from("ref-2");
        let mut second = plain(27);
        second.referrer = Some(other.clone());
        let outcome = harness.record(second);

        // Bonus still flows to the first referrer, no rebinding event.
        assert!(outcome
            .events
            .iter()
            .all(|event| !matches!(event, PresaleEvent::ReferrerSet { .. })));
        assert_eq!(harness.book.referral_info(&buyer()).referrer, Some(referrer()));
        assert_eq!(harness.book.referral_info(&other).referral_count, 0);
        assert_eq!(harness.book.user_stats(&other).receipt_count, 0);
        assert_eq!(harness.book.user_stats(&referrer()).receipt_count, 2);
    }

    #[test]
    fn promo_purchase_tracks_usage_and_receipt_order() {
        let mut harness = Harness::new();
        let base = tokens_for(100 * USD_UNIT);
        let mut request = plain(100);
        request.promo_bps = Some(1_500);
        request.referrer = Some(referrer());
        let outcome = harness.record(request);

        let promo_bonus = base * 1_500 / 10_000;
        assert_eq!(outcome.receipts.len(), 4);
        assert!(!outcome.receipts[0].is_bonus);
        assert_eq!(outcome.receipts[1].tokens, promo_bonus);
        assert_eq!(outcome.receipts[2].tokens, base * 500 / 10_000);
        assert_eq!(outcome.receipts[3].tokens, base * 700 / 10_000);
        assert_eq!(harness.book.promo_tokens(&buyer()), promo_bonus);

        let kinds: Vec<&PresaleEvent> = outcome.events.iter().collect();
        assert!(matches!(kinds[0], PresaleEvent::ReferrerSet { .. }));
        assert!(matches!(kinds[1], PresaleEvent::PurchaseRecorded { .. }));
        assert!(matches!(kinds[2], PresaleEvent::PromoUsed { .. }));
        assert!(matches!(kinds[3], PresaleEvent::ReferralBonusAwarded { .. }));
        assert!(matches!(kinds[4], PresaleEvent::StageProgress { .. }));
        assert_eq!(kinds.len(), 5);
    }

    #[test]
    fn tiny_purchase_keeps_the_promo_receipt_shape() {
        let mut harness = Harness::new();
        let request = PurchaseRequest {
            buyer: buyer(),
            usd: 1,
            tokens: 1,
            referrer: None,
            promo_bps: Some(1_500),
        };
        let outcome = harness.record(request);

        // 1 base unit earns no promo tokens but the receipt still lands.
        assert_eq!(outcome.receipts.len(), 2);
        assert_eq!(outcome.receipts[1].tokens, 0);
        assert!(outcome.receipts[1].is_bonus);
    }

    #[test]
    fn a_referrer_with_bonus_receipts_is_not_a_new_buyer() {
        let mut harness = Harness::new();
        let mut referred = plain(27);
        referred.referrer = Some(referrer());
        harness.record(referred);
        assert_eq!(harness.totals.unique_buyer_count, 1);

        let mut own_purchase = plain(27);
        own_purchase.buyer = referrer();
        let outcome = harness.record(own_purchase);

        assert!(!outcome.new_buyer);
        assert_eq!(harness.totals.unique_buyer_count, 1);
    }

    #[test]
    fn receipt_pages_are_stable_slices() {
        let mut harness = Harness::new();
        for _ in 0..3 {
            harness.record(plain(27));
        }

        let first_two = harness.book.receipts_page(&buyer(), 0, 2);
        assert_eq!(first_two.len(), 2);
        let middle = harness.book.receipts_page(&buyer(), 1, 2);
        assert_eq!(middle.len(), 2);
        assert_eq!(first_two[1], middle[0]);
        assert_eq!(harness.book.receipts_page(&buyer(), 2, 5).len(), 1);
        assert_eq!(harness.book.receipts_page(&buyer(), 9, 5).len(), 0);
    }

    #[test]
    fn completion_event_fires_only_on_the_crossing_purchase() {
        let mut harness = Harness::new();
        harness
            .registry
            .configure(&harness.config, 2, 500_000, 150_000 * TOKEN_UNIT, 100_000 * USD_UNIT)
            .unwrap();
        harness.registry.activate(&harness.config, 2).unwrap();

        // 100,000 of 150,000 tokens: below the cap, no completion.
        let mut request = plain(50_000);
        request.tokens = 100_000 * TOKEN_UNIT;
        let outcome = harness.record(request);
        assert!(outcome
            .events
            .iter()
            .all(|event| !matches!(event, PresaleEvent::StageCompleted { .. })));

        // The remaining 50,000 tokens land exactly on the cap.
        let crossing = PurchaseRequest {
            buyer: buyer(),
            usd: 25_000 * USD_UNIT,
            tokens: 50_000 * TOKEN_UNIT,
            referrer: None,
            promo_bps: None,
        };
        let outcome = harness.record(crossing);
        let completed = outcome
            .events
            .iter()
            .find(|event| matches!(event, PresaleEvent::StageCompleted { .. }));
        assert_eq!(
            completed,
            Some(&PresaleEvent::StageCompleted {
                stage_id: 2,
                usd_target_reached: false,
                token_cap_reached: true,
            })
        );
    }
}

use crate::config::PresaleConfig;
use crate::error::PresaleError;
use crate::types::{StageId, StageInfo, TokenAmount, UsdAmount};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-stage accounting record. `tokens_allocated == 0` means the stage
/// has no token cap of its own; the global cap still applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stage {
    pub price_per_token: UsdAmount,
    pub tokens_allocated: TokenAmount,
    pub tokens_sold: TokenAmount,
    pub usd_target: UsdAmount,
    pub usd_raised: UsdAmount,
    pub is_active: bool,
    pub completed: bool,
}

impl Stage {
    fn configured(
        price_per_token: UsdAmount,
        tokens_allocated: TokenAmount,
        usd_target: UsdAmount,
    ) -> Self {
        Self {
            price_per_token,
            tokens_allocated,
            tokens_sold: 0,
            usd_target,
            usd_raised: 0,
            is_active: false,
            completed: false,
        }
    }

    /// True once any sale has been recorded against the stage.
    pub fn used(&self) -> bool {
        self.tokens_sold > 0 || self.usd_raised > 0
    }
}

/// One-shot threshold-crossing report for a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageCompletion {
    pub usd_target_reached: bool,
    pub token_cap_reached: bool,
}

/// Owns stage snapshots and the single-active-stage pointer.
#[derive(Debug, Default)]
pub struct StageRegistry {
    stages: BTreeMap<StageId, Stage>,
    current: Option<StageId>,
}

impl StageRegistry {
    /// Writes a fresh stage snapshot. Reconfiguring a stage that is
    /// active or has recorded sales is rejected to keep the audit trail
    /// intact.
    pub fn configure(
        &mut self,
        config: &PresaleConfig,
        id: StageId,
        price_per_token: UsdAmount,
        tokens_allocated: TokenAmount,
        usd_target: UsdAmount,
    ) -> Result<(), PresaleError> {
        if id == 0 || id > config.max_stages {
            return Err(PresaleError::InvalidStage(id));
        }
        if price_per_token == 0 {
            return Err(PresaleError::InvalidPrice);
        }
        if usd_target == 0 {
            return Err(PresaleError::InvalidUsdTarget);
        }
        if let Some(existing) = self.stages.get(&id) {
            if existing.is_active {
                return Err(PresaleError::StageAlreadyActive(id));
            }
            if existing.used() {
                return Err(PresaleError::StageAlreadyUsed(id));
            }
        }
        self.stages
            .insert(id, Stage::configured(price_per_token, tokens_allocated, usd_target));
        Ok(())
    }

    /// Deactivates the current stage (if any) and activates the target
    /// in one transition. Returns the id that was deactivated.
    pub fn activate(
        &mut self,
        config: &PresaleConfig,
        id: StageId,
    ) -> Result<Option<StageId>, PresaleError> {
        if id == 0 || id > config.max_stages {
            return Err(PresaleError::InvalidStage(id));
        }
        match self.stages.get(&id) {
            // An unconfigured stage reads as zero-valued; price first.
            None => return Err(PresaleError::InvalidPrice),
            Some(stage) if stage.is_active => {
                return Err(PresaleError::StageAlreadyActive(id))
            }
            Some(_) => {}
        }
        let previous = self.current.take();
        if let Some(previous_id) = previous {
            if let Some(stage) = self.stages.get_mut(&previous_id) {
                stage.is_active = false;
            }
        }
        if let Some(stage) = self.stages.get_mut(&id) {
            stage.is_active = true;
        }
        self.current = Some(id);
        Ok(previous)
    }

    pub fn current_id(&self) -> Option<StageId> {
        self.current
    }

    /// The stage purchases are recorded against right now.
    pub fn current_active(&self) -> Option<(StageId, &Stage)> {
        let id = self.current?;
        let stage = self.stages.get(&id)?;
        stage.is_active.then_some((id, stage))
    }

    pub fn get(&self, id: StageId) -> Option<&Stage> {
        self.stages.get(&id)
    }

    pub fn info(&self, id: StageId) -> Option<StageInfo> {
        self.stages.get(&id).map(|stage| StageInfo {
            stage_id: id,
            price_per_token: stage.price_per_token,
            tokens_allocated: stage.tokens_allocated,
            tokens_sold: stage.tokens_sold,
            usd_target: stage.usd_target,
            usd_raised: stage.usd_raised,
            is_active: stage.is_active,
            completed: stage.completed,
        })
    }

    pub fn current_info(&self) -> Option<StageInfo> {
        self.current.and_then(|id| self.info(id))
    }

    /// Applies a committed sale to the stage and reports a threshold
    /// crossing the first time one occurs. Amounts were bounded during
    /// validation.
    pub(crate) fn record_sale(
        &mut self,
        id: StageId,
        tokens: TokenAmount,
        usd: UsdAmount,
    ) -> Option<(Stage, Option<StageCompletion>)> {
        let stage = self.stages.get_mut(&id)?;
        let was_below_target = stage.usd_raised < stage.usd_target;
        let was_below_cap =
            stage.tokens_allocated > 0 && stage.tokens_sold < stage.tokens_allocated;
        stage.usd_raised += usd;
        stage.tokens_sold += tokens;
        let usd_target_reached = was_below_target && stage.usd_raised >= stage.usd_target;
        let token_cap_reached = was_below_cap && stage.tokens_sold >= stage.tokens_allocated;
        let completion = if !stage.completed && (usd_target_reached || token_cap_reached) {
            stage.completed = true;
            Some(StageCompletion {
                usd_target_reached,
                token_cap_reached,
            })
        } else {
            None
        };
        Some((*stage, completion))
    }
}

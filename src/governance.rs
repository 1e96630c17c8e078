//! Risk-factor registry.
//!
//! Risk factors are injected configuration for the health engine. The registry
//! owns them together with the authority allowed to change them. Authority moves
//! in two steps: the current owner nominates, the nominee accepts.

use std::collections::HashMap;

use crate::types::{AccountId, AssetId, Wad};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GovernanceError {
    #[error("{caller} is not the registry owner")]
    NotOwner { caller: AccountId },

    #[error("{caller} is not the pending owner")]
    NotPendingOwner { caller: AccountId },

    #[error("No risk factor configured for {0}")]
    NoRiskFactor(AssetId),

    #[error("Risk factor for {0} must be non-zero")]
    ZeroRiskFactor(AssetId),
}

#[derive(Debug, Clone)]
pub struct RiskRegistry {
    owner: AccountId,
    pending_owner: Option<AccountId>,
    factors: HashMap<AssetId, Wad>,
}

impl RiskRegistry {
    pub fn new(owner: AccountId) -> Self {
        Self {
            owner,
            pending_owner: None,
            factors: HashMap::new(),
        }
    }

    pub fn owner(&self) -> AccountId {
        self.owner
    }

    pub fn pending_owner(&self) -> Option<AccountId> {
        self.pending_owner
    }

    pub fn risk_factor(&self, asset: AssetId) -> Result<Wad, GovernanceError> {
        self.factors
            .get(&asset)
            .copied()
            .ok_or(GovernanceError::NoRiskFactor(asset))
    }

    /// Returns the previous factor, if any.
    pub fn set_risk_factor(
        &mut self,
        caller: AccountId,
        asset: AssetId,
        factor: Wad,
    ) -> Result<Option<Wad>, GovernanceError> {
        self.require_owner(caller)?;
        if factor.is_zero() {
            return Err(GovernanceError::ZeroRiskFactor(asset));
        }
        Ok(self.factors.insert(asset, factor))
    }

    /// Nominates `new_owner`. replaces any earlier nomination.
    pub fn transfer_ownership(
        &mut self,
        caller: AccountId,
        new_owner: AccountId,
    ) -> Result<(), GovernanceError> {
        self.require_owner(caller)?;
        self.pending_owner = Some(new_owner);
        Ok(())
    }

    /// Completes a nomination. returns the previous owner.
    pub fn accept_ownership(&mut self, caller: AccountId) -> Result<AccountId, GovernanceError> {
        if self.pending_owner != Some(caller) {
            return Err(GovernanceError::NotPendingOwner { caller });
        }
        let previous = self.owner;
        self.owner = caller;
        self.pending_owner = None;
        Ok(previous)
    }

    fn require_owner(&self, caller: AccountId) -> Result<(), GovernanceError> {
        if caller != self.owner {
            return Err(GovernanceError::NotOwner { caller });
        }
        Ok(())
    }
}

//! Static validator account table.
//!
//! Resolves proposers from a fixed in-memory map regardless of height. Meant
//! for devnets, replays and tests where the validator set does not change.

use async_trait::async_trait;
use parking_lot::RwLock;
use shared_types::{Address, ConsensusAddress};
use std::collections::HashMap;

use crate::domain::ResolveError;
use crate::ports::ValidatorAccountResolver;

#[derive(Debug, Default)]
pub struct StaticValidatorAccounts {
    accounts: RwLock<HashMap<ConsensusAddress, Address>>,
}

impl StaticValidatorAccounts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style registration.
    pub fn with_account(self, validator: ConsensusAddress, account: Address) -> Self {
        self.insert(validator, account);
        self
    }

    /// Registers or replaces the account of `validator`.
    pub fn insert(&self, validator: ConsensusAddress, account: Address) -> Option<Address> {
        self.accounts.write().insert(validator, account)
    }

    pub fn remove(&self, validator: &ConsensusAddress) -> Option<Address> {
        self.accounts.write().remove(validator)
    }

    pub fn len(&self) -> usize {
        self.accounts.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.read().is_empty()
    }
}

#[async_trait]
impl ValidatorAccountResolver for StaticValidatorAccounts {
    async fn validator_account(
        &self,
        height: i64,
        proposer: &ConsensusAddress,
    ) -> Result<Address, ResolveError> {
        self.accounts
            .read()
            .get(proposer)
            .copied()
            .ok_or(ResolveError::UnknownValidator {
                height,
                address: *proposer,
            })
    }
}

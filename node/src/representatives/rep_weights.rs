use rslat_core::{Amount, PublicKey};
use std::{collections::HashMap, sync::Mutex};

/// Voting weight per representative account, maintained by the ledger
#[derive(Default)]
pub struct RepWeights {
    weights: Mutex<HashMap<PublicKey, Amount>>,
}

impl RepWeights {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn weight(&self, account: &PublicKey) -> Amount {
        self.weights
            .lock()
            .unwrap()
            .get(account)
            .copied()
            .unwrap_or_default()
    }

    pub fn set_weight(&self, account: PublicKey, weight: Amount) {
        self.weights.lock().unwrap().insert(account, weight);
    }

    pub fn total(&self) -> Amount {
        self.weights.lock().unwrap().values().copied().sum()
    }

    pub fn len(&self) -> usize {
        self.weights.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

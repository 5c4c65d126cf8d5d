//! Payment channel directory.
//!
//! Tracks which fiat channels a user has bound a default receiving
//! account for. A seller can only list on a channel they can actually
//! receive payments through.

use std::collections::{HashMap, HashSet};

use peerdesk_types::{PaymentMethod, UserId};

/// Per-user set of bound default payment channels.
pub struct PaymentDirectory {
    bound: HashMap<UserId, HashSet<PaymentMethod>>,
}

impl PaymentDirectory {
    /// Create an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self {
            bound: HashMap::new(),
        }
    }

    /// Bind a default account for `method`. Idempotent.
    pub fn bind(&mut self, user_id: UserId, method: PaymentMethod) {
        self.bound.entry(user_id).or_default().insert(method);
    }

    /// Remove the binding for `method`. No-op if absent.
    pub fn unbind(&mut self, user_id: UserId, method: PaymentMethod) {
        if let Some(methods) = self.bound.get_mut(&user_id) {
            methods.remove(&method);
        }
    }

    /// Whether `user_id` has a default account bound for `method`.
    #[must_use]
    pub fn is_bound(&self, user_id: UserId, method: PaymentMethod) -> bool {
        self.bound
            .get(&user_id)
            .is_some_and(|methods| methods.contains(&method))
    }
}

impl Default for PaymentDirectory {
    fn default() -> Self {
        Self::new()
    }
}

//! The provider trait and the channel-backed reference implementation.

use tokio::sync::watch;

use tally_types::Identity;

use crate::error::IdentityError;

/// Source of the acting identity.
///
/// `subscribe` hands out a `watch` receiver carrying the full identity list;
/// dropping the receiver deregisters the subscription, so teardown is just
/// letting it go out of scope.
pub trait IdentityProvider: Send + Sync {
    /// The identities the host currently authorizes. The first entry is the
    /// acting one; the list may be empty.
    fn current_identities(&self) -> Result<Vec<Identity>, IdentityError>;

    /// Subscribe to identity-set changes.
    fn subscribe(&self) -> watch::Receiver<Vec<Identity>>;
}

/// A provider backed by a `watch` channel.
///
/// Serves two roles: the production adapter for hosts that hand us a fixed
/// identity list (config or keystore) and push updates programmatically, and
/// the test double for exercising identity-change paths.
pub struct StaticIdentityProvider {
    tx: watch::Sender<Vec<Identity>>,
}

impl StaticIdentityProvider {
    pub fn new(identities: Vec<Identity>) -> Self {
        let (tx, _) = watch::channel(identities);
        Self { tx }
    }

    /// Replace the identity list, notifying all subscribers.
    pub fn set_identities(&self, identities: Vec<Identity>) {
        // send_replace never fails: the sender keeps the value even with no
        // live receivers.
        self.tx.send_replace(identities);
    }
}

impl IdentityProvider for StaticIdentityProvider {
    fn current_identities(&self) -> Result<Vec<Identity>, IdentityError> {
        Ok(self.tx.borrow().clone())
    }

    fn subscribe(&self) -> watch::Receiver<Vec<Identity>> {
        self.tx.subscribe()
    }
}

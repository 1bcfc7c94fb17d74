//! Notification hook for the external voting-power collaborator.

/// Receives a fire-and-forget notification after every influence change
#[cfg_attr(test, mockall::automock)]
pub trait VotingPowerHook: Send + Sync {
    /// Called once per committed mutation; the return value is not consumed
    fn callback(&self);
}

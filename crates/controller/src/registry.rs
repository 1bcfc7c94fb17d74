use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use civic_common::{Address, Context, Event, EventLog, ParamsHash};

use crate::collaborators::{Avatar, CallOutcome, ReputationToken};
use crate::error::{ControllerError, Result};

/// Registry entry for a scheme
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scheme {
    /// Hash of the scheme's parameters
    pub params_hash: ParamsHash,
    /// Whether the scheme is registered
    pub is_registered: bool,
    /// May register and unregister schemes
    pub can_manage_schemes: bool,
    /// May make calls through the avatar
    pub can_make_avatar_calls: bool,
    /// May mint and burn reputation
    pub can_change_reputation: bool,
}

/// A capability a delegated operation requires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Capability {
    ManageSchemes,
    MakeAvatarCalls,
    ChangeReputation,
}

impl Capability {
    fn granted_by(&self, scheme: &Scheme) -> bool {
        match self {
            Capability::ManageSchemes => scheme.can_manage_schemes,
            Capability::MakeAvatarCalls => scheme.can_make_avatar_calls,
            Capability::ChangeReputation => scheme.can_change_reputation,
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Capability::ManageSchemes => "manage schemes",
            Capability::MakeAvatarCalls => "make avatar calls",
            Capability::ChangeReputation => "change reputation",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Default)]
struct Registry {
    schemes: HashMap<Address, Scheme>,
    manage_schemes_count: u32,
}

/// Capability-gated registry of schemes.
///
/// At least one registered scheme holds `can_manage_schemes` at all times,
/// so the registry can never lock itself out of further changes.
pub struct Controller {
    registry: RwLock<Registry>,
    avatar: Arc<dyn Avatar>,
    reputation: Arc<dyn ReputationToken>,
    events: EventLog,
}

impl fmt::Debug for Controller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Controller")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}

impl Controller {
    /// Create a controller whose only scheme, `initial_scheme`, holds every
    /// capability
    pub fn new(
        initial_scheme: Address,
        params_hash: ParamsHash,
        avatar: Arc<dyn Avatar>,
        reputation: Arc<dyn ReputationToken>,
        events: EventLog,
    ) -> Self {
        let mut registry = Registry::default();
        registry.schemes.insert(
            initial_scheme,
            Scheme {
                params_hash,
                is_registered: true,
                can_manage_schemes: true,
                can_make_avatar_calls: true,
                can_change_reputation: true,
            },
        );
        registry.manage_schemes_count = 1;

        info!(%initial_scheme, "Controller initialized");
        Self {
            registry: RwLock::new(registry),
            avatar,
            reputation,
            events,
        }
    }

    /// Register `scheme`, or update its parameters and flags if it is
    /// already registered
    pub fn register_scheme(
        &self,
        ctx: &Context,
        scheme: Address,
        params_hash: ParamsHash,
        can_manage_schemes: bool,
        can_make_avatar_calls: bool,
        can_change_reputation: bool,
    ) -> Result<()> {
        if scheme.is_zero() {
            return Err(ControllerError::InvalidInput(
                "cannot register the zero address".to_string(),
            ));
        }

        let mut registry = self.write_registry()?;
        Self::require(&registry, ctx, Capability::ManageSchemes)?;

        let previous = registry.schemes.get(&scheme).copied().unwrap_or_default();
        let was_manager = previous.is_registered && previous.can_manage_schemes;

        let count = match (was_manager, can_manage_schemes) {
            (false, true) => registry.manage_schemes_count + 1,
            (true, false) => {
                if registry.manage_schemes_count <= 1 {
                    warn!(%scheme, "Refused to revoke the last manage-schemes permission");
                    return Err(ControllerError::InvariantViolation(format!(
                        "{} is the last scheme able to manage schemes",
                        scheme
                    )));
                }
                registry.manage_schemes_count - 1
            }
            _ => registry.manage_schemes_count,
        };

        registry.manage_schemes_count = count;
        registry.schemes.insert(
            scheme,
            Scheme {
                params_hash,
                is_registered: true,
                can_manage_schemes,
                can_make_avatar_calls,
                can_change_reputation,
            },
        );
        drop(registry);

        info!(
            sender = %ctx.sender,
            %scheme,
            can_manage_schemes,
            can_make_avatar_calls,
            can_change_reputation,
            manage_schemes_count = count,
            "Scheme registered"
        );
        self.events.emit(Event::RegisterScheme {
            sender: ctx.sender,
            scheme,
        });
        Ok(())
    }

    /// Remove `scheme`. Returns `false` without changes if it is not
    /// registered.
    pub fn unregister_scheme(&self, ctx: &Context, scheme: Address) -> Result<bool> {
        let mut registry = self.write_registry()?;
        Self::require(&registry, ctx, Capability::ManageSchemes)?;

        let entry = match registry.schemes.get(&scheme) {
            Some(entry) if entry.is_registered => *entry,
            _ => {
                debug!(%scheme, "Unregister of unknown scheme ignored");
                return Ok(false);
            }
        };

        if entry.can_manage_schemes {
            if registry.manage_schemes_count <= 1 {
                warn!(%scheme, "Refused to unregister the last manage-schemes scheme");
                return Err(ControllerError::InvariantViolation(format!(
                    "{} is the last scheme able to manage schemes",
                    scheme
                )));
            }
            registry.manage_schemes_count -= 1;
        }
        registry.schemes.remove(&scheme);
        let count = registry.manage_schemes_count;
        drop(registry);

        info!(sender = %ctx.sender, %scheme, manage_schemes_count = count, "Scheme unregistered");
        self.events.emit(Event::UnregisterScheme {
            sender: ctx.sender,
            scheme,
        });
        Ok(true)
    }

    /// Have the avatar call `target` with `data` and `value`
    pub fn avatar_call(&self, ctx: &Context, target: Address, data: &[u8], value: u128) -> Result<CallOutcome> {
        self.check(ctx, Capability::MakeAvatarCalls)?;
        let outcome = self.avatar.execute_call(target, data, value);
        debug!(sender = %ctx.sender, %target, value, success = outcome.success, "Avatar call");
        Ok(outcome)
    }

    /// Mint `amount` reputation to `recipient`
    pub fn mint_reputation(&self, ctx: &Context, amount: Decimal, recipient: Address) -> Result<bool> {
        self.check(ctx, Capability::ChangeReputation)?;
        let minted = self.reputation.mint(recipient, amount);
        debug!(sender = %ctx.sender, %recipient, %amount, minted, "Reputation minted");
        Ok(minted)
    }

    /// Burn `amount` reputation from `account`
    pub fn burn_reputation(&self, ctx: &Context, amount: Decimal, account: Address) -> Result<bool> {
        self.check(ctx, Capability::ChangeReputation)?;
        let burned = self.reputation.burn(account, amount);
        debug!(sender = %ctx.sender, %account, %amount, burned, "Reputation burned");
        Ok(burned)
    }

    /// Hand ownership of the reputation token to `new_owner`
    pub fn transfer_reputation_ownership(&self, ctx: &Context, new_owner: Address) -> Result<()> {
        self.check(ctx, Capability::ChangeReputation)?;
        self.reputation.transfer_ownership(new_owner);
        info!(sender = %ctx.sender, %new_owner, "Reputation ownership transferred");
        Ok(())
    }

    pub fn is_scheme_registered(&self, scheme: &Address) -> bool {
        self.scheme(scheme).map_or(false, |s| s.is_registered)
    }

    pub fn scheme_params_hash(&self, scheme: &Address) -> ParamsHash {
        self.scheme(scheme).map(|s| s.params_hash).unwrap_or_default()
    }

    pub fn scheme_can_manage_schemes(&self, scheme: &Address) -> bool {
        self.scheme(scheme).map_or(false, |s| s.can_manage_schemes)
    }

    pub fn scheme_can_make_avatar_calls(&self, scheme: &Address) -> bool {
        self.scheme(scheme).map_or(false, |s| s.can_make_avatar_calls)
    }

    pub fn scheme_can_change_reputation(&self, scheme: &Address) -> bool {
        self.scheme(scheme).map_or(false, |s| s.can_change_reputation)
    }

    /// Number of registered schemes holding `can_manage_schemes`
    pub fn schemes_with_manage_schemes_permission(&self) -> u32 {
        self.registry
            .read()
            .map(|registry| registry.manage_schemes_count)
            .unwrap_or_default()
    }

    /// Registry entry for `scheme`, if registered
    pub fn scheme(&self, scheme: &Address) -> Option<Scheme> {
        self.registry
            .read()
            .ok()
            .and_then(|registry| registry.schemes.get(scheme).copied())
    }

    /// Every registered scheme, sorted by address
    pub fn registered_schemes(&self) -> Vec<Address> {
        let mut schemes: Vec<Address> = self
            .registry
            .read()
            .map(|registry| registry.schemes.keys().copied().collect())
            .unwrap_or_default();
        schemes.sort();
        schemes
    }

    /// The shared event log
    pub fn events(&self) -> &EventLog {
        &self.events
    }

    fn check(&self, ctx: &Context, capability: Capability) -> Result<()> {
        let registry = self
            .registry
            .read()
            .map_err(|_| ControllerError::Internal("Failed to acquire read lock on registry".to_string()))?;
        Self::require(&registry, ctx, capability)
    }

    fn require(registry: &Registry, ctx: &Context, capability: Capability) -> Result<()> {
        match registry.schemes.get(&ctx.sender) {
            Some(scheme) if scheme.is_registered && capability.granted_by(scheme) => Ok(()),
            Some(_) => {
                warn!(sender = %ctx.sender, %capability, "Scheme lacks capability");
                Err(ControllerError::PermissionDenied(format!(
                    "{} may not {}",
                    ctx.sender, capability
                )))
            }
            None => {
                warn!(sender = %ctx.sender, %capability, "Unregistered caller");
                Err(ControllerError::PermissionDenied(format!(
                    "{} is not a registered scheme",
                    ctx.sender
                )))
            }
        }
    }

    fn write_registry(&self) -> Result<std::sync::RwLockWriteGuard<'_, Registry>> {
        self.registry
            .write()
            .map_err(|_| ControllerError::Internal("Failed to acquire write lock on registry".to_string()))
    }
}

//! Super-admin provisioning at startup

use crate::password::{hash_password_blocking, MIN_PASSWORD_LEN};
use bulkbuy_core::config::SuperAdminSettings;
use bulkbuy_core::{BulkbuyError, Result, Role, User, UserStore};
use tracing::{error, info, warn};

/// What [`ensure_super_admin`] did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapOutcome {
    /// A new account was created
    Created,
    /// An account with the configured email already exists
    AlreadyPresent,
    /// No password is configured
    Skipped,
}

/// Provision the configured super-admin if it does not exist yet
pub async fn ensure_super_admin(
    users: &dyn UserStore,
    settings: &SuperAdminSettings,
) -> Result<BootstrapOutcome> {
    let Some(password) = settings.password.clone() else {
        info!("No super-admin password configured, skipping bootstrap");
        return Ok(BootstrapOutcome::Skipped);
    };

    if password.len() < MIN_PASSWORD_LEN {
        return Err(BulkbuyError::validation(format!(
            "super_admin.password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }

    if users.find_by_email(&settings.email).await?.is_some() {
        return Ok(BootstrapOutcome::AlreadyPresent);
    }

    let hash = hash_password_blocking(password).await?;
    let user = User::new(&settings.name, &settings.email, Role::SuperAdmin, hash);
    match users.insert(user).await {
        Ok(user) => {
            info!(user_id = %user.id, email = %user.email, "Super-admin provisioned");
            Ok(BootstrapOutcome::Created)
        }
        // Lost a race with another provisioner
        Err(BulkbuyError::Conflict { .. }) => Ok(BootstrapOutcome::AlreadyPresent),
        Err(e) => Err(e),
    }
}

/// Run the bootstrap, logging instead of propagating failures
pub async fn bootstrap(users: &dyn UserStore, settings: &SuperAdminSettings) {
    match ensure_super_admin(users, settings).await {
        Ok(BootstrapOutcome::AlreadyPresent) => {
            warn!(email = %settings.email, "Super-admin already exists")
        }
        Ok(_) => {}
        Err(e) => error!(error = %e, "Super-admin bootstrap failed"),
    }
}

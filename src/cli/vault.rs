//! Vault CLI commands
//!
//! Enabling, disabling, and locking whole-file encryption of the store.

use clap::Subcommand;

use super::prompt::{confirm, prompt_new_password, prompt_password};
use crate::commands::{Origin, VaultCommand, VaultContext, VaultResponse};
use crate::error::{HearthError, HearthResult};
use crate::vault::{VaultState, VaultStatus};

/// Vault subcommands
#[derive(Subcommand)]
pub enum VaultCommands {
    /// Show vault status
    Status,

    /// Encrypt the household store with a vault password
    Enable {
        /// Minutes of inactivity before auto-lock (0 disables)
        #[arg(long)]
        auto_lock: Option<u32>,
    },

    /// Remove vault encryption (requires the vault password)
    Disable,

    /// Change the vault password
    #[command(alias = "change")]
    ChangePassword,

    /// Set the auto-lock timeout
    AutoLock {
        /// Minutes of inactivity before auto-lock (0 disables)
        minutes: u32,
    },

    /// Seal the store on disk
    Lock,

    /// Decrypt the store on disk until `vault lock` or the auto-lock timeout
    Unlock,
}

/// Unlock the vault for this invocation if it is locked
pub fn ensure_unlocked(ctx: &mut VaultContext, origin: &Origin) -> HearthResult<()> {
    if !matches!(ctx.state(), VaultState::Locked | VaultState::Detached) {
        return Ok(());
    }
    let password = prompt_password("Vault password: ")?;
    match ctx.handle_vault(origin, VaultCommand::Unlock { password })? {
        VaultResponse::Unlocked(true) => Ok(()),
        _ => Err(HearthError::WrongPassword),
    }
}

/// Handle a vault command
pub fn handle_vault_command(
    ctx: &mut VaultContext,
    origin: &Origin,
    cmd: VaultCommands,
) -> HearthResult<()> {
    match cmd {
        VaultCommands::Status => {
            if let VaultResponse::Status(status) = ctx.handle_vault(origin, VaultCommand::Status)? {
                print_status(&status, ctx.recovery_pending(), ctx.detach_expired());
            }
        }

        VaultCommands::Enable { auto_lock } => {
            if ctx.vault().is_enabled() {
                println!("The vault is already enabled.");
                println!("Use 'hearth vault change-password' to change the vault password.");
                return Ok(());
            }

            println!("Enable Vault");
            println!("============");
            println!();
            println!("The household store will be encrypted with AES-256-GCM under a key");
            println!("derived from the vault password.");
            println!();
            println!("IMPORTANT: If you forget the vault password, the data cannot be recovered!");
            println!();

            let password = prompt_new_password(ctx.settings().min_password_length)?;
            ctx.handle_vault(
                origin,
                VaultCommand::Enable {
                    password,
                    auto_lock_minutes: auto_lock,
                },
            )?;

            println!();
            println!("Vault enabled. The store is sealed when this command exits.");
        }

        VaultCommands::Disable => {
            if !ctx.vault().is_enabled() {
                println!("The vault is not enabled.");
                return Ok(());
            }
            ensure_unlocked(ctx, origin)?;

            let password = prompt_password("Vault password: ")?;
            if !confirm("Are you sure you want to store household data unencrypted?")? {
                println!("Aborted.");
                return Ok(());
            }

            ctx.handle_vault(origin, VaultCommand::Disable { password })?;
            println!("Vault disabled. Household data is now stored unencrypted.");
        }

        VaultCommands::ChangePassword => {
            if !ctx.vault().is_enabled() {
                println!("The vault is not enabled.");
                println!("Use 'hearth vault enable' first.");
                return Ok(());
            }
            ensure_unlocked(ctx, origin)?;

            let current = prompt_password("Current vault password: ")?;
            let new = prompt_new_password(ctx.settings().min_password_length)?;
            ctx.handle_vault(origin, VaultCommand::ChangePassword { current, new })?;
            println!("Vault password changed.");
        }

        VaultCommands::AutoLock { minutes } => {
            ensure_unlocked(ctx, origin)?;
            ctx.handle_vault(origin, VaultCommand::UpdateAutoLock { minutes })?;
            if minutes == 0 {
                println!("Auto-lock disabled.");
            } else {
                println!("Auto-lock after {} minute(s) of inactivity.", minutes);
            }
        }

        VaultCommands::Lock => match ctx.state() {
            VaultState::Unlocked => {
                ctx.handle_vault(origin, VaultCommand::Lock)?;
                println!("Vault locked.");
            }
            VaultState::Detached => {
                let password = prompt_password("Vault password: ")?;
                if ctx.seal_with_password(origin, password.as_str())? {
                    println!("Vault locked.");
                } else {
                    println!("Nothing was sealed. Run 'hearth vault unlock' to resolve the interrupted lock first.");
                }
            }
            VaultState::Locked if ctx.recovery_pending() => {
                println!("An interrupted lock was detected. Run 'hearth vault unlock' to resolve it.");
            }
            VaultState::Locked => println!("The vault is already locked."),
            _ => return Err(HearthError::VaultNotEnabled),
        },

        VaultCommands::Unlock => {
            if !ctx.vault().is_enabled() {
                return Err(HearthError::VaultNotEnabled);
            }
            ensure_unlocked(ctx, origin)?;
            println!("Vault unlocked. Run 'hearth vault lock' to seal the store again.");
        }
    }

    Ok(())
}

fn print_status(status: &VaultStatus, recovery_pending: bool, detach_expired: bool) {
    println!("Vault Status");
    println!("============");
    println!();
    println!("State:             {}", status.state);
    if let Some(minutes) = status.auto_lock_minutes {
        if minutes == 0 {
            println!("Auto-lock:         off");
        } else {
            println!("Auto-lock:         {} min", minutes);
        }
    }
    println!("Encrypted at rest: {}", if status.encrypted_at_rest { "yes" } else { "no" });
    if let Some(at) = status.detached_at {
        println!("Decrypted since:   {}", at.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    if detach_expired {
        println!();
        println!("The auto-lock timeout has passed. The store is sealed by the next command");
        println!("that asks for the vault password, or run 'hearth vault lock'.");
    }
    if recovery_pending {
        println!();
        println!("An interrupted lock was detected. Unlock to resolve it.");
    }
    if !status.enabled {
        println!();
        println!("Run 'hearth vault enable' to encrypt household data at rest.");
    }
}

//! Member CLI commands

use clap::Subcommand;

use super::prompt::{prompt_new_password, prompt_password};
use crate::commands::{Origin, VaultContext};
use crate::error::{HearthError, HearthResult};
use crate::models::{HouseholdUser, KeySource};

/// Member subcommands
#[derive(Subcommand)]
pub enum MemberCommands {
    /// Add a household member
    Add {
        /// Display name
        name: String,
    },
    /// List household members
    List,
    /// Set or change a member password
    SetPassword {
        /// Member name or ID
        member: String,
    },
    /// Encrypt this member's records from now on
    EnableEncryption {
        /// Member name or ID
        member: String,
        /// Which password unlocks the records (member, vault)
        ///
        /// With "vault", anyone who knows the vault password can read this
        /// member's records.
        #[arg(short, long, default_value = "member")]
        source: String,
    },
    /// Unlock this member's records with their own password instead of the vault password
    UseMemberPassword {
        /// Member name or ID
        member: String,
    },
}

/// Parse a `--source` value
pub fn parse_key_source(s: &str) -> HearthResult<KeySource> {
    match s.to_lowercase().as_str() {
        "member" => Ok(KeySource::Member),
        "vault" => Ok(KeySource::Vault),
        other => Err(HearthError::Validation(format!(
            "Invalid key source: '{}'. Valid sources: member, vault",
            other
        ))),
    }
}

/// Resolve a member by name or ID, failing if absent
pub fn require_member(
    ctx: &mut VaultContext,
    origin: &Origin,
    identifier: &str,
) -> HearthResult<HouseholdUser> {
    ctx.find_member(origin, identifier)?
        .ok_or_else(|| HearthError::user_not_found(identifier))
}

/// Open the member's record session if their records are encrypted
pub fn open_session_if_needed(
    ctx: &mut VaultContext,
    origin: &Origin,
    member: &HouseholdUser,
) -> HearthResult<()> {
    let Some(keyring) = &member.keyring else {
        return Ok(());
    };
    let prompt = match keyring.key_source {
        KeySource::Member => format!("Password for {}: ", member.name),
        KeySource::Vault => "Vault password: ".to_string(),
    };
    let secret = prompt_password(&prompt)?;
    ctx.open_member_session(origin, member.id, secret.as_str())
}

/// Handle a member command
pub fn handle_member_command(
    ctx: &mut VaultContext,
    origin: &Origin,
    cmd: MemberCommands,
) -> HearthResult<()> {
    match cmd {
        MemberCommands::Add { name } => {
            let member = ctx.add_member(origin, &name)?;
            println!("Added member: {}", member.name);
            println!("  ID: {}", member.id.as_uuid());
        }

        MemberCommands::List => {
            let members = ctx.list_members(origin)?;
            if members.is_empty() {
                println!("No members yet. Use 'hearth member add <name>' to add one.");
                return Ok(());
            }
            for member in members {
                let encryption = match member.keyring.as_ref().map(|k| k.key_source) {
                    Some(KeySource::Member) => "encrypted (member password)",
                    Some(KeySource::Vault) => "encrypted (vault password)",
                    None => "plaintext",
                };
                println!("{:<20} {}  {}", member.name, member.id.as_uuid(), encryption);
            }
        }

        MemberCommands::SetPassword { member } => {
            let member = require_member(ctx, origin, &member)?;
            let current = if member.has_password() {
                Some(prompt_password("Current member password: ")?)
            } else {
                None
            };
            let new = prompt_new_password(ctx.settings().min_password_length)?;
            ctx.set_member_password(
                origin,
                member.id,
                current.as_ref().map(|p| p.as_str()),
                new.as_str(),
            )?;
            println!("Password set for {}.", member.name);
        }

        MemberCommands::EnableEncryption { member, source } => {
            let member = require_member(ctx, origin, &member)?;
            if member.encrypts_records() {
                println!("{} already encrypts their records.", member.name);
                return Ok(());
            }
            let source = parse_key_source(&source)?;
            let prompt = match source {
                KeySource::Member => format!("Password for {}: ", member.name),
                KeySource::Vault => {
                    eprintln!(
                        "Warning: anyone who knows the vault password will be able to read {}'s records.",
                        member.name
                    );
                    eprintln!("Use '--source member' to keep them private to {}.", member.name);
                    "Vault password: ".to_string()
                }
            };
            let secret = prompt_password(&prompt)?;
            ctx.enable_record_encryption(origin, member.id, source, secret.as_str())?;
            println!("Records created by {} are now encrypted.", member.name);
        }

        MemberCommands::UseMemberPassword { member } => {
            let member = require_member(ctx, origin, &member)?;
            let vault_password = prompt_password("Vault password: ")?;
            let member_password = prompt_password(&format!("Password for {}: ", member.name))?;
            ctx.move_to_member_password(
                origin,
                member.id,
                vault_password.as_str(),
                member_password.as_str(),
            )?;
            println!(
                "{}'s records are now unlocked by their member password.",
                member.name
            );
        }
    }

    Ok(())
}

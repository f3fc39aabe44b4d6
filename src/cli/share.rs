//! Sharing CLI commands

use clap::Subcommand;

use super::member::{open_session_if_needed, require_member};
use crate::commands::{Origin, SharingCommand, SharingResponse, VaultContext};
use crate::error::{HearthError, HearthResult};
use crate::models::{DataShare, DefaultId, ShareId, SharePermissions, ShareScope, SharingDefault};

/// Sharing subcommands
#[derive(Subcommand)]
pub enum ShareCommands {
    /// Share records with another member
    Grant {
        /// Owner name or ID
        owner: String,
        /// Recipient name or ID
        recipient: String,
        /// What to share: "all" or an entity type
        #[arg(short, long, default_value = "all")]
        scope: String,
        /// Comma-separated permissions (view, combine, reports)
        #[arg(short, long, default_value = "view")]
        permissions: String,
    },
    /// Revoke a share
    Revoke {
        /// Owner name or ID
        owner: String,
        /// Share ID
        share: String,
    },
    /// List shares granted by and to a member
    List {
        /// Member name or ID
        member: String,
    },
    /// List a member's sharing defaults
    Defaults {
        /// Member name or ID
        member: String,
    },
    /// Share new records with a member automatically
    SetDefault {
        /// Owner name or ID
        owner: String,
        /// Recipient name or ID
        recipient: String,
        /// What to share: "all" or an entity type
        #[arg(short, long, default_value = "all")]
        scope: String,
        /// Comma-separated permissions (view, combine, reports)
        #[arg(short, long, default_value = "view")]
        permissions: String,
    },
    /// Remove a sharing default
    RemoveDefault {
        /// Owner name or ID
        owner: String,
        /// Default ID
        default: String,
    },
}

/// Parse a comma-separated permission list
pub fn parse_permissions(s: &str) -> HearthResult<SharePermissions> {
    let mut permissions = SharePermissions::default();
    for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        match part.to_lowercase().as_str() {
            "view" => permissions.view = true,
            "combine" => permissions.combine = true,
            "reports" => permissions.reports = true,
            "all" | "full" => permissions = SharePermissions::FULL,
            other => {
                return Err(HearthError::Validation(format!(
                    "Invalid permission: '{}'. Valid permissions: view, combine, reports",
                    other
                )))
            }
        }
    }
    if permissions == SharePermissions::default() {
        return Err(HearthError::Validation(
            "At least one permission is required".into(),
        ));
    }
    Ok(permissions)
}

fn parse_scope(s: &str) -> HearthResult<ShareScope> {
    ShareScope::parse(s).ok_or_else(|| {
        HearthError::Validation(format!(
            "Invalid scope: '{}'. Use 'all' or an entity type (account, transaction, recurring, budget, goal)",
            s
        ))
    })
}

fn permission_list(permissions: &SharePermissions) -> String {
    let mut parts = Vec::new();
    if permissions.view {
        parts.push("view");
    }
    if permissions.combine {
        parts.push("combine");
    }
    if permissions.reports {
        parts.push("reports");
    }
    parts.join(",")
}

fn print_share(share: &DataShare) {
    let target = match share.entity_id {
        Some(record) => format!("{} {}", share.scope, record.as_uuid()),
        None => share.scope.to_string(),
    };
    println!(
        "  {}  {:<24} {}",
        share.id.as_uuid(),
        target,
        permission_list(&share.permissions)
    );
}

fn print_default(default: &SharingDefault) {
    println!(
        "  {}  {:<12} -> {}  {}",
        default.id.as_uuid(),
        default.entity_type,
        default.recipient_id.as_uuid(),
        permission_list(&default.permissions)
    );
}

/// Handle a sharing command
pub fn handle_share_command(
    ctx: &mut VaultContext,
    origin: &Origin,
    cmd: ShareCommands,
) -> HearthResult<()> {
    match cmd {
        ShareCommands::Grant {
            owner,
            recipient,
            scope,
            permissions,
        } => {
            let owner = require_member(ctx, origin, &owner)?;
            let recipient = require_member(ctx, origin, &recipient)?;
            let scope = parse_scope(&scope)?;
            let permissions = parse_permissions(&permissions)?;
            open_session_if_needed(ctx, origin, &owner)?;

            let response = ctx.handle_sharing(
                origin,
                SharingCommand::Share {
                    owner_id: owner.id,
                    recipient_id: recipient.id,
                    scope,
                    permissions,
                },
            )?;
            if let SharingResponse::Share(share) = response {
                println!(
                    "Shared {}'s {} records with {}: {}",
                    owner.name,
                    scope,
                    recipient.name,
                    permission_list(&share.permissions)
                );
                println!("  Share ID: {}", share.id.as_uuid());
            }
        }

        ShareCommands::Revoke { owner, share } => {
            let owner = require_member(ctx, origin, &owner)?;
            let id: ShareId = share
                .parse()
                .map_err(|_| HearthError::Validation(format!("Invalid share ID: {}", share)))?;
            ctx.handle_sharing(
                origin,
                SharingCommand::RevokeShare {
                    actor_id: owner.id,
                    id,
                },
            )?;
            println!("Share revoked.");
        }

        ShareCommands::List { member } => {
            let member = require_member(ctx, origin, &member)?;
            if let SharingResponse::Shares(shares) = ctx.handle_sharing(
                origin,
                SharingCommand::GetSharedByMe {
                    owner_id: member.id,
                },
            )? {
                println!("Shared by {}:", member.name);
                shares.iter().for_each(print_share);
            }
            if let SharingResponse::Shares(shares) = ctx.handle_sharing(
                origin,
                SharingCommand::GetSharedWithMe {
                    viewer_id: member.id,
                },
            )? {
                println!("Shared with {}:", member.name);
                shares.iter().for_each(print_share);
            }
        }

        ShareCommands::Defaults { member } => {
            let member = require_member(ctx, origin, &member)?;
            if let SharingResponse::Defaults(defaults) = ctx.handle_sharing(
                origin,
                SharingCommand::GetDefaults { user_id: member.id },
            )? {
                if defaults.is_empty() {
                    println!("{} has no sharing defaults.", member.name);
                } else {
                    println!("Sharing defaults for {}:", member.name);
                    defaults.iter().for_each(print_default);
                }
            }
        }

        ShareCommands::SetDefault {
            owner,
            recipient,
            scope,
            permissions,
        } => {
            let owner = require_member(ctx, origin, &owner)?;
            let recipient = require_member(ctx, origin, &recipient)?;
            let response = ctx.handle_sharing(
                origin,
                SharingCommand::SetDefault {
                    owner_id: owner.id,
                    recipient_id: recipient.id,
                    entity_type: parse_scope(&scope)?,
                    permissions: parse_permissions(&permissions)?,
                },
            )?;
            if let SharingResponse::Default(default) = response {
                println!(
                    "New {} records from {} will be shared with {}.",
                    default.entity_type, owner.name, recipient.name
                );
                println!("  Default ID: {}", default.id.as_uuid());
            }
        }

        ShareCommands::RemoveDefault { owner, default } => {
            let owner = require_member(ctx, origin, &owner)?;
            let id: DefaultId = default
                .parse()
                .map_err(|_| HearthError::Validation(format!("Invalid default ID: {}", default)))?;
            ctx.handle_sharing(
                origin,
                SharingCommand::RemoveDefault {
                    actor_id: owner.id,
                    id,
                },
            )?;
            println!("Sharing default removed.");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_permissions() {
        let permissions = parse_permissions("view, combine").unwrap();
        assert!(permissions.view && permissions.combine && !permissions.reports);
        assert_eq!(parse_permissions("full").unwrap(), SharePermissions::FULL);
    }

    #[test]
    fn test_parse_permissions_rejects_unknown_and_empty() {
        assert!(parse_permissions("edit").unwrap_err().is_validation());
        assert!(parse_permissions("").unwrap_err().is_validation());
    }
}

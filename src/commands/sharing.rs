//! Sharing command surface

use serde::Serialize;

use super::context::{Origin, VaultContext};
use crate::error::HearthResult;
use crate::models::{
    DataShare, DefaultId, ShareId, SharePermissions, ShareScope, SharingDefault, UserId,
};
use crate::services::{DefaultUpdate, SharingService};

/// Sharing requests
///
/// Every command that changes a share or default names the acting member,
/// and only the owner may change what they own.
#[derive(Debug, Clone)]
pub enum SharingCommand {
    GetDefaults {
        user_id: UserId,
    },
    SetDefault {
        owner_id: UserId,
        recipient_id: UserId,
        entity_type: ShareScope,
        permissions: SharePermissions,
    },
    UpdateDefault {
        actor_id: UserId,
        id: DefaultId,
        updates: DefaultUpdate,
    },
    RemoveDefault {
        actor_id: UserId,
        id: DefaultId,
    },
    GetSharedWithMe {
        viewer_id: UserId,
    },
    GetSharedByMe {
        owner_id: UserId,
    },
    Share {
        owner_id: UserId,
        recipient_id: UserId,
        scope: ShareScope,
        permissions: SharePermissions,
    },
    UpdateShare {
        actor_id: UserId,
        id: ShareId,
        permissions: SharePermissions,
    },
    RevokeShare {
        actor_id: UserId,
        id: ShareId,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum SharingResponse {
    Defaults(Vec<SharingDefault>),
    Default(SharingDefault),
    Shares(Vec<DataShare>),
    Share(DataShare),
    Done,
}

impl VaultContext {
    /// Run one sharing command from `origin`
    pub fn handle_sharing(
        &mut self,
        origin: &Origin,
        command: SharingCommand,
    ) -> HearthResult<SharingResponse> {
        self.authorize(origin)?;
        let service = SharingService::new(self.storage()?);

        let response = match command {
            SharingCommand::GetDefaults { user_id } => {
                SharingResponse::Defaults(service.get_defaults(user_id)?)
            }
            SharingCommand::SetDefault {
                owner_id,
                recipient_id,
                entity_type,
                permissions,
            } => SharingResponse::Default(service.set_default(
                owner_id,
                recipient_id,
                entity_type,
                permissions,
            )?),
            SharingCommand::UpdateDefault {
                actor_id,
                id,
                updates,
            } => SharingResponse::Default(service.update_default(actor_id, id, updates)?),
            SharingCommand::RemoveDefault { actor_id, id } => {
                service.remove_default(actor_id, id)?;
                SharingResponse::Done
            }
            SharingCommand::GetSharedWithMe { viewer_id } => {
                SharingResponse::Shares(service.get_shared_with_me(viewer_id)?)
            }
            SharingCommand::GetSharedByMe { owner_id } => {
                SharingResponse::Shares(service.get_shared_by_me(owner_id)?)
            }
            SharingCommand::Share {
                owner_id,
                recipient_id,
                scope,
                permissions,
            } => SharingResponse::Share(service.share(
                owner_id,
                recipient_id,
                scope,
                permissions,
                self.session(owner_id),
            )?),
            SharingCommand::UpdateShare {
                actor_id,
                id,
                permissions,
            } => SharingResponse::Share(service.update_share(actor_id, id, permissions)?),
            SharingCommand::RevokeShare { actor_id, id } => {
                service.revoke_share(actor_id, id)?;
                SharingResponse::Done
            }
        };
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tempfile::TempDir;

    use super::*;
    use crate::commands::VaultCommand;
    use crate::config::{HearthPaths, Settings};
    use crate::crypto::SecureString;
    use crate::error::HearthError;
    use crate::models::EntityType;
    use crate::vault::ManualClock;

    fn setup(temp_dir: &TempDir) -> (VaultContext, Origin) {
        let settings = Settings {
            kdf_iterations: 1_000,
            ..Settings::default()
        };
        let ui = Origin::trusted(&settings);
        let paths = HearthPaths::with_base_dir(temp_dir.path().to_path_buf());
        let ctx =
            VaultContext::open_with_clock(paths, settings, Arc::new(ManualClock::new())).unwrap();
        (ctx, ui)
    }

    #[test]
    fn test_default_lifecycle() {
        let temp_dir = TempDir::new().unwrap();
        let (mut ctx, ui) = setup(&temp_dir);
        let alex = ctx.add_member(&ui, "Alex").unwrap();
        let sam = ctx.add_member(&ui, "Sam").unwrap();

        let created = match ctx
            .handle_sharing(
                &ui,
                SharingCommand::SetDefault {
                    owner_id: alex.id,
                    recipient_id: sam.id,
                    entity_type: ShareScope::All,
                    permissions: SharePermissions::VIEW_ONLY,
                },
            )
            .unwrap()
        {
            SharingResponse::Default(d) => d,
            other => panic!("unexpected response {:?}", other),
        };

        let updated = ctx
            .handle_sharing(
                &ui,
                SharingCommand::UpdateDefault {
                    actor_id: alex.id,
                    id: created.id,
                    updates: DefaultUpdate {
                        permissions: Some(SharePermissions::FULL),
                        entity_type: Some(ShareScope::Type(EntityType::Goal)),
                    },
                },
            )
            .unwrap();
        match updated {
            SharingResponse::Default(d) => {
                assert_eq!(d.permissions, SharePermissions::FULL);
                assert_eq!(d.entity_type, ShareScope::Type(EntityType::Goal));
            }
            other => panic!("unexpected response {:?}", other),
        }

        let err = ctx
            .handle_sharing(
                &ui,
                SharingCommand::RemoveDefault {
                    actor_id: sam.id,
                    id: created.id,
                },
            )
            .unwrap_err();
        assert!(err.is_access_denied());

        ctx.handle_sharing(
            &ui,
            SharingCommand::RemoveDefault {
                actor_id: alex.id,
                id: created.id,
            },
        )
        .unwrap();
        assert_eq!(
            ctx.handle_sharing(&ui, SharingCommand::GetDefaults { user_id: alex.id })
                .unwrap(),
            SharingResponse::Defaults(Vec::new())
        );
    }

    #[test]
    fn test_shared_with_me_lists_grants() {
        let temp_dir = TempDir::new().unwrap();
        let (mut ctx, ui) = setup(&temp_dir);
        let alex = ctx.add_member(&ui, "Alex").unwrap();
        let sam = ctx.add_member(&ui, "Sam").unwrap();

        ctx.handle_sharing(
            &ui,
            SharingCommand::Share {
                owner_id: alex.id,
                recipient_id: sam.id,
                scope: ShareScope::Type(EntityType::Budget),
                permissions: SharePermissions::VIEW_ONLY,
            },
        )
        .unwrap();

        match ctx
            .handle_sharing(&ui, SharingCommand::GetSharedWithMe { viewer_id: sam.id })
            .unwrap()
        {
            SharingResponse::Shares(shares) => {
                assert_eq!(shares.len(), 1);
                assert_eq!(shares[0].owner_id, alex.id);
            }
            other => panic!("unexpected response {:?}", other),
        }
    }

    #[test]
    fn test_sharing_rejected_while_locked() {
        let temp_dir = TempDir::new().unwrap();
        let (mut ctx, ui) = setup(&temp_dir);
        let alex = ctx.add_member(&ui, "Alex").unwrap();
        ctx.handle_vault(
            &ui,
            VaultCommand::Enable {
                password: SecureString::new("vault-password"),
                auto_lock_minutes: Some(0),
            },
        )
        .unwrap();
        ctx.handle_vault(&ui, VaultCommand::Lock).unwrap();

        let err = ctx
            .handle_sharing(&ui, SharingCommand::GetDefaults { user_id: alex.id })
            .unwrap_err();
        assert!(matches!(err, HearthError::Locked));
    }
}

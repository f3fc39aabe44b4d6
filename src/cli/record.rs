//! Record CLI commands

use std::collections::BTreeMap;

use clap::Subcommand;
use serde_json::Value;

use super::member::{open_session_if_needed, require_member};
use crate::commands::{Origin, VaultContext};
use crate::error::{HearthError, HearthResult};
use crate::models::{EntityRecord, EntityType, RecordId};

/// Record subcommands
#[derive(Subcommand)]
pub enum RecordCommands {
    /// Add a record
    Add {
        /// Owner name or ID
        owner: String,
        /// Entity type (account, transaction, recurring, budget, goal)
        entity_type: String,
        /// Field as key=value; values are parsed as JSON when possible
        #[arg(short, long = "field")]
        fields: Vec<String>,
    },
    /// Show one record
    Show {
        /// Viewing member name or ID
        viewer: String,
        /// Record ID
        record: String,
    },
    /// List the records a member can see
    List {
        /// Viewing member name or ID
        viewer: String,
        /// Only this entity type
        #[arg(short = 't', long)]
        entity_type: Option<String>,
    },
    /// Household total of an amount field
    Total {
        /// Viewing member name or ID
        viewer: String,
        /// Entity type
        entity_type: String,
        /// Integer field to add up
        field: String,
        /// Owners to include (defaults to the viewer)
        #[arg(short, long = "owner")]
        owners: Vec<String>,
    },
}

fn parse_entity_type(s: &str) -> HearthResult<EntityType> {
    EntityType::parse(s).ok_or_else(|| {
        HearthError::Validation(format!(
            "Invalid entity type: '{}'. Valid types: account, transaction, recurring, budget, goal",
            s
        ))
    })
}

/// Parse `key=value` pairs into record fields
pub fn parse_fields(pairs: &[String]) -> HearthResult<BTreeMap<String, Value>> {
    let mut fields = BTreeMap::new();
    for pair in pairs {
        let (key, raw) = pair.split_once('=').ok_or_else(|| {
            HearthError::Validation(format!("Invalid field '{}': expected key=value", pair))
        })?;
        let key = key.trim();
        if key.is_empty() {
            return Err(HearthError::Validation(format!(
                "Invalid field '{}': empty name",
                pair
            )));
        }
        let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        fields.insert(key.to_string(), value);
    }
    Ok(fields)
}

fn print_record(record: &EntityRecord) {
    println!(
        "{} {} (owner {})",
        record.entity_type,
        record.id.as_uuid(),
        record.owner_id().as_uuid()
    );
    for (field, value) in &record.fields {
        println!("  {:<16} {}", field, value);
    }
}

/// Handle a record command
pub fn handle_record_command(
    ctx: &mut VaultContext,
    origin: &Origin,
    cmd: RecordCommands,
) -> HearthResult<()> {
    match cmd {
        RecordCommands::Add {
            owner,
            entity_type,
            fields,
        } => {
            let owner = require_member(ctx, origin, &owner)?;
            let entity_type = parse_entity_type(&entity_type)?;
            let fields = parse_fields(&fields)?;
            open_session_if_needed(ctx, origin, &owner)?;

            let record = ctx.create_record(origin, owner.id, entity_type, fields)?;
            println!("Created {} record: {}", entity_type, record.id.as_uuid());
        }

        RecordCommands::Show { viewer, record } => {
            let viewer = require_member(ctx, origin, &viewer)?;
            let id: RecordId = record
                .parse()
                .map_err(|_| HearthError::Validation(format!("Invalid record ID: {}", record)))?;
            open_session_if_needed(ctx, origin, &viewer)?;

            let record = ctx.get_record(origin, viewer.id, id)?;
            print_record(&record);
        }

        RecordCommands::List {
            viewer,
            entity_type,
        } => {
            let viewer = require_member(ctx, origin, &viewer)?;
            let entity_type = entity_type.as_deref().map(parse_entity_type).transpose()?;
            open_session_if_needed(ctx, origin, &viewer)?;

            let records = ctx.list_records(origin, viewer.id, entity_type)?;
            if records.is_empty() {
                println!("No records visible to {}.", viewer.name);
            }
            records.iter().for_each(print_record);
        }

        RecordCommands::Total {
            viewer,
            entity_type,
            field,
            owners,
        } => {
            let viewer = require_member(ctx, origin, &viewer)?;
            let entity_type = parse_entity_type(&entity_type)?;
            let mut owner_ids = Vec::new();
            for owner in &owners {
                owner_ids.push(require_member(ctx, origin, owner)?.id);
            }
            if owner_ids.is_empty() {
                owner_ids.push(viewer.id);
            }
            open_session_if_needed(ctx, origin, &viewer)?;

            let total = ctx.combine_total(origin, viewer.id, &owner_ids, entity_type, &field)?;
            println!("{} total of {}: {}", entity_type, field, total);
        }
    }

    Ok(())
}

//! Command handlers.
//!
//! Every handler writes its result to `out` so the whole surface can be
//! driven from tests against a [`MemoryStore`](shelfmark_store::MemoryStore).

use std::io::Write;

use anyhow::{bail, Context as _};
use serde_json::json;

use shelfmark_core::backup::RestoreMode;
use shelfmark_core::entity::EntityKind;
use shelfmark_core::hex_code::{format_for_display, from_hex, parse_manual_entry, to_hex};
use shelfmark_core::id::generate_id;
use shelfmark_core::inventory::ItemPatch;
use shelfmark_core::qr_payload::{decode, encode, is_valid};
use shelfmark_core::state::{NewEntity, NewItem, ScanResolution};
use shelfmark_store::{InventoryService, KeyValueStore};

use crate::cli::{
    AreaCommands, BackupCommands, Commands, EncodeArgs, ItemCommands, LocationCommands,
    NewEntityArgs, PoolCommands, QrCommands, RenameArgs, SectionCommands,
};
use crate::config::CliConfig;
use crate::output::{print_json, print_record, print_records};

/// Everything a command needs.
pub struct Context<S> {
    pub service: InventoryService<S>,
    pub config: CliConfig,
    pub json: bool,
}

/// Accept either a raw payload or its typed hex form. Anything else is
/// passed through unchanged so validation reports it.
fn manual_payload(input: &str) -> String {
    parse_manual_entry(input).unwrap_or_else(|| input.trim().to_string())
}

impl From<NewEntityArgs> for NewEntity {
    fn from(args: NewEntityArgs) -> Self {
        Self {
            name: args.name,
            prefix: args.prefix,
            qr_data: args.qr.as_deref().map(manual_payload),
            description: args.description,
        }
    }
}

pub async fn run<S: KeyValueStore>(
    command: Commands,
    ctx: &Context<S>,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    match command {
        Commands::Encode(args) => encode_command(args, ctx.json, out),
        Commands::Decode { payload } => match decode(payload.trim()) {
            Some(decoded) if ctx.json => print_json(out, &decoded),
            Some(decoded) => {
                writeln!(out, "type:   {}", decoded.payload_type)?;
                writeln!(out, "id:     {}", decoded.id)?;
                if let Some(name) = &decoded.name {
                    writeln!(out, "name:   {name}")?;
                }
                if let Some(prefix) = &decoded.prefix {
                    writeln!(out, "prefix: {prefix}")?;
                }
                Ok(())
            }
            None => bail!("'{payload}' is not a valid QR payload"),
        },
        Commands::Hex { payload, display } => {
            let hex = to_hex(&payload);
            let hex = if display { format_for_display(&hex) } else { hex };
            writeln!(out, "{hex}")?;
            Ok(())
        }
        Commands::Unhex { hex } => match from_hex(&hex) {
            Some(payload) => {
                writeln!(out, "{payload}")?;
                Ok(())
            }
            None => bail!("'{hex}' is not valid hex text"),
        },
        Commands::Validate { payload } => {
            let valid = is_valid(payload.trim());
            if ctx.json {
                print_json(out, &json!({ "payload": payload, "valid": valid }))
            } else {
                writeln!(out, "{}", if valid { "valid" } else { "invalid" })?;
                Ok(())
            }
        }
        Commands::Location(cmd) => location_command(cmd, ctx, out).await,
        Commands::Area(cmd) => area_command(cmd, ctx, out).await,
        Commands::Section(cmd) => section_command(cmd, ctx, out).await,
        Commands::Item(cmd) => item_command(cmd, ctx, out).await,
        Commands::Qr(QrCommands::Set { kind, id, payload }) => {
            let payload = manual_payload(&payload);
            ctx.service.set_entity_qr(kind, &id, &payload).await?;
            writeln!(out, "{kind} {id} -> {payload}")?;
            Ok(())
        }
        Commands::Pool(cmd) => pool_command(cmd, ctx, out).await,
        Commands::Scan { raw } => scan_command(&raw, ctx, out).await,
        Commands::Backup(cmd) => backup_command(cmd, ctx, out).await,
    }
}

fn encode_command(args: EncodeArgs, json: bool, out: &mut dyn Write) -> anyhow::Result<()> {
    let id = match args.id {
        Some(id) => id,
        None => generate_id()?,
    };
    let payload = encode(args.kind, &args.name, &id, args.prefix.as_deref())?;
    if json {
        print_json(out, &json!({ "id": id, "payload": payload, "hex": to_hex(&payload) }))
    } else {
        writeln!(out, "{payload}")?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Entities
// ---------------------------------------------------------------------------

async fn rename<S: KeyValueStore>(
    kind: EntityKind,
    args: RenameArgs,
    ctx: &Context<S>,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    ctx.service.rename(kind, &args.id, &args.name).await?;
    writeln!(out, "Renamed {kind} {} to '{}'", args.id, args.name)?;
    Ok(())
}

async fn delete<S: KeyValueStore>(
    kind: EntityKind,
    id: &str,
    ctx: &Context<S>,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    let removed = ctx.service.delete(kind, id).await?;
    if ctx.json {
        let removed: Vec<_> = removed
            .iter()
            .map(|r| json!({ "kind": r.kind, "id": r.id }))
            .collect();
        return print_json(out, &removed);
    }
    for r in &removed {
        writeln!(out, "Deleted {} {}", r.kind, r.id)?;
    }
    Ok(())
}

async fn location_command<S: KeyValueStore>(
    cmd: LocationCommands,
    ctx: &Context<S>,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    match cmd {
        LocationCommands::Add { entity, address } => {
            let location = ctx.service.create_location(entity.into(), address).await?;
            print_record(out, ctx.json, &location)
        }
        LocationCommands::Rename(args) => rename(EntityKind::Location, args, ctx, out).await,
        LocationCommands::Delete { id } => delete(EntityKind::Location, &id, ctx, out).await,
        LocationCommands::List => {
            let state = ctx.service.snapshot().await;
            print_records(out, ctx.json, &state.inventory.locations)
        }
    }
}

async fn area_command<S: KeyValueStore>(
    cmd: AreaCommands,
    ctx: &Context<S>,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    match cmd {
        AreaCommands::Add {
            location_id,
            entity,
        } => {
            let area = ctx.service.create_area(&location_id, entity.into()).await?;
            print_record(out, ctx.json, &area)
        }
        AreaCommands::Rename(args) => rename(EntityKind::Area, args, ctx, out).await,
        AreaCommands::Delete { id } => delete(EntityKind::Area, &id, ctx, out).await,
        AreaCommands::List { location } => {
            let state = ctx.service.snapshot().await;
            let areas = state
                .inventory
                .areas
                .iter()
                .filter(|a| location.as_deref().map_or(true, |l| a.location_id == l));
            print_records(out, ctx.json, areas)
        }
    }
}

async fn section_command<S: KeyValueStore>(
    cmd: SectionCommands,
    ctx: &Context<S>,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    match cmd {
        SectionCommands::Add { area_id, entity } => {
            let section = ctx.service.create_section(&area_id, entity.into()).await?;
            print_record(out, ctx.json, &section)
        }
        SectionCommands::Rename(args) => rename(EntityKind::Section, args, ctx, out).await,
        SectionCommands::Delete { id } => delete(EntityKind::Section, &id, ctx, out).await,
        SectionCommands::List { area } => {
            let state = ctx.service.snapshot().await;
            let sections = state
                .inventory
                .sections
                .iter()
                .filter(|s| area.as_deref().map_or(true, |a| s.area_id == a));
            print_records(out, ctx.json, sections)
        }
    }
}

async fn item_command<S: KeyValueStore>(
    cmd: ItemCommands,
    ctx: &Context<S>,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    match cmd {
        ItemCommands::Add {
            area_id,
            entity,
            section,
            quantity,
            condition,
            image_uri,
        } => {
            let mut new = NewItem::new(entity.into(), area_id, section);
            if let Some(quantity) = quantity {
                new.quantity = quantity;
            }
            if let Some(condition) = condition {
                new.condition = condition;
            }
            new.image_uri = image_uri;
            let item = ctx.service.create_item(new).await?;
            print_record(out, ctx.json, &item)
        }
        ItemCommands::Rename(args) => rename(EntityKind::Item, args, ctx, out).await,
        ItemCommands::Delete { id } => delete(EntityKind::Item, &id, ctx, out).await,
        ItemCommands::List { area, section } => {
            let state = ctx.service.snapshot().await;
            let items = state.inventory.items.iter().filter(|i| {
                area.as_deref().map_or(true, |a| i.area_id == a)
                    && section
                        .as_deref()
                        .map_or(true, |s| i.section_id.as_deref() == Some(s))
            });
            print_records(out, ctx.json, items)
        }
        ItemCommands::Move {
            id,
            area_id,
            section,
        } => {
            ctx.service
                .move_item(&id, &area_id, section.as_deref())
                .await?;
            writeln!(out, "Moved item {id} to area {area_id}")?;
            Ok(())
        }
        ItemCommands::Update {
            id,
            quantity,
            condition,
            description,
        } => {
            let patch = ItemPatch {
                quantity,
                condition,
                description: description.map(Some),
                image_uri: None,
            };
            let item = ctx.service.update_item(&id, patch).await?;
            print_record(out, ctx.json, &item)
        }
    }
}

// ---------------------------------------------------------------------------
// Pool and scanning
// ---------------------------------------------------------------------------

async fn pool_command<S: KeyValueStore>(
    cmd: PoolCommands,
    ctx: &Context<S>,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    match cmd {
        PoolCommands::Generate { count, prefix } => {
            let prefix = prefix.or_else(|| ctx.config.pool_prefix.clone());
            let entries = ctx.service.generate_pool(count, prefix.as_deref()).await?;
            print_records(out, ctx.json, &entries)
        }
        PoolCommands::List { unassigned } => {
            let state = ctx.service.snapshot().await;
            let entries = state
                .pool
                .entries()
                .iter()
                .filter(|e| !unassigned || !e.is_assigned());
            print_records(out, ctx.json, entries)
        }
        PoolCommands::Delete { qr_data } => {
            let entry = ctx.service.delete_pool_entry(&manual_payload(&qr_data)).await?;
            writeln!(out, "Deleted {}", entry.qr_data)?;
            Ok(())
        }
        PoolCommands::Clear => {
            let removed = ctx.service.clear_pool().await?;
            writeln!(out, "Removed {removed} unassigned codes")?;
            Ok(())
        }
        PoolCommands::Stats => {
            let stats = ctx.service.pool_stats().await;
            if ctx.json {
                return print_json(out, &stats);
            }
            writeln!(
                out,
                "total={} assigned={} unassigned={}",
                stats.total, stats.assigned, stats.unassigned
            )?;
            Ok(())
        }
    }
}

async fn scan_command<S: KeyValueStore>(
    raw: &str,
    ctx: &Context<S>,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    let payload = manual_payload(raw);
    let resolution = ctx.service.resolve_scan(&payload).await;
    let value = match &resolution {
        ScanResolution::Entity { kind, id } => json!({ "status": "entity", "kind": kind, "id": id }),
        ScanResolution::Unassigned { qr_data } => json!({ "status": "unassigned", "qrData": qr_data }),
        ScanResolution::Unknown { payload_type } => {
            json!({ "status": "unknown", "type": payload_type })
        }
        ScanResolution::Invalid => json!({ "status": "invalid" }),
    };
    if ctx.json {
        return print_json(out, &value);
    }
    match resolution {
        ScanResolution::Entity { kind, id } => writeln!(out, "{kind} {id}")?,
        ScanResolution::Unassigned { qr_data } => writeln!(out, "unassigned pool code {qr_data}")?,
        ScanResolution::Unknown { payload_type } => {
            writeln!(out, "valid {payload_type} code not in this inventory")?
        }
        ScanResolution::Invalid => writeln!(out, "invalid code")?,
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Backup
// ---------------------------------------------------------------------------

async fn backup_command<S: KeyValueStore>(
    cmd: BackupCommands,
    ctx: &Context<S>,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    match cmd {
        BackupCommands::Export { file } => {
            let json = ctx.service.export_backup().await?;
            tokio::fs::write(&file, &json)
                .await
                .with_context(|| format!("failed to write backup to {}", file.display()))?;
            writeln!(out, "Exported backup to {}", file.display())?;
            Ok(())
        }
        BackupCommands::Import { file, merge } => {
            let json = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("failed to read backup from {}", file.display()))?;
            let mode = if merge {
                RestoreMode::Merge
            } else {
                RestoreMode::Replace
            };
            let outcome = ctx.service.import_backup(&json, mode).await?;
            if ctx.json {
                return print_json(
                    out,
                    &json!({
                        "sourceVersion": outcome.source_version,
                        "warnings": outcome.warnings,
                        "summary": outcome.summary,
                    }),
                );
            }
            let s = &outcome.summary;
            writeln!(
                out,
                "Imported v{} ({mode}): locations +{} areas +{} sections +{} items +{} codes +{}",
                outcome.source_version,
                s.locations.added,
                s.areas.added,
                s.sections.added,
                s.items.added,
                s.pre_generated_qrs.added,
            )?;
            for warning in &outcome.warnings {
                writeln!(out, "warning: {warning}")?;
            }
            if !s.orphans.is_empty() {
                writeln!(out, "{} records reference missing parents", s.orphans.len())?;
            }
            Ok(())
        }
    }
}

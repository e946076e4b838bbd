//! Command-line surface.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};
use shelfmark_core::entity::{EntityKind, ItemCondition};

fn parse_kind(s: &str) -> Result<EntityKind, String> {
    EntityKind::from_str(&s.to_ascii_lowercase()).ok_or_else(|| {
        let names: Vec<_> = EntityKind::ALL.iter().map(|k| k.as_str()).collect();
        format!("unknown kind '{s}', expected one of: {}", names.join(", "))
    })
}

fn parse_condition(s: &str) -> Result<ItemCondition, String> {
    ItemCondition::from_str(&s.to_ascii_lowercase())
        .ok_or_else(|| format!("unknown condition '{s}'"))
}

#[derive(Debug, Parser)]
#[command(
    name = "shelfmark",
    about = "QR labels and identity for a location/area/section/item inventory",
    version
)]
pub struct Cli {
    #[arg(long, global = true, help = "Data directory (overrides SHELFMARK_DATA_DIR)")]
    pub data_dir: Option<PathBuf>,
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON"
    )]
    pub json: bool,
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Build the QR payload for an entity.
    Encode(EncodeArgs),
    /// Decode a QR payload into its parts.
    Decode { payload: String },
    /// Transcode a payload to upper-case hex.
    Hex {
        payload: String,
        #[arg(long, help = "Group the output in blocks of four")]
        display: bool,
    },
    /// Transcode hex (whitespace allowed) back to a payload.
    Unhex { hex: String },
    /// Check whether a string is a valid QR payload.
    Validate { payload: String },
    #[command(subcommand)]
    Location(LocationCommands),
    #[command(subcommand)]
    Area(AreaCommands),
    #[command(subcommand)]
    Section(SectionCommands),
    #[command(subcommand)]
    Item(ItemCommands),
    #[command(subcommand)]
    Qr(QrCommands),
    #[command(subcommand)]
    Pool(PoolCommands),
    /// Resolve a scanned payload or typed hex code.
    Scan { raw: String },
    #[command(subcommand)]
    Backup(BackupCommands),
}

#[derive(Debug, Args)]
pub struct EncodeArgs {
    #[arg(value_parser = parse_kind)]
    pub kind: EntityKind,
    pub name: String,
    #[arg(long, help = "Entity id; a fresh one is generated when omitted")]
    pub id: Option<String>,
    #[arg(long)]
    pub prefix: Option<String>,
}

/// Fields shared by every `add` command.
#[derive(Debug, Args)]
pub struct NewEntityArgs {
    pub name: String,
    #[arg(long, help = "Prefix for the generated payload")]
    pub prefix: Option<String>,
    #[arg(long, help = "Label with an existing payload, e.g. a pool code")]
    pub qr: Option<String>,
    #[arg(long)]
    pub description: Option<String>,
}

#[derive(Debug, Args)]
pub struct RenameArgs {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Subcommand)]
pub enum LocationCommands {
    Add {
        #[command(flatten)]
        entity: NewEntityArgs,
        #[arg(long)]
        address: Option<String>,
    },
    Rename(RenameArgs),
    Delete { id: String },
    List,
}

#[derive(Debug, Subcommand)]
pub enum AreaCommands {
    Add {
        location_id: String,
        #[command(flatten)]
        entity: NewEntityArgs,
    },
    Rename(RenameArgs),
    Delete { id: String },
    List {
        #[arg(long)]
        location: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
pub enum SectionCommands {
    Add {
        area_id: String,
        #[command(flatten)]
        entity: NewEntityArgs,
    },
    Rename(RenameArgs),
    /// Delete a section; its items stay in the area.
    Delete { id: String },
    List {
        #[arg(long)]
        area: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
pub enum ItemCommands {
    Add {
        area_id: String,
        #[command(flatten)]
        entity: NewEntityArgs,
        #[arg(long)]
        section: Option<String>,
        #[arg(long)]
        quantity: Option<u32>,
        #[arg(long, value_parser = parse_condition)]
        condition: Option<ItemCondition>,
        #[arg(long)]
        image_uri: Option<String>,
    },
    Rename(RenameArgs),
    Delete { id: String },
    List {
        #[arg(long)]
        area: Option<String>,
        #[arg(long)]
        section: Option<String>,
    },
    /// Move an item to another area, optionally into a section.
    Move {
        id: String,
        area_id: String,
        #[arg(long)]
        section: Option<String>,
    },
    /// Change quantity, condition or description.
    Update {
        id: String,
        #[arg(long)]
        quantity: Option<u32>,
        #[arg(long, value_parser = parse_condition)]
        condition: Option<ItemCondition>,
        #[arg(long)]
        description: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
pub enum QrCommands {
    /// Label an entity with a payload (or typed hex code).
    Set {
        #[arg(value_parser = parse_kind)]
        kind: EntityKind,
        id: String,
        payload: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum PoolCommands {
    /// Mint a batch of unassigned codes.
    Generate {
        count: usize,
        #[arg(long, help = "Prefix (overrides SHELFMARK_POOL_PREFIX)")]
        prefix: Option<String>,
    },
    List {
        #[arg(long, action = ArgAction::SetTrue)]
        unassigned: bool,
    },
    /// Delete one unassigned code.
    Delete { qr_data: String },
    /// Delete every unassigned code.
    Clear,
    Stats,
}

#[derive(Debug, Subcommand)]
pub enum BackupCommands {
    Export { file: PathBuf },
    Import {
        file: PathBuf,
        #[arg(long, action = ArgAction::SetTrue, help = "Keep existing records and add new ones")]
        merge: bool,
    },
}

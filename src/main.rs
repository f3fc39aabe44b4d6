use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use hearth::cli::{
    ensure_unlocked, handle_member_command, handle_record_command, handle_share_command,
    handle_vault_command, MemberCommands, RecordCommands, ShareCommands, VaultCommands,
};
use hearth::commands::{Origin, VaultContext};
use hearth::config::{HearthPaths, Settings};
use hearth::storage::Storage;
use hearth::vault::VaultState;
use hearth::HearthResult;

/// Environment variable holding the log filter
const LOG_ENV: &str = "HEARTH_LOG";

#[derive(Parser)]
#[command(
    name = "hearth",
    version,
    about = "Local-first household finance vault",
    long_about = "Hearth keeps household finance data encrypted at rest and lets each \
                  member encrypt their own records and share them selectively."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new household store
    Init,

    /// Show current configuration and paths
    Config,

    /// Vault encryption commands
    #[command(subcommand)]
    Vault(VaultCommands),

    /// Household member commands
    #[command(subcommand)]
    Member(MemberCommands),

    /// Sharing commands
    #[command(subcommand)]
    Share(ShareCommands),

    /// Record commands
    #[command(subcommand)]
    Record(RecordCommands),
}

fn init_logging(settings: &Settings) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .unwrap_or_else(|_| EnvFilter::new(settings.log_level.as_str()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize paths and settings
    let paths = HearthPaths::new()?;
    let settings = Settings::load_or_create(&paths)?;
    init_logging(&settings);

    match cli.command {
        Some(Commands::Init) => {
            println!("Initializing Hearth at: {}", paths.base_dir().display());
            paths.ensure_directories()?;
            settings.save(&paths)?;
            if paths.store_file().exists() || paths.envelope_file().exists() {
                println!("A household store already exists; leaving it untouched.");
            } else {
                Storage::new(paths.store_file()).save()?;
            }
            println!("Initialization complete!");
            println!();
            println!("Run 'hearth member add <name>' to add household members.");
            println!("Run 'hearth vault enable' to encrypt the store at rest.");
        }
        Some(Commands::Config) => {
            println!("Hearth Configuration");
            println!("====================");
            println!("Config directory: {}", paths.base_dir().display());
            println!("Data directory:   {}", paths.data_dir().display());
            println!("Store file:       {}", paths.store_file().display());
            println!();
            println!("Settings:");
            println!("  KDF iterations:      {}", settings.kdf_iterations);
            println!("  Default auto-lock:   {} min", settings.default_auto_lock_minutes);
            println!("  Min password length: {}", settings.min_password_length);
            println!("  Log level:           {}", settings.log_level);
        }
        Some(command) => {
            run(paths, settings, command).map_err(|e| anyhow::anyhow!(e.user_message()))?;
        }
        None => {
            println!("Hearth - household finance vault");
            println!();
            println!("Run 'hearth --help' for usage information.");
        }
    }

    Ok(())
}

/// Run one command against the vault context
///
/// The store is sealed again on exit unless it was left decrypted by
/// `hearth vault unlock`, the auto-lock timeout has not passed since, and
/// this command is not `vault lock`.
fn run(paths: HearthPaths, settings: Settings, command: Commands) -> HearthResult<()> {
    let origin = Origin::trusted(&settings);
    let mut ctx = VaultContext::open(paths, settings)?;

    let detached = ctx.state() == VaultState::Detached;
    let expired = ctx.detach_expired();
    if expired {
        info!("Decrypted store outlived the auto-lock timeout; sealing on exit");
    }
    let keep_decrypted = match &command {
        Commands::Vault(VaultCommands::Unlock) => true,
        Commands::Vault(VaultCommands::Lock) => false,
        _ => detached && !expired,
    };

    let result = dispatch(&mut ctx, &origin, command);
    let finished = if keep_decrypted {
        ctx.detach()
    } else {
        ctx.shutdown()
    };
    result.and(finished)
}

fn dispatch(ctx: &mut VaultContext, origin: &Origin, command: Commands) -> HearthResult<()> {
    match command {
        Commands::Vault(cmd) => handle_vault_command(ctx, origin, cmd),
        Commands::Member(cmd) => {
            ensure_unlocked(ctx, origin)?;
            handle_member_command(ctx, origin, cmd)
        }
        Commands::Share(cmd) => {
            ensure_unlocked(ctx, origin)?;
            handle_share_command(ctx, origin, cmd)
        }
        Commands::Record(cmd) => {
            ensure_unlocked(ctx, origin)?;
            handle_record_command(ctx, origin, cmd)
        }
        Commands::Init | Commands::Config => Ok(()),
    }
}

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use zeroize::Zeroizing;

mod auth;
mod output;

use output::{OutputFormat, render_entries, render_entry};
use vaultkeep::{
    Config, DEFAULT_PROFILE, Entry, EntryUpdate, LockGuard, MasterPassword, Storage, Vault,
    VaultError, random_printable, remove_stale_lock,
};

const DEFAULT_GENERATED_LENGTH: usize = 32;

#[derive(Debug, Parser)]
#[command(name = "vaultkeep")]
#[command(version, about = "Offline password vault with per-profile encrypted stores.")]
struct Cli {
    /// Profile whose store is used
    #[arg(
        long,
        global = true,
        env = "VAULTKEEP_PROFILE",
        default_value = DEFAULT_PROFILE
    )]
    profile: String,

    /// Directory holding the profile stores (overrides config.json)
    #[arg(long, global = true, value_name = "DIR", env = "VAULTKEEP_DATA_DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, clap::Args)]
struct EntryFields {
    /// Free-text description
    #[arg(long)]
    description: Option<String>,

    /// Comma-separated tags
    #[arg(long, value_name = "TAG,TAG")]
    tags: Option<String>,

    /// Site or URL
    #[arg(long)]
    site: Option<String>,

    /// Login id (stored encrypted)
    #[arg(long)]
    id: Option<String>,

    /// Password (stored encrypted)
    #[arg(long)]
    password: Option<String>,
}

impl EntryFields {
    fn is_empty(&self) -> bool {
        self.description.is_none()
            && self.tags.is_none()
            && self.site.is_none()
            && self.id.is_none()
            && self.password.is_none()
    }
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Sets or changes the master password
    MasterPassword,

    /// Adds an entry; fields not given as flags are prompted for
    Add {
        /// Unique id of the entry (random UUID when omitted)
        unique_id: Option<String>,

        #[command(flatten)]
        fields: EntryFields,
    },

    /// Shows an entry
    #[command(arg_required_else_help = true)]
    Get {
        unique_id: String,

        /// Show every field, decrypted
        #[arg(long, conflicts_with_all = ["id", "password", "copy"])]
        all: bool,

        /// Print only the decrypted id
        #[arg(long, conflicts_with_all = ["password", "copy"])]
        id: bool,

        /// Print only the decrypted password
        #[arg(long, conflicts_with = "copy")]
        password: bool,

        /// Copy id, then password, to the clipboard
        #[arg(long)]
        copy: bool,

        #[arg(long, value_enum, default_value_t)]
        output: OutputFormat,
    },

    /// Changes fields of an entry; empty values are ignored
    #[command(arg_required_else_help = true)]
    Update {
        unique_id: String,

        /// New unique id
        #[arg(long = "unique-id")]
        new_unique_id: Option<String>,

        #[command(flatten)]
        fields: EntryFields,
    },

    /// Removes an entry
    #[command(arg_required_else_help = true)]
    Remove { unique_id: String },

    /// Lists all entries
    List {
        #[arg(long, value_enum, default_value_t)]
        output: OutputFormat,
    },

    /// Finds entries whose unique id, description, tags or site contain a term
    #[command(arg_required_else_help = true)]
    Search {
        term: String,

        #[arg(long, default_value_t = false)]
        case_sensitive: bool,

        #[arg(long, value_enum, default_value_t)]
        output: OutputFormat,
    },

    /// Generates a random password
    Generate {
        #[arg(long, short, default_value_t = DEFAULT_GENERATED_LENGTH)]
        length: usize,
    },

    /// Lists profiles in the data directory
    ListProfiles,

    /// Deletes a stale lock file left behind by a crashed run
    RemoveLock,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Generate { length } => {
            println!("{}", random_printable(length)?);
            return Ok(());
        }
        Commands::ListProfiles => {
            for profile in resolve_config(&cli)?.list_profiles()? {
                println!("{profile}");
            }
            return Ok(());
        }
        Commands::RemoveLock => {
            let storage = resolve_storage(&cli)?;
            remove_stale_lock(&storage.lock_path())?;
            println!("lock removed for profile '{}'", cli.profile);
            return Ok(());
        }
        _ => {}
    }

    let vault = Vault::new(resolve_storage(&cli)?);
    let creates_store = matches!(cli.command, Commands::Add { .. } | Commands::MasterPassword);
    if !creates_store && !vault.storage().exists() {
        return Err(VaultError::StoreNotFound(vault.storage().path().to_path_buf()).into());
    }
    let _lock = lock_store(vault.storage())?;
    if creates_store {
        vault.init()?;
    }

    match cli.command {
        Commands::MasterPassword => change_master_password(&vault)?,
        Commands::Add { unique_id, fields } => {
            let master = unlock(&vault)?;
            let entry = read_new_entry(unique_id.unwrap_or_default(), fields)?;
            let unique_id = vault.add(&master, entry)?;
            println!("New entry: {unique_id}");
        }
        Commands::Get {
            unique_id,
            all,
            id,
            password,
            copy,
            output,
        } => {
            if !(all || id || password || copy) {
                require_master_password(&vault)?;
                println!("{}", render_entry(&vault.get(&unique_id)?, false, output)?);
                return Ok(());
            }

            let master = unlock(&vault)?;
            let entry = vault.get_sensitive(&master, &unique_id)?;
            if copy {
                copy_to_clipboard(&entry)?;
            } else if id {
                println!("{}", entry.id);
            } else if password {
                println!("{}", entry.password);
            } else {
                println!("{}", render_entry(&entry, true, output)?);
            }
        }
        Commands::Update {
            unique_id,
            new_unique_id,
            fields,
        } => {
            let update = EntryUpdate {
                unique_id: non_empty(new_unique_id),
                description: non_empty(fields.description),
                tags: non_empty(fields.tags).map(|t| parse_tags(&t)),
                site: non_empty(fields.site),
                id: non_empty(fields.id),
                password: non_empty(fields.password),
            };
            if update.is_empty() {
                bail!("nothing to update");
            }

            let master = unlock(&vault)?;
            let unique_id = vault.update(&master, &unique_id, update)?;
            println!("entry '{unique_id}' updated");
        }
        Commands::Remove { unique_id } => {
            let master = unlock(&vault)?;
            vault.remove(&master, &unique_id)?;
            println!("entry '{unique_id}' removed");
        }
        Commands::List { output } => {
            require_master_password(&vault)?;
            print!("{}", render_entries(&vault.list()?, output)?);
        }
        Commands::Search {
            term,
            case_sensitive,
            output,
        } => {
            require_master_password(&vault)?;
            print!("{}", render_entries(&vault.search(&term, case_sensitive)?, output)?);
        }
        Commands::Generate { .. } | Commands::ListProfiles | Commands::RemoveLock => {}
    }

    Ok(())
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_env("VAULTKEEP_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("vaultkeep=warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();
}

fn resolve_config(cli: &Cli) -> Result<Config> {
    match &cli.data_dir {
        Some(dir) => Ok(Config::new(dir.clone())),
        None => Config::from_platform_dirs(),
    }
}

fn resolve_storage(cli: &Cli) -> Result<Storage> {
    let profile = cli.profile.as_str();
    if profile.is_empty() || profile.contains(['/', '\\']) || profile.starts_with('.') {
        bail!("invalid profile name '{profile}'");
    }
    Ok(resolve_config(cli)?.storage(profile))
}

/// Takes the store lock and makes Ctrl-C release it before exiting.
fn lock_store(storage: &Storage) -> Result<LockGuard> {
    let guard = storage.lock()?;

    let path = guard.path().to_path_buf();
    ctrlc::set_handler(move || {
        let _ = std::fs::remove_file(&path);
        std::process::exit(130);
    })
    .context("failed to install Ctrl-C handler")?;

    Ok(guard)
}

fn require_master_password(vault: &Vault) -> Result<()> {
    if !vault.is_master_password_set()? {
        return Err(VaultError::MasterPasswordNotSet.into());
    }
    Ok(())
}

fn unlock(vault: &Vault) -> Result<MasterPassword> {
    require_master_password(vault)?;
    Ok(vault.unlock(auth::read_master_password()?)?)
}

fn change_master_password(vault: &Vault) -> Result<()> {
    let old = if vault.is_master_password_set()? {
        let old = auth::read_master_password()?;
        if !vault.is_master_password_correct(&old)? {
            return Err(VaultError::IncorrectMasterPassword.into());
        }
        old
    } else {
        Zeroizing::new(String::new())
    };

    let new = auth::read_new_password_with_confirmation(|candidate| {
        if !old.is_empty() && old.as_str() == candidate {
            bail!("new master password is the same as the current one");
        }
        Ok(())
    })?;

    if !old.is_empty() {
        println!("Re-encrypting entries with the new master password...");
    }
    vault.set_master_password(&old, &new)?;
    println!("Master password updated.");

    Ok(())
}

fn read_new_entry(unique_id: String, fields: EntryFields) -> Result<Entry> {
    let prompt = fields.is_empty();
    let field = |value: Option<String>, label: &str| -> Result<String> {
        match value {
            Some(v) => Ok(v),
            None if prompt => auth::prompt_line(&format!("{label}: ")),
            None => Ok(String::new()),
        }
    };

    let description = field(fields.description, "Description")?;
    let tags = parse_tags(&field(fields.tags, "Tags (comma-separated)")?);
    let site = field(fields.site, "Site")?;
    let id = field(fields.id, "ID")?;
    let password = match fields.password {
        Some(p) => p,
        None if prompt => auth::prompt_secret("Password: ")?.to_string(),
        None => String::new(),
    };

    if password.is_empty() {
        bail!("entry password cannot be empty");
    }

    Ok(Entry {
        unique_id,
        description,
        tags,
        site,
        id,
        password,
    })
}

fn copy_to_clipboard(entry: &Entry) -> Result<()> {
    let mut clipboard = arboard::Clipboard::new().context("clipboard unavailable")?;

    clipboard.set_text(entry.id.as_str())?;
    auth::wait_for_enter("ID copied. Press Enter to copy the password...")?;

    clipboard.set_text(entry.password.as_str())?;
    auth::wait_for_enter("Password copied. Press Enter to clear the clipboard...")?;

    clipboard.clear()?;
    Ok(())
}

fn parse_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

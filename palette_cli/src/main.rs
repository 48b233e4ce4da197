use anyhow::Context;
use clap::{Parser, Subcommand};
use palette_core::{
    Accounts, Color, Config, Identity, IdentityProvider, JsonFileStore, MessagesClient, Palette,
    PaletteId, PalettePatch, PaletteStore, SLOTS, rating,
};
use std::path::PathBuf;

mod repl;

#[derive(Debug, Parser)]
#[command(name = "palette", version, about = "Palette Party from the terminal")]
struct Cli {
    /// TOML config file (defaults to $PALETTE_CONFIG or ./palette.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Account used for commands that change palettes.
    #[arg(long, global = true, env = "PALETTE_EMAIL")]
    email: Option<String>,

    #[arg(long, global = true, env = "PALETTE_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create an account.
    Signup { email: String, password: String },
    /// Print the feed, newest first.
    List,
    /// Save a new palette.
    Create {
        #[arg(long)]
        name: String,
        /// Exactly five colors, e.g. "#AA0000" or "aa0000".
        #[arg(num_args = SLOTS, required = true)]
        colors: Vec<String>,
    },
    /// Change one of your palettes.
    Update {
        id: PaletteId,
        #[arg(long)]
        name: Option<String>,
        #[arg(long, num_args = SLOTS)]
        colors: Option<Vec<String>>,
    },
    /// Delete one of your palettes.
    Delete { id: PaletteId },
    /// Ask the rating model how cohesive a palette is.
    Rate { id: PaletteId },
    /// Interactive editor (type `help` inside).
    Edit,
}

fn parse_colors(raw: &[String]) -> anyhow::Result<[Color; SLOTS]> {
    let colors: Vec<Color> = raw
        .iter()
        .map(|s| s.parse().with_context(|| format!("bad color '{s}'")))
        .collect::<anyhow::Result<_>>()?;
    colors
        .try_into()
        .map_err(|v: Vec<Color>| anyhow::anyhow!("expected {SLOTS} colors, got {}", v.len()))
}

fn sign_in(cli: &Cli, accounts: &mut Accounts) -> anyhow::Result<Identity> {
    let email = cli
        .email
        .as_deref()
        .context("missing --email (or PALETTE_EMAIL)")?;
    let password = cli
        .password
        .as_deref()
        .context("missing --password (or PALETTE_PASSWORD)")?;
    Ok(accounts.sign_in(email, password)?)
}

pub(crate) fn print_palette(p: &Palette, mine: bool) {
    let id = p.id.map(|id| id.to_string()).unwrap_or_else(|| "(draft)".into());
    let when = p
        .created_at
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_default();
    println!(
        "{} {:<20} {}  {}  {}",
        if mine { "*" } else { " " },
        p.name,
        p.hex_labels().join(" "),
        when,
        id
    );
}

pub(crate) fn block_on_rating(cfg: &Config, colors: &[Color; SLOTS]) -> anyhow::Result<rating::Rating> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("start async runtime")?;

    let score = match MessagesClient::from_config(&cfg.rating) {
        Ok(client) => rt.block_on(rating::rate(&client, colors)),
        Err(e) => {
            tracing::warn!("{e:#}");
            rating::Rating::FALLBACK
        }
    };
    Ok(score)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = Config::load(cli.config.as_deref())?;
    palette_core::configure_logging(&cfg.log_filter);

    let mut accounts = Accounts::open(cfg.accounts_path())?;

    match &cli.command {
        Command::Signup { email, password } => {
            let who = accounts.sign_up(email, password)?;
            println!("Created account {} ({})", who.email, who.id);
        }
        Command::List => {
            let store = JsonFileStore::open(cfg.palettes_path())?;
            let me = sign_in(&cli, &mut accounts).ok();
            let all = store.list()?;
            if all.is_empty() {
                println!("(no palettes yet)");
            }
            for p in &all {
                print_palette(p, me.as_ref().is_some_and(|m| p.is_owned_by(&m.id)));
            }
        }
        Command::Create { name, colors } => {
            let me = sign_in(&cli, &mut accounts)?;
            let mut store = JsonFileStore::open(cfg.palettes_path())?;
            let palette = Palette::new(name.trim(), parse_colors(colors)?);
            let id = store.create(Some(&me), palette)?;
            println!("Saved palette {id}");
        }
        Command::Update { id, name, colors } => {
            let me = sign_in(&cli, &mut accounts)?;
            let mut store = JsonFileStore::open(cfg.palettes_path())?;
            let patch = PalettePatch {
                name: name.as_ref().map(|n| n.trim().to_string()),
                colors: colors.as_deref().map(parse_colors).transpose()?,
                selected_states: colors.as_ref().map(|_| [true; SLOTS]),
            };
            if patch.is_empty() {
                anyhow::bail!("nothing to update: pass --name and/or --colors");
            }
            store.update(Some(&me), *id, patch)?;
            println!("Updated palette {id}");
        }
        Command::Delete { id } => {
            let me = sign_in(&cli, &mut accounts)?;
            let mut store = JsonFileStore::open(cfg.palettes_path())?;
            store.delete(Some(&me), *id)?;
            println!("Deleted palette {id}");
        }
        Command::Rate { id } => {
            let store = JsonFileStore::open(cfg.palettes_path())?;
            let p = store.get(*id)?;
            let score = block_on_rating(&cfg, &p.colors)?;
            println!("{}: {}/3", p.name, score.value());
        }
        Command::Edit => repl::run(&cfg, accounts)?,
    }

    Ok(())
}

// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use binkit::{
    link::{LinkOutcome, LinkState},
    path::BinDirs,
    script::{validate_name, ScriptStore},
};

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::{
    env,
    io::{stderr, IsTerminal},
    process::exit,
};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "bunscript [options] <bunscript-command>",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    fn run(self) -> Result<()> {
        let store = ScriptStore::open_default()?;
        match self.command {
            Command::New(opts) => run_new(&store, opts),
            Command::Rm(opts) => run_rm(&store, opts),
            Command::Link => run_link(&store),
            Command::Unlink(opts) => run_unlink(&store, opts),
            Command::List => run_list(&store),
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Create new script and link it into bin directory.
    #[command(override_usage = "bunscript new [options] <name>")]
    New(NewOptions),

    /// Unlink and delete script.
    #[command(override_usage = "bunscript rm [options] <name>")]
    Rm(RmOptions),

    /// Link every script into bin directory.
    #[command(override_usage = "bunscript link [options]")]
    Link,

    /// Remove links of one or every script from all bin directories.
    #[command(override_usage = "bunscript unlink [options] [name]")]
    Unlink(UnlinkOptions),

    /// Show every script with its link state.
    #[command(override_usage = "bunscript list [options]")]
    List,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct NewOptions {
    /// Name of script to create.
    #[arg(value_name = "name", value_parser = script_name)]
    pub name: String,

    /// Open new script in $EDITOR.
    #[arg(short, long)]
    pub edit: bool,

    /// Do not link new script into bin directory.
    #[arg(short, long)]
    pub no_link: bool,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct RmOptions {
    /// Name of script to remove.
    #[arg(value_name = "name")]
    pub name: String,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct UnlinkOptions {
    /// Name of script to unlink, every script if omitted.
    #[arg(value_name = "name")]
    pub name: Option<String>,
}

fn main() {
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .without_time()
        .with_ansi(stderr().is_terminal())
        .with_writer(stderr);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry().with(layer).with(filter).init();

    if let Err(error) = Cli::parse().run() {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

fn script_name(name: &str) -> Result<String, String> {
    validate_name(name)
        .map(|_| name.to_string())
        .map_err(|err| err.to_string())
}

fn run_new(store: &ScriptStore, opts: NewOptions) -> Result<()> {
    // INVARIANT: Discover bin directories before anything gets written.
    let bins = if opts.no_link {
        None
    } else {
        Some(BinDirs::from_env()?)
    };
    let script = store.create(&opts.name)?;

    if let Some(bins) = bins {
        if store.link(&script.name, &bins)? == LinkOutcome::Rejected {
            bail!(
                "created {} but could not link it into {}",
                script.path.display(),
                bins.primary().display()
            );
        }
    }

    if opts.edit {
        let editor = env::var("EDITOR").unwrap_or_default();
        store.edit(&script.name, &editor)?;
    }

    Ok(())
}

fn run_rm(store: &ScriptStore, opts: RmOptions) -> Result<()> {
    let bins = BinDirs::from_env()?;
    store.remove(&opts.name, &bins)?;

    Ok(())
}

fn run_link(store: &ScriptStore) -> Result<()> {
    let bins = BinDirs::from_env()?;
    let report = store.link_all(&bins)?;
    info!(
        "{} linked, {} already linked, {} rejected",
        report.created.len(),
        report.skipped.len(),
        report.rejected.len()
    );

    if !report.is_clean() {
        bail!("could not link: {}", report.rejected.join(", "));
    }

    Ok(())
}

fn run_unlink(store: &ScriptStore, opts: UnlinkOptions) -> Result<()> {
    let bins = BinDirs::from_env()?;
    let removed = store.unlink(opts.name.as_deref(), &bins)?;
    info!("{} link(s) removed", removed.len());

    Ok(())
}

fn run_list(store: &ScriptStore) -> Result<()> {
    let bins = BinDirs::from_env()?;
    for (script, state) in store.status(&bins)? {
        let state = match state {
            LinkState::Valid => "linked",
            LinkState::Absent => "not linked",
            LinkState::Other => "blocked",
        };
        println!("{:<24} {state}", script.name);
    }

    Ok(())
}

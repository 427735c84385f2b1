// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use binkit::worktree::{
    clone::{clone_workspace, repo_name_from_url},
    share::parse_pair,
    Workspace,
};

use anyhow::{bail, Result};
use clap::{error::ErrorKind, CommandFactory, Parser, Subcommand};
use indicatif::ProgressBar;
use std::{
    env,
    io::{stderr, IsTerminal},
    path::PathBuf,
    process::exit,
};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "wt [options] <wt-command>",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    fn run(self) -> Result<()> {
        let cwd = env::current_dir()?;
        match self.command {
            Command::Clone(opts) => run_clone(cwd, opts),
            Command::Add(opts) => run_add(cwd, opts),
            Command::Cp(opts) => run_cp(cwd, opts),
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Clone remote into a new worktree workspace.
    #[command(override_usage = "wt clone [options] <url> [dest]")]
    Clone(CloneOptions),

    /// Add worktree for branch to current workspace.
    #[command(override_usage = "wt add [options] <branch>")]
    Add(AddOptions),

    /// Copy or link untracked files into current worktree.
    #[command(override_usage = "wt cp [options] [<source> <dest>]...")]
    Cp(CpOptions),
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct CloneOptions {
    /// URL of remote to clone from.
    #[arg(required = true, value_name = "url")]
    pub url: String,

    /// Directory to clone into, named after the repository if omitted.
    #[arg(value_name = "dest")]
    pub dest: Option<PathBuf>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct AddOptions {
    /// Branch to add worktree for.
    #[arg(required = true, value_name = "branch")]
    pub branch: String,

    /// Branch to create new branch from instead of the base branch.
    #[arg(short, long, value_name = "branch")]
    pub base: Option<String>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct CpOptions {
    /// Apply files once without recording them for future worktrees.
    #[arg(short, long)]
    pub once: bool,

    /// Link files instead of copying them.
    #[arg(short, long)]
    pub link: bool,

    /// Pairs of source and destination, e.g., "wt:main .env".
    #[arg(value_name = "source dest")]
    pub pairs: Vec<String>,
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

fn run_clone(cwd: PathBuf, opts: CloneOptions) -> Result<()> {
    let dest = match opts.dest {
        Some(dest) => cwd.join(dest),
        None => match repo_name_from_url(&opts.url) {
            Some(name) => cwd.join(name),
            None => Cli::command()
                .error(
                    ErrorKind::InvalidValue,
                    format!("cannot derive repository name from {:?}, give dest", opts.url),
                )
                .exit(),
        },
    };

    let bar = ProgressBar::no_length();
    let workspace = clone_workspace(&opts.url, dest, bar)?;
    info!(
        "workspace ready at {} on {}",
        workspace.root().display(),
        workspace.config().base_branch
    );

    Ok(())
}

fn run_add(cwd: PathBuf, opts: AddOptions) -> Result<()> {
    let workspace = Workspace::discover(&cwd)?;
    let (path, report) = workspace.add_worktree(&opts.branch, opts.base.as_deref())?;
    println!("{}", path.display());

    if !report.is_clean() {
        bail!("could not share into new worktree: {}", report.rejected.join(", "));
    }

    Ok(())
}

fn run_cp(cwd: PathBuf, opts: CpOptions) -> Result<()> {
    if opts.pairs.len() % 2 != 0 {
        Cli::command()
            .error(
                ErrorKind::WrongNumberOfValues,
                "expected pairs of <source> <dest>",
            )
            .exit();
    }

    let mut workspace = Workspace::discover(&cwd)?;
    let worktree = workspace.current_worktree(&cwd)?;
    let entries = opts
        .pairs
        .chunks(2)
        .map(|pair| parse_pair(&pair[0], &pair[1], opts.link, &cwd))
        .collect::<Result<Vec<_>, _>>()?;

    let report = workspace.share(entries, &worktree, opts.once)?;
    if !report.is_clean() {
        bail!("could not share: {}", report.rejected.join(", "));
    }

    Ok(())
}

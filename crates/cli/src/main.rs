mod cmd;
mod output;

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use archivist::Compression;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::output::{OutputFormat, print_error};

/// archive-tool - Create, verify and compare archives with checksum manifests
#[derive(Parser)]
#[command(name = "archive-tool")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Create a new archive
  Create {
    /// Compression (inferred from the archive name when omitted)
    #[arg(long, value_parser = parse_compression)]
    compression: Option<Compression>,

    /// Checksum algorithm to record (repeatable, default: sha256)
    #[arg(long = "checksum", value_name = "ALGORITHM")]
    checksums: Vec<String>,

    /// Leave out a path and everything below it (repeatable)
    #[arg(long = "exclude", value_name = "PATH")]
    excludes: Vec<PathBuf>,

    /// Label stored with the archive (repeatable)
    #[arg(long = "tag", value_name = "TAG")]
    tags: Vec<String>,

    /// Change to this directory before collecting the paths
    #[arg(short = 'C', long = "directory", value_name = "DIR", default_value = ".")]
    workdir: PathBuf,

    /// Archive file to write
    archive: PathBuf,

    /// Paths to put into the archive, all below one base directory
    #[arg(required = true)]
    paths: Vec<PathBuf>,
  },

  /// List the entries of an archive
  Ls {
    archive: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value_t)]
    output: OutputFormat,
  },

  /// Show manifest information of an archive
  Info {
    archive: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value_t)]
    output: OutputFormat,
  },

  /// Check a tree against the manifest of an archive
  Verify {
    archive: PathBuf,

    /// Check the tree below this directory instead of the archive members
    #[arg(long, value_name = "DIR")]
    target: Option<PathBuf>,
  },

  /// Extract an archive
  Extract {
    archive: PathBuf,

    /// Directory to extract into
    #[arg(short = 'C', long = "directory", value_name = "DIR", default_value = ".")]
    dest: PathBuf,
  },

  /// Show the differences between two archives
  Diff {
    /// Also show differences in file system metadata
    #[arg(long)]
    report_meta: bool,

    /// For a directory missing from one archive, only report the directory
    #[arg(long)]
    skip_dir_content: bool,

    /// First archive to compare
    archive1: PathBuf,

    /// Second archive to compare
    archive2: PathBuf,
  },
}

fn parse_compression(value: &str) -> std::result::Result<Compression, String> {
  value.parse()
}

fn init_logging(verbose: bool) {
  let filter = if verbose {
    EnvFilter::new("debug")
  } else {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
  };
  tracing_subscriber::fmt()
    .with_env_filter(filter)
    .with_writer(std::io::stderr)
    .without_time()
    .init();
}

fn run(cli: Cli) -> Result<ExitCode> {
  match cli.command {
    Commands::Create {
      compression,
      checksums,
      excludes,
      tags,
      workdir,
      archive,
      paths,
    } => {
      let opts = cmd::CreateArgs {
        compression,
        checksums,
        excludes,
        tags,
        workdir,
      };
      cmd::cmd_create(&archive, &paths, opts)?;
    }
    Commands::Ls { archive, output } => cmd::cmd_ls(&archive, output)?,
    Commands::Info { archive, output } => cmd::cmd_info(&archive, output)?,
    Commands::Verify { archive, target } => cmd::cmd_verify(&archive, target.as_deref())?,
    Commands::Extract { archive, dest } => cmd::cmd_extract(&archive, &dest)?,
    Commands::Diff {
      report_meta,
      skip_dir_content,
      archive1,
      archive2,
    } => {
      let status = cmd::cmd_diff(&archive1, &archive2, report_meta, skip_dir_content)?;
      return Ok(ExitCode::from(status));
    }
  }
  Ok(ExitCode::SUCCESS)
}

fn main() -> ExitCode {
  let cli = Cli::parse();
  init_logging(cli.verbose);

  match run(cli) {
    Ok(code) => code,
    Err(e) => {
      print_error(&format!("{:#}", e));
      ExitCode::FAILURE
    }
  }
}

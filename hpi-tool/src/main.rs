//! Command-line front-end for HPI archives.

use std::fs;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing::{info, Level};

use hpi::{CompressionType, Directory, EntryKind, HpiArchive};

#[derive(Parser)]
#[command(
    name = "hpi-tool",
    about = "Inspect and extract HPI game-asset archives",
    version
)]
struct Cli {
    /// Set the logging level
    #[arg(short, long, value_enum, default_value = "info")]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// List every file in the archive
    List {
        /// Path to the HPI archive
        archive: PathBuf,
    },

    /// Extract a single file from the archive
    Extract {
        /// Path to the HPI archive
        archive: PathBuf,
        /// Path of the file inside the archive (case-insensitive)
        source: String,
        /// Destination file on disk
        dest: PathBuf,
    },

    /// Extract the whole archive into a directory
    Unpack {
        /// Path to the HPI archive
        archive: PathBuf,
        /// Destination directory (created if missing)
        dest: PathBuf,
    },
}

type ToolResult = Result<(), Box<dyn std::error::Error>>;

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(Level::from(cli.log_level))
        .with_target(false)
        .init();

    let result = match cli.command {
        Commands::List { archive } => list(&archive),
        Commands::Extract {
            archive,
            source,
            dest,
        } => extract(&archive, &source, &dest),
        Commands::Unpack { archive, dest } => unpack(&archive, &dest),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn open_archive(path: &Path) -> Result<HpiArchive<BufReader<fs::File>>, Box<dyn std::error::Error>> {
    let stream = BufReader::new(fs::File::open(path)?);
    Ok(HpiArchive::open(stream)?)
}

fn list(archive: &Path) -> ToolResult {
    let archive = open_archive(archive)?;
    print_directory(archive.root(), "");
    Ok(())
}

fn print_directory(dir: &Directory, prefix: &str) {
    for entry in dir.entries() {
        let path = if prefix.is_empty() {
            entry.name.clone()
        } else {
            format!("{prefix}/{}", entry.name)
        };

        match &entry.kind {
            EntryKind::File(file) => {
                let kind = match file.compression {
                    CompressionType::None => "null",
                    CompressionType::Lz77 => "lz77",
                    CompressionType::Zlib => "zlib",
                };
                println!("{path} ({} bytes, {kind}-compressed)", file.size);
            }
            EntryKind::Directory(sub) => print_directory(sub, &path),
        }
    }
}

fn extract(archive_path: &Path, source: &str, dest: &Path) -> ToolResult {
    let archive = open_archive(archive_path)?;
    let file = archive
        .find_file(source)
        .ok_or_else(|| format!("no such file in archive: {source}"))?;

    info!("extracting '{source}' ({} bytes)", file.size);

    let mut contents = vec![0u8; file.size as usize];
    archive.extract(file, &mut contents)?;
    fs::write(dest, &contents)?;
    Ok(())
}

fn unpack(archive_path: &Path, dest: &Path) -> ToolResult {
    let archive = open_archive(archive_path)?;
    fs::create_dir_all(dest)?;
    unpack_directory(&archive, archive.root(), dest)
}

fn unpack_directory(
    archive: &HpiArchive<BufReader<fs::File>>,
    dir: &Directory,
    dest: &Path,
) -> ToolResult {
    for entry in dir.entries() {
        if entry.name.contains(['/', '\\']) || entry.name == ".." {
            return Err(format!("refusing to unpack unsafe entry name: {}", entry.name).into());
        }

        let target = dest.join(&entry.name);
        match &entry.kind {
            EntryKind::Directory(sub) => {
                fs::create_dir_all(&target)?;
                unpack_directory(archive, sub, &target)?;
            }
            EntryKind::File(file) => {
                info!("extracting {} ({} bytes)", target.display(), file.size);
                let mut contents = vec![0u8; file.size as usize];
                archive.extract(file, &mut contents)?;
                fs::write(&target, &contents)?;
            }
        }
    }
    Ok(())
}

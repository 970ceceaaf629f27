#![deny(missing_docs)]
//! A command-line interface for the padvault one-time pad tool.

use clap::{Parser, Subcommand};
use log::{error, info};
use padvault_core::{Bucket, OpenOptions, Pad, PadFile, Result, pad_generator};
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{self, BufReader, BufWriter};
use std::path::{Path, PathBuf};

mod cipher;
mod envelope;

use cipher::KeyStream;
use envelope::Envelope;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
#[command(
    after_help = "EXAMPLES:\n  \n# Initialize a new pad\npadvault --pad ./my_pad pad init\n\n# Generate a new 1 MiB pad file\npadvault --pad ./my_pad file generate\n\n# Encrypt a file\npadvault --pad ./my_pad encrypt ./my_file.txt\n\n# Decrypt using its metadata file\npadvault --pad ./my_pad decrypt --metadata ./my_file.txt.enc.metadata.json --input ./my_file.txt.enc --output ./my_file.txt"
)]
struct Cli {
    /// The path to the pad directory.
    #[arg(long, global = true, env = "PADVAULT_DIR")]
    pad: Option<PathBuf>,

    /// Refuse to open a pad that needs repair instead of repairing it.
    #[arg(long, global = true)]
    strict: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the pad directory
    Pad {
        #[command(subcommand)]
        command: PadCommands,
    },
    /// Manage pad files within the pad
    File {
        #[command(subcommand)]
        command: FileCommands,
    },
    /// Encrypt a file with fresh key material from the pad
    Encrypt {
        /// Path to the input file to encrypt
        #[arg()]
        input: PathBuf,

        /// Path to the output file to save the encrypted content. If omitted, uses the input filename with a .enc extension.
        #[arg(short, long, value_name = "OUTPUT_FILE")]
        output: Option<PathBuf>,
    },
    /// Decrypt a file using its metadata file
    Decrypt {
        /// Path to the input file to decrypt
        #[arg(short, long)]
        input: PathBuf,

        /// Path to the output file to save the decrypted content
        #[arg(short, long)]
        output: PathBuf,

        /// Path to the ciphertext metadata file
        #[arg(long, value_name = "METADATA_FILE")]
        metadata: PathBuf,
    },
}

#[derive(Subcommand)]
enum PadCommands {
    /// Initialize a new pad at the specified path
    Init,
    /// Show the status of the pad
    Status,
    /// Check the pad and repair what can be repaired safely
    Fsck,
}

#[derive(Subcommand)]
#[command(
    after_help = "EXAMPLES:\n  \n# Generate a single 10 MiB pad file\npadvault --pad ./my_pad file generate --size 10485760\n\n# Generate 5 pad files of 1 MiB each\npadvault --pad ./my_pad file generate --count 5"
)]
enum FileCommands {
    /// Generate new pad files from the operating system's random source
    Generate {
        /// The size of each pad file in bytes
        #[arg(short, long, default_value_t = 1024 * 1024)]
        size: u64,
        /// The number of pad files to generate
        #[arg(short, long, default_value_t = 1)]
        count: u32,
    },
    /// Move an existing file of random bytes into the pad
    Ingest {
        /// Path to the file to adopt
        #[arg()]
        path: PathBuf,
    },
    /// List all pad files
    List,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let Some(root) = cli.pad.as_deref() else {
        error!("A --pad path is required for this command (or set PADVAULT_DIR).");
        std::process::exit(1);
    };

    if let Err(e) = run(&cli.command, root, cli.strict) {
        error!("{e}");
        std::process::exit(1);
    }
}

fn open(root: &Path, strict: bool) -> Result<Pad> {
    let pad = OpenOptions::new().strict(strict).open(root)?;
    if pad.is_read_only() {
        info!("Pad was repaired on open and is read-only until reopened.");
    }
    Ok(pad)
}

fn run(command: &Commands, root: &Path, strict: bool) -> Result<()> {
    match command {
        Commands::Pad { command } => match command {
            PadCommands::Init => {
                info!("Initializing new pad at '{}'", root.display());
                let pad = Pad::create(root)?;
                println!("Pad initialized at '{}'", pad.root().display());
            }
            PadCommands::Status => print_status(&open(root, strict)?)?,
            PadCommands::Fsck => {
                let pad = open(root, strict)?;
                let report = pad.recovery_report();
                if report.is_clean() {
                    println!("Pad '{}' is consistent.", pad.root().display());
                } else {
                    println!("Repaired {} issue(s):", report.repairs().len());
                    for repair in report.repairs() {
                        println!("  - {repair}");
                    }
                }
            }
        },
        Commands::File { command } => {
            let mut pad = open(root, strict)?;
            match command {
                FileCommands::Generate { size, count } => {
                    info!("Generating {count} new pad file(s) of {size} bytes each...");
                    for _ in 0..*count {
                        let name = pad_generator::generate_pad(&mut pad, *size)?;
                        println!("{name}");
                    }
                    info!("Successfully generated {count} pad file(s).");
                }
                FileCommands::Ingest { path } => {
                    let name = pad.ingest(path)?;
                    println!("{name}");
                }
                FileCommands::List => print_files(&pad)?,
            }
        }
        Commands::Encrypt { input, output } => {
            let output = output.clone().unwrap_or_else(|| {
                let mut new_path = input.as_os_str().to_owned();
                new_path.push(".enc");
                PathBuf::from(new_path)
            });
            encrypt(&mut open(root, strict)?, input, &output)?;
        }
        Commands::Decrypt {
            input,
            output,
            metadata,
        } => decrypt(&mut open(root, strict)?, input, output, metadata)?,
    }
    Ok(())
}

fn encrypt(pad: &mut Pad, input: &Path, output: &Path) -> Result<()> {
    let length = fs::metadata(input)?.len();
    let allocation = pad.get_allocation(length)?;
    // Committed before any ciphertext exists.
    pad.commit_allocation(&allocation)?;
    info!(
        "Encrypting '{}' with {length} byte(s) from {} pad file(s).",
        input.display(),
        allocation.file_count()
    );

    let reader = BufReader::new(fs::File::open(input)?);
    let writer = BufWriter::new(fs::File::create(output)?);
    let mut hasher = Sha256::new();
    let processed = cipher::process_stream(reader, writer, KeyStream::new(pad, &allocation), |chunk| {
        hasher.update(chunk);
    })?;
    if processed != length {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("input changed size during encryption ({length} -> {processed} bytes)"),
        )
        .into());
    }

    let envelope = Envelope::new(
        length,
        format!("{:x}", hasher.finalize()),
        allocation.to_serialization_state(),
    );
    let metadata_path = envelope::path_for(output);
    envelope.save(&metadata_path)?;

    println!(
        "Successfully encrypted file '{}' to '{}'",
        input.display(),
        output.display()
    );
    println!("Decryption metadata saved to '{}'", metadata_path.display());
    Ok(())
}

fn decrypt(pad: &mut Pad, input: &Path, output: &Path, metadata: &Path) -> Result<()> {
    let envelope = Envelope::load(metadata)?;
    envelope.verify(input)?;
    let allocation = pad.resolve_allocation(&envelope.allocation)?;

    let reader = BufReader::new(fs::File::open(input)?);
    let writer = BufWriter::new(fs::File::create(output)?);
    let processed = cipher::process_stream(reader, writer, KeyStream::new(pad, &allocation), |_| {})?;
    if processed != envelope.length {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!(
                "ciphertext is {processed} bytes but metadata records {}",
                envelope.length
            ),
        )
        .into());
    }

    println!(
        "Successfully decrypted file '{}' to '{}'",
        input.display(),
        output.display()
    );
    Ok(())
}

fn print_status(pad: &Pad) -> Result<()> {
    let status = pad.status()?;
    println!("Pad Status for: {}", pad.root().display());
    println!("{:-<40}", "");
    println!(
        "Pending: {} file(s), {} bytes",
        status.pending_files, status.pending_bytes
    );
    println!(
        "Current: {} file(s), {} bytes",
        status.current_files, status.current_bytes
    );
    println!(
        "Spent:   {} file(s), {} bytes",
        status.spent_files, status.spent_bytes
    );
    println!();
    println!("Free: {} bytes", status.free_bytes);
    if status.read_only {
        println!("Read-only: yes (repaired on open)");
    }
    Ok(())
}

fn print_files(pad: &Pad) -> Result<()> {
    println!(
        "{:<38} {:<8} {:>15} {:>15}",
        "Name", "Bucket", "Size (Bytes)", "Free (Bytes)"
    );
    println!("{:-<80}", "");

    let fs = pad.filesystem();
    let mut any = false;
    for bucket in Bucket::ALL {
        for name in fs.list_dir(bucket.dir_name())? {
            if !fs.is_regular_file(bucket.path_of(&name))? {
                continue;
            }
            any = true;
            let tracked = pad.files().find(|file| file.name() == name);
            let size = match tracked {
                Some(file) => file.size(),
                None => fs.file_len(bucket.path_of(&name))?,
            };
            let free = match bucket {
                Bucket::Spent => 0,
                Bucket::Pending | Bucket::Current => tracked.map_or(size, PadFile::free),
            };
            println!(
                "{name:<38} {:<8} {size:>15} {free:>15}",
                bucket.dir_name()
            );
        }
    }
    if !any {
        println!("No pad files found in '{}'", pad.root().display());
    }
    Ok(())
}

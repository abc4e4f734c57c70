//! Vela backend CLI
//!
//! Standalone driver for the LLVM backend: reads a NIR archive written
//! by the linker and emits `.ll` modules into a working directory.

use clap::{Parser, Subcommand};
use std::fs;
use std::path::PathBuf;
use std::process;
use tracing_subscriber::EnvFilter;
use vela_codegen::{codegen, Config, Lto, Mode};
use vela_nir::Defn;

#[derive(Parser)]
#[command(name = "velagen")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Vela LLVM backend - lower NIR archives to LLVM IR", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Emit LLVM IR for a serialized NIR archive
    Emit {
        /// Input NIR archive (.nirb)
        input: PathBuf,

        /// Backend configuration file (TOML)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Working directory for the .ll output
        #[arg(short, long)]
        workdir: Option<PathBuf>,

        /// Target triple written into every module
        #[arg(long)]
        triple: Option<String>,

        /// Build mode: debug | release
        #[arg(long)]
        mode: Option<Mode>,

        /// Toolchain LTO setting: none | thin | full
        #[arg(long)]
        lto: Option<Lto>,

        /// Shard count for multi-module layouts
        #[arg(long)]
        procs: Option<usize>,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Emit {
            input,
            config,
            workdir,
            triple,
            mode,
            lto,
            procs,
        } => run_emit(&input, config.as_deref(), workdir, triple, mode, lto, procs),
    }
}

#[allow(clippy::too_many_arguments)]
fn run_emit(
    input: &std::path::Path,
    config_path: Option<&std::path::Path>,
    workdir: Option<PathBuf>,
    triple: Option<String>,
    mode: Option<Mode>,
    lto: Option<Lto>,
    procs: Option<usize>,
) {
    let mut config = match config_path {
        Some(path) => match Config::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("error: {}", e);
                process::exit(1);
            }
        },
        None => Config::default(),
    };
    if let Some(workdir) = workdir {
        config.workdir = workdir;
    }
    if let Some(triple) = triple {
        config.target_triple = triple;
    }
    if let Some(mode) = mode {
        config.mode = mode;
    }
    if let Some(lto) = lto {
        config.lto = lto;
    }
    if let Some(procs) = procs {
        config.procs = procs;
    }

    let defns = match read_archive(input) {
        Ok(defns) => defns,
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(1);
        }
    };

    match codegen(&config, defns) {
        Ok(written) => {
            for path in written {
                println!("{}", path.display());
            }
        }
        Err(e) => {
            eprintln!("error: {}", e);
            process::exit(1);
        }
    }
}

fn read_archive(path: &std::path::Path) -> Result<Vec<Defn>, String> {
    let bytes =
        fs::read(path).map_err(|e| format!("failed to read {}: {}", path.display(), e))?;
    bincode::deserialize(&bytes)
        .map_err(|e| format!("malformed NIR archive {}: {}", path.display(), e))
}

use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

mod enc;

/// Seal and open AYCF authenticated container files.
#[derive(Parser)]
#[command(name = "blockmode")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encrypt a file into an authenticated container.
    Seal {
        #[command(flatten)]
        params: KeyParams,
        /// Input file.
        #[arg(short, long)]
        input: String,
        /// Output container file.
        #[arg(short, long)]
        output: String,
    },
    /// Authenticate and decrypt a container file.
    Open {
        #[command(flatten)]
        params: KeyParams,
        /// Input container file.
        #[arg(short, long)]
        input: String,
        /// Output file, created only if authentication succeeds.
        #[arg(short, long)]
        output: String,
    },
}

#[derive(clap::Args)]
struct KeyParams {
    /// Block cipher (sm4, aes-128, aes-192, aes-256).
    #[arg(short, long, default_value = "sm4")]
    cipher: String,
    /// Key as hex.
    #[arg(short, long, env = "BLOCKMODE_KEY", hide_env_values = true)]
    key: String,
    /// IV as hex (12 bytes recommended).
    #[arg(long, env = "BLOCKMODE_IV")]
    iv: String,
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    init_tracing();
    let cli = Cli::parse();

    let result = match &cli.command {
        Commands::Seal {
            params,
            input,
            output,
        } => enc::seal(&params.cipher, &params.key, &params.iv, input, output),
        Commands::Open {
            params,
            input,
            output,
        } => enc::open(&params.cipher, &params.key, &params.iv, input, output),
    };

    if let Err(e) = result {
        if let Some(failure) = enc::classify(&*e) {
            error!(
                code = failure.code,
                integrity = failure.integrity,
                "operation failed"
            );
        }
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

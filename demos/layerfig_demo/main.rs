//! # layerfig demo application
//!
//! A sample CLI tool that wires [layerfig](https://docs.rs/layerfig) into a
//! clap application. It exists to demonstrate and manually verify the layers.
//!
//! ## Running
//!
//! ```sh
//! cargo run --example layerfig_demo -- echo
//! cargo run --example layerfig_demo -- keys
//! ```
//!
//! ## Features demonstrated
//!
//! | Feature                  | How to exercise it                                                        |
//! |--------------------------|---------------------------------------------------------------------------|
//! | Default literals         | `cargo run --example layerfig_demo -- echo`                               |
//! | Config file (cwd/home)   | Create `layerfig-demo.yaml` in cwd or `~/.layerfig-demo/`, then `echo`    |
//! | Explicit file            | `CONFIG=/path/to/demo.toml cargo run --example layerfig_demo -- echo`     |
//! | Optional record defaults | Put `tls: {cert: a.pem}` in the file; `tls.min_version` is still `1.2`    |
//! | Env var override         | `LAYERFIG_DEMO_SERVER_PORT=9999 cargo run --example layerfig_demo -- echo`|
//! | Collection slot          | `LAYERFIG_DEMO_SERVER_ALLOWED_IPS[1]=10.0.0.2 cargo run --example layerfig_demo -- echo`|
//! | Flag override            | `cargo run --example layerfig_demo -- --port 4000 echo`                   |
//! | Key listing              | `cargo run --example layerfig_demo -- keys`                               |
//! | Logging                  | `RUST_LOG=layerfig=debug cargo run --example layerfig_demo -- echo`       |

mod config;

use clap::{CommandFactory, FromArgMatches, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use layerfig::{Flags, Index, Layerfig, SearchPath};

use config::DemoConfig;

const APP_NAME: &str = "layerfig-demo";

// ---------------------------------------------------------------------------
// CLI definitions
// ---------------------------------------------------------------------------

/// layerfig demo: a sample CLI app for showcasing layerfig integration.
#[derive(Parser, Debug)]
#[command(name = "layerfig-demo")]
struct Cli {
    /// Enable verbose output.
    #[arg(long, global = true)]
    verbose: bool,

    /// Override the server host.
    #[arg(long, global = true)]
    host: Option<String>,

    /// Override the server port.
    #[arg(long, global = true)]
    port: Option<u16>,

    /// Override the request timeout, e.g. `1m30s`.
    #[arg(long, global = true)]
    timeout: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the resolved configuration as YAML.
    Echo,
    /// Print every environment key and the path it writes.
    Keys,
}

// ---------------------------------------------------------------------------
// Flag binding
// ---------------------------------------------------------------------------

/// Bind the global flags to config fields by their environment keys.
fn bind_flags(
    cmd: &clap::Command,
    matches: &clap::ArgMatches,
    index: Index,
) -> Result<Flags, layerfig::LayerfigError> {
    let mut flags = Flags::new(Some(index));
    flags.bind_arg(cmd, matches, "VERBOSE", "verbose")?;
    flags.bind_arg(cmd, matches, "SERVER_HOST", "host")?;
    flags.bind_arg(cmd, matches, "SERVER_PORT", "port")?;
    flags.bind_arg(cmd, matches, "server.timeout", "timeout")?;
    Ok(flags)
}

fn fail(context: &str, err: impl std::fmt::Display) -> ! {
    eprintln!("{context}:\n{err}");
    std::process::exit(1);
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cmd = Cli::command();
    let matches = cmd.clone().get_matches();
    let cli = Cli::from_arg_matches(&matches).unwrap_or_else(|e| e.exit());

    let index = Index::build::<DemoConfig>(&[]).unwrap_or_else(|e| fail("Invalid config type", e));

    match cli.command {
        Commands::Keys => print!("{index}"),
        Commands::Echo => {
            let flags = bind_flags(&cmd, &matches, index.clone())
                .unwrap_or_else(|e| fail("Failed to bind flags", e));
            let loaded = Layerfig::builder::<DemoConfig>()
                .name(APP_NAME)
                .search_paths(vec![SearchPath::Platform, SearchPath::Home(".layerfig-demo")])
                .index(index)
                .flags(flags)
                .load()
                .unwrap_or_else(|e| fail("Failed to load config", e));

            if loaded.config.verbose {
                match &loaded.file {
                    Some(path) => println!("# loaded from {}", path.display()),
                    None => println!("# no config file found"),
                }
            }
            let yaml = serde_yaml::to_string(&loaded.config)
                .unwrap_or_else(|e| fail("Failed to render config", e));
            print!("{yaml}");
        }
    }
}

use std::io::Write;
use std::path::PathBuf;

use anyhow::Result;
use atlas_import::config::{SupabaseConfig, KEY_KEYS, URL_KEYS};
use atlas_import::store::SupabaseStore;
use atlas_import::util::env as env_util;
use atlas_import::{run_import, ImportOptions};
use clap::{ArgAction, Parser, Subcommand};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(
    name = "atlas_import",
    version,
    about = "Bulk-import Atlas articles from CSV into Supabase",
    after_help = "CSV columns:\n  required: title, slug, author, excerpt, category_slug, content_blocks\n  optional: section_images, cover_image_url, read_time_minutes, article_template_type,\n            seo_meta_description, seo_keywords, is_featured, status"
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
#[command(rename_all = "kebab-case")]
enum Commands {
    /// Validate a CSV file and insert (or update) its articles
    Run {
        /// Path to the CSV file
        csv_path: PathBuf,
        /// Validate the CSV without writing to the database
        #[arg(long, default_value_t = false)]
        dry_run: bool,
        /// Update existing articles (matched by slug) instead of skipping them
        #[arg(long, default_value_t = false)]
        update: bool,
    },
    /// Print the resolved (redacted) connection settings
    CheckEnv,
}

fn fail(lines: &[String]) -> ! {
    let mut stdout = std::io::stdout().lock();
    for l in lines {
        let _ = writeln!(stdout, "{l}");
    }
    let _ = stdout.flush();
    std::process::exit(1);
}

fn load_config() -> SupabaseConfig {
    match SupabaseConfig::from_env() {
        Ok(cfg) => {
            info!(
                url_source = cfg.url_source,
                key_source = cfg.key_source,
                "supabase configuration resolved"
            );
            cfg
        }
        Err(e) => fail(&[
            format!("Error: {e}"),
            "Set SUPABASE_URL and SUPABASE_SERVICE_KEY environment variables.".to_string(),
            "Or copy your .env file to this directory.".to_string(),
        ]),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if !e.use_stderr() => {
            // --help / --version
            e.print()?;
            return Ok(());
        }
        Err(e) => {
            let _ = e.print();
            std::process::exit(1);
        }
    };

    env_util::init_env();
    let default_filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    atlas_import::tracing::init_tracing(default_filter)?;

    match cli.command {
        Commands::Run {
            csv_path,
            dry_run,
            update,
        } => {
            if !csv_path.exists() {
                fail(&[format!("Error: File not found: {}", csv_path.display())]);
            }
            let cfg = load_config();
            let store = match SupabaseStore::new(&cfg) {
                Ok(s) => s,
                Err(e) => fail(&[format!("Error: {e:#}")]),
            };
            let opts = ImportOptions {
                csv_path,
                dry_run,
                update,
            };
            let mut stdout = std::io::stdout();
            match run_import(&store, &opts, &mut stdout).await {
                Ok(summary) => {
                    info!(?summary, "import finished");
                    Ok(())
                }
                Err(e) => {
                    error!(error = %format!("{e:#}"), "import aborted");
                    fail(&[format!("\nError: {e:#}")]);
                }
            }
        }
        Commands::CheckEnv => {
            let keys = SupabaseConfig::known_keys();
            for (k, v) in env_util::preflight_snapshot(&keys) {
                let shown = if v.is_empty() { "<unset>".to_string() } else { v };
                println!("{k}={shown}");
            }
            let cfg = load_config();
            println!(
                "OK: endpoint from {} (priority: {}), key from {} (priority: {})",
                cfg.url_source,
                URL_KEYS.join(" > "),
                cfg.key_source,
                KEY_KEYS.join(" > ")
            );
            Ok(())
        }
    }
}

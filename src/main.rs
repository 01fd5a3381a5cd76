use clap::{Parser, Subcommand};
use gallery_farm::logging::{self, Verbosity};
use gallery_farm::pipeline::{self, Site};
use gallery_farm::{config, output};
use std::path::PathBuf;

fn version_string() -> &'static str {
    let released = env!("FARM_RELEASE_BUILD");
    if released == "true" {
        env!("CARGO_PKG_VERSION")
    } else {
        let hash = env!("FARM_GIT_HASH");
        if hash.is_empty() {
            "dev@unknown"
        } else {
            // Leaked once at startup
            Box::leak(format!("dev@{hash}").into_boxed_str())
        }
    }
}

#[derive(Parser)]
#[command(name = "gallery-farm")]
#[command(about = "Keyword-driven page builder and patcher for static image galleries")]
#[command(long_about = "\
Keyword-driven page builder and patcher for static image galleries

Every directory under the site root that holds images is a category. Each
category gets paginated listing pages (page1.html, page2.html, ...) and one
detail page per image. Every page is assigned a unique keyword from the
category's keyword list and gets generated title, description and body text.

Site layout:

  site/
  ├── config.json                  # domain + site_name (shared with other tools)
  ├── farm.toml                    # Pipeline config (optional, see gen-config)
  ├── keywords/
  │   ├── all.txt                  # Global fallback keyword list
  │   ├── cats.txt                 # Raw list for category \"cats\"
  │   ├── .kw_map.json             # Ledger: page → keyword
  │   └── used_keywords.txt        # Ledger: consumed keywords
  ├── selected_keywords/
  │   └── cats.txt                 # Curated list (wins over keywords/cats.txt)
  └── cats/
      ├── 001.jpg
      ├── page1.html               # Generated listing
      └── 001.html                 # Generated detail page

Run 'gallery-farm gen-config' to generate a documented farm.toml.")]
#[command(version = version_string())]
struct Cli {
    /// Site root (default: detected by walking up from the current directory)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Brand appended to titles (default: site_name from config.json)
    #[arg(long, global = true)]
    brand: Option<String>,

    /// Report what would change without writing anything
    #[arg(long, global = true)]
    dry_run: bool,

    /// Consumed-keyword file shared between sites
    #[arg(long, env = "GALLERY_FARM_SHARED_LEDGER", global = true)]
    shared_ledger: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Warnings and errors only
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate listing and detail pages for every category
    Build,
    /// Rewrite thin pages and fix canonical links / JSON-LD
    Patch,
    /// Write sitemap.xml and robots.txt
    Sitemap,
    /// Run the full pipeline: build → patch → sitemap
    Run,
    /// Print a stock farm.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    logging::init_logging(Verbosity::from_flags(cli.verbose, cli.quiet));

    if let Command::GenConfig = cli.command {
        print!("{}", config::stock_config_toml());
        return Ok(());
    }

    let root = match &cli.root {
        Some(root) => root.clone(),
        None => config::detect_root(&std::env::current_dir()?),
    };
    let site = Site::load(&root, cli.brand.as_deref(), cli.shared_ledger.as_deref())?;
    let dry_run = cli.dry_run;
    if dry_run {
        println!("==> Dry run: nothing will be written");
    }

    match cli.command {
        Command::Build => {
            println!("==> Building pages in {}", root.display());
            let report = pipeline::build_site(&site, dry_run)?;
            output::print_build_report(&report, dry_run);
        }
        Command::Patch => {
            println!("==> Patching pages in {}", root.display());
            let report = pipeline::patch_site(&site, dry_run)?;
            output::print_patch_report(&report);
        }
        Command::Sitemap => {
            let report = pipeline::write_site_sitemap(&site, dry_run)?;
            output::print_sitemap_report(report.as_ref(), dry_run);
        }
        Command::Run => {
            let report = pipeline::run(&site, dry_run)?;
            output::print_run_report(&report, dry_run);
            println!("==> Done: {}", root.display());
        }
        Command::GenConfig => {}
    }

    Ok(())
}

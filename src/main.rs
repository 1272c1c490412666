//! Entry point for the earthnet tool.
//! Handles CLI parsing, logging setup and configuration, then dispatches to the
//! download, fetch, load, convert, plot and score commands.

use clap::Parser;
use earthnet::archive::{self, ArchiveOptions, ArchiveStatus};
use earthnet::config::ToolkitConfig;
use earthnet::minicube::Minicube;
use earthnet::remote::RemoteStore;
use earthnet::render::{cube_gallery, CubeInput, GalleryOptions, VegetationMask};
use earthnet::score::{score_over_dataset, ScoreOptions};
use earthnet::{adapter, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{Cli, Command};

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    run(cli)?;
    Ok(())
}

/// `RUST_LOG` wins over `--verbose`
fn init_logging(verbose: bool) {
    let default = if verbose { "earthnet=debug" } else { "earthnet=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn load_config(cli: &Cli) -> Result<ToolkitConfig> {
    let config = match &cli.config {
        Some(path) => {
            info!("Reading configuration from {}", path.display());
            ToolkitConfig::from_json_file(path)?
        }
        None => ToolkitConfig::default(),
    };
    Ok(config.with_proxy(cli.proxy.clone()))
}

fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;

    match cli.command {
        Command::Download(args) => {
            let options = ArchiveOptions {
                overwrite: args.overwrite,
                delete: !args.keep,
            };
            for (split, status) in archive::get(&config, &args.data_dir, &args.splits, options)? {
                match status {
                    ArchiveStatus::Extracted { entries, .. } => {
                        println!("✅ {split}: extracted {entries} entries");
                    }
                    ArchiveStatus::AlreadyPresent { tarball } => {
                        println!("⏭  {split}: {} already present", tarball.display());
                    }
                }
            }
        }
        Command::Fetch(args) => {
            let store = RemoteStore::new(&config)?;
            let saved = store.download(
                &config,
                &args.dataset,
                &args.split,
                &args.save_directory,
                args.limit,
            )?;
            println!(
                "✅ Saved {} minicubes to {}",
                saved.len(),
                args.save_directory.display()
            );
        }
        Command::Load(args) => {
            let store = RemoteStore::new(&config)?;
            let cube = store.load_minicube(
                &args.dataset,
                &args.split,
                &args.id,
                args.region.as_deref(),
            )?;
            print_minicube(&args.id, &cube);
            if let Some(output) = args.legacy_out {
                adapter::to_legacy(&cube)?.save_npz(&output)?;
                println!("✅ Saved legacy bundle to {}", output.display());
            }
        }
        Command::Convert(args) => {
            let cube = Minicube::from_netcdf(&args.input)?;
            let bundle = adapter::to_legacy(&cube)?;
            bundle.save_npz(&args.output)?;
            println!("✅ Saved legacy bundle to {}", args.output.display());
        }
        Command::Plot(args) => {
            let options = GalleryOptions {
                variable: args.variable,
                vegetation_mask: args.vegetation_mask.map(VegetationMask::Path),
                cloud_mask: !args.no_cloud_mask,
                ncols: args.ncols,
                save_path: Some(args.save_path.clone()),
            };
            cube_gallery(CubeInput::Path(args.cube), &options)?;
            println!("✅ Saved gallery to {}", args.save_path.display());
        }
        Command::Score(args) => {
            let options = ScoreOptions {
                pred_var: args.pred_var,
                verbose: !args.quiet,
            };
            let scores = score_over_dataset(&args.target_dir, &args.pred_dir, &options)?;
            if let Some(path) = args.output {
                scores.write_records(&path)?;
                info!("Saved per-pixel scores to {}", path.display());
            }
            println!("{}", scores.summary_json()?);
        }
    }

    Ok(())
}

fn print_minicube(id: &str, cube: &Minicube) {
    println!("Minicube {id}");
    println!("  dimensions:");
    for (name, len) in cube.dims() {
        println!("    {name} = {len}");
    }
    println!("  variables:");
    for (name, variable) in cube.variables() {
        println!("    {name}({})", variable.dims.join(", "));
    }
}

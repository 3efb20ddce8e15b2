use clap::{Parser, Subcommand, ValueEnum};
use infocard::config::{self, Config, ConfigError, SettingsUpdate};
use infocard::generate::{self, CardRequest};
use infocard::imaging::{self, ImageBackend, RustBackend};
use infocard::position::{
    Anchor, Axis, EvalContext, Formula, FormulaMode, PositionDefinition, build_formula,
};
use infocard::{dataset, inventory, output};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Command-line overrides for the settings section.
#[derive(clap::Args, Clone, Default)]
struct SettingsArgs {
    /// Root directory with one folder per product
    #[arg(long)]
    photos: Option<PathBuf>,
    /// Directory of overlay PNGs
    #[arg(long)]
    overlays: Option<PathBuf>,
    /// Dataset: workbook, CSV file, or directory of CSV files
    #[arg(long)]
    dataset: Option<PathBuf>,
    /// Base output directory
    #[arg(long)]
    output: Option<PathBuf>,
    /// Canvas width in pixels
    #[arg(long)]
    width: Option<u32>,
    /// Canvas height in pixels
    #[arg(long)]
    height: Option<u32>,
    /// Margin in pixels (MARGIN in formulas)
    #[arg(long)]
    margin: Option<u32>,
    /// Whether the first row of every sheet is a header
    #[arg(long)]
    header_row: Option<bool>,
}

impl SettingsArgs {
    fn to_update(&self) -> SettingsUpdate {
        SettingsUpdate {
            photos_dir: self.photos.clone(),
            infographics_dir: self.overlays.clone(),
            output_dir: self.output.clone(),
            dataset_path: self.dataset.clone(),
            dataset_header_row: self.header_row,
            canvas_width: self.width,
            canvas_height: self.height,
            margin: self.margin,
        }
    }
}

#[derive(Parser)]
#[command(name = "infocard")]
#[command(about = "Batch compositor for product photo cards with infographic overlays")]
#[command(long_about = "\
Batch compositor for product photo cards with infographic overlays

Every photo is scaled to fill a fixed canvas, center-cropped, and decorated
with the overlays the dataset assigns to its slide.

Inputs:

  photos/                 # one folder per product id
  ├── P1/
  │   ├── 01.jpg          # slide 0 (file name order)
  │   └── 02.jpg          # slide 1
  infografika/
  └── badgeA.png          # overlay \"badgeA\"
  data.xlsx               # every sheet is a pass over all photos

Dataset rows:

  product | overlay 0 | position 0 | overlay 1 | position 1 | ...
  P1      | badgeA    | 5          |           |            |

Positions are named pairs of formulas plus an anchor, defined in the config
file. Formula variables: canvas_width, canvas_height, overlay_width,
overlay_height, MARGIN.

Run 'infocard gen-config' to generate a documented infocard.toml.")]
#[command(version)]
struct Cli {
    /// Configuration file (TOML, or JSON when it ends in .json)
    #[arg(long, default_value = config::DEFAULT_CONFIG_FILE, global = true)]
    config: PathBuf,

    /// Increase log verbosity (-v info, -vv debug). RUST_LOG takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render cards for every photo according to the dataset
    Generate(SettingsArgs),
    /// Render a single card to a PNG file
    Preview {
        /// Product id (folder under the photos directory)
        product: String,
        /// Photo file name inside the product folder
        photo: String,
        /// Overlay name to composite
        #[arg(long, requires = "position")]
        overlay: Option<String>,
        /// Position id for the overlay
        #[arg(long, requires = "overlay")]
        position: Option<String>,
        /// Output file
        #[arg(long, default_value = "preview.png")]
        out: PathBuf,
        #[command(flatten)]
        settings: SettingsArgs,
    },
    /// List products, photos or overlays
    List {
        #[command(subcommand)]
        what: ListCommand,
    },
    /// Manage named positions
    Positions {
        #[command(subcommand)]
        action: PositionsCommand,
    },
    /// Show or change settings
    Settings {
        #[command(subcommand)]
        action: SettingsCommand,
    },
    /// Validate configuration, formulas, directories and dataset without writing
    Check,
    /// Print a stock infocard.toml with all options documented
    GenConfig,
}

#[derive(Subcommand)]
enum ListCommand {
    /// Product folders under the photos directory
    Products,
    /// Photos of one product in slide order
    Photos { product: String },
    /// Overlay names available in the overlays directory
    Overlays,
}

#[derive(Subcommand)]
enum PositionsCommand {
    /// Show every position
    List,
    /// Add a new position
    Add {
        id: String,
        #[arg(long, allow_hyphen_values = true)]
        x: String,
        #[arg(long, allow_hyphen_values = true)]
        y: String,
        #[arg(long, default_value = "top-left")]
        anchor: Anchor,
    },
    /// Change an existing position; omitted fields keep their value
    Update {
        id: String,
        #[arg(long, allow_hyphen_values = true)]
        x: Option<String>,
        #[arg(long, allow_hyphen_values = true)]
        y: Option<String>,
        #[arg(long)]
        anchor: Option<Anchor>,
    },
    /// Remove a position
    Delete { id: String },
    /// Build formula text for a pixel value
    Formula {
        #[arg(long, value_enum)]
        axis: AxisArg,
        /// absolute, margin, center or edge
        #[arg(long, default_value = "margin")]
        mode: FormulaMode,
        /// Desired coordinate in pixels on the current canvas
        #[arg(allow_hyphen_values = true)]
        value: i64,
    },
}

#[derive(Subcommand)]
enum SettingsCommand {
    /// Print the effective settings
    Show,
    /// Update settings and save the config file
    Set {
        /// Canvas preset: 2000x3000, 1000x1500 or 900x1200
        #[arg(long)]
        preset: Option<String>,
        #[command(flatten)]
        settings: SettingsArgs,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum AxisArg {
    X,
    Y,
}

impl From<AxisArg> for Axis {
    fn from(axis: AxisArg) -> Self {
        match axis {
            AxisArg::X => Axis::X,
            AxisArg::Y => Axis::Y,
        }
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Generate(args) => {
            let mut config = config::load_config_or_default(&cli.config);
            config.update_settings(args.to_update())?;
            init_thread_pool(&config.processing);

            let request = CardRequest::from_settings(config.settings());
            let (tx, rx) = std::sync::mpsc::channel();
            let printer = std::thread::spawn(move || {
                let mut progress = output::ProgressTracker::default();
                for event in rx {
                    for line in output::format_batch_event(&event, &mut progress) {
                        println!("{}", line);
                    }
                }
            });
            let result = generate::generate_cards(&request, config.positions(), Some(tx));
            printer
                .join()
                .map_err(|_| "progress printer thread panicked")?;
            output::print_report(&result?);
        }
        Command::Preview {
            product,
            photo,
            overlay,
            position,
            out,
            settings,
        } => {
            let mut config = config::load_config_or_default(&cli.config);
            config.update_settings(settings.to_update())?;
            let s = config.settings();
            let canvas_spec = s.canvas();
            let backend = RustBackend::new();
            let photo_path = s.photos_dir.join(&product).join(&photo);
            let mut canvas = imaging::render_canvas(&backend, &photo_path, canvas_spec)?;
            if let (Some(overlay), Some(position)) = (overlay, position) {
                let asset = inventory::overlay_path(&s.infographics_dir, &overlay);
                let placement = imaging::composite_overlay(
                    &backend,
                    &mut canvas,
                    &asset,
                    &position,
                    config.positions(),
                    canvas_spec.margin,
                )?;
                let note = if placement.fallback {
                    " (unknown position, margin fallback)"
                } else {
                    ""
                };
                println!(
                    "{} at {} → ({}, {}){}",
                    overlay, position, placement.x, placement.y, note
                );
            }
            backend.save_png(canvas.image(), &out)?;
            println!("Wrote {}", out.display());
        }
        Command::List { what } => {
            let config = config::load_config_or_default(&cli.config);
            let s = config.settings();
            match what {
                ListCommand::Products => {
                    output::print_listing("Products", &inventory::list_products(&s.photos_dir)?);
                }
                ListCommand::Photos { product } => {
                    let photos: Vec<String> = inventory::list_photos(&s.photos_dir.join(&product))?
                        .iter()
                        .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
                        .collect();
                    output::print_listing(&format!("Photos of {product}"), &photos);
                }
                ListCommand::Overlays => {
                    output::print_listing(
                        "Overlays",
                        &inventory::list_overlays(&s.infographics_dir)?,
                    );
                }
            }
        }
        Command::Positions { action } => run_positions(&cli.config, action)?,
        Command::Settings { action } => match action {
            SettingsCommand::Show => {
                let config = config::load_config_or_default(&cli.config);
                print!("{}", toml::to_string_pretty(config.settings())?);
            }
            SettingsCommand::Set { preset, settings } => {
                let mut update = settings.to_update();
                if let Some(preset) = preset {
                    let (w, h) = config::parse_canvas_size(&preset)
                        .ok_or_else(|| format!("Invalid canvas preset: {preset}"))?;
                    update.canvas_width = Some(w);
                    update.canvas_height = Some(h);
                }
                if update.is_empty() {
                    return Err("Nothing to update".into());
                }
                edit_config(&cli.config, |config| {
                    config.update_settings(update)?;
                    Ok(format!("Saved {}", cli.config.display()))
                })?;
            }
        },
        Command::Check => run_check(&cli.config)?,
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

fn run_positions(
    config_path: &Path,
    action: PositionsCommand,
) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        PositionsCommand::List => {
            let config = config::load_config_or_default(config_path);
            output::print_positions(config.positions());
        }
        PositionsCommand::Formula { axis, mode, value } => {
            let config = config::load_config_or_default(config_path);
            let s = config.settings();
            let axis = Axis::from(axis);
            let canvas_size = match axis {
                Axis::X => s.canvas_width,
                Axis::Y => s.canvas_height,
            };
            let formula =
                build_formula(mode, axis, value, canvas_size as i64, s.margin as i64);
            let ctx = EvalContext {
                canvas_width: s.canvas_width as i64,
                canvas_height: s.canvas_height as i64,
                overlay_width: 0,
                overlay_height: 0,
                margin: s.margin as i64,
            };
            let resolved = Formula::parse(&formula)?.evaluate(&ctx)?;
            println!("{formula}");
            println!("# = {resolved} on {}x{}", s.canvas_width, s.canvas_height);
        }
        PositionsCommand::Add { id, x, y, anchor } => edit_config(config_path, |config| {
            config.add_position(&id, PositionDefinition::new(x, y, anchor))?;
            Ok(format!("Added position {id}"))
        })?,
        PositionsCommand::Update { id, x, y, anchor } => edit_config(config_path, |config| {
            let current = config
                .positions()
                .get(&id)
                .cloned()
                .ok_or_else(|| ConfigError::UnknownPosition(id.clone()))?;
            config.update_position(
                &id,
                x.as_deref().unwrap_or(&current.x),
                y.as_deref().unwrap_or(&current.y),
                anchor,
            )?;
            Ok(format!("Updated position {id}"))
        })?,
        PositionsCommand::Delete { id } => edit_config(config_path, |config| {
            if !config.delete_position(&id) {
                return Err(ConfigError::UnknownPosition(id.clone()));
            }
            Ok(format!("Deleted position {id}"))
        })?,
    }
    Ok(())
}

/// Load the config strictly, apply `edit`, save it back and print the
/// returned message. Nothing is written if the edit fails.
fn edit_config(
    config_path: &Path,
    edit: impl FnOnce(&mut Config) -> Result<String, ConfigError>,
) -> Result<(), ConfigError> {
    let mut config = config::load_config(config_path)?;
    let message = edit(&mut config)?;
    config.save(config_path)?;
    println!("{message}");
    Ok(())
}

/// Validate everything a `generate` run would touch, without writing.
fn run_check(config_path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    println!("==> Checking {}", config_path.display());
    let config = config::load_config(config_path)?;
    let s = config.settings();
    let mut problems = 0usize;

    for err in config.positions().validate() {
        println!("    position: {err}");
        problems += 1;
    }
    for (label, dir) in [
        ("photos", &s.photos_dir),
        ("overlays", &s.infographics_dir),
    ] {
        if !dir.is_dir() {
            println!("    {label} directory not found: {}", dir.display());
            problems += 1;
        }
    }
    match dataset::load_dataset(&s.dataset_path, s.dataset_header_row) {
        Ok(data) => {
            println!(
                "    dataset: {} sheet(s): {}",
                data.sheets.len(),
                data.sheet_names().join(", ")
            );
            for err in data.rejected() {
                println!("    dataset: {err}");
                problems += 1;
            }
        }
        Err(e) => {
            println!("    dataset: {e}");
            problems += 1;
        }
    }
    if s.photos_dir.is_dir() {
        let products = inventory::scan_products(&s.photos_dir)?;
        let photos: usize = products.iter().map(|p| p.photos.len()).sum();
        println!("    photos: {} product(s), {} photo(s)", products.len(), photos);
    }

    if problems > 0 {
        return Err(format!("{problems} problem(s) found").into());
    }
    println!("==> Configuration is valid");
    Ok(())
}

/// Install the log subscriber. `RUST_LOG` wins over `-v`.
fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Initialize the rayon thread pool based on processing config.
///
/// Never more threads than cores: the config can lower the count, not raise it.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}

//! darkmode - dark mode for web pages, from the command line.
//!
//! Runs the popup and page agents against a JSON storage file and HTML
//! files on disk.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{CommandFactory, Parser, Subcommand};
use tracing::{debug, info, warn};

use darkmode_core::{
    ApplyOutcome, Config, ControlSurface, HtmlDocument, JsonFileStore, LoadOutcome, LocalTabs,
    Location, PageAgent, PopupForm, SaveOutcome, SettingsRecord, SettingsStore, ThemeStyle,
    logging, stylesheet,
};

/// darkmode - dark mode for web pages
#[derive(Parser, Debug)]
#[command(name = "darkmode", version, about, long_about = None)]
struct Args {
    /// Path to the configuration file (uses XDG lookup if not specified)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Increase verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Print example configuration and exit
    #[arg(long)]
    print_example_config: bool,

    /// Validate configuration and exit (returns non-zero on errors)
    #[arg(long)]
    check_config: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the dark stylesheet for the given settings
    Generate {
        /// Start from the saved global settings instead of the defaults
        #[arg(long)]
        from_store: bool,

        #[command(flatten)]
        settings: SettingsArgs,
    },
    /// Popup actions
    Popup {
        #[command(subcommand)]
        action: PopupAction,
    },
    /// Page agent actions
    Page {
        #[command(subcommand)]
        action: PageAction,
    },
}

#[derive(Subcommand, Debug)]
enum PopupAction {
    /// Show the form as the popup would populate it
    Show,
    /// Save the form as the global settings
    Save {
        /// Dark mode toggle
        #[arg(long)]
        enabled: Option<bool>,

        #[command(flatten)]
        settings: SettingsArgs,
    },
    /// Apply the form to a page
    Apply {
        #[command(flatten)]
        page: PageArgs,

        /// Dark mode toggle
        #[arg(long)]
        enabled: Option<bool>,

        /// Open the page without an agent attached
        #[arg(long)]
        no_agent: bool,

        #[command(flatten)]
        settings: SettingsArgs,
    },
}

#[derive(Subcommand, Debug)]
enum PageAction {
    /// Load a page and restore its dark mode state
    Load {
        #[command(flatten)]
        page: PageArgs,
    },
    /// List remembered page states
    States,
}

/// Settings overrides. Unset flags keep the starting value.
#[derive(clap::Args, Debug, Default)]
struct SettingsArgs {
    /// Darkness level (0-100)
    #[arg(long, value_parser = clap::value_parser!(u32).range(0..=100))]
    darkness: Option<u32>,

    /// Contrast percentage
    #[arg(long)]
    contrast: Option<u32>,

    /// Theme: gray-dark, true-dark, blue-dark or sepia
    #[arg(long)]
    theme: Option<ThemeStyle>,

    /// Invert images, video, canvas and svg
    #[arg(long)]
    invert_images: Option<bool>,

    /// Keep brand and inline colors unfiltered
    #[arg(long)]
    preserve_colors: Option<bool>,
}

impl SettingsArgs {
    fn apply_to(&self, mut settings: SettingsRecord) -> SettingsRecord {
        if let Some(darkness) = self.darkness {
            settings.darkness_level = darkness;
        }
        if let Some(contrast) = self.contrast {
            settings.contrast = contrast;
        }
        if let Some(theme) = self.theme {
            settings.theme_style = theme;
        }
        if let Some(invert) = self.invert_images {
            settings.invert_images = invert;
        }
        if let Some(preserve) = self.preserve_colors {
            settings.preserve_colors = preserve;
        }
        settings
    }
}

/// The page a command works on.
#[derive(clap::Args, Debug)]
struct PageArgs {
    /// Page URL (decides the page identity)
    #[arg(long)]
    url: String,

    /// HTML file with the page markup (a blank page if omitted)
    #[arg(long)]
    html: Option<PathBuf>,

    /// Write the resulting markup here
    #[arg(long)]
    out: Option<PathBuf>,
}

impl PageArgs {
    fn document(&self) -> anyhow::Result<HtmlDocument> {
        let location = Location::parse(&self.url)?;
        match &self.html {
            Some(path) => {
                let html = fs::read_to_string(path)
                    .with_context(|| format!("reading {}", path.display()))?;
                Ok(HtmlDocument::from_html(location, &html))
            }
            None => Ok(HtmlDocument::empty(location)),
        }
    }

    fn write(&self, document: &HtmlDocument) -> anyhow::Result<()> {
        if let Some(path) = &self.out {
            fs::write(path, document.render())
                .with_context(|| format!("writing {}", path.display()))?;
            println!("Wrote {}", path.display());
        }
        Ok(())
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    logging::init(args.verbose);

    // --print-example-config needs no config at all
    if args.print_example_config {
        print!("{}", darkmode_core::config::DEFAULT_CONFIG_TOML);
        return ExitCode::SUCCESS;
    }

    // If --config is specified, it must exist and be valid (no fallback)
    let load_result = match Config::find_and_load(args.config.as_deref()) {
        Ok(result) => result,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Some(ref source) = load_result.source {
        info!("Loaded configuration from {:?}", source);
    } else if load_result.used_defaults {
        debug!("Using default configuration (no config file found)");
    }

    let config = load_result.config;

    if let Err(e) = config.validate() {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    for warning in config.warnings() {
        warn!("{}", warning);
    }

    if args.check_config {
        if let Some(ref source) = load_result.source {
            println!("Configuration valid: {}", source.display());
        } else {
            println!("Configuration valid (using defaults)");
        }
        println!("{}", config.summary());
        return ExitCode::SUCCESS;
    }

    let Some(command) = args.command else {
        let _ = Args::command().print_help();
        return ExitCode::FAILURE;
    };

    match handle_command(command, &config) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn handle_command(command: Command, config: &Config) -> anyhow::Result<ExitCode> {
    let store = Arc::new(JsonFileStore::new(config.store_path()));
    debug!("Using storage file {}", store.path().display());

    match command {
        Command::Generate {
            from_store,
            settings,
        } => handle_generate(&store, from_store, &settings),
        Command::Popup { action } => handle_popup_command(action, config, store),
        Command::Page { action } => handle_page_command(action, config, store),
    }
}

fn settings_store(store: &Arc<JsonFileStore>, config: &Config) -> SettingsStore<Arc<JsonFileStore>> {
    SettingsStore::new(store.clone()).with_max_page_states(config.store.max_page_states)
}

fn handle_generate(
    store: &Arc<JsonFileStore>,
    from_store: bool,
    args: &SettingsArgs,
) -> anyhow::Result<ExitCode> {
    let base = if from_store {
        SettingsStore::new(store.clone()).global_settings()?
    } else {
        SettingsRecord::default()
    };

    print!("{}", stylesheet::generate(&args.apply_to(base)));
    Ok(ExitCode::SUCCESS)
}

fn handle_popup_command(
    action: PopupAction,
    config: &Config,
    store: Arc<JsonFileStore>,
) -> anyhow::Result<ExitCode> {
    let page_store = store.clone();
    let max_page_states = config.store.max_page_states;
    let tabs = LocalTabs::new(move |document: HtmlDocument| {
        PageAgent::new(
            document,
            SettingsStore::new(page_store.clone()).with_max_page_states(max_page_states),
        )
    });
    let surface = ControlSurface::new(
        settings_store(&store, config),
        tabs,
        config.control.clone(),
    );

    match action {
        PopupAction::Show => {
            print_form(&surface.open());
            Ok(ExitCode::SUCCESS)
        }
        PopupAction::Save { enabled, settings } => {
            let form = edit_form(surface.open(), enabled, &settings);
            match surface.save(&form) {
                SaveOutcome::Saved { label, .. } => {
                    println!("{}", label);
                    Ok(ExitCode::SUCCESS)
                }
                SaveOutcome::Failed => bail!("settings were not saved"),
            }
        }
        PopupAction::Apply {
            page,
            enabled,
            no_agent,
            settings,
        } => {
            let tab = surface.tabs().open_page(page.document()?, !no_agent)?;
            let form = edit_form(surface.open(), enabled, &settings);
            let outcome = surface.apply(&form);

            match &outcome {
                ApplyOutcome::Applied(response) => {
                    println!("Applied: enabled={}", response.enabled());
                }
                ApplyOutcome::AppliedAfterProvision(response) => {
                    println!(
                        "Applied after attaching an agent: enabled={}",
                        response.enabled()
                    );
                }
                ApplyOutcome::Failed => println!("Apply failed"),
                ApplyOutcome::NoActivePage => println!("No active page"),
            }

            if let Some(document) = surface.tabs().close_page(tab) {
                page.write(&document)?;
            }

            Ok(if outcome.is_applied() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
    }
}

fn handle_page_command(
    action: PageAction,
    config: &Config,
    store: Arc<JsonFileStore>,
) -> anyhow::Result<ExitCode> {
    match action {
        PageAction::Load { page } => {
            let mut agent = PageAgent::new(page.document()?, settings_store(&store, config));
            let outcome = agent.on_load();

            let description = match outcome {
                LoadOutcome::RestoredPage => "restored page state",
                LoadOutcome::AppliedGlobal => "applied global settings",
                LoadOutcome::Inactive => "dark mode off",
                LoadOutcome::Failed => "storage unavailable",
                LoadOutcome::Deferred | LoadOutcome::AlreadyLoaded => "nothing to do",
            };
            println!("{}: {}", agent.page_id(), description);
            if let Some(settings) = agent.settings() {
                println!(
                    "  theme: {}, darkness: {}%, contrast: {}%",
                    settings.theme_style, settings.darkness_level, settings.contrast
                );
            }

            page.write(agent.document())?;

            Ok(if outcome == LoadOutcome::Failed {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            })
        }
        PageAction::States => {
            let states = SettingsStore::new(store.clone()).page_states()?;
            if states.is_empty() {
                println!("No page states in {}", store.path().display());
            }
            for (id, state) in states {
                let theme = state
                    .settings
                    .as_ref()
                    .map_or("-", |settings| settings.theme_style.as_str());
                println!(
                    "{}\t{}\t{}\t{}",
                    id,
                    if state.enabled { "on" } else { "off" },
                    theme,
                    state.url
                );
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn edit_form(mut form: PopupForm, enabled: Option<bool>, settings: &SettingsArgs) -> PopupForm {
    if let Some(enabled) = enabled {
        form.enabled = enabled;
    }
    form.settings = settings.apply_to(form.settings);
    form
}

fn print_form(form: &PopupForm) {
    println!("Dark mode: {}", if form.enabled { "on" } else { "off" });
    println!("  darkness: {}", form.darkness_label());
    println!("  contrast: {}", form.contrast_label());
    println!("  theme: {}", form.settings.theme_style);
    println!("  invert images: {}", form.settings.invert_images);
    println!("  preserve colors: {}", form.settings.preserve_colors);
    if let Some(saved_at) = form
        .settings
        .timestamp
        .and_then(chrono::DateTime::from_timestamp_millis)
    {
        println!("  saved at: {}", saved_at.format("%Y-%m-%d %H:%M:%S UTC"));
    }
}

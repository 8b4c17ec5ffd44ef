use anyhow::{bail, Result};
use clap::{Parser, Subcommand, ValueEnum};
use pawsignal::analytics;
use pawsignal::error::ProfileError;
use pawsignal::events::{EventFilter, SignalEvent};
use pawsignal::motion;
use pawsignal::terminal::{self, KeyboardHost};
use pawsignal::torch;
use pawsignal::{
    DogProfile, EventBus, PawSignalConfig, PresentationMode, ProfileStore, Signal, SignalId, SIGNALS,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::{Layer, Registry};

#[derive(Parser, Debug)]
#[command(name = "pawsignal")]
#[command(about = "Full-screen dog temperament signal with attention flashing")]
#[command(version)]
#[command(long_about = "Shows a color-coded temperament signal for a dog on the whole \
terminal. The signal can flash together with the device torch to get attention, \
started from the flash control or by shaking the device.")]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file
    #[arg(short, long, default_value = "pawsignal.toml", help = "Path to TOML configuration file")]
    config: String,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (info level)
    #[arg(short, long, help = "Enable verbose info level logging")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration file and exit")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,

    /// Write logs to daily files in this directory instead of stderr.
    /// `show` always logs to files, under the temp directory unless set.
    #[arg(long, value_name = "DIR")]
    log_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show a signal full-screen (defaults to the profile's signal)
    Show {
        /// green, yellow, blue or red
        signal: Option<String>,
    },
    /// Print the color guide
    Signals {
        #[arg(long)]
        json: bool,
    },
    /// Manage the local dog profile
    Profile {
        #[command(subcommand)]
        action: ProfileAction,
    },
}

#[derive(Subcommand, Debug)]
enum ProfileAction {
    Show {
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
    Set {
        #[arg(long)]
        owner: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        dog: Option<String>,
        #[arg(long)]
        signal: Option<String>,
    },
    Clear,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum OutputFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_config {
        print_default_config()?;
        return Ok(());
    }

    let _log_guard = init_logging(&args)?;

    info!("Starting PawSignal v{}", env!("CARGO_PKG_VERSION"));

    let config = match PawSignalConfig::load_from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {}", e);
        if args.validate_config {
            eprintln!("✗ Configuration validation failed: {}", e);
            std::process::exit(1);
        }
        return Err(e.into());
    }

    if args.validate_config {
        println!("✓ Configuration is valid");
        return Ok(());
    }

    match args.command.unwrap_or(Command::Show { signal: None }) {
        Command::Show { signal } => run_show(&config, signal.as_deref()).await,
        Command::Signals { json } => print_signals(json),
        Command::Profile { action } => run_profile(&config, action),
    }
}

async fn run_show(config: &PawSignalConfig, signal: Option<&str>) -> Result<()> {
    let store = ProfileStore::new(&config.profile.path);
    let signal_id = match signal {
        Some(name) => name.parse::<SignalId>()?,
        None => store.load().default_signal_id,
    };

    let analytics = analytics::from_config(&config.analytics);
    analytics.track_page_view("signal");

    let event_bus = Arc::new(EventBus::new(config.system.event_bus_capacity));
    let mut session_events = event_bus.subscribe_filtered(
        EventFilter::EventTypes(vec!["mode_changed", "screen_unmounted"]),
        "show-session",
    );
    let session = tokio::spawn(async move {
        let mut flashes = 0usize;
        while let Ok(event) = session_events.recv().await {
            match event {
                SignalEvent::ModeChanged { to: PresentationMode::Attention, .. } => flashes += 1,
                SignalEvent::ScreenUnmounted { .. } => break,
                _ => {}
            }
        }
        flashes
    });

    let (motion_source, shake_sender) = motion::from_config(&config.motion);
    let back_requested = Arc::new(Notify::new());
    let notify = Arc::clone(&back_requested);

    let screen = pawsignal::SignalScreen::builder()
        .with_torch(torch::from_config(&config.torch))
        .with_motion(motion_source)
        .with_analytics(Arc::clone(&analytics))
        .with_event_bus(Arc::clone(&event_bus))
        .with_presentation_config(config.presentation.clone())
        .with_torch_acquisition(config.torch.acquisition)
        .on_back(move || notify.notify_one())
        .mount(Signal::get(signal_id).clone());

    let host_token = CancellationToken::new();
    let keys = KeyboardHost::new(screen.inputs(), shake_sender, host_token.child_token()).start();
    let painter = tokio::spawn(terminal::paint_frames(screen.frames(), host_token.child_token()));

    tokio::select! {
        _ = back_requested.notified() => info!("Back requested, leaving signal screen"),
        _ = tokio::signal::ctrl_c() => info!("Interrupted, leaving signal screen"),
    }

    screen.unmount().await;
    host_token.cancel();

    match painter.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("Terminal painter failed: {}", e),
        Err(e) => warn!("Terminal painter task ended abnormally: {}", e),
    }
    if let Err(e) = keys.await {
        warn!("Keyboard host ended abnormally: {}", e);
    }

    if let Ok(flashes) = session.await {
        info!("Signal {} shown, attention mode entered {} time(s)", signal_id, flashes);
    }

    analytics.track_page_view("home");
    Ok(())
}

fn print_signals(json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&SIGNALS)?);
        return Ok(());
    }

    for signal in SIGNALS.iter() {
        println!("{} {:<7} {} {}", signal.icon.glyph(), signal.id.as_str(), signal.hex, signal.label);
        println!("    {}", signal.meaning);
        println!("    {}", signal.guidance);
    }
    Ok(())
}

fn run_profile(config: &PawSignalConfig, action: ProfileAction) -> Result<()> {
    let store = ProfileStore::new(&config.profile.path);

    match action {
        ProfileAction::Show { format } => {
            let profile = store.load();
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&profile)?),
                OutputFormat::Text => print_profile(&profile, store.has_profile()),
            }
        }
        ProfileAction::Set {
            owner,
            email,
            phone,
            dog,
            signal,
        } => {
            let mut profile = store.load();
            if let Some(owner) = owner {
                profile.owner_first_name = owner.trim().to_string();
            }
            if let Some(email) = email {
                profile.email = email.trim().to_string();
            }
            if let Some(phone) = phone {
                profile.phone = phone.trim().to_string();
            }
            if let Some(dog) = dog {
                profile.dog_name = dog.trim().to_string();
            }
            if let Some(signal) = signal {
                profile.default_signal_id = signal.parse()?;
            }

            if let Err(ProfileError::MissingFields(fields)) = profile.validate() {
                bail!("Profile not saved, missing: {}", fields.join(", "));
            }
            store.save(&profile)?;
            println!("✓ Profile saved to {}", store.path().display());
        }
        ProfileAction::Clear => {
            store.clear()?;
            println!("✓ Profile cleared");
        }
    }

    Ok(())
}

fn print_profile(profile: &DogProfile, complete: bool) {
    let blank = |value: &str| if value.is_empty() { "-".to_string() } else { value.to_string() };

    println!("Owner:          {}", blank(&profile.owner_first_name));
    println!("Email:          {}", blank(&profile.email));
    println!("Phone:          {}", blank(&profile.phone));
    println!("Dog:            {}", blank(&profile.dog_name));
    println!("Default signal: {}", profile.default_signal_id);
    if !complete {
        println!("(profile incomplete)");
    }
}

#[derive(Debug, PartialEq, Eq)]
enum LogTarget {
    Stderr,
    Directory(PathBuf),
}

/// The signal screen owns the terminal while mounted, so `show` never logs to
/// stderr
fn log_target(args: &Args) -> LogTarget {
    if let Some(dir) = &args.log_dir {
        return LogTarget::Directory(dir.clone());
    }

    let shows_screen = matches!(args.command, None | Some(Command::Show { .. }));
    if shows_screen && !args.validate_config {
        LogTarget::Directory(std::env::temp_dir().join("pawsignal-logs"))
    } else {
        LogTarget::Stderr
    }
}

fn init_logging(args: &Args) -> Result<Option<WorkerGuard>> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else if args.quiet {
        "error"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("pawsignal={}", log_level)));

    let (fmt_layer, guard) = match log_target(args) {
        LogTarget::Directory(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "pawsignal.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (fmt_layer(args, writer, false), Some(guard))
        }
        LogTarget::Stderr => (fmt_layer(args, std::io::stderr, true), None),
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
        .try_init()?;

    Ok(guard)
}

fn fmt_layer<W>(args: &Args, writer: W, ansi: bool) -> Box<dyn Layer<Registry> + Send + Sync>
where
    W: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    use tracing_subscriber::fmt;

    match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_writer(writer)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("compact") => fmt::layer()
            .compact()
            .with_writer(writer)
            .with_ansi(ansi)
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .boxed(),
        Some("pretty") | None => fmt::layer()
            .pretty()
            .with_writer(writer)
            .with_ansi(ansi)
            .with_target(true)
            .with_thread_ids(args.debug)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer()
                .with_writer(writer)
                .with_ansi(ansi)
                .with_target(true)
                .boxed()
        }
    }
}

/// Print default configuration in TOML format
fn print_default_config() -> Result<()> {
    println!("# PawSignal Configuration File");
    println!("# Every key can be overridden with PAWSIGNAL_<SECTION>__<KEY>");
    println!();
    println!("{}", toml::to_string_pretty(&PawSignalConfig::default())?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("pawsignal").chain(argv.iter().copied())).unwrap()
    }

    #[test]
    fn test_show_never_logs_to_terminal() {
        let default_dir = std::env::temp_dir().join("pawsignal-logs");

        assert_eq!(log_target(&parse(&[])), LogTarget::Directory(default_dir.clone()));
        assert_eq!(
            log_target(&parse(&["-v", "show", "red"])),
            LogTarget::Directory(default_dir)
        );
        assert_eq!(
            log_target(&parse(&["--log-dir", "/var/log/pawsignal", "show"])),
            LogTarget::Directory(PathBuf::from("/var/log/pawsignal"))
        );
    }

    #[test]
    fn test_plain_commands_log_to_stderr() {
        assert_eq!(log_target(&parse(&["signals", "--json"])), LogTarget::Stderr);
        assert_eq!(log_target(&parse(&["profile", "clear"])), LogTarget::Stderr);
        assert_eq!(log_target(&parse(&["--validate-config"])), LogTarget::Stderr);
        assert_eq!(
            log_target(&parse(&["--log-dir", "logs", "signals"])),
            LogTarget::Directory(PathBuf::from("logs"))
        );
    }
}

//! Nursery Pi - Raspberry Pi Nursery Monitor Binary
//!
//! Serves the monitor page and media feeds, or grabs a single snapshot.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use nursery_pi::devices::camera::{list_cameras, SystemCameras};
use nursery_pi::devices::config::parse_switch_pin;
use nursery_pi::devices::{audio, data::DeviceInfo};
use nursery_pi::session::video::encode_jpeg;
use nursery_pi::{
    start_web_server, AppState, CaptureManager, DeviceConfig, WebConfig, DEFAULT_WEB_PORT,
};
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "nursery_pi")]
#[command(about = "Nursery Pi - Raspberry Pi nursery monitor")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = "Live camera, microphone, white noise and LED control over HTTP")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Web server bind address
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Web server port
    #[arg(short, long, env = "APP_PORT", default_value_t = DEFAULT_WEB_PORT)]
    port: u16,

    /// Use generic peripherals and logged GPIO instead of Pi hardware
    #[arg(long, env = "DEV_MODE", value_parser = parse_dev_mode)]
    dev_mode: bool,

    /// Index of the generic camera
    #[arg(long, default_value_t = 0)]
    camera_index: u32,

    /// Device node of the camera module
    #[arg(long, default_value = "/dev/video0")]
    camera_device: PathBuf,

    /// LED switch as name=pin (repeatable, replaces the defaults)
    #[arg(long = "switch", value_name = "NAME=PIN")]
    switches: Vec<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

/// Only a case-insensitive "true" turns development mode on; any other
/// `DEV_MODE` value leaves it off instead of failing to start.
fn parse_dev_mode(value: &str) -> Result<bool, Infallible> {
    Ok(value.trim().eq_ignore_ascii_case("true"))
}

#[derive(Subcommand)]
enum Commands {
    /// Start the web server (default)
    Serve(ServeArgs),

    /// Capture a single JPEG and exit
    Snapshot(SnapshotArgs),

    /// List the cameras and audio devices the compiled backends can see
    Devices,
}

#[derive(Args, Default)]
struct ServeArgs {
    /// Static files directory (optional)
    #[arg(long)]
    static_dir: Option<String>,

    /// Disable CORS headers
    #[arg(long)]
    no_cors: bool,
}

#[derive(Args)]
struct SnapshotArgs {
    /// Where to write the JPEG
    #[arg(short, long, default_value = "snapshot.jpg")]
    output: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(&cli)?;

    let devices = device_config(&cli)?;

    match &cli.command {
        Some(Commands::Serve(args)) => serve_command(&cli, args, devices).await,
        Some(Commands::Snapshot(args)) => snapshot_command(args, devices).await,
        Some(Commands::Devices) => devices_command(),
        None => serve_command(&cli, &ServeArgs::default(), devices).await,
    }
}

fn init_logging(cli: &Cli) -> anyhow::Result<()> {
    let level = if cli.debug {
        Level::DEBUG
    } else if cli.verbose {
        Level::INFO
    } else {
        Level::WARN
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    Ok(())
}

fn device_config(cli: &Cli) -> anyhow::Result<DeviceConfig> {
    let mut config = DeviceConfig::default()
        .with_dev_mode(cli.dev_mode)
        .with_camera_index(cli.camera_index)
        .with_camera_device(&cli.camera_device);

    if !cli.switches.is_empty() {
        let pins = cli
            .switches
            .iter()
            .map(|spec| parse_switch_pin(spec))
            .collect::<Result<BTreeMap<_, _>, _>>()?;
        config = config.with_switch_pins(pins);
    }

    Ok(config)
}

async fn serve_command(cli: &Cli, args: &ServeArgs, devices: DeviceConfig) -> anyhow::Result<()> {
    info!("Starting Nursery Pi monitor...");

    let mut web_config = WebConfig::new(&cli.host, cli.port).with_cors(!args.no_cors);
    if let Some(static_dir) = &args.static_dir {
        web_config = web_config.with_static_dir(Some(PathBuf::from(static_dir)));
        info!("Using static files from: {}", static_dir);
    }

    info!("Web server configuration:");
    info!("  - Bind address: {}:{}", web_config.host, web_config.port);
    info!("  - CORS enabled: {}", web_config.enable_cors);
    info!("  - Development mode: {}", devices.dev_mode);
    info!("  - Switches: {:?}", devices.switch_pins);

    let state = AppState::from_config(&devices);
    start_web_server(web_config, state).await?;

    Ok(())
}

async fn snapshot_command(args: &SnapshotArgs, devices: DeviceConfig) -> anyhow::Result<()> {
    let dev_mode = devices.dev_mode;
    let capture = CaptureManager::new(Arc::new(SystemCameras::new(devices)), dev_mode);

    let (jpeg, status) = tokio::task::spawn_blocking(move || {
        let frame = capture.acquire();
        let status = capture.status();
        capture.release();
        encode_jpeg(&frame).map(|jpeg| (jpeg, status))
    })
    .await
    .context("capture task failed")??;

    tokio::fs::write(&args.output, &jpeg)
        .await
        .with_context(|| format!("failed to write {}", args.output.display()))?;

    println!(
        "Wrote {} ({} bytes) from {}",
        args.output.display(),
        jpeg.len(),
        status
            .kind
            .map(|kind| kind.to_string())
            .unwrap_or_else(|| "unknown source".to_string())
    );
    Ok(())
}

fn devices_command() -> anyhow::Result<()> {
    print_devices("Cameras", list_cameras()?);
    print_devices("Audio outputs", audio::list_output_devices()?);
    print_devices("Audio inputs", audio::list_input_devices()?);

    println!("Features compiled:");
    println!("  - camera module: {}", mark(cfg!(feature = "camera-module")));
    println!("  - generic camera: {}", mark(cfg!(feature = "camera")));
    println!("  - audio: {}", mark(cfg!(feature = "audio")));
    println!("  - GPIO: {}", mark(cfg!(feature = "gpio")));
    Ok(())
}

fn print_devices(title: &str, devices: Vec<DeviceInfo>) {
    println!("{}:", title);
    if devices.is_empty() {
        println!("  (none)");
    }
    for device in devices {
        let default = if device.is_default { " (default)" } else { "" };
        println!("  [{}] {}{}", device.id, device.name, default);
    }
    println!();
}

fn mark(enabled: bool) -> &'static str {
    if enabled {
        "yes"
    } else {
        "no"
    }
}

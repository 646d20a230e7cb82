use clap::{Args as ClapArgs, Parser, Subcommand};
use pumpctl::{
    config::{ConfigError, ConfigLoader},
    error::{AppError, AppResult},
    logging,
    payload::{InputView, ManualPayload},
    port::{BaudRate, DataBits, Parity, PortDescriptor, PortWatcher, StopBits},
    protocol::PumpId,
    scheduler::validate_interval,
    service::{Notification, PumpService},
    Line, PortConfig, TextEncoding,
};
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// How often the service is ticked while a session runs.
const TICK_PERIOD: Duration = Duration::from_millis(10);

/// How often the device list is re-read.
const PORT_REFRESH_PERIOD: Duration = Duration::from_secs(1);

/// How long a one-shot setpoint waits for the controller's echo.
const SETPOINT_SETTLE: Duration = Duration::from_millis(300);

// Command-line arguments
#[derive(Parser, Debug)]
#[command(
    name = "pumpctl",
    version,
    about = "Talk to a laser pump controller over a serial line.",
    long_about = "Polls a multi-channel pump controller for telemetry, applies current setpoints, and gives an interactive terminal onto the serial link."
)]
struct Args {
    /// Settings file to use instead of the standard locations.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List serial devices.
    Ports {
        /// Print JSON instead of text.
        #[arg(long)]
        json: bool,
    },
    /// Open a session: poll telemetry and forward stdin to the controller.
    Run(RunArgs),
    /// Apply one setpoint and exit.
    Setpoint {
        /// Device to open (falls back to `serial.port`).
        #[arg(long)]
        port: Option<String>,
        /// Pump name, e.g. "HIPUMP 1" or pump4.
        pump: String,
        /// Current in the pump's unit (A for HIPUMP 1/2, mA otherwise).
        value: String,
    },
    /// Inspect or edit saved settings.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(ClapArgs, Debug)]
struct RunArgs {
    /// Device to open (falls back to `serial.port`).
    #[arg(long)]
    port: Option<String>,
    #[arg(long)]
    baud: Option<BaudRate>,
    #[arg(long)]
    data_bits: Option<DataBits>,
    #[arg(long)]
    stop_bits: Option<StopBits>,
    #[arg(long)]
    parity: Option<Parity>,
    #[arg(long)]
    encoding: Option<TextEncoding>,
    /// Polling interval in milliseconds (100-5000).
    #[arg(long)]
    interval_ms: Option<u64>,
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the effective settings.
    Show,
    /// Restore defaults and save.
    Reset,
    /// Print one setting.
    Get { key: String },
    /// Change one setting and save.
    Set { key: String, value: String },
}

// --- Main Application Entry Point ---
#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let loader = load_settings(args.config.as_ref());

    if let Err(e) = logging::init(&loader.config().logging) {
        eprintln!("warning: {e}");
    }

    let result = match args.command {
        Command::Ports { json } => list_ports(json),
        Command::Run(run) => run_session(loader, run).await,
        Command::Setpoint { port, pump, value } => one_shot_setpoint(loader, port, &pump, &value).await,
        Command::Config { action } => edit_config(loader, action),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn load_settings(path: Option<&PathBuf>) -> ConfigLoader {
    match path {
        Some(path) if path.exists() => ConfigLoader::load_from(path).unwrap_or_else(|e| {
            eprintln!("warning: {e}; using defaults");
            with_path(path)
        }),
        Some(path) => with_path(path),
        None => ConfigLoader::load_or_default(),
    }
}

fn with_path(path: &PathBuf) -> ConfigLoader {
    let mut loader = ConfigLoader::with_defaults();
    loader.config_path = Some(path.clone());
    loader
}

fn list_ports(json: bool) -> AppResult<()> {
    let ports = PumpService::available_ports()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&ports)?);
    } else if ports.is_empty() {
        println!("no serial ports found");
    } else {
        for port in ports {
            println!("{port}");
        }
    }
    Ok(())
}

fn resolve_device(arg: Option<String>, loader: &ConfigLoader) -> AppResult<String> {
    arg.or_else(|| loader.config().serial.port.clone())
        .map(|label| PortDescriptor::device_from_label(&label).to_string())
        .filter(|device| !device.is_empty())
        .ok_or_else(|| AppError::Usage("no serial port given; pass --port or set serial.port".into()))
}

// --- Interactive session ---

struct Session {
    hex_send: bool,
    add_newline: bool,
    last_input: Option<InputView>,
}

enum Flow {
    Continue,
    Quit,
}

async fn run_session(mut loader: ConfigLoader, args: RunArgs) -> AppResult<()> {
    let device = resolve_device(args.port, &loader)?;
    let mut port_config = loader.config().port_config(device);
    if let Some(baud) = args.baud {
        port_config.baud_rate = baud;
    }
    if let Some(bits) = args.data_bits {
        port_config.data_bits = bits;
    }
    if let Some(bits) = args.stop_bits {
        port_config.stop_bits = bits;
    }
    if let Some(parity) = args.parity {
        port_config.parity = parity;
    }
    if let Some(encoding) = args.encoding {
        port_config.encoding = encoding;
    }
    let interval = validate_interval(args.interval_ms.unwrap_or(loader.config().sampling_interval_ms))?;

    let (mut service, mut notifications) = PumpService::new(interval);
    let opened = service.open(port_config.clone(), Instant::now())?;
    println!(
        "opened {} at {} baud ({}); :help lists commands",
        opened.device, opened.baud_rate, opened.encoding
    );
    remember_port(&mut loader, &port_config, interval);

    let mut session = Session {
        hex_send: loader.config().hex_send,
        add_newline: loader.config().add_newline,
        last_input: None,
    };

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    let mut tick = tokio::time::interval(TICK_PERIOD);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut refresh = tokio::time::interval(PORT_REFRESH_PERIOD);
    let mut watcher = PortWatcher::new();
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            _ = tick.tick() => {
                service.tick(Instant::now());
            }
            Some(notification) = notifications.recv() => {
                if !print_notification(notification) {
                    break;
                }
            }
            _ = refresh.tick() => match watcher.refresh() {
                Ok(changes) if !changes.is_empty() => {
                    for port in &changes.added {
                        info!(port = %port, "serial port appeared");
                    }
                    for port in &changes.removed {
                        info!(port = %port, "serial port disappeared");
                    }
                }
                Ok(_) => {}
                Err(e) => debug!(error = %e, "port enumeration failed"),
            },
            line = stdin.next_line() => match line {
                Ok(Some(line)) => {
                    if let Flow::Quit = handle_input(&line, &mut service, &mut loader, &mut session) {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(error = %e, "stdin closed");
                    break;
                }
            },
        }
    }

    service.close();
    let counters = service.counters();
    println!("TX: {}  RX: {}", counters.bytes_sent, counters.bytes_received);
    save(&loader);
    Ok(())
}

fn remember_port(loader: &mut ConfigLoader, port: &PortConfig, interval: Duration) {
    let config = loader.config_mut();
    config.serial.port = Some(port.device.clone());
    config.serial.baud_rate = port.baud_rate;
    config.serial.data_bits = port.data_bits;
    config.serial.stop_bits = port.stop_bits;
    config.serial.parity = port.parity;
    config.encoding = port.encoding;
    config.sampling_interval_ms = interval.as_millis() as u64;
}

fn save(loader: &ConfigLoader) {
    if let Err(e) = loader.save() {
        warn!(error = %e, "could not save settings");
    }
}

/// Print one notification. Returns `false` once the connection is gone.
fn print_notification(notification: Notification) -> bool {
    match notification {
        Notification::Line(line) => {
            let mut stdout = std::io::stdout().lock();
            let _ = match &line {
                Line::Terminated { .. } => write!(stdout, "{}", line.display_text()),
                Line::Prompt(text) => write!(stdout, "{text} "),
            };
            let _ = stdout.flush();
            true
        }
        Notification::Reading(reading) => {
            println!(
                "[{}] {} {} {:?} = {}",
                chrono::Local::now().format("%H:%M:%S%.3f"),
                reading.family,
                reading.index + 1,
                reading.attribute,
                reading.value
            );
            true
        }
        Notification::ConnectionLost { device, reason } => {
            eprintln!("connection to {device} lost: {reason}");
            false
        }
    }
}

const HELP: &str = "\
:set <PUMP> <value>   apply a setpoint (A for HIPUMP 1/2, mA otherwise)
:interval <ms>        change the polling interval (100-5000)
:hex | :text          send input as hex digits or as text
:telemetry            show the latest readings
:status               show connection status
:quit                 close and exit
anything else is sent to the controller";

fn handle_input(
    line: &str,
    service: &mut PumpService,
    loader: &mut ConfigLoader,
    session: &mut Session,
) -> Flow {
    let now = Instant::now();
    let Some(command) = line.strip_prefix(':') else {
        send_manual(line, service, session, now);
        return Flow::Continue;
    };

    let mut words = command.split_whitespace();
    match words.next().unwrap_or_default() {
        "quit" | "q" => return Flow::Quit,
        "help" | "h" => println!("{HELP}"),
        "set" => {
            let rest: Vec<&str> = words.collect();
            match rest.split_last() {
                Some((value, pump)) if !pump.is_empty() => {
                    apply_setpoint(&pump.join(" "), value, service, loader, now)
                }
                _ => eprintln!("usage: :set <PUMP> <value>"),
            }
        }
        "interval" => match words.next().map(str::parse::<u64>) {
            Some(Ok(ms)) => match service.set_sampling_interval(ms, now) {
                Ok(()) => {
                    loader.config_mut().sampling_interval_ms = ms;
                    save(loader);
                    println!("polling every {ms} ms");
                }
                Err(e) => eprintln!("{e}"),
            },
            _ => eprintln!("usage: :interval <ms>"),
        },
        "hex" => {
            session.hex_send = true;
            loader.config_mut().hex_send = true;
            if let Some(last) = &session.last_input {
                println!("last input as hex: {}", last.as_hex());
            }
        }
        "text" => {
            session.hex_send = false;
            loader.config_mut().hex_send = false;
            if let Some(last) = &session.last_input {
                println!("last input as text: {}", last.as_text());
            }
        }
        "telemetry" => print_telemetry(service),
        "status" => match serde_json::to_string_pretty(&service.status(now)) {
            Ok(json) => println!("{json}"),
            Err(e) => eprintln!("{e}"),
        },
        other => eprintln!("unknown command ':{other}'; try :help"),
    }
    Flow::Continue
}

fn send_manual(line: &str, service: &mut PumpService, session: &mut Session, now: Instant) {
    let payload = if session.hex_send {
        ManualPayload::Hex(line.to_string())
    } else {
        ManualPayload::text(line, session.add_newline)
    };
    if let Err(e) = service.send_manual(&payload, now) {
        eprintln!("{e}");
    }
    session.last_input = Some(InputView::new(line, session.hex_send));
}

fn apply_setpoint(
    pump: &str,
    value: &str,
    service: &mut PumpService,
    loader: &mut ConfigLoader,
    now: Instant,
) {
    let pump: PumpId = match pump.parse() {
        Ok(pump) => pump,
        Err(e) => {
            eprintln!("{e}");
            return;
        }
    };
    match service.send_setpoint(pump, value, now) {
        Ok(result) => {
            println!("{} set to {} A", result.pump, result.amps);
            loader.config_mut().set_setpoint(pump, value.trim());
            save(loader);
        }
        Err(e) => eprintln!("{e}"),
    }
}

fn print_telemetry(service: &PumpService) {
    println!("{:<10} {:>10} {:>10} {:>10}", "pump", "voltage", "current", "temp");
    for (pump, row) in PumpId::ALL.iter().zip(service.telemetry().snapshot()) {
        println!(
            "{:<10} {:>10} {:>10} {:>10}",
            pump.label(),
            row.voltage,
            row.current,
            row.temperature
        );
    }
}

// --- One-shot commands ---

async fn one_shot_setpoint(
    mut loader: ConfigLoader,
    port: Option<String>,
    pump: &str,
    value: &str,
) -> AppResult<()> {
    let pump: PumpId = pump.parse()?;
    let device = resolve_device(port, &loader)?;
    let (mut service, mut notifications) = PumpService::new(loader.config().sampling_interval());
    service.open(loader.config().port_config(device), Instant::now())?;

    let result = service.send_setpoint(pump, value, Instant::now())?;
    println!("{} set to {} A", result.pump, result.amps);

    // Give the controller a moment to echo, so its reply ends up in the log.
    let deadline = tokio::time::Instant::now() + SETPOINT_SETTLE;
    while tokio::time::Instant::now() < deadline {
        service.tick(Instant::now());
        while let Ok(notification) = notifications.try_recv() {
            if let Notification::Line(line) = notification {
                debug!(line = line.text(), "controller reply");
            }
        }
        tokio::time::sleep(TICK_PERIOD).await;
    }
    service.close();

    loader.config_mut().set_setpoint(pump, value.trim());
    save(&loader);
    Ok(())
}

fn edit_config(mut loader: ConfigLoader, action: ConfigAction) -> AppResult<()> {
    match action {
        ConfigAction::Show => {
            if let Some(path) = &loader.config_path {
                println!("# {}", path.display());
            }
            let text = toml::to_string_pretty(loader.config()).map_err(ConfigError::from)?;
            print!("{text}");
        }
        ConfigAction::Reset => {
            loader.reset()?;
            println!("settings reset to defaults");
        }
        ConfigAction::Get { key } => {
            let value = loader
                .config()
                .get(&key)
                .ok_or(ConfigError::UnknownKey(key))?;
            println!("{value}");
        }
        ConfigAction::Set { key, value } => {
            loader.config_mut().set(&key, &value)?;
            loader.save()?;
        }
    }
    Ok(())
}

// --- Graceful Shutdown Handler ---
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    println!("\nSignal received, closing the connection...");
}

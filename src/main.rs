mod args;
mod platform;

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand, error::ErrorKind};
use std::fs::File;
use std::path::PathBuf;
use std::process;
use std::time::Duration;

use clap_verbosity_flag::{InfoLevel, Verbosity};
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use sartool_lib::constants::*;
use sartool_lib::emulator::{EmulatedModem, EmulatedWlan};
use sartool_lib::error::SarError;
use sartool_lib::modem::ModemSarManager;
use sartool_lib::notification::{MonitorLimits, Notification};
use sartool_lib::provisioning::{Variable, VariableFailure};
use sartool_lib::store::{DirectoryStore, EfiVarStore, VariableStore};
use sartool_lib::transport::DeviceServiceTransport;
use sartool_lib::{LteSar, ProvisioningSet, WifiSar, read_provisioning, write_provisioning};

use args::{Radio, StoreSelector};
use platform::{PlatformModem, PlatformWlan};

/// Provision and control SAR power backoff on Wi-Fi and cellular radios.
#[derive(Parser, Debug)]
#[command(name = "sartool", author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
    /// Talk to the in-process emulated radios instead of the platform APIs.
    #[arg(long, global = true)]
    emulate: bool,
    /// Mount point of efivarfs, used when the store is `uefi`.
    #[arg(long, global = true, default_value = DEFAULT_EFIVARS_ROOT)]
    efivars_root: PathBuf,
    /// Optional path to a file to write logs to, in addition to the console.
    #[arg(short, long, global = true)]
    log_file: Option<PathBuf>,
    #[command(flatten)]
    verbose: Verbosity<InfoLevel>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Read the provisioning variables and print them.
    #[command(alias = "getConfig")]
    Getconfig {
        /// `uefi` or a directory of `<name>.bin` files
        #[arg(value_parser = args::parse_store)]
        store: StoreSelector,
        /// Print the records as JSON instead of the text report.
        #[arg(long)]
        json: bool,
    },
    /// Write the built-in example provisioning.
    #[command(alias = "setConfig")]
    Setconfig {
        /// `uefi` or a directory of `<name>.bin` files
        #[arg(value_parser = args::parse_store)]
        store: StoreSelector,
    },
    /// Query the live SAR configuration of a radio.
    #[command(alias = "getSar")]
    Getsar {
        #[arg(value_enum, ignore_case = true)]
        radio: Radio,
    },
    /// Apply a live SAR configuration.
    ///
    /// wifi {on <mimoMask> | off} [<antenna> <backoff>]...   (antenna and mask in hex)
    /// lte <antenna> <backoff> [<antenna> <backoff>]          (decimal)
    #[command(alias = "setSar")]
    Setsar {
        #[arg(value_enum, ignore_case = true)]
        radio: Radio,
        #[arg(num_args = 0.., allow_hyphen_values = true)]
        values: Vec<String>,
    },
    /// Watch for unsolicited SAR notifications.
    #[command(alias = "unsolMon")]
    Unsolmon {
        #[arg(value_enum, ignore_case = true)]
        radio: Radio,
        /// Stop after this many seconds (Wi-Fi waits for the notification cap by default).
        #[arg(long)]
        duration: Option<u64>,
        #[arg(long, default_value_t = DEFAULT_MAX_NOTIFICATIONS)]
        max_notifications: u32,
        /// Transmission-state hysteresis for the cellular modem, 1-5 seconds.
        #[arg(long, default_value_t = DEFAULT_HYSTERESIS_SECS)]
        hysteresis_secs: u64,
    },
    /// Query the driver's SAR interface version over Wi-Fi.
    Version,
}

fn setup_logging(log_file_path: Option<PathBuf>, verbosity: &Verbosity<InfoLevel>) -> Result<Option<WorkerGuard>> {
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .without_time();

    let (file_layer, guard) = if let Some(ref path) = log_file_path {
        let log_file = File::create(path).with_context(|| format!("Failed to create log file at: {:?}", path))?;
        let (non_blocking_writer, guard) = tracing_appender::non_blocking(log_file);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking_writer)
            .with_ansi(false)
            .with_target(false);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    // INFO by default, DEBUG with -v, TRACE with -vv; RUST_LOG wins
    let filter = EnvFilter::builder()
        .with_default_directive(verbosity.tracing_level_filter().into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    if let Some(path) = log_file_path {
        info!("Logging to file: {:?}", path);
    }

    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let guard = setup_logging(cli.log_file.clone(), &cli.verbose)?;

    let ok = match run(cli).await {
        Ok(ok) => ok,
        Err(e) => {
            if let Some(SarError::InvalidArgument(msg)) = e.downcast_ref::<SarError>() {
                drop(guard);
                Cli::command().error(ErrorKind::ValueValidation, msg).exit();
            }
            error!("{:#}", e);
            false
        }
    };

    if !ok {
        drop(guard);
        process::exit(1);
    }
    Ok(())
}

fn open_store(selector: StoreSelector, efivars_root: PathBuf) -> Box<dyn VariableStore> {
    match selector {
        StoreSelector::Uefi => Box::new(EfiVarStore::new(efivars_root)),
        StoreSelector::Directory(dir) => Box::new(DirectoryStore::new(dir)),
    }
}

fn wlan_backend(emulate: bool) -> Box<dyn DeviceServiceTransport> {
    if emulate {
        info!("Using the emulated WLAN driver");
        Box::new(EmulatedWlan::new())
    } else {
        Box::new(PlatformWlan)
    }
}

fn modem_backend(emulate: bool) -> Box<dyn ModemSarManager> {
    if emulate {
        info!("Using the emulated modem");
        Box::new(EmulatedModem::new())
    } else {
        Box::new(PlatformModem)
    }
}

/// Dispatch one command. `Ok(false)` means it ran but some part did not succeed.
async fn run(cli: Cli) -> Result<bool> {
    match cli.command {
        Command::Getconfig { store, json } => {
            let mut store = open_store(store, cli.efivars_root);
            let (set, outcome) = read_provisioning(&mut store);
            if json {
                println!("{}", serde_json::to_string_pretty(&set).context("Serializing provisioning report")?);
            } else {
                print!("{}", set);
            }
            report_failures("read", &outcome.failures);
            Ok(outcome.is_success())
        }
        Command::Setconfig { store } => {
            let mut store = open_store(store, cli.efivars_root);
            let outcome = write_provisioning(&mut store, &ProvisioningSet::canonical());
            report_failures("write", &outcome.failures);
            Ok(outcome.is_success())
        }
        Command::Getsar { radio: Radio::Wifi } => {
            let state = WifiSar::with_session(wlan_backend(cli.emulate), |device| device.get_sar_state())
                .context("Querying Wi-Fi SAR state")?;
            print!("{}", state);
            Ok(true)
        }
        Command::Getsar { radio: Radio::Lte } => {
            let state = LteSar::new(modem_backend(cli.emulate))
                .get_state()
                .context("Querying LTE SAR state")?;
            print!("{}", state);
            Ok(true)
        }
        Command::Setsar {
            radio: Radio::Wifi,
            values,
        } => {
            let request = args::wifi_request(&values)?;
            let status = WifiSar::with_session(wlan_backend(cli.emulate), |device| device.set_sar_state(&request))
                .context("Applying Wi-Fi SAR state")?;
            println!("SET_SAR_STATE status: {}", status);
            Ok(status.is_success())
        }
        Command::Setsar {
            radio: Radio::Lte,
            values,
        } => {
            let antennas = args::lte_request(&values)?;
            LteSar::new(modem_backend(cli.emulate))
                .set_configuration(&antennas)
                .context("Applying LTE SAR configuration")?;
            Ok(true)
        }
        Command::Unsolmon {
            radio,
            duration,
            max_notifications,
            hysteresis_secs,
        } => {
            // The real Wi-Fi monitor runs until the notification cap
            let default_period = match radio {
                Radio::Wifi if !cli.emulate => Duration::MAX,
                _ => Duration::from_secs(DEFAULT_MONITOR_PERIOD_SECS),
            };
            let limits = MonitorLimits {
                duration: duration.map(Duration::from_secs).unwrap_or(default_period),
                max_events: max_notifications,
                ..MonitorLimits::default()
            };
            match radio {
                Radio::Wifi => monitor_wifi(cli.emulate, &limits).await,
                Radio::Lte => monitor_lte(cli.emulate, Duration::from_secs(hysteresis_secs), &limits).await,
            }
        }
        Command::Version => {
            let version = WifiSar::with_session(wlan_backend(cli.emulate), |device| device.interface_version())
                .context("Querying SAR interface version")?;
            println!("SAR interface version {}", version);
            Ok(version.is_compatible())
        }
    }
}

fn report_failures(operation: &str, failures: &[VariableFailure]) {
    if !failures.is_empty() {
        error!(
            "{} of {} variables failed to {}",
            failures.len(),
            Variable::ALL.len(),
            operation
        );
    }
}

async fn monitor_wifi(emulate: bool, limits: &MonitorLimits) -> Result<bool> {
    let wlan = emulate.then(EmulatedWlan::new);
    let transport: Box<dyn DeviceServiceTransport> = match &wlan {
        Some(emulated) => Box::new(emulated.clone()),
        None => Box::new(PlatformWlan),
    };
    let mut device = WifiSar::open(transport).context("Opening WLAN channel")?;

    // Give the emulated driver something to say
    let feeder = wlan.map(|emulated| {
        emulated.spawn_notifications(
            vec![
                Notification::sar_status_request(0x0001),
                Notification::sar_status_request(0x0000),
            ],
            Duration::from_secs(1),
        )
    });

    let summary = device
        .monitor_notifications(limits, |event| match &event.payload {
            Ok(decoded) => println!("{} : {}", event.received_at.format("%H:%M:%S%.3f"), decoded),
            Err(e) => warn!("Notification #{} could not be decoded: {}", event.sequence, e),
        })
        .await;
    let closed = device.close();

    if let Some(feeder) = feeder {
        if feeder.join().is_err() {
            warn!("Notification feeder thread panicked");
        }
    }
    let summary = summary.context("Monitoring Wi-Fi notifications")?;
    closed.context("Closing WLAN channel")?;
    println!("Called back {} times", summary.received);
    Ok(true)
}

async fn monitor_lte(emulate: bool, hysteresis: Duration, limits: &MonitorLimits) -> Result<bool> {
    let modem = emulate.then(EmulatedModem::new);
    let manager: Box<dyn ModemSarManager> = match &modem {
        Some(emulated) => Box::new(emulated.clone()),
        None => Box::new(PlatformModem),
    };
    let feeder = modem.map(|emulated| emulated.spawn_transmission_states(vec![true, false], Duration::from_secs(1)));

    let summary = LteSar::new(manager)
        .monitor_transmission_state(hysteresis, limits, |event| println!("{}", event))
        .await;

    if let Some(feeder) = feeder {
        if feeder.join().is_err() {
            warn!("Transmission-state feeder thread panicked");
        }
    }
    let summary = summary.context("Monitoring LTE transmission state")?;
    println!("Observed {} transmission-state changes", summary.received);
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_shape() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_case_insensitive_radio_and_alias() {
        let cli = Cli::try_parse_from(["sartool", "unsolMon", "WiFi"]).unwrap();
        assert!(matches!(cli.command, Command::Unsolmon { radio: Radio::Wifi, duration: None, .. }));

        let cli = Cli::try_parse_from(["sartool", "getsar", "LTE", "--emulate"]).unwrap();
        assert!(cli.emulate);
        assert!(matches!(cli.command, Command::Getsar { radio: Radio::Lte }));
    }

    #[test]
    fn test_setsar_collects_values() {
        let cli = Cli::try_parse_from(["sartool", "setsar", "wifi", "on", "0x3", "0x1", "5"]).unwrap();
        match cli.command {
            Command::Setsar { radio, values } => {
                assert_eq!(radio, Radio::Wifi);
                assert_eq!(values, vec!["on", "0x3", "0x1", "5"]);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_getconfig_store_and_json() {
        let cli = Cli::try_parse_from(["sartool", "getconfig", "Uefi", "--json"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Getconfig {
                store: StoreSelector::Uefi,
                json: true
            }
        ));
        assert_eq!(cli.efivars_root, PathBuf::from(DEFAULT_EFIVARS_ROOT));
    }

    #[test]
    fn test_unknown_radio_is_usage_error() {
        let err = Cli::try_parse_from(["sartool", "getsar", "bluetooth"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidValue);
    }

    #[tokio::test]
    async fn test_emulated_round_trip_commands() {
        let cli = Cli::try_parse_from(["sartool", "--emulate", "setsar", "wifi", "on", "0x1", "0x1", "5"]).unwrap();
        assert!(run(cli).await.unwrap());

        let cli = Cli::try_parse_from(["sartool", "--emulate", "setsar", "wifi", "on", "0x1", "0x9", "5"]).unwrap();
        assert!(!run(cli).await.unwrap());

        let cli = Cli::try_parse_from(["sartool", "version"]).unwrap();
        assert!(run(cli).await.is_err());
    }

    #[tokio::test]
    async fn test_setconfig_then_getconfig_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().to_str().unwrap();

        let cli = Cli::try_parse_from(["sartool", "setconfig", path]).unwrap();
        assert!(run(cli).await.unwrap());

        let cli = Cli::try_parse_from(["sartool", "getconfig", path]).unwrap();
        assert!(run(cli).await.unwrap());
    }
}

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

use ble_transport::{Advertisement, MacAddress, MockScanner, Scanner};
use sensor_registry as sreg;

#[derive(Parser, Debug)]
#[command(
    name = "bles",
    version,
    about = "BLE advertisement sensor decoder",
    disable_help_subcommand = true
)]
struct Cli {
    /// Turn on debug logging
    #[arg(long, short = 'd', action = ArgAction::SetTrue, global = true)]
    debug: bool,

    /// Hub configuration file (YAML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Scan, decode and print role service updates as JSON lines
    Run {
        /// Adapters to scan with; all adapters when omitted
        #[arg(long)]
        adapter: Vec<String>,
        /// Directory of YAML device descriptors
        #[arg(long)]
        descriptors: Option<PathBuf>,
        /// Stop after this many scan cycles
        #[arg(long)]
        cycles: Option<u32>,
        /// Enable role services of newly seen devices
        #[arg(long, action = ArgAction::SetTrue)]
        enable_new_devices: bool,
    },
    /// Decode one manufacturer payload and print the per-role values
    Decode {
        /// Manufacturer id, hex (0x089A) or decimal
        #[arg(long)]
        manufacturer: String,
        /// Payload bytes in hex, e.g. 01B708B4 or 01 B7 08 B4
        #[arg(required = true)]
        data: Vec<String>,
        /// Device address
        #[arg(long, default_value = "00:00:00:00:00:00")]
        mac: String,
        /// Advertised name
        #[arg(long)]
        name: Option<String>,
        /// Directory of YAML device descriptors
        #[arg(long)]
        descriptors: Option<PathBuf>,
    },
    /// Validate built-in classes and a descriptor directory
    Validate {
        /// Directory of YAML device descriptors
        descriptors: Option<PathBuf>,
    },
    /// List registered roles
    Roles,
    /// List BLE adapters
    Adapters,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_tracing(cli.debug);

    let mut config = match &cli.config {
        Some(path) => sreg::load_hub_config(path)?,
        None => sreg::HubConfig::default(),
    };

    match cli.command {
        Commands::Run {
            adapter,
            descriptors,
            cycles,
            enable_new_devices,
        } => {
            config.enable_new_devices |= enable_new_devices;
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(run(config, adapter, descriptors, cycles))
        }
        Commands::Decode {
            manufacturer,
            data,
            mac,
            name,
            descriptors,
        } => decode(
            &config,
            &manufacturer,
            &data,
            &mac,
            name.as_deref(),
            descriptors,
        ),
        Commands::Validate { descriptors } => validate(&config, descriptors),
        Commands::Roles => list_roles(),
        Commands::Adapters => {
            for adapter in MockScanner::list()? {
                println!("{}\t{}\t{}", adapter.name, adapter.address, adapter.driver);
            }
            Ok(())
        }
    }
}

fn setup_tracing(debug: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(if debug { "debug" } else { "info" })
    });
    // Best-effort; avoid panics if already set
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

fn build_catalog(
    config: &sreg::HubConfig,
    roles: &sreg::RoleRegistry,
    descriptors: Option<PathBuf>,
) -> Result<sreg::DeviceCatalog> {
    let mut catalog = sreg::builtin_catalog()?;
    let dir = descriptors.or_else(|| config.descriptors_dir.as_ref().map(PathBuf::from));
    if let Some(dir) = dir {
        for device in sreg::load_descriptors_dir(&dir, roles)? {
            catalog.register(Arc::new(device))?;
        }
    }
    info!(manufacturers = ?catalog.manufacturer_ids(), "device classes loaded");
    Ok(catalog)
}

async fn run(
    config: sreg::HubConfig,
    adapters: Vec<String>,
    descriptors: Option<PathBuf>,
    cycles: Option<u32>,
) -> Result<()> {
    let roles = sreg::builtin_roles()?;
    let catalog = build_catalog(&config, &roles, descriptors)?;
    let mut hub = sreg::SensorHub::new(config.clone(), roles, catalog)?;

    let names = if adapters.is_empty() {
        MockScanner::list()?.into_iter().map(|a| a.name).collect()
    } else {
        adapters
    };
    let mut scanners = Vec::with_capacity(names.len());
    for name in &names {
        info!(adapter = %name, "adding adapter");
        scanners.push(MockScanner::open(name)?);
    }
    if scanners.is_empty() {
        anyhow::bail!("no bluetooth adapter available");
    }

    info!("Starting service");
    let mut cycle = 0u32;
    loop {
        let timeout = config.scan_timeout();
        let scan = tokio::task::spawn_blocking(move || {
            let mut found = Vec::new();
            for scanner in scanners.iter_mut() {
                match scanner.scan(timeout) {
                    Ok(adverts) => found.extend(adverts),
                    Err(e) => error!("scan error: {e}"),
                }
            }
            (scanners, found)
        });
        let (returned, adverts) = tokio::select! {
            res = scan => res?,
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted, stopping");
                return Ok(());
            }
        };
        scanners = returned;
        debug!(n = adverts.len(), "scan finished");

        for adv in &adverts {
            publish(&mut hub, adv)?;
        }
        for service in hub.expire_stale(Instant::now()) {
            debug!(%service, "service expired");
        }

        cycle += 1;
        if cycles.is_some_and(|max| cycle >= max) {
            info!(cycles = cycle, "cycle limit reached");
            debug!("{}", hub.metrics().encode_text());
            return Ok(());
        }
        if config.continuous_scan {
            debug!("continuous scan on, restarting scan immediately");
            continue;
        }
        let pause = config.scan_sleep();
        debug!("continuous scan off, pausing for {} seconds", pause.as_secs());
        tokio::select! {
            _ = tokio::time::sleep(pause) => {}
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted, stopping");
                return Ok(());
            }
        }
    }
}

fn publish(hub: &mut sreg::SensorHub, adv: &Advertisement) -> Result<()> {
    match hub.handle_advertisement(adv) {
        Ok(updated) => {
            for snapshot in updated {
                println!("{}", serde_json::to_string(&snapshot)?);
            }
        }
        Err(e) => debug!("{e}"),
    }
    Ok(())
}

fn decode(
    config: &sreg::HubConfig,
    manufacturer: &str,
    data: &[String],
    mac: &str,
    name: Option<&str>,
    descriptors: Option<PathBuf>,
) -> Result<()> {
    let manufacturer_id = parse_manufacturer(manufacturer)?;
    let payload = parse_hex_payload(data)?;
    let mac: MacAddress = mac.parse()?;

    let roles = sreg::builtin_roles()?;
    let catalog = build_catalog(config, &roles, descriptors)?;
    let class = catalog.get(manufacturer_id).cloned().ok_or_else(|| {
        anyhow::anyhow!("no device class for manufacturer 0x{manufacturer_id:04X}")
    })?;

    let identity = sreg::DeviceIdentity::new(mac, name);
    let mut decoder = sreg::DeviceDecoder::new(class, identity, &payload, &roles)?;
    let decoded = decoder.decode(&payload, &roles);
    if decoded.dropped > 0 {
        warn!(dropped = decoded.dropped, "some fields could not be decoded");
    }
    println!("{}", serde_json::to_string_pretty(&decoded.values)?);
    Ok(())
}

fn validate(config: &sreg::HubConfig, descriptors: Option<PathBuf>) -> Result<()> {
    let roles = sreg::builtin_roles()?;
    println!("roles: ok ({})", roles.len());
    let catalog = build_catalog(config, &roles, descriptors)?;
    for id in catalog.manufacturer_ids() {
        println!("0x{id:04X}: ok");
    }
    Ok(())
}

#[derive(Serialize)]
struct RoleInfo<'a> {
    name: &'a str,
    dev_instance: u32,
    settings: Vec<(&'a str, sreg::SettingProps)>,
    alarms: Vec<&'a str>,
}

fn list_roles() -> Result<()> {
    let roles = sreg::builtin_roles()?;
    let infos: Vec<RoleInfo<'_>> = roles
        .iter()
        .map(|r| RoleInfo {
            name: r.name(),
            dev_instance: r.spec.dev_instance,
            settings: r
                .spec
                .settings
                .iter()
                .map(|s| (s.name.as_str(), s.props))
                .collect(),
            alarms: r.spec.alarms.iter().map(|a| a.name.as_str()).collect(),
        })
        .collect();
    println!("{}", serde_json::to_string_pretty(&infos)?);
    Ok(())
}

fn parse_manufacturer(s: &str) -> Result<u16> {
    let t = s.trim();
    let parsed = match t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => t.parse(),
    };
    parsed.map_err(|e| anyhow::anyhow!("invalid manufacturer id '{t}': {e}"))
}

fn parse_hex_payload(items: &[String]) -> Result<Vec<u8>> {
    let hex: String = items
        .iter()
        .map(|s| {
            let t = s.trim();
            t.strip_prefix("0x").unwrap_or(t).to_string()
        })
        .collect::<String>()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    if hex.len() % 2 != 0 {
        anyhow::bail!("odd number of hex digits in payload");
    }
    (0..hex.len())
        .step_by(2)
        .map(|i| {
            let pair = hex.get(i..i + 2).unwrap_or_default();
            u8::from_str_radix(pair, 16).map_err(|e| anyhow::anyhow!("invalid hex byte '{pair}': {e}"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_manufacturer() {
        assert_eq!(parse_manufacturer("0x089A").unwrap(), 0x089A);
        assert_eq!(parse_manufacturer("1177").unwrap(), 0x0499);
        assert!(parse_manufacturer("0xZZ").is_err());
    }

    #[test]
    fn test_parse_hex_payload() {
        let joined = parse_hex_payload(&["01B708B4".to_string()]).unwrap();
        let split = parse_hex_payload(&["01".into(), "0xB7".into(), "08".into(), "B4".into()]).unwrap();
        assert_eq!(joined, vec![0x01, 0xB7, 0x08, 0xB4]);
        assert_eq!(joined, split);
        assert!(parse_hex_payload(&["0B7".to_string()]).is_err());
        assert!(parse_hex_payload(&["GG".to_string()]).is_err());
    }

    #[test]
    fn test_cli_parses() {
        let cli = Cli::try_parse_from(["bles", "--debug", "run", "--cycles", "1"]).unwrap();
        assert!(cli.debug);
        assert!(matches!(
            cli.command,
            Commands::Run { cycles: Some(1), enable_new_devices: false, .. }
        ));
        let cli = Cli::try_parse_from(["bles", "run", "--enable-new-devices"]).unwrap();
        assert!(matches!(cli.command, Commands::Run { enable_new_devices: true, .. }));
    }

    #[test]
    fn test_mock_frames_publish() {
        let roles = sreg::builtin_roles().unwrap();
        let catalog = sreg::builtin_catalog().unwrap();
        let config = sreg::HubConfig {
            enable_new_devices: true,
            ..sreg::HubConfig::default()
        };
        let mut hub = sreg::SensorHub::new(config, roles, catalog).unwrap();
        let mut scanner = MockScanner::open("mock0").unwrap();
        for adv in scanner.scan(std::time::Duration::from_millis(1)).unwrap() {
            publish(&mut hub, &adv).unwrap();
        }
        assert!(hub.device("7cd9f4112a05").is_some());
        assert!(hub.snapshot().iter().all(|s| s.enabled && s.connected));
        // Ruuvi has no built-in class and the unknown vendor is ignored.
        assert!(hub.is_ignored("cbb8334c884f"));
        assert!(hub.is_ignored("112233445566"));
    }
}

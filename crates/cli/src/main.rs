use std::fs;
use std::io;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use avdecc::entity::{
    ENTITY_CAP_AEM_SUPPORTED, ENTITY_CAP_CLASS_A_SUPPORTED, ENTITY_CAP_GPTP_SUPPORTED,
    LISTENER_CAP_AUDIO_SINK, LISTENER_CAP_IMPLEMENTED,
};
use avdecc::transport::udp::{DEFAULT_GROUP, DEFAULT_PORT};
use avdecc::{
    EndStation, EntityConfig, EntityId, EntityInfo, MacAddr, StationConfig, Transport, UdpConfig,
    UdpTransport,
};
use clap::Parser;
use tracing::Level;

const ENTITY_MODEL_ID: u64 = 3;
const LISTENER_STREAM_SINKS: u16 = 2;

#[derive(Parser)]
#[command(name = "avdecc-entity", about = "AVDECC listener entity over a UDP tunnel")]
struct Args {
    /// Network interface the entity is bound to
    #[arg(long, short, default_value = "eth0")]
    interface: String,

    /// Descriptor configuration (YAML)
    #[arg(long, short, default_value = "/etc/avdecc/config.yml")]
    config: PathBuf,

    /// Advertised validity in seconds
    #[arg(long, short, default_value_t = 62)]
    valid_time: u32,

    /// Also track other entities on the network
    #[arg(long)]
    discover: bool,

    /// Log at debug level
    #[arg(long, short)]
    debug: bool,

    /// MAC address to use instead of the interface's
    #[arg(long)]
    mac: Option<MacAddr>,

    /// UDP port of the tunnel
    #[arg(long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Multicast group of the tunnel
    #[arg(long, default_value_t = DEFAULT_GROUP)]
    group: Ipv4Addr,
}

fn interface_mac(interface: &str) -> avdecc::Result<MacAddr> {
    let text = fs::read_to_string(format!("/sys/class/net/{interface}/address"))?;
    text.parse()
}

fn load_config(path: &Path) -> EntityConfig {
    if !path.exists() {
        tracing::warn!(path = %path.display(), "configuration not found, using defaults");
        return EntityConfig::default();
    }
    match EntityConfig::load(path) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "configuration ignored");
            EntityConfig::default()
        }
    }
}

fn main() {
    let args = Args::parse();

    let level = if args.debug { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt().with_max_level(level).init();

    let mac = match args.mac {
        Some(mac) => mac,
        None => match interface_mac(&args.interface) {
            Ok(mac) => mac,
            Err(e) => {
                eprintln!("Cannot read MAC address of {}: {}", args.interface, e);
                return;
            }
        },
    };

    let mut info = EntityInfo::from_mac(mac);
    info.valid_time = args.valid_time;
    info.entity_model_id = ENTITY_MODEL_ID;
    info.entity_capabilities =
        ENTITY_CAP_AEM_SUPPORTED | ENTITY_CAP_CLASS_A_SUPPORTED | ENTITY_CAP_GPTP_SUPPORTED;
    info.listener_stream_sinks = LISTENER_STREAM_SINKS;
    info.listener_capabilities = LISTENER_CAP_IMPLEMENTED | LISTENER_CAP_AUDIO_SINK;
    // No gPTP daemon to ask, so the entity is its own grandmaster.
    info.gptp_grandmaster_id = info.entity_id;

    let udp = UdpConfig {
        group: args.group,
        port: args.port,
        ..UdpConfig::default()
    };
    let transport: Arc<dyn Transport> = match UdpTransport::bind(&args.interface, mac, &udp) {
        Ok(transport) => Arc::new(transport),
        Err(e) => {
            eprintln!("Failed to open UDP tunnel on {}:{}: {}", args.group, args.port, e);
            return;
        }
    };

    let entity_id = info.entity_id;
    let config = StationConfig {
        info,
        config: load_config(&args.config),
        discover: args.discover,
    };
    let mut station = EndStation::new(config, vec![transport]);

    if let Err(e) = station.start() {
        eprintln!("Failed to start entity: {}", e);
        return;
    }

    println!("Entity {} on {} ({}), press Enter to stop", EntityId(entity_id), args.interface, mac);
    let mut input = String::new();
    if let Err(e) = io::stdin().read_line(&mut input) {
        tracing::warn!(error = %e, "stdin closed");
    }

    if args.discover {
        for id in station.discovered().ids() {
            tracing::info!(entity_id = %EntityId(id), "known entity");
        }
    }
    station.stop();
}

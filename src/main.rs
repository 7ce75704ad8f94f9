use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use ldap_controls::control::CONTROLS_TAG;
use ldap_controls::{control_name, registry, Class, Config, Control, OutputFormat, Packet};
use serde::Serialize;
use std::fmt::Debug;
use std::path::PathBuf;
use tracing::{debug, info};

#[derive(Parser)]
#[command(name = "ldap-controls")]
#[command(about = "Decode, encode and inspect LDAP v3 controls")]
struct Args {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Output format (overrides config)
    #[arg(short, long, value_enum)]
    format: Option<OutputFormat>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Also decode Persistent Search and Entry Change Notification controls
    #[arg(short, long)]
    extended: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Decode hex-encoded Control envelopes (or a context [0] Controls wrapper)
    Decode {
        #[arg(value_name = "HEX", required = true)]
        hex: Vec<String>,
    },
    /// Encode a control given in JSON form and print the envelope as hex
    Encode {
        #[arg(value_name = "JSON")]
        json: String,
    },
    /// Print the BER tree of hex-encoded bytes
    Dump {
        #[arg(value_name = "HEX")]
        hex: String,
    },
    /// List registered control OIDs
    Oids,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.debug { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(format!("ldap_controls={},warn", log_level))
        .with_writer(std::io::stderr)
        .init();

    let config = match &args.config {
        Some(path) => {
            info!("Loading configuration from {:?}", path);
            Config::from_file(path).with_context(|| format!("Failed to load config {:?}", path))?
        }
        None => Config::default(),
    };
    let format = args.format.unwrap_or(config.output);
    let registry = registry::global();
    if args.extended {
        registry.register_extended();
    }
    config.apply(registry)?;

    match args.command {
        Command::Decode { hex } => {
            for (i, input) in hex.iter().enumerate() {
                let packet = parse_hex(input).with_context(|| format!("Argument #{}", i + 1))?;
                if packet.class == Class::Context && packet.tag == CONTROLS_TAG {
                    let controls = registry
                        .decode_controls(&packet)
                        .with_context(|| format!("Failed to decode controls in argument #{}", i + 1))?;
                    debug!("Decoded {} controls from argument #{}", controls.len(), i + 1);
                    let text: Vec<String> = controls.iter().map(Control::to_string).collect();
                    print(&controls, &text.join("\n"), format)?;
                } else {
                    let control = registry
                        .decode(&packet)
                        .with_context(|| format!("Failed to decode control in argument #{}", i + 1))?;
                    print(&control, &control.to_string(), format)?;
                }
            }
        }
        Command::Encode { json } => {
            let control: Control = serde_json::from_str(&json).context("Invalid control JSON")?;
            let Some(packet) = control.encode() else {
                bail!("Unknown control {} has no encoding", control.oid());
            };
            println!("{}", hex::encode(packet.to_bytes()));
        }
        Command::Dump { hex } => {
            let packet = parse_hex(&hex)?;
            print!("{}", packet.dump());
        }
        Command::Oids => {
            let mut oids = registry.list_oids();
            oids.sort();
            for oid in oids {
                println!("{}\t{}", oid, control_name(&oid).unwrap_or("(custom)"));
            }
        }
    }

    if config.metrics {
        print!("{}", registry.metrics().render());
    }
    Ok(())
}

fn parse_hex(input: &str) -> Result<Packet> {
    let cleaned: String = input.chars().filter(|c| !c.is_whitespace() && *c != ':').collect();
    let bytes = hex::decode(&cleaned).with_context(|| format!("Invalid hex: {}", input))?;
    let packet = Packet::from_bytes(&bytes).context("Invalid BER")?;
    Ok(packet)
}

fn print<T: Serialize + Debug>(value: &T, text: &str, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => println!("{}", text),
        OutputFormat::Debug => println!("{:#?}", value),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(value)?),
    }
    Ok(())
}

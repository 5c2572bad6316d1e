use clap::{Args, Parser, Subcommand};
use comport::config::{Config, ConfigLoader};
use comport::port::{list_ports, Mode, Parity, PortError, StopBits};
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

// Command-line arguments
#[derive(Parser, Debug)]
#[command(
    name = "comport",
    version,
    about = "List, monitor and drive serial ports.",
    long_about = "Opens serial ports with a fixed line policy (XON/XOFF limits, bounded reads with \
                  liveness probing) and exposes listing, monitoring, sending and break signalling."
)]
struct Cli {
    /// Configuration file to use instead of the standard locations.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(flatten)]
    line: LineArgs,

    #[command(subcommand)]
    command: Command,
}

/// Line parameters; anything omitted comes from the `[serial]` config section.
#[derive(Args, Debug, Default)]
struct LineArgs {
    #[arg(long, global = true)]
    baud: Option<u32>,

    #[arg(long, global = true)]
    data_bits: Option<u8>,

    /// none, odd, even, mark or space
    #[arg(long, global = true)]
    parity: Option<Parity>,

    /// 1, 1.5 or 2
    #[arg(long, global = true)]
    stop_bits: Option<StopBits>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the serial ports known to the system.
    List,

    /// Print everything received on a port until interrupted.
    Monitor {
        /// Port name or alias
        port: String,

        /// Print received bytes as hex instead of raw
        #[arg(long)]
        hex: bool,
    },

    /// Write data to a port.
    Send {
        /// Port name or alias
        port: String,

        data: String,

        /// Treat DATA as hex digits, e.g. "0D 0A"
        #[arg(long)]
        hex: bool,
    },

    /// Hold a port's line in the break state.
    Break {
        /// Port name or alias
        port: String,

        /// Break length; defaults to `serial.break_duration_ms`
        #[arg(long)]
        duration_ms: Option<u64>,
    },
}

impl LineArgs {
    fn mode(&self, config: &Config) -> Mode {
        let mut mode = config.serial.default_mode();
        if let Some(baud) = self.baud {
            mode.baud_rate = baud;
        }
        if let Some(data_bits) = self.data_bits {
            mode.data_bits = data_bits;
        }
        if let Some(parity) = self.parity {
            mode.parity = parity;
        }
        if let Some(stop_bits) = self.stop_bits {
            mode.stop_bits = stop_bits;
        }
        mode
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let loader = match &cli.config {
        Some(path) => ConfigLoader::load_from(path)?,
        None => ConfigLoader::load()?,
    };
    if let Err(err) = comport::logging::init(&loader.config().logging) {
        eprintln!("logging disabled: {err}");
    }
    debug!(path = ?loader.config_path, "Configuration loaded");
    let config = loader.into_config();

    match cli.command {
        Command::List => {
            for name in list_ports()? {
                println!("{name}");
            }
        }
        Command::Monitor { port, hex } => {
            monitor(&config, &cli.line, &port, hex)?;
        }
        Command::Send { port, data, hex } => {
            let bytes = if hex {
                decode_hex(&data)?
            } else {
                data.into_bytes()
            };
            let mut serial = open_port(&config, &cli.line, &port)?;
            serial.write_all(&bytes)?;
            info!(port = %serial.name(), bytes = bytes.len(), "Data sent");
            serial.close()?;
        }
        Command::Break { port, duration_ms } => {
            let duration = duration_ms
                .map(Duration::from_millis)
                .unwrap_or_else(|| config.serial.break_duration());
            let mut serial = open_port(&config, &cli.line, &port)?;
            serial.send_break(duration)?;
            info!(port = %serial.name(), ?duration, "Break sent");
            serial.close()?;
        }
    }

    Ok(())
}

fn open_port(
    config: &Config,
    line: &LineArgs,
    port: &str,
) -> Result<comport::SerialPort, PortError> {
    let name = config.serial.resolve_port(port);
    let mode = line.mode(config);
    info!(port = %name, %mode, "Opening port");
    config.serial.open_options(mode).open(&name)
}

fn monitor(
    config: &Config,
    line: &LineArgs,
    port: &str,
    hex: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut serial = open_port(config, line, port)?;
    let stdout = io::stdout();
    let mut buffer = [0u8; 1024];

    loop {
        let n = match serial.read(&mut buffer) {
            Ok(n) => n,
            Err(PortError::ReadTimeout(waited)) => {
                debug!(?waited, "No data");
                continue;
            }
            Err(err) => return Err(err.into()),
        };

        let mut out = stdout.lock();
        if hex {
            writeln!(out, "{}", encode_hex(&buffer[..n]))?;
        } else {
            out.write_all(&buffer[..n])?;
        }
        out.flush()?;
    }
}

fn encode_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}

fn decode_hex(input: &str) -> Result<Vec<u8>, String> {
    let digits: Vec<char> = input
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ':' && *c != ',')
        .collect();
    if digits.len() % 2 != 0 {
        return Err(format!("odd number of hex digits in '{input}'"));
    }

    digits
        .chunks(2)
        .map(|pair| {
            let text: String = pair.iter().collect();
            u8::from_str_radix(&text, 16).map_err(|_| format!("invalid hex byte '{text}'"))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_line_args_override_config() {
        let cli = Cli::parse_from([
            "comport", "send", "COM3", "hi", "--baud", "115200", "--parity", "even",
            "--stop-bits", "2",
        ]);
        let mode = cli.line.mode(&Config::default());
        assert_eq!(
            mode,
            Mode::new(115200).parity(Parity::Even).stop_bits(StopBits::Two)
        );
    }

    #[test]
    fn test_line_args_default_to_config() {
        let mut config = Config::default();
        config.serial.default_baud = 57600;
        config.serial.default_data_bits = 7;

        let mode = LineArgs::default().mode(&config);
        assert_eq!(mode, Mode::new(57600).data_bits(7));
    }

    #[test]
    fn test_hex_round_trip() {
        assert_eq!(decode_hex("0D 0a:ff").unwrap(), vec![0x0D, 0x0A, 0xFF]);
        assert_eq!(encode_hex(&[0x0D, 0x0A, 0xFF]), "0D 0A FF");
        assert!(decode_hex("abc").is_err());
        assert!(decode_hex("zz").is_err());
    }
}

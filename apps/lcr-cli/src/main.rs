use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

use lcr_calibration::{verify, CalibrationResult, Calibrator, Operator};
use servo_bus::codec::{signed_to_unsigned, unsigned_to_signed};
use servo_bus::{MetricsHub, MotorsChain};
use servo_transport::{MockBus, SerialBus, ServoBus};

mod config;
use config::ArmConfig;

#[derive(Parser, Debug)]
#[command(
    name = "lcr",
    version,
    about = "Low Cost Robot arm setup and calibration",
    disable_help_subcommand = true
)]
struct Cli {
    /// Use a simulated servo chain instead of a serial port
    #[arg(long, action = ArgAction::SetTrue, global = true)]
    mock: bool,

    /// Arm description file
    #[arg(long, global = true, default_value = "configs/lcr.yaml")]
    config: PathBuf,

    /// Serial port (overrides the config file)
    #[arg(long, global = true)]
    port: Option<String>,

    /// Baud rate (overrides the config file)
    #[arg(long, global = true)]
    baud: Option<u32>,

    /// Print bus counters in Prometheus text format when done
    #[arg(long, action = ArgAction::SetTrue, global = true)]
    metrics: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Backend {
    Mock,
    Serial,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List serial ports
    Ports {
        #[arg(long, value_enum, default_value_t = Backend::Serial)]
        backend: Backend,
    },
    /// Ping every motor of the arm
    Ping,
    /// Run the two-pose calibration
    Calibrate {
        /// Write the result as JSON
        #[arg(long)]
        out: Option<PathBuf>,
        /// Verification cycles to print afterwards (0 skips, runs until
        /// interrupted otherwise)
        #[arg(long)]
        verify_count: Option<usize>,
    },
    /// Print calibrated positions continuously
    Verify {
        /// Calibration JSON written by `calibrate`
        #[arg(long)]
        calibration: PathBuf,
        /// Stop after N cycles (runs until interrupted otherwise)
        #[arg(long)]
        count: Option<usize>,
        #[arg(long, default_value_t = 1000u64)]
        period_ms: u64,
    },
    /// Read one field of one motor
    Read {
        #[arg(long)]
        id: u8,
        #[arg(long)]
        field: String,
    },
    /// Write one field of one motor
    Write {
        #[arg(long)]
        id: u8,
        #[arg(long)]
        field: String,
        /// Negative values are sent in two's complement
        #[arg(long, allow_negative_numbers = true)]
        value: i64,
    },
}

/// Prompts on stdout and waits for Enter on stdin.
struct StdinOperator;

impl Operator for StdinOperator {
    fn pause(&mut self, prompt: &str) -> io::Result<()> {
        wait_for_enter(&mut io::stdin().lock(), &mut io::stdout(), prompt)
    }
}

/// A closed input is not a confirmation: nobody is there to move the arm.
fn wait_for_enter<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    prompt: &str,
) -> io::Result<()> {
    write!(output, "{prompt}... ")?;
    output.flush()?;
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "input closed before the operator confirmed",
        ));
    }
    Ok(())
}

fn main() -> Result<()> {
    setup_tracing();
    let cli = Cli::parse();

    if let Commands::Ports { backend } = cli.command {
        return list_ports(if cli.mock { Backend::Mock } else { backend });
    }

    let mut cfg = ArmConfig::load(&cli.config)?;
    cfg.override_with(cli.port.clone(), cli.baud);
    let hub = MetricsHub::new().map_err(anyhow::Error::msg)?;

    if cli.mock {
        let bus = MockBus::with_devices(&cfg.port, &cfg.arm.motor_ids);
        let chain = MotorsChain::new(bus, &cfg.port, cfg.arm.motors(), &cfg.control_tables()?)?;
        run(chain.with_metrics(hub.bus.clone()), &cfg, cli.command)?;
    } else {
        let chain: MotorsChain<SerialBus> = MotorsChain::connect(
            &cfg.port,
            cfg.arm.motors(),
            &cfg.control_tables()?,
            cfg.settings(),
        )?;
        run(chain.with_metrics(hub.bus.clone()), &cfg, cli.command)?;
    }

    if cli.metrics {
        print!("{}", hub.encode_text());
    }
    Ok(())
}

fn setup_tracing() {
    // Best-effort; avoid panics if already set
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

fn list_ports(backend: Backend) -> Result<()> {
    let ports = match backend {
        Backend::Mock => MockBus::list()?,
        Backend::Serial => SerialBus::list()?,
    };
    for port in ports {
        println!("{}\t{}", port.name, port.driver);
    }
    Ok(())
}

fn run<B: ServoBus>(mut chain: MotorsChain<B>, cfg: &ArmConfig, command: Commands) -> Result<()> {
    match command {
        Commands::Ports { .. } => Ok(()),
        Commands::Ping => {
            for id in chain.motor_ids() {
                let state = if chain.ping(id)? { "ok" } else { "missing" };
                println!("{id}\t{state}");
            }
            Ok(())
        }
        Commands::Calibrate { out, verify_count } => {
            calibrate(&mut chain, cfg, out, verify_count)
        }
        Commands::Verify {
            calibration,
            count,
            period_ms,
        } => {
            let result = CalibrationResult::load(&calibration)?;
            verify(
                &mut chain,
                &result,
                Duration::from_millis(period_ms),
                count,
                print_positions,
            )?;
            Ok(())
        }
        Commands::Read { id, field } => {
            let value = chain.read(&field, id)?;
            println!("{field}[{id}] = {value} ({})", unsigned_to_signed(value));
            Ok(())
        }
        Commands::Write { id, field, value } => {
            let raw = u32::try_from(value)
                .or_else(|_| i32::try_from(value).map(signed_to_unsigned))
                .with_context(|| format!("value {value} does not fit in 32 bits"))?;
            chain.write(&field, raw, id)?;
            println!("{field}[{id}] <- {raw}");
            Ok(())
        }
    }
}

fn calibrate<B: ServoBus>(
    chain: &mut MotorsChain<B>,
    cfg: &ArmConfig,
    out: Option<PathBuf>,
    verify_count: Option<usize>,
) -> Result<()> {
    let outcome = {
        let mut calibrator = Calibrator::new(chain, cfg.arm.clone(), cfg.calibration.clone())?;
        calibrator.run(&mut StdinOperator)?
    };
    let result = outcome.into_result()?;

    println!("Configuration done!");
    print!("{}", result.to_text());
    if let Some(path) = out {
        result.save(&path)?;
        info!(path = %path.display(), "calibration saved");
    }

    if verify_count != Some(0) {
        println!("Make sure everything is working properly:");
        verify(
            chain,
            &result,
            Duration::from_secs(1),
            verify_count,
            print_positions,
        )?;
    }
    Ok(())
}

fn print_positions(positions: &[Option<i32>]) {
    let cells: Vec<String> = positions
        .iter()
        .map(|p| match p {
            Some(v) => v.to_string(),
            None => "--".to_string(),
        })
        .collect();
    println!("{}", cells.join("\t"));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_enter_confirms() {
        let mut out = Vec::new();
        wait_for_enter(&mut Cursor::new(b"\n".to_vec()), &mut out, "Move the arm").unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "Move the arm... ");
    }

    #[test]
    fn test_closed_input_is_not_a_confirmation() {
        let err = wait_for_enter(&mut Cursor::new(Vec::new()), &mut Vec::new(), "Move the arm")
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_calibrate_verifies_until_interrupted_by_default() {
        let cli = Cli::try_parse_from(["lcr", "calibrate"]).unwrap();
        assert!(matches!(cli.command, Commands::Calibrate { verify_count: None, .. }));
        let cli = Cli::try_parse_from(["lcr", "calibrate", "--verify-count", "0"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Calibrate { verify_count: Some(0), .. }
        ));
    }
}

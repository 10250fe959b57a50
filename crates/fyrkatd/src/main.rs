//! fyrkatd - the BLE keypad peripheral daemon
//!
//! Opens the HCI adapter and a virtual uinput keyboard, registers the keypad
//! service, and serves write batches until terminated. Needs access to the
//! raw HCI channel and /dev/uinput, which in practice means running as root
//! or with the matching capabilities.

use clap::Parser;
use fyrkat::{Peripheral, PeripheralConfig, UinputKeyboard};
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "fyrkatd", version, about = "Bluetooth LE numeric keypad peripheral")]
struct Cli {
    /// HCI adapter index (hciN)
    #[arg(short = 'i', long, default_value_t = 0)]
    adapter: u16,

    /// Device name carried in the scan response
    #[arg(short, long, default_value = "fyrkat")]
    name: String,

    /// Increase log verbosity (-v: debug, -vv: trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    if let Err(e) = run(cli) {
        error!("fatal: {e}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), fyrkat::Error> {
    if !UinputKeyboard::is_available() {
        error!("/dev/uinput not found; load the uinput module first");
    }

    let keyboard = UinputKeyboard::open()?;

    let config = PeripheralConfig {
        device_id: cli.adapter,
        local_name: cli.name,
    };

    info!(adapter = config.device_id, name = %config.local_name, "starting keypad peripheral");

    let mut peripheral = Peripheral::new(config, keyboard)?;
    peripheral.run()
}

fn setup_logging(verbose: u8) {
    let level = match verbose {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    tracing_subscriber::fmt().with_max_level(level).init();
}

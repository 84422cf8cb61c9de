//! `sanctum` assembles the sanctum board and reports its memory map.

use std::path::PathBuf;
use std::process;

use anyhow::Context;
use clap::Parser;
use env_logger::Env;

use sanctum_emu::board::{MachineConfig, Platform};
use sanctum_emu::board::config::{SANCTUM_CLOCK_FREQ, SANCTUM_CPUS_MAX, SANCTUM_PUF_SECRET};

/// Sanctum board command line.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Size of dram in bytes.
    #[arg(long, value_name = "BYTES", value_parser = parse_u64, default_value = "0x80000000")]
    ram_size: u64,
    /// Number of harts.
    #[arg(long, default_value_t = 1, help = "Number of harts (at most 4)")]
    harts: usize,
    /// Processor word size.
    #[arg(long, default_value_t = 64)]
    xlen: u32,
    /// Raw boot rom image to place at the reset vector.
    #[arg(long, value_name = "FILE")]
    firmware: Option<PathBuf>,
    /// Leave out the enclave partitioning devices.
    #[arg(long)]
    no_partitioning: bool,
    /// Puf factory secret.
    #[arg(long, value_name = "HEX", value_parser = parse_u64)]
    secret: Option<u64>,
}

impl Cli {
    fn config(&self) -> MachineConfig {
        let mut config = MachineConfig::default()
            .with_ram_size(self.ram_size)
            .with_harts(self.harts)
            .with_xlen(self.xlen)
            .with_partitioning(!self.no_partitioning)
            .with_puf_secret(self.secret.unwrap_or(SANCTUM_PUF_SECRET));
        if let Some(path) = &self.firmware {
            config = config.with_firmware(path);
        }
        config
    }
}

/// accepts decimal or `0x`-prefixed hex, with optional `_` separators
fn parse_u64(value: &str) -> Result<u64, String> {
    let value = value.replace('_', "");
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16),
        None => value.parse::<u64>(),
    };
    parsed.map_err(|err| format!("invalid number `{}`: {}", value, err))
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = cli.config();
    let platform = Platform::assemble(config)
        .context("failed to assemble the sanctum board")?;

    log::info!(
        "sanctum board: {} of {} hart(s) at {} MHz, {:#x} bytes dram",
        platform.config().harts,
        SANCTUM_CPUS_MAX,
        SANCTUM_CLOCK_FREQ / 1_000_000,
        platform.config().ram_size,
    );
    for region in platform.space().regions() {
        log::info!(
            "{:<28} [{:#012x}, {:#012x}) {} {:?}{}",
            region.name,
            region.range.start.offset(),
            region.range.end.offset(),
            region.access,
            region.kind,
            if region.overlay { " overlay" } else { "" },
        );
    }
    for region in platform.reserved() {
        log::info!(
            "{:<28} [{:#012x}, {:#012x}) reserved",
            region.id,
            region.base.offset(),
            region.end().offset(),
        );
    }

    Ok(())
}

fn main() {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    if let Err(err) = run(Cli::parse()) {
        log::error!("{:#}", err);
        process::exit(1);
    }
}

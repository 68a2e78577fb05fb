//! `fleet devices` command - Tracking devices and their positions

use clap::Subcommand;
use console::style;
use miette::{IntoDiagnostic, Result};

use crate::cli::helpers::{load_config, open_api};
use crate::cli::table::{CellValue, ColumnDef, TableFormatter};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::entities::device::{NewDevice, Position, TrackedDevice};

#[derive(Subcommand, Debug)]
pub enum DevicesCommands {
    /// List tracking devices
    List,

    /// Show the positions reported by a device
    Positions(PositionsArgs),

    /// Find the device reporting a VIN
    Find(FindArgs),

    /// Register a new device (local devices last for this session only)
    ///
    /// Without api_url the device is kept in memory and is gone once the
    /// command exits. Set api_url to register it with the fleet server.
    Create(CreateArgs),
}

#[derive(clap::Args, Debug)]
pub struct PositionsArgs {
    /// Device ID
    pub id: u64,
}

#[derive(clap::Args, Debug)]
pub struct FindArgs {
    /// Vehicle VIN
    pub vin: String,
}

#[derive(clap::Args, Debug)]
pub struct CreateArgs {
    /// Display name, e.g. "Truck 103"
    #[arg(long)]
    pub name: String,

    /// VIN or other unique identifier reported by the unit
    #[arg(long)]
    pub unique_id: String,
}

const DEVICE_COLUMNS: &[ColumnDef] = &[
    ColumnDef::new("ID", 6),
    ColumnDef::new("NAME", 20),
    ColumnDef::new("UNIQUE ID", 20),
    ColumnDef::new("STATUS", 10),
    ColumnDef::new("LAST UPDATE", 18),
    ColumnDef::new("LAT", 10),
    ColumnDef::new("LNG", 11),
];

const POSITION_COLUMNS: &[ColumnDef] = &[
    ColumnDef::new("ID", 6),
    ColumnDef::new("FIX TIME", 18),
    ColumnDef::new("LAT", 10),
    ColumnDef::new("LNG", 11),
    ColumnDef::new("SPEED", 8),
];

pub fn run(cmd: DevicesCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        DevicesCommands::List => run_list(global),
        DevicesCommands::Positions(args) => run_positions(args, global),
        DevicesCommands::Find(args) => run_find(args, global),
        DevicesCommands::Create(args) => run_create(args, global),
    }
}

fn coordinate(value: Option<f64>, precision: usize) -> CellValue {
    value.map_or(CellValue::Empty, |v| CellValue::Float(v, precision))
}

fn device_row(device: &TrackedDevice) -> Vec<CellValue> {
    vec![
        CellValue::Id(device.id.to_string()),
        CellValue::Text(device.name.clone()),
        CellValue::Text(device.unique_id.clone()),
        CellValue::Status(device.status.clone()),
        CellValue::DateTime(device.last_update),
        coordinate(device.latitude, 4),
        coordinate(device.longitude, 4),
    ]
}

fn position_row(position: &Position) -> Vec<CellValue> {
    vec![
        CellValue::Id(position.id.to_string()),
        CellValue::DateTime(position.fix_time),
        CellValue::Float(position.latitude, 4),
        CellValue::Float(position.longitude, 4),
        CellValue::Float(position.speed, 1),
    ]
}

fn print_devices(devices: &[TrackedDevice], format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(devices).into_diagnostic()?);
        }
        OutputFormat::Yaml => {
            print!("{}", serde_yml::to_string(devices).into_diagnostic()?);
        }
        format => {
            let rows: Vec<Vec<CellValue>> = devices.iter().map(device_row).collect();
            TableFormatter::new(DEVICE_COLUMNS, "device").output(&rows, format);
        }
    }
    Ok(())
}

fn run_list(global: &GlobalOpts) -> Result<()> {
    let config = load_config(global);
    let api = open_api(&config)?;
    let devices = api.fetch_devices().into_diagnostic()?;

    if devices.is_empty() && !matches!(global.format, OutputFormat::Json | OutputFormat::Yaml) {
        println!("No devices found.");
        return Ok(());
    }
    print_devices(&devices, global.format)
}

fn run_positions(args: PositionsArgs, global: &GlobalOpts) -> Result<()> {
    let config = load_config(global);
    let api = open_api(&config)?;
    let positions = api.fetch_positions(args.id).into_diagnostic()?;

    match global.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&positions).into_diagnostic()?);
        }
        OutputFormat::Yaml => {
            print!("{}", serde_yml::to_string(&positions).into_diagnostic()?);
        }
        format => {
            if positions.is_empty() {
                println!("No positions reported by device {}.", args.id);
                return Ok(());
            }
            let rows: Vec<Vec<CellValue>> = positions.iter().map(position_row).collect();
            TableFormatter::new(POSITION_COLUMNS, "position").output(&rows, format);
        }
    }

    Ok(())
}

fn run_find(args: FindArgs, global: &GlobalOpts) -> Result<()> {
    let config = load_config(global);
    let api = open_api(&config)?;

    let device = api
        .find_device_by_vin(&args.vin)
        .into_diagnostic()?
        .ok_or_else(|| miette::miette!("No device found for VIN {}", args.vin))?;

    print_devices(std::slice::from_ref(&device), global.format)
}

fn run_create(args: CreateArgs, global: &GlobalOpts) -> Result<()> {
    let request = NewDevice::new(args.name.trim(), args.unique_id.trim());
    request.validate().into_diagnostic()?;

    let config = load_config(global);
    let mut api = open_api(&config)?;
    let device = api.create_device(&request).into_diagnostic()?;

    match global.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&device).into_diagnostic()?);
        }
        OutputFormat::Yaml => {
            print!("{}", serde_yml::to_string(&device).into_diagnostic()?);
        }
        _ => {
            println!(
                "{} Created device {} ({}) with ID {}",
                style("✓").green(),
                style(&device.name).cyan(),
                device.unique_id,
                style(device.id).cyan()
            );
            if config.api_url().is_none() {
                println!(
                    "  {}",
                    style("Local devices are kept for this session only").dim()
                );
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_device_row_without_fix() {
        let device = TrackedDevice {
            id: 7,
            name: "Truck 107".to_string(),
            unique_id: "VIN107".to_string(),
            status: "offline".to_string(),
            last_update: Utc::now(),
            latitude: None,
            longitude: None,
        };
        let row = device_row(&device);
        assert_eq!(row[0].raw(), "7");
        assert!(matches!(row[5], CellValue::Empty));
        assert!(matches!(row[6], CellValue::Empty));
    }

    #[test]
    fn test_position_row_precision() {
        let now = Utc::now();
        let position = Position {
            id: 1,
            device_id: 1,
            latitude: 37.774912,
            longitude: -122.419416,
            speed: 42.0,
            device_time: now,
            fix_time: now,
        };
        let row = position_row(&position);
        assert_eq!(row[2].raw(), "37.7749");
        assert_eq!(row[3].raw(), "-122.4194");
        assert_eq!(row[4].raw(), "42.0");
    }
}

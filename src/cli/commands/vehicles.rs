//! `fleet vehicles` command - Browse the vehicle inventory

use clap::Subcommand;
use console::style;
use dialoguer::{theme::ColorfulTheme, Confirm};
use miette::{IntoDiagnostic, Result};
use serde::Serialize;

use crate::cli::helpers::{auth_provider, load_config, open_api};
use crate::cli::table::{CellValue, ColumnDef, TableFormatter};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::identity::VehicleId;
use crate::core::store::open_store;
use crate::entities::device::TrackedDevice;
use crate::entities::vehicle::{
    locations, FleetMetrics, VehicleFilter, VehicleRecord, VehicleStatus, VehicleUpdate,
};

#[derive(Subcommand, Debug)]
pub enum VehiclesCommands {
    /// List vehicles with optional filtering
    List(ListArgs),

    /// Show a vehicle's details
    Show(ShowArgs),

    /// Change a vehicle's status
    SetStatus(SetStatusArgs),

    /// Move a vehicle to another location
    SetLocation(SetLocationArgs),

    /// Vehicle counts by status and location
    Stats,

    /// Remove every vehicle from the local store
    Clear(ClearArgs),
}

#[derive(clap::Args, Debug)]
pub struct ListArgs {
    /// Case-insensitive search in VIN, make, and model
    #[arg(long, short = 's')]
    pub search: Option<String>,

    /// Filter by status
    #[arg(long)]
    pub status: Option<VehicleStatus>,

    /// Filter by location (exact match)
    #[arg(long, short = 'l')]
    pub location: Option<String>,

    /// Only vehicles created by an import
    #[arg(long)]
    pub imported: bool,

    /// Limit number of results
    #[arg(long, short = 'n')]
    pub limit: Option<usize>,
}

#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    /// Vehicle ID
    pub id: String,
}

#[derive(clap::Args, Debug)]
pub struct SetStatusArgs {
    /// Vehicle ID
    pub id: String,

    /// New status
    pub status: VehicleStatus,
}

#[derive(clap::Args, Debug)]
pub struct SetLocationArgs {
    /// Vehicle ID
    pub id: String,

    /// New location, e.g. "Overflow Lot"
    pub location: String,
}

#[derive(clap::Args, Debug)]
pub struct ClearArgs {
    /// Skip the confirmation prompt
    #[arg(long, short = 'y')]
    pub yes: bool,
}

const LIST_COLUMNS: &[ColumnDef] = &[
    ColumnDef::new("ID", 32),
    ColumnDef::new("VIN", 20),
    ColumnDef::new("VEHICLE", 30),
    ColumnDef::new("STATUS", 12),
    ColumnDef::new("LOCATION", 20),
    ColumnDef::new("MOVED BY", 18),
    ColumnDef::new("MOVED", 18),
];

pub fn run(cmd: VehiclesCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        VehiclesCommands::List(args) => run_list(args, global),
        VehiclesCommands::Show(args) => run_show(args, global),
        VehiclesCommands::SetStatus(args) => {
            run_update(&args.id, VehicleUpdate::status(args.status), global)
        }
        VehiclesCommands::SetLocation(args) => {
            let location = args.location.trim();
            if location.is_empty() {
                return Err(miette::miette!("Location cannot be empty"));
            }
            run_update(&args.id, VehicleUpdate::location(location), global)
        }
        VehiclesCommands::Stats => run_stats(global),
        VehiclesCommands::Clear(args) => run_clear(args, global),
    }
}

fn run_list(args: ListArgs, global: &GlobalOpts) -> Result<()> {
    let config = load_config(global);
    let api = open_api(&config)?;
    let vehicles = api.fetch_vehicles().into_diagnostic()?;

    let filter = VehicleFilter {
        search: args.search,
        status: args.status,
        location: args.location,
    };
    let mut matched = filter.apply(&vehicles);
    if args.imported {
        matched.retain(|v| VehicleId::is_import_id(&v.id));
    }
    if let Some(limit) = args.limit {
        matched.truncate(limit);
    }

    match global.format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&matched).into_diagnostic()?;
            println!("{}", json);
        }
        OutputFormat::Yaml => {
            let yaml = serde_yml::to_string(&matched).into_diagnostic()?;
            print!("{}", yaml);
        }
        format => {
            if matched.is_empty() {
                println!("No vehicles found.");
                return Ok(());
            }
            let rows: Vec<Vec<CellValue>> = matched.iter().map(|v| list_row(v)).collect();
            TableFormatter::new(LIST_COLUMNS, "vehicle").output(&rows, format);
        }
    }

    Ok(())
}

fn list_row(vehicle: &VehicleRecord) -> Vec<CellValue> {
    let text = |s: &str| {
        if s.is_empty() {
            CellValue::Empty
        } else {
            CellValue::Text(s.to_string())
        }
    };
    vec![
        CellValue::Id(vehicle.id.clone()),
        text(&vehicle.vin),
        text(&vehicle.title()),
        CellValue::Status(vehicle.status.clone()),
        text(&vehicle.location),
        text(&vehicle.last_movement.by),
        CellValue::DateTime(vehicle.last_movement.date),
    ]
}

/// A vehicle together with the tracking unit reporting its VIN
#[derive(Serialize)]
struct VehicleDetails<'a> {
    #[serde(flatten)]
    vehicle: &'a VehicleRecord,
    #[serde(rename = "trackingDevice", skip_serializing_if = "Option::is_none")]
    tracking_device: Option<TrackedDevice>,
}

fn run_show(args: ShowArgs, global: &GlobalOpts) -> Result<()> {
    let config = load_config(global);
    let api = open_api(&config)?;

    let vehicle = api
        .fetch_vehicle(&args.id)
        .into_diagnostic()?
        .ok_or_else(|| miette::miette!("Vehicle not found: {}", args.id))?;

    let tracking_device = match api.find_device_by_vin(&vehicle.vin) {
        Ok(device) => device,
        Err(e) => {
            tracing::debug!(vin = %vehicle.vin, error = %e, "device lookup failed");
            None
        }
    };

    let details = VehicleDetails {
        vehicle: &vehicle,
        tracking_device,
    };

    match global.format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&details).into_diagnostic()?;
            println!("{}", json);
        }
        _ => {
            let yaml = serde_yml::to_string(&details).into_diagnostic()?;
            print!("{}", yaml);
        }
    }

    Ok(())
}

fn run_update(id: &str, update: VehicleUpdate, global: &GlobalOpts) -> Result<()> {
    let config = load_config(global);
    let user = auth_provider(&config).current_user().into_diagnostic()?;
    let mut api = open_api(&config)?;

    let vehicle = api
        .update_vehicle(id, &update, &user.name)
        .into_diagnostic()?
        .ok_or_else(|| miette::miette!("Vehicle not found: {}", id))?;

    match global.format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&vehicle).into_diagnostic()?);
        }
        OutputFormat::Yaml => {
            print!("{}", serde_yml::to_string(&vehicle).into_diagnostic()?);
        }
        _ => {
            println!(
                "{} {} is now {} at {} (by {})",
                style("✓").green(),
                style(&vehicle.vin).cyan(),
                vehicle.status,
                vehicle.location,
                vehicle.last_movement.by
            );
        }
    }

    Ok(())
}

#[derive(Serialize)]
struct LocationCount<'a> {
    location: &'a str,
    count: usize,
}

fn location_counts(vehicles: &[VehicleRecord]) -> Vec<LocationCount<'_>> {
    locations(vehicles)
        .into_iter()
        .map(|location| LocationCount {
            location,
            count: vehicles.iter().filter(|v| v.location == location).count(),
        })
        .collect()
}

fn run_stats(global: &GlobalOpts) -> Result<()> {
    let config = load_config(global);
    let api = open_api(&config)?;
    let vehicles = api.fetch_vehicles().into_diagnostic()?;

    let metrics = FleetMetrics::from_vehicles(&vehicles);
    let by_location = location_counts(&vehicles);
    let imported = vehicles
        .iter()
        .filter(|v| VehicleId::is_import_id(&v.id))
        .count();

    if global.format == OutputFormat::Json {
        let json = serde_json::json!({
            "metrics": metrics,
            "imported": imported,
            "locations": by_location,
        });
        println!("{}", serde_json::to_string_pretty(&json).into_diagnostic()?);
        return Ok(());
    }

    println!("{}", style("Fleet Overview").bold());
    println!("{}", style("─".repeat(40)).dim());
    println!("  Total vehicles: {}", style(metrics.total).cyan());
    println!("  Available:      {}", style(metrics.available).green());
    println!("  Leased:         {}", style(metrics.leased).cyan());
    println!("  Service:        {}", style(metrics.service).yellow());
    println!("  Sold:           {}", style(metrics.sold).dim());
    let other = metrics.total - metrics.available - metrics.leased - metrics.service - metrics.sold;
    if other > 0 {
        println!("  Other status:   {}", style(other).white());
    }
    println!("  Imported:       {}", imported);

    if !by_location.is_empty() {
        println!();
        println!("{}", style("Locations").bold());
        println!("{}", style("─".repeat(40)).dim());
        for entry in &by_location {
            println!("  {:<24} {}", entry.location, style(entry.count).cyan());
        }
    }

    Ok(())
}

fn run_clear(args: ClearArgs, global: &GlobalOpts) -> Result<()> {
    let config = load_config(global);
    if let Some(url) = config.api_url() {
        return Err(miette::miette!(
            "Clearing is only available for the local store (api_url is set to {})",
            url
        ));
    }

    let mut store = open_store(config.store(), &config.data_dir()).into_diagnostic()?;
    let count = store.list().into_diagnostic()?.len();
    if count == 0 {
        println!("{} is already empty", store.describe());
        return Ok(());
    }

    if !args.yes {
        let proceed = Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(format!("Remove {} vehicle(s) from {}?", count, store.describe()))
            .default(false)
            .interact()
            .into_diagnostic()?;
        if !proceed {
            println!("{} Nothing removed", style("✗").yellow());
            return Ok(());
        }
    }

    store.clear().into_diagnostic()?;
    tracing::info!(count, store = %store.describe(), "store cleared");
    println!(
        "{} Removed {} vehicle(s) from {}",
        style("✓").green(),
        style(count).cyan(),
        store.describe()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vehicle(id: &str, location: &str) -> VehicleRecord {
        VehicleRecord {
            id: id.to_string(),
            vin: format!("VIN-{}", id),
            location: location.to_string(),
            status: "available".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_location_counts_keep_first_seen_order() {
        let vehicles = vec![
            vehicle("1", "North Yard"),
            vehicle("2", "Main Lot"),
            vehicle("3", "North Yard"),
            vehicle("4", ""),
        ];
        let counts = location_counts(&vehicles);
        assert_eq!(counts.len(), 2);
        assert_eq!(counts[0].location, "North Yard");
        assert_eq!(counts[0].count, 2);
        assert_eq!(counts[1].location, "Main Lot");
        assert_eq!(counts[1].count, 1);
    }

    #[test]
    fn test_details_nest_device_under_vehicle() {
        let v = vehicle("1", "Main Lot");
        let details = VehicleDetails {
            vehicle: &v,
            tracking_device: None,
        };
        let json = serde_json::to_value(&details).unwrap();
        assert_eq!(json["vin"], "VIN-1");
        assert!(json.get("trackingDevice").is_none());
    }

    #[test]
    fn test_list_row_marks_missing_values() {
        let row = list_row(&vehicle("1", ""));
        assert!(matches!(row[4], CellValue::Empty));
        assert!(matches!(row[0], CellValue::Id(ref id) if id == "1"));
    }
}

//! `fleet config` command - Configuration management
//!
//! Provides commands to view and modify the user configuration file.

use clap::Subcommand;
use console::style;
use miette::{IntoDiagnostic, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::cli::helpers::load_config;
use crate::cli::{GlobalOpts, OutputFormat};
use crate::core::Config;

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Show current configuration values
    Show(ShowArgs),

    /// Set a configuration value in the config file
    Set(SetArgs),

    /// Unset (remove) a configuration value from the config file
    Unset(UnsetArgs),

    /// Show the path of the config file
    Path,

    /// List all available configuration keys
    Keys,
}

#[derive(clap::Args, Debug)]
pub struct ShowArgs {
    /// Show only this key's value
    pub key: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct SetArgs {
    /// Configuration key (e.g., operator, store)
    pub key: String,

    /// Value to set
    pub value: String,
}

#[derive(clap::Args, Debug)]
pub struct UnsetArgs {
    /// Configuration key to remove
    pub key: String,
}

/// Valid configuration keys
const VALID_KEYS: &[(&str, &str)] = &[
    ("operator", "Name the session acts as"),
    ("import_actor", "Recorded as lastMovement.by on imported vehicles"),
    ("store", "Local storage backend (json, sqlite, memory)"),
    ("data_dir", "Directory holding the vehicle store"),
    ("api_url", "Fleet server base URL; enables the HTTP backend"),
    ("api_token", "Bearer token for the fleet server"),
    ("page_size", "Rows per page in the import preview"),
    ("demo_data", "Serve sample vehicles and devices locally (true/false)"),
    ("default_location", "Location for imported vehicles without one"),
    ("default_lat", "Latitude for imported vehicles without one"),
    ("default_lng", "Longitude for imported vehicles without one"),
];

/// Run a config subcommand
pub fn run(cmd: ConfigCommands, global: &GlobalOpts) -> Result<()> {
    match cmd {
        ConfigCommands::Show(args) => run_show(args, global),
        ConfigCommands::Set(args) => run_set(args),
        ConfigCommands::Unset(args) => run_unset(args),
        ConfigCommands::Path => run_path(),
        ConfigCommands::Keys => run_keys(),
    }
}

fn run_show(args: ShowArgs, global: &GlobalOpts) -> Result<()> {
    let config = load_config(global);

    // If a specific key is requested, show just that value
    if let Some(key) = &args.key {
        check_key(key)?;
        return match get_config_value(&config, key) {
            Some(v) => {
                println!("{}", v);
                Ok(())
            }
            None => Err(miette::miette!("Key '{}' is not set", key)),
        };
    }

    match global.format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&effective(&config)).into_diagnostic()?;
            println!("{}", json);
        }
        OutputFormat::Yaml => {
            let yaml = serde_yml::to_string(&effective(&config)).into_diagnostic()?;
            print!("{}", yaml);
        }
        _ => {
            println!("{}", style("Effective Configuration").bold().underlined());
            println!();

            for (key, _) in VALID_KEYS {
                print_config_value(key, get_config_value(&config, key).as_deref());
            }

            println!();
            println!("{}", style("Config Sources (in priority order):").dim());
            println!("  1. Command line (--data-dir)");
            println!(
                "  2. Environment variables (FLEET_OPERATOR, FLEET_STORE, FLEET_DATA_DIR, \
                 FLEET_API_URL, FLEET_API_TOKEN, FLEET_DEMO_DATA)"
            );
            println!("  3. Config file (~/.config/fleet/config.yaml or FLEET_CONFIG)");
        }
    }

    Ok(())
}

/// Config with every default resolved, token masked
fn effective(config: &Config) -> Config {
    let defaults = config.import_defaults();
    Config {
        operator: Some(config.operator()),
        import_actor: Some(config.import_actor()),
        store: Some(config.store()),
        data_dir: Some(config.data_dir()),
        api_url: config.api_url().map(String::from),
        api_token: config.api_token.as_ref().map(|_| "********".to_string()),
        page_size: Some(config.page_size()),
        demo_data: Some(config.demo_data()),
        default_location: Some(defaults.location),
        default_lat: Some(defaults.lat),
        default_lng: Some(defaults.lng),
    }
}

fn run_set(args: SetArgs) -> Result<()> {
    check_key(&args.key)?;
    let config_path = get_config_path()?;

    let mut config_map = read_config_map(&config_path)?;
    if let serde_yml::Value::Mapping(map) = &mut config_map {
        map.insert(
            serde_yml::Value::String(args.key.clone()),
            typed_value(&args.value),
        );
    }

    // Refuse values that would make the file unreadable
    let yaml = serde_yml::to_string(&config_map).into_diagnostic()?;
    serde_yml::from_str::<Config>(&yaml)
        .map_err(|e| miette::miette!("Invalid value for '{}': {}", args.key, e))?;

    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent).into_diagnostic()?;
    }
    fs::write(&config_path, yaml).into_diagnostic()?;

    println!(
        "{} Set {} {} {}",
        style("✓").green(),
        style(&args.key).cyan(),
        style("→").dim(),
        style(&args.value).yellow(),
    );

    Ok(())
}

fn run_unset(args: UnsetArgs) -> Result<()> {
    let config_path = get_config_path()?;

    if !config_path.exists() {
        return Err(miette::miette!(
            "Config file does not exist: {}",
            config_path.display()
        ));
    }

    let mut config_map = read_config_map(&config_path)?;
    let removed = match &mut config_map {
        serde_yml::Value::Mapping(map) => map
            .remove(&serde_yml::Value::String(args.key.clone()))
            .is_some(),
        _ => false,
    };

    if !removed {
        return Err(miette::miette!("Key '{}' not found in config", args.key));
    }

    let yaml = serde_yml::to_string(&config_map).into_diagnostic()?;
    fs::write(&config_path, yaml).into_diagnostic()?;

    println!(
        "{} Removed {} from config",
        style("✓").green(),
        style(&args.key).cyan(),
    );

    Ok(())
}

fn run_path() -> Result<()> {
    let path = get_config_path()?;
    println!("{}", path.display());
    if path.exists() {
        eprintln!("{}", style("(exists)").green());
    } else {
        eprintln!("{}", style("(not created)").dim());
    }
    Ok(())
}

fn run_keys() -> Result<()> {
    println!("{}", style("Available configuration keys:").bold());
    println!();

    for (key, description) in VALID_KEYS {
        println!("  {:<20} {}", style(key).cyan(), style(description).dim());
    }

    println!();
    println!(
        "{}",
        style("Use 'fleet config set <key> <value>' to set a value.").dim()
    );

    Ok(())
}

// Helper functions

fn get_config_path() -> Result<PathBuf> {
    Config::config_path().ok_or_else(|| miette::miette!("Could not determine config directory"))
}

fn check_key(key: &str) -> Result<()> {
    if VALID_KEYS.iter().any(|(k, _)| *k == key) {
        Ok(())
    } else {
        Err(miette::miette!(
            "Unknown config key '{}'. Run 'fleet config keys' to list valid keys.",
            key
        ))
    }
}

fn read_config_map(path: &Path) -> Result<serde_yml::Value> {
    if !path.exists() {
        return Ok(serde_yml::Value::Mapping(Default::default()));
    }
    let content = fs::read_to_string(path).into_diagnostic()?;
    let parsed: serde_yml::Value = serde_yml::from_str(&content).map_err(|e| {
        miette::miette!(
            "Config file {} is not valid YAML: {}. Fix or remove it first.",
            path.display(),
            e
        )
    })?;
    match parsed {
        // An empty file parses as null
        serde_yml::Value::Null => Ok(serde_yml::Value::Mapping(Default::default())),
        serde_yml::Value::Mapping(_) => Ok(parsed),
        _ => Err(miette::miette!(
            "Config file {} must contain a mapping of keys to values",
            path.display()
        )),
    }
}

/// Interpret a command-line value as a YAML scalar so numbers and
/// booleans keep their type
fn typed_value(value: &str) -> serde_yml::Value {
    match serde_yml::from_str::<serde_yml::Value>(value) {
        Ok(v @ (serde_yml::Value::Bool(_) | serde_yml::Value::Number(_))) => v,
        _ => serde_yml::Value::String(value.to_string()),
    }
}

fn get_config_value(config: &Config, key: &str) -> Option<String> {
    match key {
        "operator" => config.operator.clone(),
        "import_actor" => config.import_actor.clone(),
        "store" => config.store.map(|s| s.as_str().to_string()),
        "data_dir" => config.data_dir.as_ref().map(|p| p.display().to_string()),
        "api_url" => config.api_url.clone(),
        "api_token" => config.api_token.as_ref().map(|_| "********".to_string()),
        "page_size" => config.page_size.map(|n| n.to_string()),
        "demo_data" => config.demo_data.map(|b| b.to_string()),
        "default_location" => config.default_location.clone(),
        "default_lat" => config.default_lat.map(|n| n.to_string()),
        "default_lng" => config.default_lng.map(|n| n.to_string()),
        _ => None,
    }
}

fn print_config_value(key: &str, value: Option<&str>) {
    if let Some(v) = value {
        println!("  {}: {}", style(key).cyan(), style(v).yellow());
    } else {
        println!("  {}: {}", style(key).cyan(), style("(not set)").dim());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_value() {
        assert_eq!(typed_value("25"), serde_yml::Value::Number(25.into()));
        assert_eq!(typed_value("true"), serde_yml::Value::Bool(true));
        assert_eq!(
            typed_value("North Yard"),
            serde_yml::Value::String("North Yard".to_string())
        );
    }

    #[test]
    fn test_read_config_map_rejects_malformed_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.yaml");

        fs::write(&path, "operator: Dana\nstore: [broken\n").unwrap();
        let err = read_config_map(&path).unwrap_err();
        assert!(err.to_string().contains("not valid YAML"));

        fs::write(&path, "- operator\n").unwrap();
        assert!(read_config_map(&path).is_err());

        fs::write(&path, "").unwrap();
        assert!(read_config_map(&path).unwrap().as_mapping().unwrap().is_empty());

        fs::write(&path, "operator: Dana\n").unwrap();
        let map = read_config_map(&path).unwrap();
        assert_eq!(map.get("operator").and_then(|v| v.as_str()), Some("Dana"));
    }

    #[test]
    fn test_check_key() {
        assert!(check_key("store").is_ok());
        assert!(check_key("author").is_err());
    }

    #[test]
    fn test_token_is_masked() {
        let config = Config {
            api_token: Some("secret".to_string()),
            ..Default::default()
        };
        assert_eq!(get_config_value(&config, "api_token").as_deref(), Some("********"));
        assert_eq!(effective(&config).api_token.as_deref(), Some("********"));
    }
}

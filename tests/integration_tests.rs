//! Integration tests for the fleet CLI
//!
//! These tests exercise the CLI commands end-to-end using assert_cmd. Each
//! test gets its own data directory and config file.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

const THREE_ROWS: &str = "VIN,Make,Model,Year,Status,Location
1HGCM82633A123456,Honda,Accord,2022,available,Main Lot
5XYKT3A17CG222222,,Sorento,2020,leased,Main Lot
WBAPM7339AE111111,BMW,X5,2021,service,North Yard
";

/// Isolated environment: empty store, no config file, no sample data
struct TestEnv {
    tmp: TempDir,
}

impl TestEnv {
    fn new() -> Self {
        Self {
            tmp: TempDir::new().unwrap(),
        }
    }

    fn config_path(&self) -> PathBuf {
        self.tmp.path().join("config").join("config.yaml")
    }

    fn fleet(&self) -> Command {
        let mut cmd = Command::cargo_bin("fleet").unwrap();
        cmd.current_dir(self.tmp.path())
            .env("FLEET_DATA_DIR", self.tmp.path().join("data"))
            .env("FLEET_CONFIG", self.config_path())
            .env("FLEET_DEMO_DATA", "false")
            .env("FLEET_OPERATOR", "Test Operator")
            .env_remove("FLEET_API_URL")
            .env_remove("FLEET_API_TOKEN")
            .env_remove("FLEET_STORE")
            .env_remove("FLEET_LOG");
        cmd
    }

    fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.tmp.path().join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    fn list_vehicles(&self) -> Vec<serde_json::Value> {
        let output = self
            .fleet()
            .args(["vehicles", "list", "--format", "json"])
            .output()
            .unwrap();
        assert!(output.status.success());
        serde_json::from_slice(&output.stdout).unwrap()
    }
}

// ============================================================================
// CLI Basic Tests
// ============================================================================

#[test]
fn test_help_displays() {
    TestEnv::new()
        .fleet()
        .arg("-h")
        .assert()
        .success()
        .stdout(predicate::str::contains("Fleet vehicle onboarding"))
        .stdout(predicate::str::contains("import"))
        .stdout(predicate::str::contains("vehicles"));
}

#[test]
fn test_long_help_displays() {
    TestEnv::new()
        .fleet()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Import vehicle inventories"));
}

#[test]
fn test_version_displays() {
    TestEnv::new()
        .fleet()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("fleet"));
}

#[test]
fn test_completions_bash() {
    TestEnv::new()
        .fleet()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("fleet"));
}

// ============================================================================
// Import Tests
// ============================================================================

#[test]
fn test_import_template() {
    TestEnv::new()
        .fleet()
        .args(["import", "--template"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with(
            "vin,make,model,year,color,status,location,location_lat,location_lng,mileage,price",
        ))
        .stderr(predicate::str::contains("Template generated"));
}

#[test]
fn test_import_template_round_trips() {
    let env = TestEnv::new();
    let output = env.fleet().args(["import", "--template"]).output().unwrap();
    let template = String::from_utf8(output.stdout).unwrap();
    let file = env.write("template.csv", &template);

    env.fleet()
        .args(["import", "--format", "json"])
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"imported\": 1"));
}

#[test]
fn test_import_skips_rows_with_errors() {
    let env = TestEnv::new();
    let file = env.write("vehicles.csv", THREE_ROWS);

    env.fleet()
        .args(["import", "--format", "json"])
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"imported\": 2"))
        .stdout(predicate::str::contains("\"failed\": 0"))
        .stdout(predicate::str::contains("Import Completed Successfully"));

    let vehicles = env.list_vehicles();
    assert_eq!(vehicles.len(), 2);
    let vins: Vec<&str> = vehicles.iter().map(|v| v["vin"].as_str().unwrap()).collect();
    assert!(vins.contains(&"1HGCM82633A123456"));
    assert!(vins.contains(&"WBAPM7339AE111111"));
    assert!(!vins.contains(&"5XYKT3A17CG222222"));

    for vehicle in &vehicles {
        assert!(vehicle["id"].as_str().unwrap().starts_with("IMP-"));
        assert_eq!(vehicle["lastMovement"]["by"], "Import Process");
        assert_eq!(vehicle["color"], "Not specified");
    }
}

#[test]
fn test_import_text_output_shows_preview_and_summary() {
    let env = TestEnv::new();
    let file = env.write("vehicles.csv", THREE_ROWS);

    env.fleet()
        .arg("import")
        .arg(&file)
        .arg("--show-issues")
        .assert()
        .success()
        .stdout(predicate::str::contains("Field Mapping"))
        .stdout(predicate::str::contains("Data Preview"))
        .stdout(predicate::str::contains("Row 2 Make: Make is required"))
        .stdout(predicate::str::contains("Imported:     2"));
}

#[test]
fn test_import_rejects_unmapped_vin() {
    let env = TestEnv::new();
    let file = env.write(
        "serials.csv",
        "Serial,Make,Model,Year\n1HGCM82633A123456,Honda,Accord,2022\n",
    );

    env.fleet()
        .arg("import")
        .arg(&file)
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "Please map the following required fields: VIN",
        ));

    assert!(env.list_vehicles().is_empty());
}

#[test]
fn test_import_with_explicit_mapping() {
    let env = TestEnv::new();
    let file = env.write(
        "serials.csv",
        "Serial,Make,Model,Year\n1HGCM82633A123456,Honda,Accord,2022\n",
    );

    env.fleet()
        .args(["import", "--format", "json", "--map", "vin=Serial"])
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"imported\": 1"));
}

#[test]
fn test_import_map_unknown_column_fails() {
    let env = TestEnv::new();
    let file = env.write("vehicles.csv", THREE_ROWS);

    env.fleet()
        .args(["import", "--map", "vin=Chassis"])
        .arg(&file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown source column 'Chassis'"));
}

#[test]
fn test_import_unsupported_extension() {
    let env = TestEnv::new();
    let file = env.write("vehicles.pdf", "%PDF-1.4");

    env.fleet()
        .arg("import")
        .arg(&file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unsupported file type: .pdf"));
}

#[test]
fn test_import_missing_file() {
    TestEnv::new()
        .fleet()
        .args(["import", "nope.csv"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("File not found"));
}

#[test]
fn test_import_dry_run_writes_nothing() {
    let env = TestEnv::new();
    let file = env.write("vehicles.csv", THREE_ROWS);

    env.fleet()
        .args(["import", "--dry-run"])
        .arg(&file)
        .assert()
        .success()
        .stderr(predicate::str::contains("2 vehicle(s) would be imported"));

    assert!(env.list_vehicles().is_empty());
}

#[test]
fn test_import_exclude_row() {
    let env = TestEnv::new();
    let file = env.write("vehicles.csv", THREE_ROWS);

    env.fleet()
        .args(["import", "--format", "json", "--exclude", "1"])
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"imported\": 1"));

    let vehicles = env.list_vehicles();
    assert_eq!(vehicles.len(), 1);
    assert_eq!(vehicles[0]["vin"], "WBAPM7339AE111111");
}

#[test]
fn test_import_nothing_selected_fails() {
    let env = TestEnv::new();
    let file = env.write("vehicles.csv", THREE_ROWS);

    env.fleet()
        .args(["import", "--exclude", "1", "--exclude", "3"])
        .arg(&file)
        .assert()
        .failure();
}

#[test]
fn test_import_json_file_into_sqlite() {
    let env = TestEnv::new();
    let file = env.write(
        "vehicles.json",
        r#"[
            {"vin": "1HGCM82633A123456", "make": "Honda", "model": "Accord", "year": 2022,
             "latitude": 37.7801},
            {"vin": "WBAPM7339AE111111", "make": "BMW", "model": "X5", "year": 2021,
             "latitude": "not a number"}
        ]"#,
    );

    env.fleet()
        .env("FLEET_STORE", "sqlite")
        .args(["import", "--format", "json"])
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"imported\": 2"))
        .stdout(predicate::str::contains("Latitude could not be read as a number"));

    env.fleet()
        .env("FLEET_STORE", "sqlite")
        .args(["vehicles", "list", "--format", "csv"])
        .assert()
        .success()
        .stdout(predicate::str::contains("WBAPM7339AE111111"));
}

// ============================================================================
// Vehicle Tests
// ============================================================================

#[test]
fn test_vehicles_list_empty() {
    TestEnv::new()
        .fleet()
        .args(["vehicles", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No vehicles found"));
}

#[test]
fn test_vehicles_list_filters() {
    let env = TestEnv::new();
    let file = env.write("vehicles.csv", THREE_ROWS);
    env.fleet().arg("import").arg(&file).assert().success();

    env.fleet()
        .args(["vehicles", "list", "--search", "bmw"])
        .assert()
        .success()
        .stdout(predicate::str::contains("WBAPM7339AE111111"))
        .stdout(predicate::str::contains("1HGCM82633A123456").not());

    env.fleet()
        .args(["vehicles", "list", "--location", "Main Lot", "--format", "csv"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1HGCM82633A123456"))
        .stdout(predicate::str::contains("WBAPM7339AE111111").not());

    env.fleet()
        .args(["vehicles", "list", "--status", "sold"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No vehicles found"));
}

#[test]
fn test_vehicles_show() {
    let env = TestEnv::new();
    let file = env.write("vehicles.csv", THREE_ROWS);
    env.fleet().arg("import").arg(&file).assert().success();

    let vehicles = env.list_vehicles();
    let id = vehicles[0]["id"].as_str().unwrap().to_string();

    env.fleet()
        .args(["vehicles", "show", &id])
        .assert()
        .success()
        .stdout(predicate::str::contains(format!("id: {}", id)));

    env.fleet()
        .args(["vehicles", "show", "IMP-DOESNOTEXIST"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Vehicle not found"));
}

#[test]
fn test_vehicles_set_status_and_location() {
    let env = TestEnv::new();
    let file = env.write("vehicles.csv", THREE_ROWS);
    env.fleet().arg("import").arg(&file).assert().success();

    let id = env.list_vehicles()[0]["id"].as_str().unwrap().to_string();

    env.fleet()
        .args(["vehicles", "set-status", &id, "service"])
        .assert()
        .success()
        .stdout(predicate::str::contains("is now service"));

    env.fleet()
        .args(["vehicles", "set-location", &id, "North Yard", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"location\": \"North Yard\""));

    let vehicles = env.list_vehicles();
    let moved = vehicles.iter().find(|v| v["id"] == id.as_str()).unwrap();
    assert_eq!(moved["status"], "service");
    assert_eq!(moved["location"], "North Yard");
    assert_eq!(moved["lastMovement"]["by"], "Test Operator");
    assert_eq!(vehicles.len(), 2);
}

#[test]
fn test_vehicles_set_status_rejects_unknown() {
    let env = TestEnv::new();
    env.fleet()
        .args(["vehicles", "set-status", "IMP-DOESNOTEXIST", "available"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Vehicle not found"));

    env.fleet()
        .args(["vehicles", "set-status", "IMP-DOESNOTEXIST", "parked"])
        .assert()
        .failure();

    env.fleet()
        .args(["vehicles", "set-location", "IMP-DOESNOTEXIST", "  "])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Location cannot be empty"));
}

#[test]
fn test_vehicles_set_status_on_sqlite_store() {
    let env = TestEnv::new();
    let file = env.write("vehicles.csv", THREE_ROWS);
    env.fleet()
        .env("FLEET_STORE", "sqlite")
        .arg("import")
        .arg(&file)
        .assert()
        .success();

    let output = env
        .fleet()
        .env("FLEET_STORE", "sqlite")
        .args(["vehicles", "list", "--format", "json"])
        .output()
        .unwrap();
    let vehicles: Vec<serde_json::Value> = serde_json::from_slice(&output.stdout).unwrap();
    let id = vehicles[1]["id"].as_str().unwrap().to_string();

    env.fleet()
        .env("FLEET_STORE", "sqlite")
        .args(["vehicles", "set-status", &id, "sold", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"status\": \"sold\""));

    env.fleet()
        .env("FLEET_STORE", "sqlite")
        .args(["vehicles", "list", "--status", "sold", "--format", "csv"])
        .assert()
        .success()
        .stdout(predicate::str::contains(id.as_str()));
}

#[test]
fn test_vehicles_stats_with_demo_data() {
    TestEnv::new()
        .fleet()
        .env("FLEET_DEMO_DATA", "true")
        .args(["vehicles", "stats", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"total\": 2"))
        .stdout(predicate::str::contains("\"imported\": 0"));
}

#[test]
fn test_vehicles_clear() {
    let env = TestEnv::new();
    let file = env.write("vehicles.csv", THREE_ROWS);
    env.fleet().arg("import").arg(&file).assert().success();

    env.fleet()
        .args(["vehicles", "clear", "--yes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Removed 2 vehicle(s)"));

    assert!(env.list_vehicles().is_empty());
}

// ============================================================================
// Device Tests
// ============================================================================

#[test]
fn test_devices_list_with_demo_data() {
    TestEnv::new()
        .fleet()
        .env("FLEET_DEMO_DATA", "true")
        .args(["devices", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Truck 101"))
        .stdout(predicate::str::contains("Truck 102"));
}

#[test]
fn test_devices_find_by_vin() {
    let env = TestEnv::new();
    env.fleet()
        .env("FLEET_DEMO_DATA", "true")
        .args(["devices", "find", "VIN102"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Truck 102"));

    env.fleet()
        .env("FLEET_DEMO_DATA", "true")
        .args(["devices", "find", "VIN999"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No device found"));
}

#[test]
fn test_devices_positions() {
    TestEnv::new()
        .fleet()
        .env("FLEET_DEMO_DATA", "true")
        .args(["devices", "positions", "1", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"deviceId\": 1"));
}

#[test]
fn test_devices_create_requires_fields() {
    TestEnv::new()
        .fleet()
        .args(["devices", "create", "--name", " ", "--unique-id", "VIN103"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Name and VIN/Unique ID are required"));
}

#[test]
fn test_devices_create() {
    TestEnv::new()
        .fleet()
        .args(["devices", "create", "--name", "Truck 103", "--unique-id", "VIN103"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created device Truck 103"));
}

#[test]
fn test_devices_create_help_notes_session_lifetime() {
    TestEnv::new()
        .fleet()
        .args(["devices", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("local devices last for this session only"));

    TestEnv::new()
        .fleet()
        .args(["devices", "create", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("gone once the"));
}

// ============================================================================
// Config Tests
// ============================================================================

#[test]
fn test_config_keys() {
    TestEnv::new()
        .fleet()
        .args(["config", "keys"])
        .assert()
        .success()
        .stdout(predicate::str::contains("page_size"))
        .stdout(predicate::str::contains("demo_data"));
}

#[test]
fn test_config_path_follows_env() {
    let env = TestEnv::new();
    env.fleet()
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.yaml"))
        .stderr(predicate::str::contains("(not created)"));
}

#[test]
fn test_config_set_show_unset() {
    let env = TestEnv::new();

    env.fleet()
        .args(["config", "set", "page_size", "25"])
        .assert()
        .success();
    assert!(env.config_path().exists());

    env.fleet()
        .args(["config", "show", "page_size"])
        .assert()
        .success()
        .stdout(predicate::str::diff("25\n"));

    env.fleet()
        .args(["config", "unset", "page_size"])
        .assert()
        .success();

    env.fleet()
        .args(["config", "show", "page_size"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not set"));
}

#[test]
fn test_config_set_rejects_bad_values() {
    let env = TestEnv::new();

    env.fleet()
        .args(["config", "set", "store", "redis"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid value for 'store'"));

    env.fleet()
        .args(["config", "set", "author", "Dana"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown config key"));
}

#[test]
fn test_config_set_keeps_malformed_file() {
    let env = TestEnv::new();
    let path = env.config_path();
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, "operator: Dana\nstore: [broken\n").unwrap();

    env.fleet()
        .args(["config", "set", "page_size", "20"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not valid YAML"));

    assert_eq!(
        fs::read_to_string(&path).unwrap(),
        "operator: Dana\nstore: [broken\n"
    );
}

#[test]
fn test_config_show_masks_token() {
    TestEnv::new()
        .fleet()
        .env("FLEET_API_TOKEN", "secret-token")
        .args(["config", "show", "--format", "json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("********"))
        .stdout(predicate::str::contains("secret-token").not());
}

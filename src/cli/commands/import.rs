//! `fleet import` command - Upload, map, preview, and import a vehicle file

use console::style;
use dialoguer::{theme::ColorfulTheme, Confirm, MultiSelect, Select};
use miette::{IntoDiagnostic, Result};
use std::path::PathBuf;

use crate::cli::helpers::{auth_provider, load_config, open_api};
use crate::cli::table::{CellValue, ColumnDef, TableFormatter};
use crate::cli::{GlobalOpts, OutputFormat};
use crate::onboarding::mapper::{FieldMapper, MappingSource};
use crate::onboarding::parser::UploadedFile;
use crate::onboarding::preview::RowSelector;
use crate::onboarding::record::TargetField;
use crate::onboarding::summary::ImportSummary;
use crate::onboarding::validator::Severity;
use crate::onboarding::wizard::{ImportWizard, WizardError};

#[derive(clap::Args, Debug)]
pub struct ImportArgs {
    /// File to import (.csv, .xlsx, .xls, .json, .xml, .txt)
    pub file: Option<PathBuf>,

    /// Print a CSV template with every vehicle column
    #[arg(long, conflicts_with = "file")]
    pub template: bool,

    /// Map a vehicle field to a source column, e.g. --map vin="Vehicle ID"
    /// (use `ignore` to leave an optional field empty)
    #[arg(long = "map", value_name = "FIELD=COLUMN", value_parser = parse_map_arg)]
    pub map: Vec<(TargetField, MappingSource)>,

    /// Leave a row out of the import (1-based, repeatable)
    #[arg(long, value_name = "ROW")]
    pub exclude: Vec<usize>,

    /// Validate and preview without importing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Choose columns and rows with prompts, then confirm before importing
    #[arg(long, short = 'i')]
    pub interactive: bool,

    /// List every validation issue, not just the counts
    #[arg(long)]
    pub show_issues: bool,

    /// Preview page to display
    #[arg(long, value_name = "N", default_value_t = 1)]
    pub page: usize,
}

fn parse_map_arg(s: &str) -> std::result::Result<(TargetField, MappingSource), String> {
    let (target, column) = s
        .split_once('=')
        .ok_or_else(|| format!("expected FIELD=COLUMN, got '{}'", s))?;
    let target: TargetField = target.parse()?;
    let column = column.trim();
    if column.is_empty() {
        return Err(format!("no column given for '{}'", target));
    }
    Ok((target, MappingSource::parse(column)))
}

const MAPPING_COLUMNS: &[ColumnDef] = &[
    ColumnDef::new("FIELD", 12),
    ColumnDef::new("SOURCE", 24),
    ColumnDef::new("SAMPLE", 34),
    ColumnDef::new("TYPE", 16),
    ColumnDef::new("REQUIRED", 10),
];

const PREVIEW_COLUMNS: &[ColumnDef] = &[
    ColumnDef::new("#", 6),
    ColumnDef::new("SELECTED", 10),
    ColumnDef::new("VIN", 20),
    ColumnDef::new("MAKE", 14),
    ColumnDef::new("MODEL", 14),
    ColumnDef::new("YEAR", 6),
    ColumnDef::new("STATUS", 12),
    ColumnDef::new("LOCATION", 18),
    ColumnDef::new("ISSUES", 9),
];

pub fn run(args: ImportArgs, global: &GlobalOpts) -> Result<()> {
    if args.template {
        return generate_template();
    }

    let path = args
        .file
        .clone()
        .ok_or_else(|| miette::miette!("File required. Usage: fleet import vehicles.csv"))?;
    if !path.exists() {
        return Err(miette::miette!("File not found: {}", path.display()));
    }

    let config = load_config(global);
    let user = auth_provider(&config).current_user().into_diagnostic()?;
    let api = open_api(&config)?;
    let mut wizard = ImportWizard::new(api).with_page_size(config.page_size());

    // Structured formats keep stdout for the final summary
    let chatty = !global.quiet && !matches!(global.format, OutputFormat::Json | OutputFormat::Yaml);

    if chatty {
        println!(
            "{} Importing {} as {}{}",
            style("→").blue(),
            style(path.display()).yellow(),
            style(&user.name).cyan(),
            if args.dry_run {
                style(" (dry run)").dim().to_string()
            } else {
                String::new()
            }
        );
        println!();
    }

    // Upload
    let file = UploadedFile::from_path(&path).into_diagnostic()?;
    wizard.upload(file).into_diagnostic()?;

    // Mapping
    {
        let mapper = wizard
            .mapper_mut()
            .ok_or_else(|| miette::miette!("No file loaded"))?;
        for (target, source) in &args.map {
            mapper.set(*target, source.clone()).into_diagnostic()?;
        }
        if args.interactive {
            prompt_mapping(mapper)?;
        }
        if chatty {
            print_mapping(mapper, global.format);
        }
    }
    wizard.submit_mapping().into_diagnostic()?;

    // Preview
    {
        let selector = wizard
            .selector_mut()
            .ok_or_else(|| miette::miette!("Nothing to preview"))?;
        apply_exclusions(selector, &args.exclude)?;
        if args.interactive {
            prompt_rows(selector)?;
        }
        selector.set_page(args.page);
        if chatty {
            print_preview(selector, global.format, args.show_issues);
        }
    }

    let selected = wizard.selector().map_or(0, |s| s.selected_rows().len());

    if args.dry_run {
        if !global.quiet {
            eprintln!(
                "{} Dry run: {} vehicle(s) would be imported",
                style("→").blue(),
                style(selected).cyan()
            );
        }
        return Ok(());
    }

    if args.interactive {
        let proceed = Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(format!("Import {} vehicle(s)?", selected))
            .default(true)
            .interact()
            .into_diagnostic()?;
        if !proceed {
            println!("{} Import cancelled", style("✗").yellow());
            return Ok(());
        }
    }

    // Import
    match wizard.confirm_import() {
        Ok(_) => {}
        Err(WizardError::ImportFailed { message, result }) => {
            if let Some(result) = result {
                print_summary(&ImportSummary::from_result(&result), global)?;
            }
            return Err(miette::miette!("{}", message));
        }
        Err(e) => return Err(e).into_diagnostic(),
    }

    // Summary
    let summary = wizard
        .summary()
        .ok_or_else(|| miette::miette!("Import finished without a result"))?;
    print_summary(&summary, global)
}

fn generate_template() -> Result<()> {
    let headers: Vec<&str> = TargetField::all().iter().map(|f| f.as_str()).collect();
    println!("{}", headers.join(","));
    println!("1HGCM82633A123456,Honda,Accord,2022,Silver,available,Main Lot,37.7749,-122.4194,15000,24500");

    // Hint on stderr so redirected output stays a clean CSV
    eprintln!();
    eprintln!(
        "{} Template generated. Redirect to file: fleet import --template > vehicles.csv",
        style("→").blue()
    );

    Ok(())
}

fn apply_exclusions(selector: &mut RowSelector, rows: &[usize]) -> Result<()> {
    for &row in rows {
        if row == 0 || row > selector.len() {
            return Err(miette::miette!(
                "Row {} is out of range (file has {} rows)",
                row,
                selector.len()
            ));
        }
        selector.deselect(row - 1);
    }
    Ok(())
}

fn prompt_mapping(mapper: &mut FieldMapper) -> Result<()> {
    let theme = ColorfulTheme::default();

    println!();
    println!("{} Map file columns to vehicle fields", style("◆").cyan());
    println!("{}", style("─".repeat(50)).dim());

    for &target in TargetField::all() {
        let options: Vec<MappingSource> = mapper
            .source_options(target)
            .into_iter()
            .filter(|o| !o.disabled)
            .map(|o| o.source)
            .collect();
        let items: Vec<String> = options
            .iter()
            .map(|source| match source {
                MappingSource::Ignore => "(ignore)".to_string(),
                MappingSource::Column(_) => {
                    format!("{}  e.g. {}", source, mapper.sample_value(source))
                }
            })
            .collect();
        let current = mapper
            .source_for(target)
            .and_then(|s| options.iter().position(|o| o == s))
            .unwrap_or(0);

        let prompt = if target.is_required() {
            format!("{} *", target.label())
        } else {
            target.label().to_string()
        };
        let choice = Select::with_theme(&theme)
            .with_prompt(prompt)
            .items(&items)
            .default(current)
            .interact()
            .into_diagnostic()?;

        if let Some(source) = options.get(choice) {
            mapper.set(target, source.clone()).into_diagnostic()?;
        }
    }

    Ok(())
}

fn prompt_rows(selector: &mut RowSelector) -> Result<()> {
    let eligible: Vec<usize> = (0..selector.len())
        .filter(|row| !selector.is_blocked(*row))
        .collect();
    if eligible.is_empty() {
        return Ok(());
    }

    let items: Vec<String> = eligible
        .iter()
        .map(|&row| {
            let record = &selector.records()[row];
            let text = |field: TargetField| record.text(field).unwrap_or_default();
            format!(
                "{:>4}  {}  {} {} {}",
                row + 1,
                text(TargetField::Vin),
                text(TargetField::Year),
                text(TargetField::Make),
                text(TargetField::Model)
            )
        })
        .collect();
    let defaults: Vec<bool> = eligible.iter().map(|&row| selector.is_selected(row)).collect();

    let chosen = MultiSelect::with_theme(&ColorfulTheme::default())
        .with_prompt("Rows to import (space toggles, enter confirms)")
        .items(&items)
        .defaults(&defaults)
        .interact()
        .into_diagnostic()?;

    for (i, &row) in eligible.iter().enumerate() {
        if chosen.contains(&i) != selector.is_selected(row) {
            selector.toggle_row(row);
        }
    }

    Ok(())
}

fn print_mapping(mapper: &FieldMapper, format: OutputFormat) {
    let rows: Vec<Vec<CellValue>> = TargetField::all()
        .iter()
        .map(|&target| {
            let source = mapper.source_for(target).cloned().unwrap_or(MappingSource::Ignore);
            vec![
                CellValue::Text(target.label().to_string()),
                match &source {
                    MappingSource::Column(name) => CellValue::Id(name.clone()),
                    MappingSource::Ignore => CellValue::Empty,
                },
                CellValue::Text(mapper.sample_value(&source)),
                CellValue::Text(mapper.detect_type(&source).to_string()),
                CellValue::Flag(target.is_required()),
            ]
        })
        .collect();

    println!("{}", style("Field Mapping").bold());
    TableFormatter::new(MAPPING_COLUMNS, "field")
        .without_summary()
        .output(&rows, format);

    let missing = mapper.missing_required();
    if !missing.is_empty() {
        println!();
        println!(
            "{} Unmapped required fields: {}",
            style("!").red().bold(),
            missing
                .iter()
                .map(|f| f.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
        println!(
            "  {}",
            style("Use --map FIELD=COLUMN or --interactive to choose a column").dim()
        );
    }
    println!();
}

fn print_preview(selector: &RowSelector, format: OutputFormat, show_issues: bool) {
    let text = |value: Option<String>| match value {
        Some(s) if !s.is_empty() => CellValue::Text(s),
        _ => CellValue::Empty,
    };

    let rows: Vec<Vec<CellValue>> = selector
        .page_rows()
        .map(|(row, record)| {
            let mut severity = None;
            for issue in selector.issues_for_row(row) {
                if issue.is_error() {
                    severity = Some(Severity::Error);
                    break;
                }
                severity = Some(Severity::Warning);
            }
            vec![
                CellValue::Number(row as i64 + 1),
                CellValue::Flag(selector.is_selected(row)),
                text(record.text(TargetField::Vin)),
                text(record.text(TargetField::Make)),
                text(record.text(TargetField::Model)),
                text(record.text(TargetField::Year)),
                match record.text(TargetField::Status) {
                    Some(s) if !s.is_empty() => CellValue::Status(s),
                    _ => CellValue::Empty,
                },
                text(record.text(TargetField::Location)),
                CellValue::Severity(severity),
            ]
        })
        .collect();

    println!(
        "{} (page {} of {})",
        style("Data Preview").bold(),
        selector.page(),
        selector.total_pages()
    );
    TableFormatter::new(PREVIEW_COLUMNS, "row")
        .without_summary()
        .output(&rows, format);

    println!();
    println!(
        "{} rows, {} selected, {} blocked by errors, {} warning(s)",
        style(selector.len()).cyan(),
        style(selector.selected_rows().len()).green(),
        style(selector.blocked_rows().len()).red(),
        style(selector.warning_count()).yellow()
    );

    if show_issues && !selector.issues().is_empty() {
        println!();
        println!("{}", style("Validation Issues").bold());
        for issue in selector.issues() {
            let marker = if issue.is_error() {
                style("✗").red()
            } else {
                style("!").yellow()
            };
            println!(
                "  {} Row {} {}: {}",
                marker,
                issue.row + 1,
                style(issue.field.label()).cyan(),
                issue.message
            );
        }
    } else if !selector.issues().is_empty() {
        println!("  {}", style("Use --show-issues to list them").dim());
    }
    println!();
}

fn print_summary(summary: &ImportSummary, global: &GlobalOpts) -> Result<()> {
    match global.format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(summary).into_diagnostic()?;
            println!("{}", json);
            return Ok(());
        }
        OutputFormat::Yaml => {
            let yaml = serde_yml::to_string(summary).into_diagnostic()?;
            print!("{}", yaml);
            return Ok(());
        }
        _ => {}
    }

    let marker = if summary.has_issues() {
        style("!").yellow().bold()
    } else {
        style("✓").green().bold()
    };

    println!("{}", style("─".repeat(50)).dim());
    println!("{} {}", marker, style(summary.title).bold());
    println!("{}", style("─".repeat(50)).dim());
    println!("  Imported:     {}", style(summary.imported).green());
    if summary.failed > 0 {
        println!("  Failed:       {}", style(summary.failed).red());
    } else {
        println!("  Failed:       {}", summary.failed);
    }
    println!("  Warnings:     {}", style(summary.warning_count).yellow());
    println!("  Errors:       {}", summary.error_count);
    println!("  Completed at: {}", style(summary.local_time()).dim());

    for (title, messages) in [("Errors", &summary.errors), ("Warnings", &summary.warnings)] {
        if messages.is_empty() {
            continue;
        }
        println!();
        println!("{}", style(title).bold());
        for msg in messages {
            let location = msg.row.map(|r| format!("Row {}: ", r)).unwrap_or_default();
            match &msg.details {
                Some(details) => {
                    println!("  {}{} ({})", location, msg.message, style(details).dim())
                }
                None => println!("  {}{}", location, msg.message),
            }
        }
    }

    Ok(())
}

//! Offline line protection calculation sheet converter
//!
//! Runs the same conversion as the `/upload` endpoint against local files.
//!
//! Usage:
//!   `cargo run --bin lpcs-convert -- --csv study.csv --form form.json --output sheet.xlsm`

use anyhow::Context;
use clap::{Arg, ArgAction, Command};
use console::style;
use line_protection_api::config::DEFAULT_TEMPLATE_PATH;
use line_protection_api::conversion::{ConversionReport, FormFields, convert};
use std::fs;
use tracing_subscriber::EnvFilter;

fn print_report(report: &ConversionReport) {
    println!("{}", style("Conversion complete").green().bold());
    println!("  CSV rows:            {}", report.csv_rows);
    println!("  Infeed buses found:  {}", report.infeed_buses_found);
    println!(
        "  First line:          {}",
        if report.first_line_found { "found" } else { "missing" }
    );
    println!("  Second lines found:  {}", report.second_lines_found);
    println!(
        "  Cells written:       {} ({} left blank)",
        report.population.cells_written, report.population.cells_skipped
    );

    if report.warnings.is_empty() {
        return;
    }
    println!("{}", style(format!("{} warnings", report.warnings.len())).yellow());
    for warning in &report.warnings {
        println!("  {} {warning}", style("!").yellow());
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let matches = Command::new("lpcs-convert")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Fills the line protection calculation sheet template from a relay study CSV export")
        .arg(
            Arg::new("csv")
                .short('c')
                .long("csv")
                .value_name("FILE")
                .help("Relay study CSV export")
                .required(true),
        )
        .arg(
            Arg::new("template")
                .short('t')
                .long("template")
                .value_name("FILE")
                .help("Calculation sheet template workbook")
                .default_value(DEFAULT_TEMPLATE_PATH),
        )
        .arg(
            Arg::new("form")
                .short('f')
                .long("form")
                .value_name("FILE")
                .help("JSON file with the data entry form fields"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("FILE")
                .help("Where to write the populated workbook")
                .required(true),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .action(ArgAction::SetTrue)
                .help("Print the conversion report as JSON"),
        )
        .get_matches();

    let csv_path = matches
        .get_one::<String>("csv")
        .context("--csv is required")?;
    let template_path = matches
        .get_one::<String>("template")
        .context("--template is required")?;
    let output_path = matches
        .get_one::<String>("output")
        .context("--output is required")?;

    let csv = fs::read(csv_path).with_context(|| format!("Could not read CSV {csv_path}"))?;
    let template = fs::read(template_path)
        .with_context(|| format!("Could not read template {template_path}"))?;
    let form = match matches.get_one::<String>("form") {
        Some(form_path) => {
            let json = fs::read_to_string(form_path)
                .with_context(|| format!("Could not read form fields {form_path}"))?;
            FormFields::from_json(&json)
                .with_context(|| format!("{form_path} is not a JSON object of form fields"))?
        }
        None => FormFields::default(),
    };

    let output = convert(&csv, &form, &template).context("Conversion failed")?;
    fs::write(output_path, &output.workbook)
        .with_context(|| format!("Could not write {output_path}"))?;

    if matches.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&output.report)?);
    } else {
        print_report(&output.report);
        println!("Wrote {}", style(output_path).cyan());
    }

    Ok(())
}

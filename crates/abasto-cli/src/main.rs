// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod config;
mod logging;
mod runtime;

use abasto_api::Client;
use abasto_app::{
    DELETE_ALL_KEYWORD, DateRange, DeleteAllRequest, ExportFormat, FilterSelection, ForecastState,
    ImportGate, ImportOutcome, ImportSummary, LoginForm, PurchaseUpdate, RecordForm, RecordId,
    Resource, filter_purchases, parse_iso_date,
};
use abasto_export::XlsxExporter;
use abasto_testkit::{DEMO_PASSWORD, DEMO_USER, MockBackend};
use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use config::Config;
use runtime::HttpRuntime;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use time::Date;

#[derive(Debug, Parser)]
#[command(name = "abasto", author, version, about = "Supply forecast dashboard in the terminal")]
struct Cli {
    /// Config file to load instead of the default location.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[arg(long)]
    print_config_path: bool,

    #[arg(long)]
    print_example_config: bool,

    /// Serve generated data from an in-process backend.
    #[arg(long, global = true)]
    demo: bool,

    /// Validate the config and reach the backend, then exit.
    #[arg(long)]
    check: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
enum Command {
    /// Open the forecast table (default).
    Forecast,
    /// Print every record of a resource as JSON.
    List {
        #[arg(value_parser = Resource::parse)]
        resource: Resource,
    },
    /// Create a record from Field=value pairs.
    Create {
        #[arg(value_parser = Resource::parse)]
        resource: Resource,
        #[arg(required = true, value_name = "FIELD=VALUE")]
        fields: Vec<String>,
    },
    /// Replace a record addressed by its id, index, or key column.
    Update {
        #[arg(value_parser = Resource::parse)]
        resource: Resource,
        id: String,
        #[arg(required = true, value_name = "FIELD=VALUE")]
        fields: Vec<String>,
    },
    Delete {
        #[arg(value_parser = Resource::parse)]
        resource: Resource,
        id: String,
    },
    /// Upload a JSON or spreadsheet file to a resource.
    Import {
        #[arg(value_parser = Resource::parse)]
        resource: Resource,
        file: PathBuf,
    },
    /// Download a resource as excel or json.
    Export {
        #[arg(value_parser = Resource::parse)]
        resource: Resource,
        #[arg(long, default_value = "excel", value_parser = ExportFormat::parse)]
        format: ExportFormat,
        #[arg(long, value_name = "DIR")]
        dir: Option<PathBuf>,
    },
    /// Remove every record of a resource. Prompts for the keyword unless --confirm is given.
    DeleteAll {
        #[arg(value_parser = Resource::parse)]
        resource: Resource,
        #[arg(long, value_name = "KEYWORD")]
        confirm: Option<String>,
    },
    /// Materials and cost centers missing from the product and point-of-sale catalogs.
    Pending {
        #[arg(value_parser = parse_pending_resource)]
        resource: Resource,
    },
    /// Months that have sales records.
    SalesMonths,
    /// Remove sales whose date falls in an inclusive range.
    DeleteSales {
        #[arg(long, value_name = "YYYY-MM-DD", value_parser = parse_iso_date)]
        from: Option<Date>,
        #[arg(long, value_name = "YYYY-MM-DD", value_parser = parse_iso_date)]
        to: Option<Date>,
        #[arg(long, value_name = "KEYWORD")]
        confirm: Option<String>,
    },
    /// Review and approve purchase suggestions.
    Purchases {
        #[command(subcommand)]
        action: PurchaseAction,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
enum PurchaseAction {
    /// Print suggestions, optionally narrowed by material, product, or brand.
    List {
        #[arg(long)]
        search: Option<String>,
    },
    Approve {
        material: String,
    },
    Reject {
        material: String,
    },
    /// Replace the note on a suggestion.
    Note {
        material: String,
        text: String,
    },
    /// Upload suggestions; rows for known materials add to their quantity.
    Import {
        file: PathBuf,
    },
    Export {
        #[arg(long, value_name = "DIR")]
        dir: Option<PathBuf>,
    },
}

fn parse_pending_resource(value: &str) -> Result<Resource> {
    let resource = Resource::parse(value)?;
    if !resource.has_pending_view() {
        bail!("{} has no pending view -- use inventario, metas or ventasclaro", resource.name());
    }
    Ok(resource)
}

fn main() {
    if let Err(error) = run() {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => Config::default_path()?,
    };

    if cli.print_config_path {
        println!("{}", config_path.display());
        return Ok(());
    }

    if cli.print_example_config {
        print!("{}", Config::example_config(&config_path));
        return Ok(());
    }

    let config = Config::load(&config_path).with_context(|| {
        format!(
            "load config {}; run `abasto --print-example-config` to generate a v1 template",
            config_path.display()
        )
    })?;
    let log_path = logging::init()?;
    tracing::info!(config = %config_path.display(), log = %log_path.display(), "starting");

    let demo = if cli.demo {
        Some(MockBackend::demo().context("start demo backend")?)
    } else {
        None
    };
    let base_url = demo
        .as_ref()
        .map_or_else(|| config.base_url().to_owned(), |backend| backend.base_url().to_owned());
    let client = Client::new(&base_url, config.timeout()?).with_context(|| {
        format!(
            "invalid [backend] config in {}; fix base_url/timeout values",
            config_path.display()
        )
    })?;

    if cli.check {
        client
            .forecast_options(&FilterSelection::default())
            .with_context(|| format!("reach backend {base_url}"))?;
        println!("config {} ok, backend {base_url} reachable", config_path.display());
        return Ok(());
    }

    let login = if demo.is_some() {
        Some(LoginForm {
            user: DEMO_USER.to_owned(),
            password: DEMO_PASSWORD.to_owned(),
        })
    } else {
        config.login()
    };
    if let Some(form) = login {
        form.validate()?;
        let welcome = client.login(&form).context("log in to backend")?;
        tracing::info!(user = %form.user, "{welcome}");
    }

    match cli.command.unwrap_or(Command::Forecast) {
        Command::Forecast => {
            let mut state = ForecastState::new(config.forecast_settings()?);
            let exporter = XlsxExporter::new(config.export_dir()?);
            let mut runtime = HttpRuntime::new(client, exporter);
            abasto_tui::run_app(
                &mut state,
                &mut runtime,
                ImportGate::new(config.import_cooldown()?),
            )
        }
        command => {
            let stdin = io::stdin();
            let stdout = io::stdout();
            run_resource_command(
                &client,
                &config,
                command,
                &mut stdin.lock(),
                &mut stdout.lock(),
            )
        }
    }
}

fn run_resource_command(
    client: &Client,
    config: &Config,
    command: Command,
    input: &mut impl BufRead,
    out: &mut impl Write,
) -> Result<()> {
    match command {
        Command::Forecast => bail!("forecast is interactive -- run `abasto` without a subcommand"),
        Command::List { resource } => {
            let records = client.list(resource)?;
            writeln!(out, "{}", serde_json::to_string_pretty(&records)?)?;
        }
        Command::Create { resource, fields } => {
            let form = RecordForm::from_pairs(resource, fields.iter().map(String::as_str))?;
            form.validate()?;
            client.create(form)?;
            writeln!(out, "created {} record", resource.label())?;
        }
        Command::Update {
            resource,
            id,
            fields,
        } => {
            let form = RecordForm::from_pairs(resource, fields.iter().map(String::as_str))?;
            form.validate()?;
            client.update(&RecordId::new(id.as_str()), form)?;
            writeln!(out, "updated {} record {id}", resource.label())?;
        }
        Command::Delete { resource, id } => {
            client.delete(resource, &RecordId::new(id.as_str()))?;
            writeln!(out, "deleted {} record {id}", resource.label())?;
        }
        Command::Import { resource, file } => match client.import_outcome(resource, &file) {
            ImportOutcome::Imported(summary) => print_import(out, summary)?,
            ImportOutcome::Busy(message) => bail!("{message}"),
            ImportOutcome::Failed(message) => bail!("import {}: {message}", file.display()),
        },
        Command::Export {
            resource,
            format,
            dir,
        } => {
            let dir = export_dir(config, dir)?;
            let path = client.export(resource, format, &dir)?;
            writeln!(out, "{}", path.display())?;
        }
        Command::DeleteAll { resource, confirm } => {
            let typed = match confirm {
                Some(typed) => typed,
                None => prompt(
                    input,
                    out,
                    &format!(
                        "type {DELETE_ALL_KEYWORD} to delete every {} record: ",
                        resource.label()
                    ),
                )?,
            };
            let request = DeleteAllRequest::confirm(typed.trim())?;
            client.delete_all(resource, request)?;
            writeln!(out, "deleted every {} record", resource.label())?;
        }
        Command::Pending { resource } => {
            let report = client.pending(resource)?;
            if report.is_empty() {
                writeln!(out, "every {} record is in the catalogs", resource.label())?;
            }
            for (title, codes) in [
                ("missing materials", &report.missing_materials),
                ("missing centros", &report.missing_centros),
            ] {
                if codes.is_empty() {
                    continue;
                }
                writeln!(out, "{title} ({}):", codes.len())?;
                for code in codes {
                    writeln!(out, "  {code}")?;
                }
            }
        }
        Command::SalesMonths => {
            for month in client.sales_months()? {
                writeln!(out, "{month}")?;
            }
        }
        Command::DeleteSales { from, to, confirm } => {
            let range = DateRange::new(from, to)?;
            let matching = range.count_matching(&client.list(Resource::VentasClaro)?);
            if matching == 0 {
                bail!("no sales dated {range} -- widen --from/--to and retry");
            }
            let typed = match confirm {
                Some(typed) => typed,
                None => prompt(
                    input,
                    out,
                    &format!(
                        "type {DELETE_ALL_KEYWORD} to delete {matching} sales records dated {range}: "
                    ),
                )?,
            };
            if typed.trim() != DELETE_ALL_KEYWORD {
                bail!("delete-sales not confirmed -- type {DELETE_ALL_KEYWORD} exactly and retry");
            }
            let summary = client.delete_sales_in_range(&range)?;
            writeln!(
                out,
                "deleted {} sales records, {} remaining",
                summary.deleted, summary.remaining
            )?;
        }
        Command::Purchases { action } => run_purchase_action(client, config, action, out)?,
    }
    Ok(())
}

fn run_purchase_action(
    client: &Client,
    config: &Config,
    action: PurchaseAction,
    out: &mut impl Write,
) -> Result<()> {
    match action {
        PurchaseAction::List { search } => {
            let items = client.purchases()?;
            writeln!(out, "Material\tProducto\tMarca\tSugerido\tEstado\tObservacion")?;
            for item in filter_purchases(&items, search.as_deref().unwrap_or_default()) {
                let suggested = item.suggested.map(|n| n.to_string()).unwrap_or_default();
                writeln!(
                    out,
                    "{}\t{}\t{}\t{suggested}\t{}\t{}",
                    item.material,
                    item.product,
                    item.brand,
                    item.status(),
                    item.note
                )?;
            }
        }
        PurchaseAction::Approve { material } => {
            client.update_purchase(&PurchaseUpdate::approve(&material, true)?)?;
            writeln!(out, "approved purchase {material}")?;
        }
        PurchaseAction::Reject { material } => {
            client.update_purchase(&PurchaseUpdate::approve(&material, false)?)?;
            writeln!(out, "rejected purchase {material}")?;
        }
        PurchaseAction::Note { material, text } => {
            client.update_purchase(&PurchaseUpdate::note(&material, &text)?)?;
            writeln!(out, "noted purchase {material}")?;
        }
        PurchaseAction::Import { file } => {
            let summary = client
                .import_purchases(&file)
                .with_context(|| format!("import {}", file.display()))?;
            print_import(out, summary)?;
        }
        PurchaseAction::Export { dir } => {
            let dir = export_dir(config, dir)?;
            let path = client.export_purchases(&dir)?;
            writeln!(out, "{}", path.display())?;
        }
    }
    Ok(())
}

fn print_import(out: &mut impl Write, summary: ImportSummary) -> Result<()> {
    writeln!(out, "{}", ImportOutcome::Imported(summary.clone()).message())?;
    for material in &summary.added_materials {
        writeln!(out, "  {material}")?;
    }
    Ok(())
}

fn export_dir(config: &Config, flag: Option<PathBuf>) -> Result<PathBuf> {
    let dir = match flag {
        Some(dir) => dir,
        None => config.export_dir()?,
    };
    fs::create_dir_all(&dir)
        .with_context(|| format!("create export directory {}", dir.display()))?;
    Ok(dir)
}

fn prompt(input: &mut impl BufRead, out: &mut impl Write, question: &str) -> Result<String> {
    write!(out, "{question}")?;
    out.flush()?;
    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(line)
}

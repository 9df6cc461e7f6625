use anyhow::{anyhow, bail, Context, Result};
use chrono::{NaiveDate, Utc};
use clap::{ArgAction, Args, Parser, Subcommand};
use palletrack::{
    config,
    models::{Entrance, ExitResult, PartNumberQuantity},
    services::{
        aggregation::{FolioAggregate, PartNumberAggregate},
        costs::GeneralMetrics,
        entrances::{paginate, EntranceDraft, EntranceFilter, EntranceWithMetrics, StatusFilter},
        exits::{parse_folio, ExitOutcome},
        ledger::QuantityChange,
    },
    ServiceError, ServiceFactory,
};
use serde::Serialize;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let context = CliContext::initialize()?;

    match cli.command {
        Commands::Entrances(command) => {
            handle_entrances_command(&context, command, cli.json).await?
        }
        Commands::Search(command) => handle_search_command(&context, command, cli.json).await?,
        Commands::Exits(command) => handle_exits_command(&context, command, cli.json).await?,
        Commands::Reports(command) => handle_reports_command(&context, command, cli.json).await?,
        Commands::Metrics(args) => handle_metrics(&context, args, cli.json).await?,
    }

    Ok(())
}

#[derive(Parser)]
#[command(name = "palletrack", about = "Warehouse pallet entrances, exits and reports", version)]
struct Cli {
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON when available"
    )]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(subcommand)]
    Entrances(EntrancesCommands),
    #[command(subcommand)]
    Search(SearchCommands),
    #[command(subcommand)]
    Exits(ExitsCommands),
    #[command(subcommand)]
    Reports(ReportsCommands),
    /// Cost totals over the (filtered) entrance listing
    Metrics(FilterArgs),
}

#[derive(Subcommand)]
enum EntrancesCommands {
    List(EntrancesListArgs),
    Create(EntranceFormArgs),
    Update(EntranceUpdateArgs),
    Exit(EntranceExitArgs),
    Delete(EntranceDeleteArgs),
}

#[derive(Args)]
struct FilterArgs {
    #[arg(long, default_value = "all", value_parser = parse_status, help = "all, active or completed")]
    status: StatusFilter,
    #[arg(long, help = "Only entrances whose part numbers contain this text")]
    part: Option<String>,
    #[arg(long, value_parser = parse_date, help = "Earliest entry date (YYYY-MM-DD, inclusive)")]
    from: Option<NaiveDate>,
    #[arg(long, value_parser = parse_date, help = "Latest entry date (YYYY-MM-DD, inclusive)")]
    to: Option<NaiveDate>,
}

impl From<FilterArgs> for EntranceFilter {
    fn from(args: FilterArgs) -> Self {
        EntranceFilter {
            status: args.status,
            part_number: args.part.filter(|p| !p.trim().is_empty()),
            entry_from: args.from,
            entry_to: args.to,
        }
    }
}

#[derive(Args)]
struct EntrancesListArgs {
    #[command(flatten)]
    filter: FilterArgs,
    #[arg(long, default_value_t = 1, help = "Page to show (1-based)")]
    page: usize,
}

#[derive(Args)]
struct EntranceFormArgs {
    #[arg(long)]
    folio: i64,
    #[arg(long, help = "Entry date, e.g. 2024-03-01T10:30")]
    date: String,
    #[arg(
        long = "part",
        value_parser = parse_part_quantity,
        help = "Part number and pieces as PART=QTY (repeatable)"
    )]
    parts: Vec<PartNumberQuantity>,
}

impl From<EntranceFormArgs> for EntranceDraft {
    fn from(args: EntranceFormArgs) -> Self {
        EntranceDraft {
            folio: args.folio,
            entry_date: args.date,
            part_numbers: args.parts,
        }
    }
}

#[derive(Args)]
struct EntranceUpdateArgs {
    #[arg(long)]
    id: i64,
    #[command(flatten)]
    form: EntranceFormArgs,
}

#[derive(Args)]
struct EntranceExitArgs {
    #[arg(long)]
    id: i64,
    #[arg(long, help = "Pallets leaving the warehouse")]
    platforms: i64,
    #[arg(long, help = "Exit date; defaults to now")]
    date: Option<String>,
}

#[derive(Args)]
struct EntranceDeleteArgs {
    #[arg(long)]
    id: i64,
    #[arg(long, action = ArgAction::SetTrue, help = "Confirm the irreversible delete")]
    yes: bool,
}

#[derive(Subcommand)]
enum SearchCommands {
    Folio(SearchFolioArgs),
    Part(SearchPartArgs),
}

#[derive(Args)]
struct SearchFolioArgs {
    folio: String,
}

#[derive(Args)]
struct SearchPartArgs {
    part_number: String,
}

#[derive(Subcommand)]
enum ExitsCommands {
    /// Withdraw whole pallets of a folio
    Pallet(ExitPalletArgs),
    /// Withdraw pieces of one or more part numbers of a folio
    Process(ExitProcessArgs),
}

#[derive(Args)]
struct ExitPalletArgs {
    #[arg(long)]
    folio: String,
    #[arg(long, default_value_t = 1)]
    quantity: i64,
}

#[derive(Args)]
struct ExitProcessArgs {
    #[arg(long)]
    folio: String,
    #[arg(
        long = "item",
        value_parser = parse_part_quantity,
        help = "Part number and pieces as PART=QTY (repeatable)"
    )]
    items: Vec<PartNumberQuantity>,
    #[arg(long, help = "Also withdraw this many whole pallets")]
    pallets: Option<i64>,
}

#[derive(Subcommand)]
enum ReportsCommands {
    List,
    Monthly(MonthArgs),
    Range(RangeArgs),
    /// Monthly cost summary computed locally from the entrance listing
    Summary(MonthArgs),
}

#[derive(Args)]
struct MonthArgs {
    #[arg(long)]
    year: i32,
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=12))]
    month: u32,
}

#[derive(Args)]
struct RangeArgs {
    #[arg(long, help = "First day, YYYY-MM-DD")]
    start: String,
    #[arg(long, help = "Last day, YYYY-MM-DD")]
    end: String,
}

struct CliContext {
    factory: ServiceFactory,
}

impl CliContext {
    fn initialize() -> Result<Self> {
        let config = config::load_config().context("failed to load application config")?;
        config::init_tracing(config.log_level(), config.log_json);

        let factory =
            ServiceFactory::from_config(config).context("failed to build warehouse client")?;
        Ok(Self { factory })
    }
}

async fn handle_entrances_command(
    context: &CliContext,
    command: EntrancesCommands,
    json: bool,
) -> Result<()> {
    let service = context.factory.entrance_service();

    match command {
        EntrancesCommands::List(args) => {
            let filter = EntranceFilter::from(args.filter);
            let entrances = service.list(&filter).await.map_err(user_error)?;
            let rows = service.with_metrics(entrances, Utc::now());
            let page = paginate(rows, args.page, context.factory.config().page_size);

            if json {
                print_json(&page)?;
            } else if page.items.is_empty() {
                println!("No entrances found");
            } else {
                for row in &page.items {
                    render_entrance_row(row);
                }
                println!(
                    "Page {} of {} ({} entrances) • pages {:?}",
                    page.page, page.total_pages, page.total_items, page.window
                );
            }
        }
        EntrancesCommands::Create(args) => {
            let response = service.create(args.into()).await.map_err(user_error)?;
            if json {
                print_json(&response)?;
            } else {
                match response.id {
                    Some(id) => println!("Entrance saved (id {})", id),
                    None => println!("Entrance saved"),
                }
            }
        }
        EntrancesCommands::Update(args) => {
            let response = service
                .update(args.id, args.form.into())
                .await
                .map_err(user_error)?;
            if json {
                print_json(&response)?;
            } else {
                println!("Entrance {} updated", args.id);
            }
        }
        EntrancesCommands::Exit(args) => {
            let exit_date = args.date.unwrap_or_else(|| Utc::now().to_rfc3339());
            let response = service
                .register_exit(args.id, args.platforms, &exit_date)
                .await
                .map_err(user_error)?;
            if json {
                print_json(&response)?;
            } else {
                println!("Exit registered for entrance {}", args.id);
            }
        }
        EntrancesCommands::Delete(args) => {
            if !args.yes {
                bail!(
                    "deleting entrance {} cannot be undone; pass --yes to confirm",
                    args.id
                );
            }
            let response = service.delete(args.id).await.map_err(user_error)?;
            if json {
                print_json(&response)?;
            } else {
                println!("Entrance {} deleted", args.id);
            }
        }
    }

    Ok(())
}

async fn handle_search_command(
    context: &CliContext,
    command: SearchCommands,
    json: bool,
) -> Result<()> {
    let mut session = context.factory.exit_session();

    match command {
        SearchCommands::Folio(args) => {
            let results = session
                .search_by_folio(&args.folio)
                .await
                .map_err(user_error)?;
            match results {
                Some(aggregate) if json => print_json(aggregate)?,
                Some(aggregate) => render_folio_aggregate(aggregate),
                None => println!("Nothing to search"),
            }
        }
        SearchCommands::Part(args) => {
            let results = session
                .search_by_part_number(&args.part_number)
                .await
                .map_err(user_error)?;
            if json {
                print_json(&results)?;
            } else if results.is_empty() {
                println!("No folios hold part number {}", args.part_number.trim());
            } else {
                results.iter().for_each(render_part_aggregate);
            }
        }
    }

    Ok(())
}

async fn handle_exits_command(
    context: &CliContext,
    command: ExitsCommands,
    json: bool,
) -> Result<()> {
    let mut session = context.factory.exit_session();

    let (folio_input, pallets, items) = match command {
        ExitsCommands::Pallet(args) => (args.folio, Some(args.quantity), Vec::new()),
        ExitsCommands::Process(args) => (args.folio, args.pallets, args.items),
    };
    let folio = parse_folio(&folio_input).map_err(user_error)?;

    session
        .search_by_folio(&folio_input)
        .await
        .map_err(user_error)?;

    if let Some(quantity) = pallets {
        let change = session
            .select_platforms(folio, quantity)
            .map_err(user_error)?;
        ensure_selected(change, &format!("{} pallets of folio {}", quantity, folio))?;
    }
    for item in &items {
        let change = session
            .select_part_quantity(folio, &item.part_number, item.quantity)
            .map_err(user_error)?;
        ensure_selected(
            change,
            &format!("{} pieces of {}", item.quantity, item.part_number),
        )?;
    }

    let outcome = session.process_selected().await.map_err(user_error)?;

    if json {
        print_json(&outcome)?;
    } else {
        render_exit_outcome(&outcome);
        if let Some(aggregate) = session.folio_results() {
            println!("Remaining stock:");
            render_folio_aggregate(aggregate);
        }
    }

    if !outcome.success {
        bail!(
            "{}",
            session
                .last_error()
                .unwrap_or("some exits could not be processed")
        );
    }
    Ok(())
}

async fn handle_reports_command(
    context: &CliContext,
    command: ReportsCommands,
    json: bool,
) -> Result<()> {
    let service = context.factory.report_service();

    match command {
        ReportsCommands::List => {
            let reports = service.available_reports().await.map_err(user_error)?;
            if json {
                print_json(&reports)?;
            } else if reports.is_empty() {
                println!("No reports available");
            } else {
                for report in &reports {
                    println!("- {} {} ({:02})", report.month_name, report.year, report.month);
                }
            }
        }
        ReportsCommands::Monthly(args) => {
            let path = service
                .download_monthly(args.year, args.month)
                .await
                .map_err(user_error)?;
            print_saved(&path, json)?;
        }
        ReportsCommands::Range(args) => {
            let path = service
                .download_range(&args.start, &args.end)
                .await
                .map_err(user_error)?;
            print_saved(&path, json)?;
        }
        ReportsCommands::Summary(args) => {
            let report = service
                .monthly_summary(args.year, args.month, Utc::now())
                .await
                .map_err(user_error)?;
            if json {
                print_json(&report)?;
            } else {
                println!(
                    "{} {}: {} records ({} active, {} completed), {} pallets",
                    report.month_name,
                    report.year,
                    report.total_records,
                    report.active_records,
                    report.completed_records,
                    report.total_pallets
                );
                println!(
                    "  entry {} • exit {} • storage {} • total {}",
                    report.total_entry_cost,
                    report.total_exit_cost,
                    report.total_storage_cost,
                    report.total_general_cost
                );
            }
        }
    }

    Ok(())
}

async fn handle_metrics(context: &CliContext, args: FilterArgs, json: bool) -> Result<()> {
    let service = context.factory.entrance_service();
    let entrances = service
        .list(&EntranceFilter::from(args))
        .await
        .map_err(user_error)?;

    match service.general_metrics(&entrances, Utc::now()) {
        Some(metrics) if json => print_json(&metrics)?,
        Some(metrics) => render_general_metrics(&metrics),
        None => println!("No entrances to measure"),
    }
    Ok(())
}

fn user_error(err: ServiceError) -> anyhow::Error {
    anyhow!(err.user_message())
}

fn ensure_selected(change: QuantityChange, what: &str) -> Result<()> {
    match change {
        QuantityChange::Inserted | QuantityChange::Updated => Ok(()),
        QuantityChange::Removed | QuantityChange::Unchanged => {
            bail!("cannot withdraw {}: quantity must be greater than 0", what)
        }
        QuantityChange::Rejected(_) => {
            bail!("cannot withdraw {}: exceeds the available quantity", what)
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_saved(path: &std::path::Path, json: bool) -> Result<()> {
    if json {
        print_json(&serde_json::json!({ "path": path.display().to_string() }))
    } else {
        println!("Report saved to: {}", path.display());
        Ok(())
    }
}

fn render_entrance_row(row: &EntranceWithMetrics) {
    let e = &row.entrance;
    println!(
        "- #{} folio {} • {} pallets • {} pieces • {} days • total {}{}",
        e.id,
        e.folio,
        e.platforms,
        e.total_pieces(),
        row.metrics.days_in_warehouse,
        row.metrics.total_cost,
        if e.is_completed() { " • completed" } else { "" }
    );
}

fn render_entrance(entrance: &Entrance) {
    let parts: Vec<String> = entrance
        .breakdown()
        .iter()
        .map(|p| format!("{}×{}", p.part_number, p.quantity))
        .collect();
    println!(
        "  • entrance #{} • {} pallets • {} • entered {}{}",
        entrance.id,
        entrance.platforms,
        parts.join(", "),
        entrance.entry_date.format("%Y-%m-%d %H:%M"),
        entrance
            .exit_date
            .map(|d| format!(" • exited {}", d.format("%Y-%m-%d %H:%M")))
            .unwrap_or_default()
    );
}

fn render_folio_aggregate(aggregate: &FolioAggregate) {
    if aggregate.is_empty() {
        println!("No entrances found for that folio");
        return;
    }
    for summary in &aggregate.folios {
        println!(
            "Folio {} • {} pallets in stock • {} pieces received",
            summary.folio, summary.total_platforms, summary.total_pieces
        );
        summary.entrances.iter().for_each(render_entrance);
    }
    println!("Accumulated by part number:");
    for (part_number, quantity) in &aggregate.accumulated {
        println!("  {} → {}", part_number, quantity);
    }
}

fn render_part_aggregate(aggregate: &PartNumberAggregate) {
    println!(
        "Part {} • {} pallets • {} pieces",
        aggregate.part_number, aggregate.total_platforms, aggregate.total_pieces
    );
    for folio in &aggregate.folios {
        println!(
            "  • folio {} • {} pallets • {} pieces{}",
            folio.folio,
            folio.platforms,
            folio.pieces,
            if folio.completed { " • completed" } else { "" }
        );
    }
}

fn render_exit_result(result: &ExitResult) {
    let pallets = match (result.previous_platforms, result.current_platforms) {
        (Some(before), Some(after)) => format!(" • pallets {} → {}", before, after),
        _ => String::new(),
    };
    let pieces = match (result.previous_pieces, result.current_pieces) {
        (Some(before), Some(after)) => format!(" • pieces {} → {}", before, after),
        _ => String::new(),
    };
    println!(
        "  • folio {} {}{}{} • {}",
        result.folio,
        if result.success { "ok" } else { "FAILED" },
        pallets,
        pieces,
        result.message
    );
}

fn render_exit_outcome(outcome: &ExitOutcome) {
    println!(
        "{}{}",
        if outcome.success {
            "Exits processed"
        } else {
            "Exits partially failed"
        },
        outcome
            .exit_date
            .as_deref()
            .map(|d| format!(" at {}", d))
            .unwrap_or_default()
    );
    outcome.results.iter().for_each(render_exit_result);
    if outcome.pending_items > 0 {
        println!("{} selections kept for retry", outcome.pending_items);
    }
    if let Some(err) = &outcome.refresh_error {
        println!("Could not reload the folio: {}", err);
    }
}

fn render_general_metrics(metrics: &GeneralMetrics) {
    println!("Records: {}", metrics.record_count);
    println!("Storage: {}", metrics.total_storage_cost);
    println!("Entrance fees: {}", metrics.total_entrance_fees);
    println!("Exit fees: {}", metrics.total_exit_fees);
    println!("Total: {}", metrics.total_general_cost);
    println!(
        "Days in warehouse: {} (average {})",
        metrics.total_days_in_warehouse, metrics.average_days_in_warehouse
    );
}

fn parse_part_quantity(raw: &str) -> Result<PartNumberQuantity, String> {
    let (part, quantity) = raw
        .rsplit_once('=')
        .ok_or_else(|| format!("invalid part '{raw}', expected PART=QTY"))?;
    let quantity: i64 = quantity
        .trim()
        .parse()
        .map_err(|_| format!("invalid quantity '{}'", quantity.trim()))?;
    Ok(PartNumberQuantity::new(part.trim(), quantity))
}

fn parse_status(raw: &str) -> Result<StatusFilter, String> {
    raw.parse()
        .map_err(|_| format!("invalid status '{raw}', expected all, active or completed"))
}

fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| format!("invalid date '{}', expected YYYY-MM-DD", raw))
}

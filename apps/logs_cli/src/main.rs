mod config;

use std::{path::PathBuf, sync::Arc};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use logs_client::{
    page_href, page_items, EnvironmentFilter, EnvironmentFilterState, FilterDimension,
    FilterIntent, FilterState, HttpLogSearchClient, LogSearchBackend, LogsDisplay,
    MemoryNavigator, Navigator, PageItem, SearchEvent, SearchOrchestrator, SystemClock,
    UrlSynchronizer, ViewState,
};
use shared::domain::{LogLevel, ProjectId, TimeRange};
use tokio::sync::broadcast;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Search application logs from the terminal")]
struct Cli {
    #[arg(long, default_value = config::DEFAULT_CONFIG_FILE)]
    config: PathBuf,
    #[arg(long)]
    api_url: Option<String>,
    #[arg(long)]
    token: Option<String>,
    #[arg(long)]
    project: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply filter changes to a logs-view query string and run the search.
    Search(SearchArgs),
    /// List environments available to the environment filter.
    Environments,
}

#[derive(Args, Debug)]
struct SearchArgs {
    /// Starting query string, e.g. "level=ERROR&page=2".
    #[arg(long, default_value = "")]
    query: String,
    #[arg(long)]
    clear: bool,
    /// Toggle a level (repeatable).
    #[arg(long = "level")]
    levels: Vec<String>,
    /// Toggle an environment (repeatable).
    #[arg(long = "environment")]
    environments: Vec<String>,
    /// Toggle a hostname (repeatable).
    #[arg(long = "hostname")]
    hostnames: Vec<String>,
    #[arg(long)]
    search: Option<String>,
    /// all, 5m, 30m, 1h, 6h, 12h, 1d or custom.
    #[arg(long)]
    time_range: Option<String>,
    /// Custom range start, epoch millis.
    #[arg(long)]
    start: Option<i64>,
    /// Custom range end, epoch millis.
    #[arg(long)]
    end: Option<i64>,
    #[arg(long)]
    page: Option<u32>,
    /// Print the raw JSON result instead of a table.
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();
    let cli = Cli::parse();

    let mut settings = config::load_settings(&cli.config)?;
    if let Some(api_url) = cli.api_url {
        settings.api_url = api_url;
    }
    if let Some(token) = cli.token {
        settings.auth_token = Some(token);
    }
    if let Some(project) = cli.project {
        settings.project_id = Some(project);
    }

    let project_id = settings
        .project_id
        .clone()
        .map(ProjectId::new)
        .ok_or_else(|| anyhow!("no project configured; pass --project or set APP__PROJECT_ID"))?;
    let token = settings.auth_token.clone().unwrap_or_default();
    let backend: Arc<dyn LogSearchBackend> = Arc::new(
        HttpLogSearchClient::new(&settings.api_url, token)
            .with_context(|| format!("invalid api url '{}'", settings.api_url))?,
    );

    match cli.command {
        Command::Search(args) => run_search(backend, project_id, &settings, args).await,
        Command::Environments => list_environments(backend, project_id).await,
    }
}

async fn run_search(
    backend: Arc<dyn LogSearchBackend>,
    project_id: ProjectId,
    settings: &config::Settings,
    args: SearchArgs,
) -> Result<()> {
    let timings = settings.timings();
    let clock = Arc::new(SystemClock);
    let navigator = Arc::new(MemoryNavigator::new(args.query.clone()));
    let synchronizer =
        UrlSynchronizer::new(navigator.clone(), clock.clone(), timings.search_debounce);

    for intent in intents_from_args(&args)? {
        synchronizer.dispatch(intent);
    }

    let orchestrator = SearchOrchestrator::new(backend, clock, timings);
    let mut events = orchestrator.subscribe_events();
    let query = navigator.current_query();
    info!(%project_id, query = %query, "searching logs");
    orchestrator.sync(&project_id, &query).await;
    wait_for_completion(&mut events).await?;

    let view = orchestrator.snapshot().await;
    if args.json {
        let body = serde_json::json!({
            "query": query,
            "logs": view.logs,
            "pagination": view.pagination,
            "error": view.error,
        });
        println!("{}", serde_json::to_string_pretty(&body)?);
    } else {
        print_view(&view, &query);
    }

    if view.display() == LogsDisplay::Error {
        bail!("log search failed");
    }
    Ok(())
}

fn intents_from_args(args: &SearchArgs) -> Result<Vec<FilterIntent>> {
    let mut intents = Vec::new();
    if args.clear {
        intents.push(FilterIntent::ClearAll);
    }
    for raw in &args.levels {
        let level = LogLevel::parse(raw).ok_or_else(|| anyhow!("unknown level '{raw}'"))?;
        intents.push(FilterIntent::Toggle {
            dimension: FilterDimension::Level,
            value: level.as_str().to_string(),
        });
    }
    let free_form = [
        (FilterDimension::Environment, &args.environments),
        (FilterDimension::Hostname, &args.hostnames),
    ];
    for (dimension, values) in free_form {
        intents.extend(values.iter().map(|value| FilterIntent::Toggle {
            dimension,
            value: value.clone(),
        }));
    }
    if let Some(text) = &args.search {
        intents.push(FilterIntent::SetSearchText(text.clone()));
    }
    if let Some(raw) = &args.time_range {
        let range = TimeRange::parse(raw).ok_or_else(|| anyhow!("unknown time range '{raw}'"))?;
        intents.push(FilterIntent::SetTimeRange(range));
    }
    if args.start.is_some() || args.end.is_some() {
        intents.push(FilterIntent::SetCustomRange {
            start: args.start,
            end: args.end,
        });
    }
    if let Some(page) = args.page {
        intents.push(FilterIntent::SetPage(page));
    }
    Ok(intents)
}

async fn wait_for_completion(events: &mut broadcast::Receiver<SearchEvent>) -> Result<()> {
    loop {
        match events.recv().await {
            Ok(SearchEvent::ResultsReplaced { .. } | SearchEvent::Failed { .. }) => return Ok(()),
            Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => {
                bail!("search orchestrator stopped before the search completed")
            }
        }
    }
}

fn print_view(view: &ViewState, query: &str) {
    match view.display() {
        LogsDisplay::Loading => println!("Loading logs..."),
        LogsDisplay::Error => {
            println!("{}", view.error.as_deref().unwrap_or("Failed to load logs"));
            println!("Run the search again to reload logs.");
        }
        LogsDisplay::Empty => println!("No logs match the current filters."),
        LogsDisplay::Results => {
            if let Some(error) = &view.error {
                println!("warning: {error}");
            }
            for log in &view.logs {
                println!(
                    "{:>13}  {:<8}  {:<12}  {}",
                    log.timestamp,
                    log.level,
                    log.hostname.as_deref().unwrap_or("-"),
                    log.message
                );
            }
        }
    }

    let Some(pagination) = view.pagination else {
        return;
    };
    let controls: Vec<String> = page_items(pagination.page, pagination.total_pages)
        .into_iter()
        .map(|item| match item {
            PageItem::Page(page) if page == pagination.page => format!("[{page}]"),
            PageItem::Page(page) => page.to_string(),
            PageItem::Ellipsis => "...".to_string(),
        })
        .collect();
    println!();
    println!(
        "{} logs, page {} of {}: {}",
        pagination.total,
        pagination.page,
        pagination.total_pages,
        controls.join(" ")
    );
    if pagination.page < pagination.total_pages {
        println!("next: {}", page_href(query, pagination.page + 1));
    }
    println!("share: ?{query}");
    if let Some(line) = active_filters_line(query) {
        println!("{line}");
    }
}

fn active_filters_line(query: &str) -> Option<String> {
    let filters = FilterState::from_query(query);
    if !filters.has_active_filters() {
        return None;
    }
    let count = filters.active_filter_count();
    let noun = if count == 1 { "filter" } else { "filters" };
    Some(format!("{count} active {noun}; pass --clear to reset"))
}

async fn list_environments(backend: Arc<dyn LogSearchBackend>, project_id: ProjectId) -> Result<()> {
    let filter = EnvironmentFilter::new(backend, project_id);
    match filter.open().await {
        EnvironmentFilterState::Loaded(options) if options.is_empty() => {
            println!("No environments reported yet.");
        }
        EnvironmentFilterState::Loaded(options) => {
            for option in options {
                println!("{:<24} {}", option.value, option.count);
            }
        }
        EnvironmentFilterState::Failed(message) => bail!(message),
        EnvironmentFilterState::NotLoaded => bail!("environment list was not loaded"),
    }
    Ok(())
}

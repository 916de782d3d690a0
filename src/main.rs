use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{ArgGroup, Parser};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use rtv::controller::Controller;
use rtv::domain::{ExplorerConfig, ExplorerError};
use rtv::logging::{default_log_file, init_logging};
use rtv::model::{FetchResponse, Model, Status};
use rtv::notation::SvarNotation;
use rtv::prefs::{FileKeyValueStore, KeyValueStore, MemoryKeyValueStore};
use rtv::query::QueryGateway;
use rtv::record::OrderSpec;
use rtv::render::TableRenderer;
use rtv::schema::{ColumnDef, TableSchema};
use rtv::store::{MemoryStore, RestStore, RowStore};
use rtv::ui::TableUI;
use rtv::view::TableView;

#[derive(Parser, Debug)]
#[command(
    name = "rtv",
    version,
    about = "Browse, search and filter raag tables in the terminal"
)]
#[command(group(ArgGroup::new("source").required(true).args(["url", "fixture"])))]
struct Args {
    /// Table to show.
    table: String,

    /// Base url of a PostgREST style row store.
    #[arg(long, env = "RTV_STORE_URL")]
    url: Option<String>,

    /// JSON file of the form {"table": [records...]} to browse offline.
    #[arg(long, value_name = "PATH")]
    fixture: Option<PathBuf>,

    /// Api key sent to the row store.
    #[arg(long, env = "RTV_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Declared columns as name[:kind][!], comma separated. A trailing `!`
    /// makes the column unsortable. Inferred from the first row when absent.
    #[arg(long, value_delimiter = ',')]
    columns: Vec<ColumnDef>,

    /// Server side order as column[:asc|desc].
    #[arg(long)]
    order: Option<OrderSpec>,

    /// Notation used when none was saved yet.
    #[arg(long)]
    notation: Option<String>,

    /// Preference file. Defaults to <config dir>/rtv/preferences.json.
    #[arg(long, value_name = "PATH")]
    prefs: Option<String>,

    /// Log file. Defaults to <cache dir>/rtv/rtv.log.
    #[arg(long, value_name = "PATH")]
    log_file: Option<String>,

    #[arg(long, default_value_t = 100)]
    event_poll_time: u64,

    #[arg(long, default_value_t = 40)]
    max_column_width: usize,
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(args) {
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
    }
}

fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).as_ref())
}

fn open_store(args: &Args) -> Result<Arc<dyn RowStore>, ExplorerError> {
    match (&args.url, &args.fixture) {
        (Some(url), _) => Ok(Arc::new(RestStore::new(url.as_str(), args.api_key.as_deref())?)),
        (None, Some(path)) => Ok(Arc::new(MemoryStore::from_json_file(path)?)),
        (None, None) => Err(ExplorerError::Config(
            "either --url or --fixture is required".to_string(),
        )),
    }
}

fn open_prefs(path: Option<&str>) -> Box<dyn KeyValueStore> {
    let path = path.map(expand_path).or_else(|| {
        dirs::config_dir().map(|dir| dir.join("rtv").join("preferences.json"))
    });
    let Some(path) = path else {
        warn!("No config dir, preferences are kept in memory only");
        return Box::new(MemoryKeyValueStore::new());
    };
    match FileKeyValueStore::open(&path) {
        Ok(store) => {
            info!("Preferences in {}", store.path().display());
            Box::new(store)
        }
        Err(e) => {
            warn!("Could not open preferences {}: {e}", path.display());
            Box::new(MemoryKeyValueStore::new())
        }
    }
}

fn run(args: Args) -> Result<(), ExplorerError> {
    let log_file = args
        .log_file
        .as_deref()
        .map(expand_path)
        .unwrap_or_else(default_log_file);
    init_logging(&log_file)?;

    let mut cfg = ExplorerConfig::default()
        .with_event_poll_time(args.event_poll_time)
        .with_max_column_width(args.max_column_width);
    if let Some(notation) = &args.notation {
        cfg = cfg.with_default_notation(notation.clone());
    }
    info!("Starting rtv on {} with {cfg:?}", args.table);

    let gateway = QueryGateway::new(open_store(&args)?);
    info!("Reading rows from {}", gateway.store_name());
    let schema = (!args.columns.is_empty()).then(|| TableSchema::declare(args.columns.clone()));
    let view = TableView::initialize(
        args.table.clone(),
        open_prefs(args.prefs.as_deref()),
        TableRenderer::new(Arc::new(SvarNotation)),
        schema,
        &cfg.default_notation,
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let mut terminal = ratatui::init();
    let result = terminal.size().map_err(ExplorerError::from).and_then(|size| {
        let model = Model::init(
            &cfg,
            view,
            args.order.clone(),
            size.width as usize,
            size.height as usize,
        );
        event_loop(model, &cfg, &gateway, &runtime, &mut terminal)
    });
    ratatui::restore();
    info!("Stopped rtv");
    result
}

fn event_loop(
    mut model: Model,
    cfg: &ExplorerConfig,
    gateway: &QueryGateway,
    runtime: &tokio::runtime::Runtime,
    terminal: &mut ratatui::DefaultTerminal,
) -> Result<(), ExplorerError> {
    let ui = TableUI::new(cfg);
    let controller = Controller::new(cfg);
    let (tx, mut rx) = mpsc::unbounded_channel::<FetchResponse>();

    while model.status != Status::Quitting {
        if let Some(request) = model.take_fetch_request() {
            let tx = tx.clone();
            let gateway = gateway.clone();
            runtime.spawn(async move {
                let id = request.id;
                if tx.send(request.run(gateway).await).is_err() {
                    debug!("Fetch #{id} finished after shutdown");
                }
            });
        }
        while let Ok(response) = rx.try_recv() {
            model.apply_fetch(response);
        }

        terminal.draw(|f| ui.draw(&model, f))?;

        let message = controller.handle_event(&model)?;
        model.update(message);
    }
    Ok(())
}

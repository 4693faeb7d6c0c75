use anyhow::{bail, Context, Result};
use chrono::Local;
use clap::Parser;
use painel_vigilancia::{
    export::{ExportFormat, ExportStatus},
    filter::FilterRequest,
    pages::{run_page, PageRun},
    PageKind, Settings, SheetLoader,
};
use std::{fs, path::PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "painel-report")]
#[command(about = "Render one dashboard page to JSON, optionally writing its downloads")]
struct Args {
    /// Page slug: dengue, saude-trabalhador, visa, pce or oropouche
    #[arg(short, long)]
    page: String,

    /// YAML settings file (defaults to $PAINEL_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Filter as key=value; repeat for several values or keys
    #[arg(short, long = "filter", value_parser = parse_key_val)]
    filters: Vec<(String, String)>,

    /// Write the filtered data as CSV
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Write the filtered data as an XLSX workbook
    #[arg(long)]
    xlsx: Option<PathBuf>,
}

fn parse_key_val(s: &str) -> Result<(String, String), String> {
    let (k, v) = s
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got `{s}`"))?;
    Ok((k.trim().to_string(), v.trim().to_string()))
}

fn write_download(
    kind: PageKind,
    run: &PageRun,
    format: ExportFormat,
    path: &PathBuf,
    bom: bool,
) -> Result<()> {
    if !kind.offers(format) {
        warn!(
            page = kind.slug(),
            path = %path.display(),
            "{} download is not offered for this page",
            format.extension()
        );
        return Ok(());
    }
    match run.export(format, bom) {
        (Some(bytes), _) => {
            fs::write(path, &bytes).with_context(|| format!("writing {}", path.display()))?;
            info!(path = %path.display(), bytes = bytes.len(), "wrote {}", format.extension());
        }
        (None, ExportStatus::Unavailable { reason, .. }) => {
            warn!(path = %path.display(), %reason, "download not available");
        }
        (None, _) => warn!(path = %path.display(), "download not available"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let settings = Settings::load(args.config.as_deref())?;

    // Logs go to stderr so stdout stays valid JSON.
    let env = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.log_level));
    fmt()
        .with_env_filter(env)
        .with_writer(std::io::stderr)
        .init();

    let Some(kind) = PageKind::from_slug(&args.page) else {
        bail!("unknown page `{}`", args.page);
    };
    let loader = SheetLoader::http(settings.request_timeout(), settings.cache_ttl())?;
    let request = FilterRequest::from_query_pairs(args.filters);
    let today = Local::now().date_naive();

    let run = run_page(kind, &loader, &settings, &request, today).await?;
    info!(
        total = run.report.total_rows,
        filtered = run.report.filtered_rows,
        "page rendered"
    );

    if let Some(path) = &args.csv {
        write_download(kind, &run, ExportFormat::Csv, path, settings.csv_bom)?;
    }
    if let Some(path) = &args.xlsx {
        write_download(kind, &run, ExportFormat::Xlsx, path, settings.csv_bom)?;
    }

    println!("{}", serde_json::to_string_pretty(&run.report)?);
    Ok(())
}

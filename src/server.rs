// src/server.rs
//! Stateless HTTP surface. Every request reloads the sheet through the cache
//! and re-derives the filtered view from its query string.

use chrono::{Local, NaiveDate};
use serde::Serialize;
use std::{convert::Infallible, sync::Arc};
use tracing::{error, info, warn};
use warp::{
    http::{
        header::{CONTENT_DISPOSITION, CONTENT_TYPE},
        StatusCode,
    },
    reject::Rejection,
    reply::{Reply, Response},
    Filter,
};

use crate::config::Settings;
use crate::error::PageError;
use crate::export::{ExportFormat, ExportStatus, UNAVAILABLE_NOTICE};
use crate::fetch::SheetLoader;
use crate::filter::FilterRequest;
use crate::pages::{catalog, run_page, PageKind};
use crate::report::EMPTY_NOTICE;

/// Shared by every handler.
pub struct AppState {
    pub loader: SheetLoader,
    pub settings: Settings,
    fixed_today: Option<NaiveDate>,
}

impl AppState {
    pub fn new(loader: SheetLoader, settings: Settings) -> Self {
        Self {
            loader,
            settings,
            fixed_today: None,
        }
    }

    /// Pin the date used for the current-year default.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.fixed_today = Some(today);
        self
    }

    fn today(&self) -> NaiveDate {
        self.fixed_today
            .unwrap_or_else(|| Local::now().date_naive())
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    details: Option<String>,
}

fn error_reply(status: StatusCode, error: &str, details: Option<String>) -> Response {
    let body = warp::reply::json(&ErrorResponse {
        error: error.to_string(),
        details,
    });
    warp::reply::with_status(body, status).into_response()
}

fn page_error(kind: PageKind, err: PageError) -> Response {
    match err {
        PageError::Load(e) => {
            warn!(page = kind.slug(), error = %e, "sheet load failed");
            error_reply(
                StatusCode::BAD_GATEWAY,
                "Erro ao carregar a planilha",
                Some(e.to_string()),
            )
        }
        PageError::Internal(e) => {
            error!(page = kind.slug(), error = ?e, "page pipeline failed");
            error_reply(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Erro ao processar a página",
                Some(format!("{e:#}")),
            )
        }
    }
}

fn unknown_page(slug: &str) -> Response {
    error_reply(
        StatusCode::NOT_FOUND,
        "Página não encontrada",
        Some(slug.to_string()),
    )
}

/// `export.csv` → Csv, `export.xlsx` → Xlsx.
fn export_format(segment: &str) -> Option<ExportFormat> {
    match segment.strip_prefix("export.")? {
        "csv" => Some(ExportFormat::Csv),
        "xlsx" => Some(ExportFormat::Xlsx),
        _ => None,
    }
}

async fn health_check() -> Result<impl Reply, Rejection> {
    Ok(warp::reply::json(&serde_json::json!({
        "status": "healthy",
        "service": "painel-vigilancia"
    })))
}

async fn home() -> Result<impl Reply, Rejection> {
    Ok(warp::reply::json(&catalog()))
}

async fn page_report(
    slug: String,
    query: Vec<(String, String)>,
    state: Arc<AppState>,
) -> Result<Response, Rejection> {
    let Some(kind) = PageKind::from_slug(&slug) else {
        return Ok(unknown_page(&slug));
    };
    let request = FilterRequest::from_query_pairs(query);
    match run_page(kind, &state.loader, &state.settings, &request, state.today()).await {
        Ok(run) => Ok(warp::reply::json(&run.report).into_response()),
        Err(e) => Ok(page_error(kind, e)),
    }
}

async fn page_export(
    slug: String,
    file: String,
    query: Vec<(String, String)>,
    state: Arc<AppState>,
) -> Result<Response, Rejection> {
    let (Some(kind), Some(format)) = (PageKind::from_slug(&slug), export_format(&file)) else {
        return Ok(unknown_page(&format!("{slug}/{file}")));
    };
    if !kind.offers(format) {
        return Ok(error_reply(
            StatusCode::SERVICE_UNAVAILABLE,
            UNAVAILABLE_NOTICE,
            Some(format!("{} não é oferecido nesta página", format.extension())),
        ));
    }

    let request = FilterRequest::from_query_pairs(query);
    let run = match run_page(kind, &state.loader, &state.settings, &request, state.today()).await {
        Ok(run) => run,
        Err(e) => return Ok(page_error(kind, e)),
    };
    if run.report.is_empty() {
        return Ok(error_reply(StatusCode::NOT_FOUND, EMPTY_NOTICE, None));
    }

    match run.export(format, state.settings.csv_bom) {
        (Some(bytes), _) => {
            info!(page = kind.slug(), bytes = bytes.len(), "serving {}", format.extension());
            let disposition = format!("attachment; filename=\"{}\"", run.file_name(format));
            let reply = warp::reply::with_header(bytes, CONTENT_TYPE, format.content_type());
            Ok(warp::reply::with_header(reply, CONTENT_DISPOSITION, disposition).into_response())
        }
        (None, status) => {
            let reason = match status {
                ExportStatus::Unavailable { reason, .. } => Some(reason),
                ExportStatus::Available { .. } => None,
            };
            Ok(error_reply(
                StatusCode::SERVICE_UNAVAILABLE,
                UNAVAILABLE_NOTICE,
                reason,
            ))
        }
    }
}

fn with_state(
    state: Arc<AppState>,
) -> impl Filter<Extract = (Arc<AppState>,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

/// All routes of the service.
pub fn routes(
    state: Arc<AppState>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let health = warp::path("health")
        .and(warp::path::end())
        .and(warp::get())
        .and_then(health_check);

    let home = warp::path::end().and(warp::get()).and_then(home);

    let report = warp::path!("pages" / String)
        .and(warp::get())
        .and(warp::query::<Vec<(String, String)>>())
        .and(with_state(state.clone()))
        .and_then(page_report);

    let export = warp::path!("pages" / String / String)
        .and(warp::get())
        .and(warp::query::<Vec<(String, String)>>())
        .and(with_state(state))
        .and_then(page_export);

    health.or(home).or(report).or(export)
}

/// Bind and serve until the process is stopped.
pub async fn serve(state: AppState) {
    let bind = state.settings.bind;
    info!("Server starting on {}", bind);
    info!("Health check: http://{}/health", bind);
    warp::serve(routes(Arc::new(state))).run(bind).await;
}

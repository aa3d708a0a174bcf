use std::{process, sync::Arc};

use dojo_sync::{
    application::{
        coordinator::{DataLayer, FetchOptions},
        error::{AppError, FetchError},
        request::RequestState,
        transport::TransportError,
    },
    cache::EntityCache,
    config::{self, Command, GamesArgs, Settings},
    infra::{
        connectivity::ConnectivityFlag,
        http::{HttpTransport, StaticToken},
        telemetry,
    },
};
use serde::Serialize;
use serde_json::json;
use tracing::{Dispatch, Level, debug, dispatcher, error};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(error.exit_code());
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt()
        .with_writer(std::io::stderr)
        .with_max_level(Level::ERROR)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;
    telemetry::init(&settings.logging)?;

    let layer = build_data_layer(&settings)?;
    match cli_args.command {
        Command::Users => {
            let mut users = layer.users();
            let loaded = users.load().await;
            finish(loaded.data, &loaded.request)
        }
        Command::User { username } => {
            let mut user = layer.user(username.clone());
            let loaded = user.load().await;
            let found = settled_one(&loaded.request, loaded.data, "user", username)?;
            print_json(&found)
        }
        Command::Scoreboard { cohort } => {
            let mut scoreboard = layer.scoreboard(cohort);
            let loaded = scoreboard.load().await;
            finish(loaded.data, &loaded.request)
        }
        Command::Games(args) => run_games(&layer, &settings, args).await,
        Command::Clubs => {
            let mut clubs = layer.clubs();
            let loaded = clubs.load().await;
            finish(loaded.data, &loaded.request)
        }
        Command::Club { id } => {
            let mut club = layer.club(id.clone());
            let loaded = club.load().await;
            let found = settled_one(&loaded.request, loaded.data, "club", id)?;
            print_json(&found)
        }
    }
}

fn build_data_layer(settings: &Settings) -> Result<DataLayer, AppError> {
    let connectivity = ConnectivityFlag::default();
    let transport = HttpTransport::new(
        settings.api.base_url.clone(),
        settings.api.timeout,
        Arc::new(StaticToken::new(settings.api.token.clone())),
        connectivity.clone(),
    )?;
    debug!(base_url = %settings.api.base_url, "API transport ready");

    let options = FetchOptions {
        max_pages: settings.fetch.max_pages.get(),
    };
    Ok(DataLayer::new(
        Arc::new(EntityCache::new()),
        Arc::new(transport),
        Arc::new(connectivity),
    )
    .with_options(options))
}

async fn run_games(
    layer: &DataLayer,
    settings: &Settings,
    args: GamesArgs,
) -> Result<(), AppError> {
    let page_size = args
        .page_size
        .unwrap_or(settings.fetch.page_size.get() as usize);
    let mut paginator = layer.game_pages(args.cohort, args.page, page_size);
    paginator.sync().await;

    settled(paginator.request(), ())?;
    print_json(&json!({
        "page": paginator.page(),
        "pageSize": paginator.page_size(),
        "rowCount": paginator.row_count(),
        "exhausted": paginator.is_exhausted(),
        "items": paginator.page_items(),
    }))
}

fn finish<T: Serialize>(data: T, request: &RequestState) -> Result<(), AppError> {
    let data = settled(request, data)?;
    print_json(&data)
}

/// Surface a failed request as the command's error; otherwise pass the data through.
fn settled<T>(request: &RequestState, data: T) -> Result<T, AppError> {
    match request.error() {
        Some(error) => Err(AppError::from(error.clone())),
        None => Ok(data),
    }
}

/// Like [`settled`], for single-entity lookups where a 404 means "no such entity".
fn settled_one<T>(
    request: &RequestState,
    data: Option<T>,
    entity: &'static str,
    id: String,
) -> Result<T, AppError> {
    match request.error() {
        Some(FetchError::Transport(TransportError::Status { status: 404, .. })) => {
            Err(AppError::not_found(entity, id))
        }
        Some(error) => Err(AppError::from(error.clone())),
        None => data.ok_or_else(|| AppError::not_found(entity, id)),
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), AppError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

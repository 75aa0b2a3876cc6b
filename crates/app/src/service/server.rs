//! Actix Web points service.
//!
//! The server runs on a dedicated thread with its own Actix system so the
//! caller keeps a plain blocking handle it can stop. Every mutation of a
//! user's points happens under that user's record lock inside
//! [`MemoryRepository`], which keeps concurrent clients from losing updates.

use std::{
    io,
    net::SocketAddr,
    sync::{Arc, mpsc},
    thread,
    time::{Duration, Instant},
};

use actix_web::{
    App, HttpResponse, HttpServer,
    dev::Service as _,
    http::{Method, header},
    middleware::DefaultHeaders,
    web::{self, Bytes},
};
use anyhow::{Context, Result};
use async_stream::stream;
use geo_core::{Coordinate, GeoError, UserKey};
use point_repo::{
    MemoryRepository, PersistenceError, PointRecord, PointRepository,
    wire::{ErrorResponse, SaveResponse, UpdatePointsRequest},
};
use serde::Deserialize;
use serde_json::to_string;
use tokio::sync::oneshot;
use tracing::{error, info, warn};

use crate::{
    service::{ServeConfig, data::BoundsResponse},
    telemetry,
};

/// Shared state backing HTTP handlers.
pub(crate) struct ServiceState {
    pub(crate) repository: Arc<MemoryRepository>,
    pub(crate) stream_interval: Duration,
}

/// Handle for the points service thread.
pub(crate) struct PointsService {
    local_addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl PointsService {
    pub(crate) fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub(crate) fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Signal the server to stop and block until the thread exits.
    pub(crate) fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

#[derive(Deserialize)]
struct UserQuery {
    user: Option<String>,
}

impl UserQuery {
    fn key(&self) -> Result<UserKey, HttpResponse> {
        match self.user.as_deref() {
            None => Err(error_response(
                HttpResponse::BadRequest(),
                "missing `user` query parameter",
            )),
            Some(raw) => UserKey::new(raw)
                .map_err(|err| error_response(HttpResponse::BadRequest(), err.to_string())),
        }
    }
}

/// Run `geomark serve` until Ctrl+C or until the server thread exits.
pub fn run(config: ServeConfig) -> Result<()> {
    let _telemetry_guard = telemetry::enter_runtime(&config.telemetry);
    let _ = telemetry::init_metrics_recorder();

    let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
    ctrlc::set_handler(move || {
        let _ = stop_tx.try_send(());
    })
    .context("Failed to install Ctrl+C handler")?;

    let repository = Arc::new(MemoryRepository::new());
    let service = spawn_points_service(&config, repository)?;
    info!(
        "points service listening on http://{} ({} workers)",
        service.local_addr(),
        config.workers
    );

    while service.is_running() {
        if stop_rx.recv_timeout(Duration::from_millis(500)).is_ok() {
            info!("shutdown requested; stopping points service");
            break;
        }
    }
    service.stop();
    Ok(())
}

/// Spawn the service thread and wait until the listener is bound.
pub(crate) fn spawn_points_service(
    config: &ServeConfig,
    repository: Arc<MemoryRepository>,
) -> Result<PointsService> {
    let state = web::Data::new(ServiceState {
        repository,
        stream_interval: config.stream_interval,
    });
    let bind_addr = (config.bind.clone(), config.port);
    let workers = config.workers;
    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let (ready_tx, ready_rx) = mpsc::channel::<io::Result<SocketAddr>>();

    let handle = thread::Builder::new()
        .name("points-service".into())
        .spawn(move || {
            if let Err(err) = actix_web::rt::System::new().block_on(async move {
                let server = HttpServer::new(move || {
                    App::new()
                        .app_data(state.clone())
                        .app_data(json_config())
                        .wrap(cors_headers())
                        .wrap_fn(|req, srv| {
                            info!("{} {}", req.method(), req.path());
                            srv.call(req)
                        })
                        .configure(routes)
                })
                .workers(workers)
                .shutdown_timeout(5)
                .bind(bind_addr);
                let server = match server {
                    Ok(server) => server,
                    Err(err) => {
                        let _ = ready_tx.send(Err(err));
                        return Ok(());
                    }
                };
                let local_addr = server.addrs().first().copied().ok_or_else(|| {
                    io::Error::new(io::ErrorKind::AddrNotAvailable, "no listener bound")
                });

                let server = server.run();
                let srv_handle = server.handle();
                actix_web::rt::spawn(async move {
                    let _ = shutdown_rx.await;
                    srv_handle.stop(true).await;
                });

                let _ = ready_tx.send(local_addr);
                server.await
            }) {
                error!("HTTP server error: {err}");
            }
        })
        .context("Failed to spawn points service thread")?;

    let local_addr = ready_rx
        .recv()
        .context("Points service thread exited before binding")?
        .context("Failed to bind points service")?;

    Ok(PointsService {
        local_addr,
        shutdown: Some(shutdown_tx),
        handle: Some(handle),
    })
}

/// Register every route of the service.
pub(crate) fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/api/points")
            .route(web::get().to(get_points_handler))
            .route(web::post().to(save_points_handler))
            .route(web::method(Method::OPTIONS).to(preflight_handler)),
    )
    .service(
        web::resource("/api/points/add")
            .route(web::post().to(add_point_handler))
            .route(web::method(Method::OPTIONS).to(preflight_handler)),
    )
    .service(
        web::resource("/api/points/{index}")
            .route(web::delete().to(delete_point_handler))
            .route(web::method(Method::OPTIONS).to(preflight_handler)),
    )
    .service(
        web::resource("/api/bounds")
            .route(web::get().to(bounds_handler))
            .route(web::method(Method::OPTIONS).to(preflight_handler)),
    )
    .route("/api/bounds/stream", web::get().to(stream_bounds_handler))
    .route("/metrics", web::get().to(metrics_handler));
}

/// JSON extractor config: malformed or out-of-range bodies answer 422.
pub(crate) fn json_config() -> web::JsonConfig {
    web::JsonConfig::default()
        .limit(1 << 20)
        .error_handler(|err, _req| {
            let response = error_response(HttpResponse::UnprocessableEntity(), err.to_string());
            actix_web::error::InternalError::from_response(err, response).into()
        })
}

fn cors_headers() -> DefaultHeaders {
    DefaultHeaders::new()
        .add((header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"))
        .add((header::ACCESS_CONTROL_ALLOW_HEADERS, "*"))
        .add((
            header::ACCESS_CONTROL_ALLOW_METHODS,
            "GET, POST, DELETE, OPTIONS",
        ))
}

fn error_response(
    mut builder: actix_web::HttpResponseBuilder,
    message: impl Into<String>,
) -> HttpResponse {
    builder.json(ErrorResponse {
        error: message.into(),
    })
}

fn persistence_error_response(user: &UserKey, err: PersistenceError) -> HttpResponse {
    let kind = match &err {
        PersistenceError::Invalid(geo) => geo.kind(),
        other => other.kind(),
    };
    metrics::counter!("geomark_rejections_total", "kind" => kind).increment(1);
    warn!("request for {user} rejected ({kind}): {err}");
    let builder = match &err {
        PersistenceError::Invalid(GeoError::IndexOutOfRange { .. }) => HttpResponse::NotFound(),
        PersistenceError::Invalid(_) => HttpResponse::UnprocessableEntity(),
        _ => HttpResponse::InternalServerError(),
    };
    error_response(builder, err.to_string())
}

/// Apply one mutation under the user's lock and answer with the new bounds.
fn mutate_and_report<F>(
    state: &ServiceState,
    user: &UserKey,
    kind: &'static str,
    mutate: F,
) -> HttpResponse
where
    F: FnOnce(&mut geo_core::PointStore) -> Result<(), GeoError>,
{
    let span = tracing::info_span!("points.mutation", user = %user, kind);
    let _span_guard = span.enter();
    let started = Instant::now();
    match state.repository.mutate(user, mutate) {
        Ok(record) => {
            metrics::counter!("geomark_mutations_total", "kind" => kind).increment(1);
            metrics::gauge!("geomark_stored_users").set(state.repository.user_count() as f64);
            metrics::histogram!("geomark_mutation_seconds", "kind" => kind)
                .record(started.elapsed().as_secs_f64());
            info!(
                "{kind} for {user}: {} points, revision {}",
                record.points.len(),
                record.revision
            );
            HttpResponse::Ok().json(BoundsResponse::new(user.as_str(), &record))
        }
        Err(err) => persistence_error_response(user, err),
    }
}

/// Return the user's full point list; unknown users get `[]`.
async fn get_points_handler(
    query: web::Query<UserQuery>,
    state: web::Data<ServiceState>,
) -> HttpResponse {
    let user = match query.key() {
        Ok(user) => user,
        Err(response) => return response,
    };
    match state.repository.load(&user) {
        Ok(points) => HttpResponse::Ok().json(points),
        Err(err) => persistence_error_response(&user, err),
    }
}

/// Overwrite the user's point list with `updatedPoints`.
async fn save_points_handler(
    query: web::Query<UserQuery>,
    body: web::Json<UpdatePointsRequest>,
    state: web::Data<ServiceState>,
) -> HttpResponse {
    let user = match query.key() {
        Ok(user) => user,
        Err(response) => return response,
    };
    let UpdatePointsRequest { updated_points } = body.into_inner();
    let span = tracing::info_span!("points.mutation", user = %user, kind = "replace");
    let _span_guard = span.enter();
    match state
        .repository
        .mutate(&user, |store| store.replace(updated_points).map(|_| ()))
    {
        Ok(record) => {
            metrics::counter!("geomark_mutations_total", "kind" => "replace").increment(1);
            metrics::gauge!("geomark_stored_users").set(state.repository.user_count() as f64);
            info!(
                "replaced points for {user}: {} points, revision {}",
                record.points.len(),
                record.revision
            );
            HttpResponse::Ok().json(SaveResponse { success: true })
        }
        Err(err) => persistence_error_response(&user, err),
    }
}

/// Append one `[lon, lat]` point.
async fn add_point_handler(
    query: web::Query<UserQuery>,
    body: web::Json<Coordinate>,
    state: web::Data<ServiceState>,
) -> HttpResponse {
    let user = match query.key() {
        Ok(user) => user,
        Err(response) => return response,
    };
    let coordinate = body.into_inner();
    mutate_and_report(&state, &user, "add", |store| {
        store.add(coordinate).map(|_| ())
    })
}

/// Remove the point at `index`; later points shift down.
async fn delete_point_handler(
    query: web::Query<UserQuery>,
    path: web::Path<usize>,
    state: web::Data<ServiceState>,
) -> HttpResponse {
    let user = match query.key() {
        Ok(user) => user,
        Err(response) => return response,
    };
    let index = path.into_inner();
    mutate_and_report(&state, &user, "remove", |store| {
        store.remove_at(index).map(|_| ())
    })
}

/// Bounds report for the user's stored points.
async fn bounds_handler(
    query: web::Query<UserQuery>,
    state: web::Data<ServiceState>,
) -> HttpResponse {
    let user = match query.key() {
        Ok(user) => user,
        Err(response) => return response,
    };
    match state.repository.snapshot(&user) {
        Ok(record) => HttpResponse::Ok().json(BoundsResponse::new(user.as_str(), &record)),
        Err(err) => persistence_error_response(&user, err),
    }
}

async fn preflight_handler() -> HttpResponse {
    HttpResponse::NoContent().finish()
}

/// Stream bounds reports as Server-Sent Events whenever the revision changes.
async fn stream_bounds_handler(
    query: web::Query<UserQuery>,
    state: web::Data<ServiceState>,
) -> HttpResponse {
    let user = match query.key() {
        Ok(user) => user,
        Err(response) => return response,
    };
    let state = state.clone();
    let stream = stream! {
        yield Ok::<Bytes, actix_web::Error>(Bytes::from_static(b"retry: 500\n\n"));
        let mut interval = actix_web::rt::time::interval(state.stream_interval);
        let mut last_revision: Option<u64> = None;
        loop {
            interval.tick().await;
            let record: PointRecord = match state.repository.snapshot(&user) {
                Ok(record) => record,
                Err(err) => {
                    let error_chunk = format!("event: error\ndata: {}\n\n", err);
                    yield Ok::<Bytes, actix_web::Error>(Bytes::from(error_chunk));
                    break;
                }
            };
            if last_revision == Some(record.revision) {
                yield Ok::<Bytes, actix_web::Error>(Bytes::from_static(b": keep-alive\n\n"));
                continue;
            }
            last_revision = Some(record.revision);
            match to_string(&BoundsResponse::new(user.as_str(), &record)) {
                Ok(json) => {
                    let mut sse_chunk = String::with_capacity(json.len() + 32);
                    sse_chunk.push_str("id: ");
                    sse_chunk.push_str(&record.revision.to_string());
                    sse_chunk.push('\n');
                    sse_chunk.push_str("data: ");
                    sse_chunk.push_str(&json);
                    sse_chunk.push_str("\n\n");
                    yield Ok::<Bytes, actix_web::Error>(Bytes::from(sse_chunk));
                }
                Err(err) => {
                    let error_chunk = format!("event: error\ndata: {}\n\n", err);
                    yield Ok::<Bytes, actix_web::Error>(Bytes::from(error_chunk));
                }
            }
        }
    };

    HttpResponse::Ok()
        .insert_header((header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"))
        .insert_header((header::ACCESS_CONTROL_EXPOSE_HEADERS, "Content-Type"))
        .append_header(("Cache-Control", "no-cache"))
        .append_header(("Content-Type", "text/event-stream"))
        .append_header(("Connection", "keep-alive"))
        .streaming(stream)
}

/// Prometheus exposition of the service metrics.
async fn metrics_handler() -> HttpResponse {
    match telemetry::prometheus_handle() {
        Some(handle) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(handle.render()),
        None => HttpResponse::NoContent().finish(),
    }
}

#[cfg(test)]
mod tests {
    use std::{future::poll_fn, pin::Pin};

    use actix_web::{body::MessageBody, http::StatusCode, test};
    use serde_json::{Value, json};

    use super::*;

    fn state() -> web::Data<ServiceState> {
        web::Data::new(ServiceState {
            repository: Arc::new(MemoryRepository::new()),
            stream_interval: Duration::from_millis(10),
        })
    }

    macro_rules! service {
        ($state:expr) => {
            test::init_service(
                App::new()
                    .app_data($state.clone())
                    .app_data(json_config())
                    .wrap(cors_headers())
                    .configure(routes),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn unknown_user_gets_empty_list() {
        let state = state();
        let app = service!(state);
        let req = test::TestRequest::get()
            .uri("/api/points?user=nobody")
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body, json!([]));
    }

    #[actix_web::test]
    async fn missing_user_is_bad_request() {
        let state = state();
        let app = service!(state);
        let req = test::TestRequest::get().uri("/api/points").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn save_then_load_round_trip() {
        let state = state();
        let app = service!(state);
        let req = test::TestRequest::post()
            .uri("/api/points?user=ana")
            .set_json(json!({"updatedPoints": [[15.97799, 45.81299], [-73.5, 40.25]]}))
            .to_request();
        let saved: SaveResponse = test::call_and_read_body_json(&app, req).await;
        assert!(saved.success);

        let req = test::TestRequest::get().uri("/api/points?user=ana").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body, json!([[15.97799, 45.81299], [-73.5, 40.25]]));
    }

    #[actix_web::test]
    async fn out_of_range_save_is_unprocessable() {
        let state = state();
        let app = service!(state);
        let req = test::TestRequest::post()
            .uri("/api/points?user=ana")
            .set_json(json!({"updatedPoints": [[181.0, 0.0]]}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let stored = state.repository.load(&UserKey::new("ana").unwrap()).unwrap();
        assert!(stored.is_empty());
    }

    #[actix_web::test]
    async fn add_and_delete_report_bounds() {
        let state = state();
        let app = service!(state);
        for point in [[-10.0, -5.0], [10.0, 5.0], [0.0, 0.0]] {
            let req = test::TestRequest::post()
                .uri("/api/points/add?user=ana")
                .set_json(json!(point))
                .to_request();
            let resp = test::call_service(&app, req).await;
            assert_eq!(resp.status(), StatusCode::OK);
        }

        let req = test::TestRequest::get().uri("/api/bounds?user=ana").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["revision"], json!(3));
        assert_eq!(body["report"]["bounds"]["west"], json!(-10.0));
        assert_eq!(body["report"]["extremes"]["north"], json!(1));
        let area = body["report"]["area"]["area_square_km"].as_f64().unwrap();
        assert!((area - 1_574_296.296).abs() < 0.01);

        let req = test::TestRequest::delete()
            .uri("/api/points/0?user=ana")
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["points"], json!([[10.0, 5.0], [0.0, 0.0]]));
        assert_eq!(body["report"]["extremes"]["west"], json!(1));
    }

    #[actix_web::test]
    async fn delete_out_of_range_is_not_found() {
        let state = state();
        let app = service!(state);
        let req = test::TestRequest::delete()
            .uri("/api/points/0?user=ana")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let body: ErrorResponse = test::read_body_json(resp).await;
        assert!(body.error.contains("out of range"));
    }

    #[actix_web::test]
    async fn empty_bounds_have_no_polygon() {
        let state = state();
        let app = service!(state);
        let req = test::TestRequest::get().uri("/api/bounds?user=ana").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["polygon"], Value::Null);
        assert_eq!(body["report"]["extremes"]["west"], Value::Null);
        assert_eq!(body["report"]["area"]["percent_of_earth_surface"], json!(0.0));
    }

    #[actix_web::test]
    async fn responses_carry_cors_headers() {
        let state = state();
        let app = service!(state);
        let req = test::TestRequest::default()
            .method(Method::OPTIONS)
            .uri("/api/points?user=ana")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
        assert_eq!(
            resp.headers().get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
            "*"
        );
    }

    #[actix_web::test]
    async fn metrics_without_recorder_is_no_content() {
        let state = state();
        let app = service!(state);
        let req = test::TestRequest::get().uri("/metrics").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    }

    async fn next_chunk<B: MessageBody>(body: &mut Pin<Box<B>>) -> String {
        match poll_fn(|cx| body.as_mut().poll_next(cx)).await {
            Some(Ok(bytes)) => String::from_utf8(bytes.to_vec()).unwrap(),
            Some(Err(_)) => panic!("bounds stream failed"),
            None => panic!("bounds stream ended"),
        }
    }

    #[actix_web::test]
    async fn bounds_stream_emits_on_revision_change() {
        let state = state();
        let user = UserKey::new("ana").unwrap();
        let points = [
            Coordinate::new(-10.0, -5.0).unwrap(),
            Coordinate::new(10.0, 5.0).unwrap(),
        ];
        state.repository.save(&user, &points).unwrap();
        let app = service!(state);
        let req = test::TestRequest::get()
            .uri("/api/bounds/stream?user=ana")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/event-stream"
        );
        let mut body = Box::pin(resp.into_body());

        assert_eq!(next_chunk(&mut body).await, "retry: 500\n\n");

        let first = next_chunk(&mut body).await;
        let data = first
            .strip_prefix("id: 1\ndata: ")
            .and_then(|rest| rest.strip_suffix("\n\n"))
            .unwrap();
        let report: Value = serde_json::from_str(data).unwrap();
        assert_eq!(report["revision"], json!(1));
        assert_eq!(report["report"]["bounds"]["east"], json!(10.0));

        assert_eq!(next_chunk(&mut body).await, ": keep-alive\n\n");

        let far_east = Coordinate::new(20.0, 0.0).unwrap();
        state
            .repository
            .mutate(&user, |store| store.add(far_east).map(|_| ()))
            .unwrap();
        let second = next_chunk(&mut body).await;
        assert!(second.starts_with("id: 2\ndata: "));
        assert!(second.contains("\"east\":20.0"));
    }

    #[actix_web::test]
    async fn bounds_stream_requires_user() {
        let state = state();
        let app = service!(state);
        let req = test::TestRequest::get().uri("/api/bounds/stream").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}

#[cfg(test)]
mod service_thread_tests {
    use point_repo::HttpRepository;

    use super::*;
    use crate::config::TelemetryOptions;

    #[test]
    fn http_repository_round_trips_through_service() {
        let config = ServeConfig {
            bind: "127.0.0.1".into(),
            port: 0,
            workers: 1,
            stream_interval: Duration::from_millis(50),
            telemetry: TelemetryOptions::default(),
        };
        let repository = Arc::new(MemoryRepository::new());
        let service = spawn_points_service(&config, repository.clone()).unwrap();
        let base_url = format!("http://{}", service.local_addr());

        let client = HttpRepository::new(&base_url, Duration::from_secs(5)).unwrap();
        let user = UserKey::new("ana").unwrap();
        assert!(client.load(&user).unwrap().is_empty());

        let points = vec![
            Coordinate::new(1.0, 2.0).unwrap(),
            Coordinate::new(-3.5, 4.25).unwrap(),
        ];
        client.save(&user, &points).unwrap();
        assert_eq!(client.load(&user).unwrap(), points);
        assert_eq!(repository.revision(&user).unwrap(), 1);

        drop(client);
        service.stop();
        let client = HttpRepository::new(&base_url, Duration::from_millis(500)).unwrap();
        assert!(client.load(&user).is_err());
    }
}

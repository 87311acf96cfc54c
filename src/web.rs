//! Backend HTTP service: instance registration, catalog and enrichment.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::{Path, Request, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;
use tower_http::services::ServeFile;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::enrich::{
    EnrichOptions, Enricher, FaceDetector, Geocoder, NominatimGeocoder, ProcessFaceDetector,
    resolve_within,
};
use crate::error::RegistryError;
use crate::events::{CatalogEntry, ClientMessage, InstanceConfig, ServerMessage};
use crate::scan::{catalog_entries, discover_images};

/// Everything a request for one slideshow instance needs.
pub struct InstanceContext {
    pub id: String,
    pub root: PathBuf,
    pub instance: InstanceConfig,
    pub enricher: Enricher,
}

#[derive(Clone)]
pub struct Backend {
    server: Arc<ServerConfig>,
    geocoder: Option<Arc<dyn Geocoder>>,
    detector: Option<Arc<dyn FaceDetector>>,
    instances: Arc<RwLock<HashMap<String, Arc<InstanceContext>>>>,
}

impl Backend {
    /// Backend with the configured geocoder and face detector.
    pub fn new(server: ServerConfig) -> Result<Self> {
        let geocoder = NominatimGeocoder::new(&server.geocoder).context("building geocoder client")?;
        let detector = ProcessFaceDetector::new(&server.face_detector);
        Ok(Self::with_services(
            server,
            Some(Arc::new(geocoder)),
            Some(Arc::new(detector)),
        ))
    }

    pub fn with_services(
        server: ServerConfig,
        geocoder: Option<Arc<dyn Geocoder>>,
        detector: Option<Arc<dyn FaceDetector>>,
    ) -> Self {
        Self {
            server: Arc::new(server),
            geocoder,
            detector,
            instances: Arc::default(),
        }
    }

    /// Resolve the instance root and make its routes live.
    pub async fn register(&self, instance: InstanceConfig) -> Arc<InstanceContext> {
        let root = self.server.resolve_instance_root(&instance.path);
        let options = EnrichOptions {
            exif: instance.show_exif,
            face_detection: instance.face_detection,
            language: instance.language.clone(),
        };
        let detector = if instance.face_detection {
            self.detector.clone()
        } else {
            None
        };
        let ctx = Arc::new(InstanceContext {
            id: instance.id.clone(),
            root,
            enricher: Enricher::new(options, self.geocoder.clone(), detector),
            instance,
        });
        let options = ctx.enricher.options();
        info!(
            id = %ctx.id,
            root = %ctx.root.display(),
            exif = options.exif,
            faces = options.face_detection,
            language = %options.language,
            "instance registered"
        );
        self.instances
            .write()
            .await
            .insert(ctx.id.clone(), ctx.clone());
        ctx
    }

    pub async fn instance(&self, id: &str) -> Result<Arc<InstanceContext>, RegistryError> {
        self.instances
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownInstance(id.to_string()))
    }

    pub async fn handle(&self, message: ClientMessage) -> Result<ServerMessage, RegistryError> {
        match message {
            ClientMessage::Config(instance) => {
                let ctx = self.register(instance).await;
                Ok(ServerMessage::Ready { id: ctx.id.clone() })
            }
            ClientMessage::Metadata { id, photo } => {
                let ctx = self.instance(&id).await?;
                let photo = ctx.enricher.enrich(&ctx.root, photo).await;
                Ok(ServerMessage::Metadata { id, photo })
            }
        }
    }

    pub async fn catalog(&self, id: &str) -> Result<Vec<CatalogEntry>> {
        let ctx = self.instance(id).await?;
        let root = ctx.root.clone();
        let paths = tokio::task::spawn_blocking(move || discover_images(&root))
            .await
            .context("catalog walk panicked")?;
        Ok(catalog_entries(&ctx.id, paths))
    }
}

pub fn router(backend: Backend) -> Router {
    Router::new()
        .route("/notify", post(notify))
        .route("/photos/{id}", get(list_photos))
        .route("/photo/{id}/{*path}", get(serve_photo))
        .layer(TraceLayer::new_for_http())
        .with_state(backend)
}

/// Serve until `cancel` fires.
pub async fn serve(
    backend: Backend,
    bind_address: SocketAddr,
    cancel: CancellationToken,
) -> Result<()> {
    let listener = TcpListener::bind(bind_address)
        .await
        .with_context(|| format!("failed to bind backend listener on {bind_address}"))?;
    info!(addr = %bind_address, "backend listening");
    axum::serve(listener, router(backend))
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await
        .context("backend server exited")?;
    Ok(())
}

async fn notify(
    State(backend): State<Backend>,
    Json(message): Json<ClientMessage>,
) -> Result<Json<ServerMessage>, (StatusCode, String)> {
    backend
        .handle(message)
        .await
        .map(Json)
        .map_err(|err| (StatusCode::NOT_FOUND, err.to_string()))
}

async fn list_photos(
    State(backend): State<Backend>,
    Path(id): Path<String>,
) -> Result<Json<Vec<CatalogEntry>>, (StatusCode, String)> {
    match backend.catalog(&id).await {
        Ok(entries) => Ok(Json(entries)),
        Err(err) if err.downcast_ref::<RegistryError>().is_some() => {
            Err((StatusCode::NOT_FOUND, err.to_string()))
        }
        Err(err) => {
            warn!(id = %id, error = %format!("{err:#}"), "catalog failed");
            Err((StatusCode::INTERNAL_SERVER_ERROR, "catalog failed".to_string()))
        }
    }
}

async fn serve_photo(
    State(backend): State<Backend>,
    Path((id, rel)): Path<(String, String)>,
    request: Request,
) -> Response {
    let file = match backend.instance(&id).await {
        Ok(ctx) => resolve_within(&ctx.root, &rel),
        Err(err) => Err(err),
    };
    let file = match file {
        Ok(file) => file,
        Err(err) => return (StatusCode::NOT_FOUND, err.to_string()).into_response(),
    };
    match ServeFile::new(file).oneshot(request).await {
        Ok(resp) => resp.into_response(),
        Err(never) => match never {},
    }
}

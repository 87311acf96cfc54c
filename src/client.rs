//! Client side of the backend protocol.

use futures::future::BoxFuture;
use reqwest::StatusCode;

use crate::error::CatalogError;
use crate::events::{CatalogEntry, ClientMessage, InstanceConfig, PhotoDescriptor, ServerMessage};
use crate::scan::encode_segment;

/// What the presentation scheduler needs from the backend.
pub trait SlideshowBackend: Send + Sync {
    /// Announce the instance; resolves once the backend reports it ready.
    fn register<'a>(&'a self, instance: &'a InstanceConfig) -> BoxFuture<'a, Result<(), CatalogError>>;

    fn fetch_catalog<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Vec<CatalogEntry>, CatalogError>>;

    /// Enrich one minimal descriptor.
    fn request_metadata<'a>(
        &'a self,
        id: &'a str,
        photo: PhotoDescriptor,
    ) -> BoxFuture<'a, Result<PhotoDescriptor, CatalogError>>;
}

/// [`SlideshowBackend`] over the backend's HTTP routes.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBackend {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn notify(&self, message: &ClientMessage) -> Result<ServerMessage, CatalogError> {
        let resp = self
            .client
            .post(format!("{}/notify", self.base_url))
            .json(message)
            .send()
            .await
            .map_err(unavailable)?;
        check_status(resp.status())?;
        resp.json().await.map_err(unavailable)
    }
}

impl SlideshowBackend for HttpBackend {
    fn register<'a>(&'a self, instance: &'a InstanceConfig) -> BoxFuture<'a, Result<(), CatalogError>> {
        Box::pin(async move {
            match self.notify(&ClientMessage::Config(instance.clone())).await? {
                ServerMessage::Ready { id } if id == instance.id => Ok(()),
                other => Err(CatalogError::Unavailable(format!(
                    "unexpected reply to registration: {other:?}"
                ))),
            }
        })
    }

    fn fetch_catalog<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<Vec<CatalogEntry>, CatalogError>> {
        Box::pin(async move {
            let resp = self
                .client
                .get(format!("{}/photos/{}", self.base_url, encode_segment(id)))
                .send()
                .await
                .map_err(unavailable)?;
            check_status(resp.status())?;
            resp.json().await.map_err(unavailable)
        })
    }

    fn request_metadata<'a>(
        &'a self,
        id: &'a str,
        photo: PhotoDescriptor,
    ) -> BoxFuture<'a, Result<PhotoDescriptor, CatalogError>> {
        Box::pin(async move {
            let message = ClientMessage::Metadata {
                id: id.to_string(),
                photo,
            };
            match self.notify(&message).await? {
                ServerMessage::Metadata { photo, .. } => Ok(photo),
                other => Err(CatalogError::Unavailable(format!(
                    "unexpected reply to metadata request: {other:?}"
                ))),
            }
        })
    }
}

fn check_status(status: StatusCode) -> Result<(), CatalogError> {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Err(CatalogError::Forbidden(status.as_u16()))
        }
        s if s.is_success() => Ok(()),
        s => Err(CatalogError::Unavailable(format!("backend answered {s}"))),
    }
}

fn unavailable(err: reqwest::Error) -> CatalogError {
    CatalogError::Unavailable(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_failures_are_permanent() {
        assert_eq!(
            check_status(StatusCode::FORBIDDEN),
            Err(CatalogError::Forbidden(403))
        );
        assert!(check_status(StatusCode::UNAUTHORIZED).unwrap_err().is_permanent());
        assert!(!check_status(StatusCode::BAD_GATEWAY).unwrap_err().is_permanent());
        assert!(check_status(StatusCode::OK).is_ok());
    }
}

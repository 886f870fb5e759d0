// vedur_exporter - Prometheus metrics exporter for xmlweather.vedur.is
//
// Copyright 2022 Nick Pillitteri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.
//

use crate::client::{ClientError, VedurClient};
use crate::document::{Document, DocumentError, Validity};
use crate::exposition::{self, LabelSet};
use crate::metrics::{ExtractError, Extractor};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use std::error;
use std::fmt;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{Instrument, Level};

const LABEL_STATION: &str = "station";

#[derive(Debug)]
pub enum ObservationError {
    Invalid(String),
    Client(ClientError),
    Document(DocumentError),
    Extract(ExtractError),
}

impl fmt::Display for ObservationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invalid(msg) => write!(f, "invalid station: {}", msg),
            Self::Client(e) => write!(f, "unable to fetch observation: {}", e),
            Self::Document(e) => write!(f, "unable to decode observation: {}", e),
            Self::Extract(e) => write!(f, "unable to extract metrics: {}", e),
        }
    }
}

impl error::Error for ObservationError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match self {
            Self::Invalid(_) => None,
            Self::Client(e) => Some(e),
            Self::Document(e) => Some(e),
            Self::Extract(e) => Some(e),
        }
    }
}

impl From<ClientError> for ObservationError {
    fn from(e: ClientError) -> Self {
        Self::Client(e)
    }
}

impl From<DocumentError> for ObservationError {
    fn from(e: DocumentError) -> Self {
        Self::Document(e)
    }
}

impl From<ExtractError> for ObservationError {
    fn from(e: ExtractError) -> Self {
        Self::Extract(e)
    }
}

/// State shared by every request, nothing in it changes after startup.
#[derive(Debug)]
pub struct RequestContext {
    client: VedurClient,
    extractor: Extractor,
    station_label: bool,
}

impl RequestContext {
    /// Create a new context. When `station_label` is true, every sample is labeled with
    /// the ID of the station reported by the API.
    pub fn new(client: VedurClient, extractor: Extractor, station_label: bool) -> Self {
        RequestContext {
            client,
            extractor,
            station_label,
        }
    }

    /// Fetch the latest observation for a station and render it as Prometheus metrics.
    pub async fn observation(&self, station: &str) -> Result<String, ObservationError> {
        let xml = self
            .client
            .observation(station)
            .instrument(tracing::span!(Level::DEBUG, "vedur_observation"))
            .await?;

        let doc = Document::parse(&xml)?;
        let id = match doc.validity()? {
            Validity::Valid { id } => id,
            Validity::Invalid { message } => return Err(ObservationError::Invalid(message)),
        };

        let metrics = self.extractor.extract(&doc)?;
        let labels = match id {
            Some(id) if self.station_label => LabelSet::new().with(LABEL_STATION, id),
            _ => LabelSet::new(),
        };

        tracing::debug!(
            message = "extracted metrics from observation",
            station = %station,
            num_metrics = metrics.len(),
        );

        Ok(exposition::render(&metrics, &labels))
    }
}

/// Build the router for the `/api/observations/:station` endpoint.
pub fn router(context: Arc<RequestContext>) -> Router {
    Router::new()
        .route("/api/observations/:station", get(observations))
        .layer(TraceLayer::new_for_http())
        .with_state(context)
}

async fn observations(State(context): State<Arc<RequestContext>>, Path(station): Path<String>) -> Response {
    // Run in a separate task so that the fetch and rendering finish even if the
    // client goes away before the response is ready.
    let task_station = station.clone();
    let task = tokio::spawn(async move { context.observation(&task_station).await });

    match task.await {
        Ok(Ok(body)) => (StatusCode::OK, body).into_response(),
        Ok(Err(ObservationError::Invalid(reason))) => {
            tracing::warn!(message = "station marked invalid by API", station = %station, reason = %reason);
            (StatusCode::INTERNAL_SERVER_ERROR, reason).into_response()
        }
        Ok(Err(e)) => {
            tracing::error!(message = "failed to export observation", station = %station, error = %e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
        Err(e) => {
            tracing::error!(message = "observation task failed", station = %station, error = %e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

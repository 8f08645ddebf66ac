// metar_exporter - Prometheus metrics exporter for aviationweather.gov METAR reports
//
// Copyright 2024 Nick Pillitteri
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

use crate::collector::MetarCollector;
use crate::metrics;
use axum::extract::State;
use axum::http::header::CONTENT_TYPE;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// State shared by every request to the metrics endpoint.
#[derive(Debug)]
pub struct RequestContext {
    collector: MetarCollector,
}

impl RequestContext {
    pub fn new(collector: MetarCollector) -> Self {
        RequestContext { collector }
    }
}

/// Router exposing `GET /metrics`. Any other method on `/metrics` gets a 405, other paths a 404.
pub fn router(context: Arc<RequestContext>) -> Router {
    Router::new()
        .route("/metrics", get(text_metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(context)
}

/// Run a collection cycle and respond with the resulting metrics in text format.
///
/// Failures during the cycle don't change the response status, they only result in fewer
/// (or no) metrics.
pub async fn text_metrics(State(context): State<Arc<RequestContext>>) -> Response {
    let scrape = context.collector.collect().await;

    match context.collector.metrics().encode(&scrape) {
        Ok(buf) => {
            tracing::debug!(
                message = "encoded prometheus metrics to text format",
                num_bytes = buf.len(),
                num_samples = scrape.len(),
            );

            ([(CONTENT_TYPE, metrics::CONTENT_TYPE)], buf).into_response()
        }
        Err(e) => {
            tracing::error!(message = "error encoding metrics", error = %e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

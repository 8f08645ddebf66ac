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

use axum::extract::Query;
use axum::http::header::USER_AGENT;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use metar_exporter::client::AviationWeatherClient;
use metar_exporter::collector::MetarCollector;
use metar_exporter::http::RequestContext;
use metar_exporter::metrics::{MetarMetrics, Scrape};
use metar_exporter::stations::StationSet;
use reqwest::Client;
use serde_json::json;
use std::collections::{BTreeSet, HashMap};
use std::io;
use std::net::{SocketAddr, TcpListener};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::subscriber::DefaultGuard;

const METAR_PATH: &str = "/cgi-bin/data/metar.php";

fn serve(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.set_nonblocking(true).unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::Server::from_tcp(listener)
            .unwrap()
            .serve(app.into_make_service())
            .await
            .unwrap();
    });

    addr
}

fn upstream(app: Router) -> String {
    format!("http://{}{}", serve(app), METAR_PATH)
}

fn collector(api_url: &str, stations: &str, timeout: Duration) -> MetarCollector {
    let http = Client::builder().timeout(timeout).build().unwrap();
    let client = AviationWeatherClient::new(http, api_url).unwrap();
    MetarCollector::new(client, StationSet::parse(stations).unwrap(), MetarMetrics::new())
}

fn report(id: &str, temp: f64, raw: &str) -> serde_json::Value {
    json!({
        "icaoId": id,
        "name": id,
        "temp": temp,
        "dewp": temp - 2.0,
        "wdir": 270,
        "wspd": 10,
        "wgst": null,
        "visib": "6+",
        "altim": 1013,
        "slp": null,
        "wxString": null,
        "metarType": "METAR",
        "rawOb": raw,
        "clouds": [{"cover": "FEW", "base": 3000}],
    })
}

/// Respond with a report for every requested station, rejecting requests that the real API
/// would reject or answer with something other than JSON.
async fn echo_reports(Query(params): Query<HashMap<String, String>>, headers: HeaderMap) -> Response {
    let browser = headers
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("Mozilla/"))
        .unwrap_or(false);

    if !browser || params.get("format").map(String::as_str) != Some("json") {
        return StatusCode::FORBIDDEN.into_response();
    }

    let ids = params.get("ids").cloned().unwrap_or_default();
    let reports: Vec<serde_json::Value> = ids
        .split(',')
        .enumerate()
        .map(|(i, id)| report(id, i as f64, &format!("{} 010000Z 27010KT 9999 FEW030 05/03 Q1013", id)))
        .collect();

    axum::Json(reports).into_response()
}

/// Log output captured from the current thread while the guard is held.
#[derive(Clone, Default)]
struct CapturedLogs {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl CapturedLogs {
    fn install(&self) -> DefaultGuard {
        let writer = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();

        tracing::subscriber::set_default(subscriber)
    }

    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.buf.lock().unwrap()).into_owned()
    }

    fn warnings(&self) -> Vec<String> {
        self.contents()
            .lines()
            .filter(|l| l.contains("WARN"))
            .map(str::to_owned)
            .collect()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.lock().unwrap().extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn stations_in(scrape: &Scrape) -> BTreeSet<String> {
    scrape.samples().iter().filter_map(|s| s.station.clone()).collect()
}

#[tokio::test]
async fn test_collect_all_stations() {
    let logs = CapturedLogs::default();
    let _guard = logs.install();
    let url = upstream(Router::new().route(METAR_PATH, get(echo_reports)));
    let scrape = collector(&url, "EDDH, EDDM", Duration::from_secs(5)).collect().await;

    assert!(logs.warnings().is_empty(), "unexpected warnings: {:?}", logs.warnings());
    assert_eq!(13, scrape.len());
    assert_eq!(Some(0.0), scrape.value("metar_temperature", Some("EDDH")));
    assert_eq!(Some(1.0), scrape.value("metar_temperature", Some("EDDM")));
    assert_eq!(Some(-1.0), scrape.value("metar_dewPoint", Some("EDDM")));
    assert_eq!(Some(10.0), scrape.value("metar_wind_speed", Some("EDDH")));
    assert_eq!(Some(270.0), scrape.value("metar_wind_direction", Some("EDDH")));
    assert_eq!(Some(1013.0), scrape.value("metar_altim", Some("EDDH")));
    assert_eq!(Some(9999.0), scrape.value("metar_visibilityStatute", Some("EDDH")));
    assert!(scrape.value("metar_execTime", None).unwrap() > 0.0);
    assert_eq!("metar_execTime", scrape.samples().last().unwrap().name);
}

#[tokio::test]
async fn test_collect_fewer_reports_than_requested() {
    async fn one_report() -> axum::Json<Vec<serde_json::Value>> {
        axum::Json(vec![report("EDDH", 5.0, "EDDH 010000Z 27010KT 9999 FEW030 05/03 Q1013")])
    }

    let logs = CapturedLogs::default();
    let _guard = logs.install();
    let url = upstream(Router::new().route(METAR_PATH, get(one_report)));
    let scrape = collector(&url, "EDDH,EDDM,EDDF", Duration::from_secs(5)).collect().await;

    let warnings = logs.warnings();
    assert!(
        warnings.iter().any(|l| l.contains("requested=3") && l.contains("received=1")),
        "missing count mismatch warning in {:?}",
        warnings
    );
    assert_eq!(7, scrape.len());
    assert_eq!(Some(5.0), scrape.value("metar_temperature", Some("EDDH")));
    assert_eq!(None, scrape.value("metar_temperature", Some("EDDM")));
    assert!(scrape.value("metar_execTime", None).is_some());
}

#[tokio::test]
async fn test_collect_unavailable() {
    async fn unavailable() -> StatusCode {
        StatusCode::SERVICE_UNAVAILABLE
    }

    let logs = CapturedLogs::default();
    let _guard = logs.install();
    let url = upstream(Router::new().route(METAR_PATH, get(unavailable)));
    let scrape = collector(&url, "EDDH", Duration::from_secs(5)).collect().await;

    let warnings = logs.warnings();
    assert!(
        warnings.iter().any(|l| l.contains("status_code=503")),
        "missing status warning in {:?}",
        warnings
    );
    assert!(scrape.is_empty());
}

#[tokio::test]
async fn test_collect_malformed_body() {
    async fn html() -> &'static str {
        "<html><body>Down for maintenance</body></html>"
    }

    let url = upstream(Router::new().route(METAR_PATH, get(html)));
    let scrape = collector(&url, "EDDH", Duration::from_secs(5)).collect().await;

    assert!(scrape.is_empty());
}

#[tokio::test]
async fn test_collect_connection_refused() {
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };

    let url = format!("http://{}{}", addr, METAR_PATH);
    let scrape = collector(&url, "EDDH", Duration::from_secs(5)).collect().await;

    assert!(scrape.is_empty());
}

#[tokio::test]
async fn test_collect_timeout() {
    async fn slow() -> &'static str {
        tokio::time::sleep(Duration::from_secs(5)).await;
        "[]"
    }

    let url = upstream(Router::new().route(METAR_PATH, get(slow)));
    let scrape = collector(&url, "EDDH", Duration::from_millis(100)).collect().await;

    assert!(scrape.is_empty());
}

#[tokio::test]
async fn test_collect_unparseable_raw_report() {
    async fn garbled() -> axum::Json<Vec<serde_json::Value>> {
        axum::Json(vec![
            report("EDDH", 5.0, "garbled report text"),
            report("EDDM", 7.0, "EDDM 010020Z 24004KT 0800 BKN002 02/02 Q1021"),
        ])
    }

    let url = upstream(Router::new().route(METAR_PATH, get(garbled)));
    let scrape = collector(&url, "EDDH,EDDM", Duration::from_secs(5)).collect().await;

    assert_eq!(12, scrape.len());
    assert_eq!(Some(5.0), scrape.value("metar_temperature", Some("EDDH")));
    assert_eq!(None, scrape.value("metar_visibilityStatute", Some("EDDH")));
    assert_eq!(Some(800.0), scrape.value("metar_visibilityStatute", Some("EDDM")));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_collections_are_independent() {
    let url = upstream(Router::new().route(METAR_PATH, get(echo_reports)));
    let germany = Arc::new(collector(&url, "EDDH,EDDM", Duration::from_secs(5)));
    let usa = Arc::new(collector(&url, "KBOS,KJFK,KORD", Duration::from_secs(5)));

    let mut handles = Vec::new();
    for _ in 0..10 {
        let germany = germany.clone();
        let usa = usa.clone();
        handles.push(tokio::spawn(async move { ("germany", germany.collect().await) }));
        handles.push(tokio::spawn(async move { ("usa", usa.collect().await) }));
    }

    for handle in handles {
        let (name, scrape) = handle.await.unwrap();
        let stations = stations_in(&scrape);

        if name == "germany" {
            assert_eq!(BTreeSet::from(["EDDH".to_owned(), "EDDM".to_owned()]), stations);
            assert_eq!(13, scrape.len());
        } else {
            assert_eq!(
                BTreeSet::from(["KBOS".to_owned(), "KJFK".to_owned(), "KORD".to_owned()]),
                stations
            );
            assert_eq!(19, scrape.len());
        }
    }
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let url = upstream(Router::new().route(METAR_PATH, get(echo_reports)));
    let context = Arc::new(RequestContext::new(collector(&url, "EDDH", Duration::from_secs(5))));
    let addr = serve(metar_exporter::http::router(context));
    let client = Client::new();

    let res = client.get(format!("http://{}/metrics", addr)).send().await.unwrap();
    assert_eq!(reqwest::StatusCode::OK, res.status());
    assert!(res.headers()[reqwest::header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("application/openmetrics-text"));

    let body = res.text().await.unwrap();
    assert!(body.contains("metar_temperature{station=\"EDDH\"} 0"));
    assert!(body.contains("metar_visibilityStatute{station=\"EDDH\"} 9999"));
    assert!(body.contains("metar_execTime "));

    let res = client.post(format!("http://{}/metrics", addr)).send().await.unwrap();
    assert_eq!(reqwest::StatusCode::METHOD_NOT_ALLOWED, res.status());

    let res = client.get(format!("http://{}/", addr)).send().await.unwrap();
    assert_eq!(reqwest::StatusCode::NOT_FOUND, res.status());
}

#[tokio::test]
async fn test_metrics_endpoint_upstream_failure_is_not_an_error() {
    async fn unavailable() -> StatusCode {
        StatusCode::SERVICE_UNAVAILABLE
    }

    let url = upstream(Router::new().route(METAR_PATH, get(unavailable)));
    let context = Arc::new(RequestContext::new(collector(&url, "EDDH", Duration::from_secs(5))));
    let addr = serve(metar_exporter::http::router(context));

    let res = Client::new().get(format!("http://{}/metrics", addr)).send().await.unwrap();
    assert_eq!(reqwest::StatusCode::OK, res.status());

    let body = res.text().await.unwrap();
    assert!(!body.contains("station="));
    assert!(!body.contains("metar_execTime "));
}

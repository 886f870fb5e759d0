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

use axum::extract::Query;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Url};
use std::collections::HashMap;
use std::net::{SocketAddr, TcpListener};
use std::sync::Arc;
use vedur_exporter::client::VedurClient;
use vedur_exporter::http::{router, RequestContext};
use vedur_exporter::metrics::{Extractor, NonNumeric, OBSERVATION_METRICS};

const VALID: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<observations>
  <station valid="1" id="1475">
    <name>Reykjavík</name>
    <time>2023-01-14 12:00:00</time>
    <err></err>
    <link>https://www.vedur.is/vedur/athuganir/kort/hofudborgarsvaedid/#group=100&amp;station=1475</link>
    <F>3.0</F>
    <FX>7.1</FX>
    <FG>9.4</FG>
    <D>NA</D>
    <T>5.2</T>
    <W>Partly cloudy</W>
    <RH>83</RH>
  </station>
</observations>"#;

const MISSING_GUST: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<observations>
  <station valid="1" id="2">
    <F>3.0</F>
    <FX>7.1</FX>
    <T>5.2</T>
  </station>
</observations>"#;

const NON_NUMERIC: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<observations>
  <station valid="1" id="3">
    <F>-</F>
    <T>5.2</T>
  </station>
</observations>"#;

const INVALID: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<observations>
  <station valid="0" id="9999">
    <err>station not found</err>
  </station>
</observations>"#;

const EXPECTED_VALID: &str = "# HELP temperature Temperature (degrees C)
# TYPE temperature gauge
temperature 5.2

# HELP wind_speed Wind speed (m/s)
# TYPE wind_speed gauge
wind_speed 3

# HELP wind_speed_max Max wind speed (m/s)
# TYPE wind_speed_max gauge
wind_speed_max 7.1

# HELP wind_speed_gust Wind speed gust (m/s)
# TYPE wind_speed_gust gauge
wind_speed_gust 9.4";

async fn fake_api(Query(params): Query<HashMap<String, String>>) -> Response {
    let expected = [("op_w", "xml"), ("type", "obs"), ("lang", "en"), ("view", "xml")];
    if expected.iter().any(|(k, v)| params.get(*k).map(String::as_str) != Some(*v)) {
        return (StatusCode::BAD_REQUEST, "unexpected query").into_response();
    }

    match params.get("ids").map(String::as_str) {
        Some("1475") => (StatusCode::OK, VALID).into_response(),
        Some("2") => (StatusCode::OK, MISSING_GUST).into_response(),
        Some("3") => (StatusCode::OK, NON_NUMERIC).into_response(),
        Some("4") => (StatusCode::OK, "<observations><station valid=\"1\">").into_response(),
        Some("5") => (StatusCode::OK, "<observations></observations>").into_response(),
        Some("404") => (StatusCode::NOT_FOUND, VALID).into_response(),
        _ => (StatusCode::OK, INVALID).into_response(),
    }
}

fn serve(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
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

fn exporter(api: SocketAddr, non_numeric: NonNumeric, station_label: bool) -> SocketAddr {
    let base_url = Url::parse(&format!("http://{}/", api)).unwrap();
    let client = VedurClient::new(Client::new(), base_url);
    let extractor = Extractor::new(OBSERVATION_METRICS.to_vec(), non_numeric);
    serve(router(Arc::new(RequestContext::new(client, extractor, station_label))))
}

fn default_exporter() -> SocketAddr {
    let api = serve(Router::new().route("/", get(fake_api)));
    exporter(api, NonNumeric::Emit, false)
}

async fn scrape(addr: SocketAddr, station: &str) -> (StatusCode, String) {
    let res = reqwest::get(format!("http://{}/api/observations/{}", addr, station))
        .await
        .unwrap();

    let status = res.status();
    (status, res.text().await.unwrap())
}

#[tokio::test]
async fn test_valid_station() {
    let addr = default_exporter();
    let res = reqwest::get(format!("http://{}/api/observations/1475", addr))
        .await
        .unwrap();

    assert_eq!(StatusCode::OK, res.status());
    let content_type = res.headers().get(CONTENT_TYPE).unwrap().to_str().unwrap().to_owned();
    assert!(content_type.starts_with("text/plain"));
    assert_eq!(EXPECTED_VALID, res.text().await.unwrap());
}

#[tokio::test]
async fn test_invalid_station() {
    let addr = default_exporter();
    let (status, body) = scrape(addr, "9999").await;

    assert_eq!(StatusCode::INTERNAL_SERVER_ERROR, status);
    assert_eq!("station not found", body);
}

#[tokio::test]
async fn test_missing_metric() {
    let addr = default_exporter();
    let (status, body) = scrape(addr, "2").await;

    assert_eq!(StatusCode::OK, status);
    assert_eq!(
        "# HELP temperature Temperature (degrees C)
# TYPE temperature gauge
temperature 5.2

# HELP wind_speed Wind speed (m/s)
# TYPE wind_speed gauge
wind_speed 3

# HELP wind_speed_max Max wind speed (m/s)
# TYPE wind_speed_max gauge
wind_speed_max 7.1",
        body
    );
}

#[tokio::test]
async fn test_api_status_ignored() {
    let addr = default_exporter();
    let (status, body) = scrape(addr, "404").await;

    assert_eq!(StatusCode::OK, status);
    assert_eq!(EXPECTED_VALID, body);
}

#[tokio::test]
async fn test_malformed_xml() {
    let addr = default_exporter();
    let (status, body) = scrape(addr, "4").await;

    assert_eq!(StatusCode::INTERNAL_SERVER_ERROR, status);
    assert_eq!("", body);
}

#[tokio::test]
async fn test_missing_station() {
    let addr = default_exporter();
    let (status, body) = scrape(addr, "5").await;

    assert_eq!(StatusCode::INTERNAL_SERVER_ERROR, status);
    assert_eq!("", body);
}

#[tokio::test]
async fn test_api_unreachable() {
    let api = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };

    let addr = exporter(api, NonNumeric::Emit, false);
    let (status, body) = scrape(addr, "1475").await;

    assert_eq!(StatusCode::INTERNAL_SERVER_ERROR, status);
    assert_eq!("", body);
}

#[tokio::test]
async fn test_non_numeric_policies() {
    let api = serve(Router::new().route("/", get(fake_api)));

    let (status, body) = scrape(exporter(api, NonNumeric::Emit, false), "3").await;
    assert_eq!(StatusCode::OK, status);
    assert!(body.ends_with("wind_speed NaN"));

    let (status, body) = scrape(exporter(api, NonNumeric::Skip, false), "3").await;
    assert_eq!(StatusCode::OK, status);
    assert_eq!(
        "# HELP temperature Temperature (degrees C)\n# TYPE temperature gauge\ntemperature 5.2",
        body
    );

    let (status, body) = scrape(exporter(api, NonNumeric::Error, false), "3").await;
    assert_eq!(StatusCode::INTERNAL_SERVER_ERROR, status);
    assert_eq!("", body);
}

#[tokio::test]
async fn test_station_label() {
    let api = serve(Router::new().route("/", get(fake_api)));
    let (status, body) = scrape(exporter(api, NonNumeric::Emit, true), "1475").await;

    assert_eq!(StatusCode::OK, status);
    assert!(body.contains("\ntemperature{station=\"1475\"} 5.2\n"));
    assert!(body.ends_with("wind_speed_gust{station=\"1475\"} 9.4"));
}

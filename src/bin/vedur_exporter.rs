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

use clap::Parser;
use reqwest::{Client, Url};
use std::error::Error;
use std::io;
use std::net::SocketAddr;
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{self, SignalKind};
use tracing::Level;
use vedur_exporter::client::VedurClient;
use vedur_exporter::http::RequestContext;
use vedur_exporter::metrics::{Extractor, NonNumeric, OBSERVATION_METRICS};

const DEFAULT_LOG_LEVEL: Level = Level::INFO;
const DEFAULT_BIND_ADDR: ([u8; 4], u16) = ([0, 0, 0, 0], 9784);
const DEFAULT_NON_NUMERIC: NonNumeric = NonNumeric::Emit;
const DEFAULT_API_URL: &str = "https://xmlweather.vedur.is/";

#[derive(Debug, Parser)]
#[clap(name = "vedur_exporter", version = clap::crate_version!())]
struct VedurExporterApplication {
    /// Base URL for the xmlweather.vedur.is API
    #[clap(long, default_value = DEFAULT_API_URL)]
    api_url: Url,

    /// Logging verbosity. Allowed values are 'trace', 'debug', 'info', 'warn', and 'error'
    /// (case insensitive)
    #[clap(long, default_value_t = DEFAULT_LOG_LEVEL)]
    log_level: Level,

    /// Timeout for fetching observations from the API, in milliseconds. By default,
    /// requests to the API do not time out.
    #[clap(long)]
    timeout_millis: Option<u64>,

    /// How to handle observation values that aren't numbers. Allowed values are 'emit'
    /// (emit them as NaN), 'skip' (leave them out), and 'error' (fail the request)
    #[clap(long, default_value_t = DEFAULT_NON_NUMERIC)]
    non_numeric: NonNumeric,

    /// Add a 'station' label with the ID of the station to every metric
    #[clap(long)]
    station_label: bool,

    /// Address to bind to. By default, vedur_exporter will bind to public address since
    /// the purpose is to expose metrics to an external system (Prometheus or another
    /// agent for ingestion)
    #[clap(long, default_value_t = DEFAULT_BIND_ADDR.into())]
    bind: SocketAddr,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error + Send + Sync>> {
    let opts = VedurExporterApplication::parse();
    tracing::subscriber::set_global_default(
        tracing_subscriber::FmtSubscriber::builder()
            .with_max_level(opts.log_level)
            .finish(),
    )
    .expect("failed to set tracing subscriber");

    let mut builder = Client::builder();
    if let Some(millis) = opts.timeout_millis {
        builder = builder.timeout(Duration::from_millis(millis));
    }

    let http_client = builder.build().unwrap_or_else(|e| {
        tracing::error!(message = "unable to initialize HTTP client", error = %e);
        process::exit(1)
    });

    let client = VedurClient::new(http_client, opts.api_url.clone());
    let extractor = Extractor::new(OBSERVATION_METRICS.to_vec(), opts.non_numeric);
    let context = Arc::new(RequestContext::new(client, extractor, opts.station_label));
    let app = vedur_exporter::http::router(context);

    let server = axum::Server::try_bind(&opts.bind)
        .unwrap_or_else(|e| {
            tracing::error!(message = "error binding to address", address = %opts.bind, error = %e);
            process::exit(1)
        })
        .serve(app.into_make_service());

    tracing::info!(
        message = "server started",
        address = %server.local_addr(),
        api_url = %opts.api_url,
        non_numeric = %opts.non_numeric,
    );

    server
        .with_graceful_shutdown(async {
            // Wait for either SIGTERM or SIGINT to shutdown
            tokio::select! {
                _ = sigterm() => {}
                _ = sigint() => {}
            }
        })
        .await?;

    tracing::info!("server shutdown");
    Ok(())
}

/// Return after the first SIGTERM signal received by this process
async fn sigterm() -> io::Result<()> {
    unix::signal(SignalKind::terminate())?.recv().await;
    Ok(())
}

/// Return after the first SIGINT signal received by this process
async fn sigint() -> io::Result<()> {
    unix::signal(SignalKind::interrupt())?.recv().await;
    Ok(())
}

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

//! Prometheus metrics exporter for xmlweather.vedur.is
//!
//! ## Features
//!
//! `vedur_exporter` fetches the latest observation for a weather station from the XML API
//! of the [Icelandic Met Office] and emits it as Prometheus metrics. The station is picked
//! per request: each scrape of `/api/observations/$STATION` makes a single request to the
//! API and renders the result. The following metrics are emitted when available (not all
//! stations measure everything).
//!
//! * `temperature` - Temperature, in degrees celsius.
//! * `wind_speed` - Wind speed, in meters per second.
//! * `wind_speed_max` - Max wind speed, in meters per second.
//! * `wind_speed_gust` - Wind speed gust, in meters per second.
//!
//! [Icelandic Met Office]: https://www.vedur.is/
//!
//! ## Build
//!
//! `vedur_exporter` is a Rust program and must be built from source using a
//! [Rust toolchain](https://rustup.rs/). From a checkout of the source, run:
//!
//! ```text
//! cargo build --release
//! ```
//!
//! ## Usage
//!
//! ### Picking a station
//!
//! Stations are identified by a numeric ID, for example `1475` for Reykjavík. You can
//! check what the API returns for a station using `curl`.
//!
//! ```text
//! curl -sS 'https://xmlweather.vedur.is/?op_w=xml&type=obs&lang=en&view=xml&ids=1475'
//! ```
//!
//! Stations the API doesn't know about (or that have no recent observations) are reported
//! with `valid="0"` and a message in the `err` element. `vedur_exporter` responds to
//! these with a `500` status and the message as the body.
//!
//! ### Run
//!
//! ```text
//! ./vedur_exporter --bind 0.0.0.0:9784
//! ```
//!
//! Values that aren't numbers (some stations report `-` for missing readings) are emitted
//! as `NaN` by default. Use `--non-numeric skip` to leave them out or `--non-numeric error`
//! to fail the scrape instead. Use `--station-label` to add a `station` label with the ID
//! of the station to each sample.
//!
//! ### Prometheus
//!
//! Metrics for a station are exposed on port `9784` at `/api/observations/$STATION`.
//! Configure a scrape for each station you are interested in.
//!
//! ```yaml
//! scrape_configs:
//! - job_name: vedur_reykjavik
//!   metrics_path: /api/observations/1475
//!   static_configs:
//!   - targets: ['example:9784']
//! ```
//!

pub mod client;
pub mod document;
pub mod exposition;
pub mod http;
pub mod metrics;

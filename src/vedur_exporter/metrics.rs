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

use crate::document::{Document, Node};
use std::error;
use std::fmt;
use std::str::FromStr;

/// Metrics emitted for each observation, in the order they are rendered.
pub const OBSERVATION_METRICS: [MetricDefinition; 4] = [
    MetricDefinition {
        name: "temperature",
        help: "Temperature (degrees C)",
        metric_type: MetricType::Gauge,
        path: "observations.station.T._text",
        format: NumericFormat::Float,
    },
    MetricDefinition {
        name: "wind_speed",
        help: "Wind speed (m/s)",
        metric_type: MetricType::Gauge,
        path: "observations.station.F._text",
        format: NumericFormat::Float,
    },
    MetricDefinition {
        name: "wind_speed_max",
        help: "Max wind speed (m/s)",
        metric_type: MetricType::Gauge,
        path: "observations.station.FX._text",
        format: NumericFormat::Float,
    },
    MetricDefinition {
        name: "wind_speed_gust",
        help: "Wind speed gust (m/s)",
        metric_type: MetricType::Gauge,
        path: "observations.station.FG._text",
        format: NumericFormat::Float,
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricType {
    Gauge,
    Counter,
}

impl MetricType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gauge => "gauge",
            Self::Counter => "counter",
        }
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the raw text of a field is turned into a number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumericFormat {
    /// Longest leading decimal literal, e.g. `"5.2 C"` is `5.2`.
    Float,
    /// Longest leading integer, e.g. `"12.7"` is `12`. A `0x` prefix means base 16.
    Int,
}

impl NumericFormat {
    /// Parse the numeric prefix of `raw` (after any leading whitespace). Text with no
    /// numeric prefix is NaN.
    pub fn coerce(&self, raw: &str) -> f64 {
        match self {
            Self::Float => parse_float(raw),
            Self::Int => parse_int(raw),
        }
    }
}

/// What to do with a field that resolves to something that isn't a number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NonNumeric {
    /// Emit the metric with a value of `NaN`.
    Emit,
    /// Leave the metric out, as if the field didn't exist.
    Skip,
    /// Fail the entire request.
    Error,
}

impl fmt::Display for NonNumeric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Emit => f.write_str("emit"),
            Self::Skip => f.write_str("skip"),
            Self::Error => f.write_str("error"),
        }
    }
}

impl FromStr for NonNumeric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "emit" => Ok(Self::Emit),
            "skip" => Ok(Self::Skip),
            "error" => Ok(Self::Error),
            _ => Err(format!("unknown policy '{}', expected 'emit', 'skip', or 'error'", s)),
        }
    }
}

#[derive(Debug)]
pub enum ExtractError {
    NonNumeric(&'static str, String),
}

impl fmt::Display for ExtractError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonNumeric(name, raw) => write!(f, "non-numeric value {} for {}", raw, name),
        }
    }
}

impl error::Error for ExtractError {}

/// Where to find a metric in an observation document and how to describe it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricDefinition {
    pub name: &'static str,
    pub help: &'static str,
    pub metric_type: MetricType,
    pub path: &'static str,
    pub format: NumericFormat,
}

/// Single sample produced from a `MetricDefinition` and a document.
#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    pub name: &'static str,
    pub help: &'static str,
    pub metric_type: MetricType,
    pub value: f64,
}

/// Produces `Metric`s from observation documents using a fixed set of definitions.
#[derive(Debug, Clone)]
pub struct Extractor {
    definitions: Vec<MetricDefinition>,
    non_numeric: NonNumeric,
}

impl Extractor {
    pub fn new(definitions: Vec<MetricDefinition>, non_numeric: NonNumeric) -> Self {
        Extractor {
            definitions,
            non_numeric,
        }
    }

    pub fn definitions(&self) -> &[MetricDefinition] {
        &self.definitions
    }

    /// Create a `Metric` for each definition whose path exists in `doc`.
    ///
    /// Metrics are returned in the same order as the definitions. Definitions that
    /// can't be found in the document are skipped. Values that can't be parsed as a
    /// number are handled based on the `NonNumeric` policy.
    pub fn extract(&self, doc: &Document) -> Result<Vec<Metric>, ExtractError> {
        let mut out = Vec::with_capacity(self.definitions.len());

        for def in self.definitions.iter() {
            let node = match doc.lookup(def.path) {
                Some(n) => n,
                None => {
                    tracing::debug!(
                        message = "metric not present in observation",
                        metric = def.name,
                        path = def.path,
                    );
                    continue;
                }
            };

            let value = node.as_text().map(|s| def.format.coerce(s)).unwrap_or(f64::NAN);
            if value.is_nan() {
                match self.non_numeric {
                    NonNumeric::Emit => {}
                    NonNumeric::Skip => {
                        tracing::debug!(
                            message = "skipping non-numeric metric",
                            metric = def.name,
                            raw = %describe(node),
                        );
                        continue;
                    }
                    NonNumeric::Error => return Err(ExtractError::NonNumeric(def.name, describe(node))),
                }
            }

            out.push(Metric {
                name: def.name,
                help: def.help,
                metric_type: def.metric_type,
                value,
            });
        }

        Ok(out)
    }
}

impl Default for Extractor {
    fn default() -> Self {
        Self::new(OBSERVATION_METRICS.to_vec(), NonNumeric::Emit)
    }
}

fn describe(node: &Node) -> String {
    match node {
        Node::Text(s) => format!("{:?}", s),
        Node::List(_) => "(list)".to_owned(),
        Node::Map(_) => "(element)".to_owned(),
    }
}

fn count_digits(bytes: &[u8]) -> usize {
    bytes.iter().take_while(|b| b.is_ascii_digit()).count()
}

fn parse_float(raw: &str) -> f64 {
    let s = raw.trim_start();
    let bytes = s.as_bytes();
    let negative = bytes.first() == Some(&b'-');
    let mut end = usize::from(matches!(bytes.first(), Some(b'+') | Some(b'-')));

    if s[end..].starts_with("Infinity") {
        return if negative { f64::NEG_INFINITY } else { f64::INFINITY };
    }

    let int_digits = count_digits(&bytes[end..]);
    end += int_digits;

    let mut frac_digits = 0;
    if bytes.get(end) == Some(&b'.') {
        frac_digits = count_digits(&bytes[end + 1..]);
        if int_digits > 0 || frac_digits > 0 {
            end += 1 + frac_digits;
        }
    }

    if int_digits == 0 && frac_digits == 0 {
        return f64::NAN;
    }

    if matches!(bytes.get(end), Some(b'e') | Some(b'E')) {
        let mut exp = end + 1;
        if matches!(bytes.get(exp), Some(b'+') | Some(b'-')) {
            exp += 1;
        }

        let exp_digits = count_digits(&bytes[exp..]);
        if exp_digits > 0 {
            end = exp + exp_digits;
        }
    }

    s[..end].parse::<f64>().unwrap_or(f64::NAN)
}

fn parse_int(raw: &str) -> f64 {
    let s = raw.trim_start();
    let bytes = s.as_bytes();
    let sign = usize::from(matches!(bytes.first(), Some(b'+') | Some(b'-')));
    let rest = &s[sign..];

    if rest.starts_with("0x") || rest.starts_with("0X") {
        let hex: Vec<u32> = rest[2..].chars().map_while(|c| c.to_digit(16)).collect();
        if hex.is_empty() {
            return f64::NAN;
        }

        let value = hex.iter().fold(0.0, |acc, d| acc * 16.0 + f64::from(*d));
        return if bytes[0] == b'-' { -value } else { value };
    }

    let digits = count_digits(rest.as_bytes());
    if digits == 0 {
        return f64::NAN;
    }

    s[..sign + digits].parse::<f64>().unwrap_or(f64::NAN)
}

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

//! Rendering of metrics in the Prometheus text exposition format.

use crate::metrics::Metric;

/// Labels attached to every sample, rendered in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSet {
    labels: Vec<(String, String)>,
}

impl LabelSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.labels.push((key.into(), value.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Format as `{k1="v1",k2="v2"}` or an empty string when there are no labels.
    /// Values are not escaped.
    pub fn to_text(&self) -> String {
        if self.labels.is_empty() {
            return String::new();
        }

        let pairs: Vec<String> = self.labels.iter().map(|(k, v)| format!("{}=\"{}\"", k, v)).collect();
        format!("{{{}}}", pairs.join(","))
    }
}

/// Render HELP and TYPE comments followed by a single sample for `metric`.
pub fn metric_to_text(metric: &Metric, labels: &LabelSet) -> String {
    format!(
        "# HELP {name} {help}\n# TYPE {name} {kind}\n{name}{labels} {value}",
        name = metric.name,
        help = metric.help,
        kind = metric.metric_type,
        labels = labels.to_text(),
        value = format_value(metric.value),
    )
}

/// Render each metric, separated by a blank line with no trailing newline.
pub fn render(metrics: &[Metric], labels: &LabelSet) -> String {
    metrics
        .iter()
        .map(|m| metric_to_text(m, labels))
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_owned()
    } else if value == f64::INFINITY {
        "+Inf".to_owned()
    } else if value == f64::NEG_INFINITY {
        "-Inf".to_owned()
    } else if value == 0.0 {
        // Includes negative zero
        "0".to_owned()
    } else if value.abs() >= 1e21 || value.abs() < 1e-6 {
        let formatted = format!("{:e}", value);
        match formatted.split_once('e') {
            Some((mantissa, exponent)) if !exponent.starts_with('-') => format!("{}e+{}", mantissa, exponent),
            _ => formatted,
        }
    } else {
        value.to_string()
    }
}

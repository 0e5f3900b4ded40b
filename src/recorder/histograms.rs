use std::cell::RefCell;
use std::collections::BTreeMap;

use serde::Serialize;
use tdigest::TDigest;

use crate::sinks::{HistogramBucketing, HistogramSink};

const DIGEST_SIZE: usize = 100;

#[derive(Debug, Default)]
struct HistogramSamples {
    bucketing: Option<HistogramBucketing>,
    values: Vec<i64>,
    underflows: usize,
    overflows: usize,
}

/// Distribution summary of one histogram.
#[derive(Debug, Clone, Serialize)]
pub struct HistogramSummary {
    pub name: String,
    pub bucketing: Option<HistogramBucketing>,
    pub count: usize,
    pub underflows: usize,
    pub overflows: usize,
    pub mean: f64,
    pub min: f64,
    pub max: f64,
    pub p50: f64,
    pub p90: f64,
    pub p99: f64,
}

/// Keeps every sample, per histogram name.
#[derive(Debug, Default)]
pub struct HistogramRecorder {
    histograms: RefCell<BTreeMap<String, HistogramSamples>>,
}

impl HistogramRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Samples recorded under `name`, in arrival order.
    pub fn samples(&self, name: &str) -> Vec<i64> {
        self.histograms
            .borrow()
            .get(name)
            .map(|h| h.values.clone())
            .unwrap_or_default()
    }

    pub fn names(&self) -> Vec<String> {
        self.histograms.borrow().keys().cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.histograms.borrow().is_empty()
    }

    pub fn summaries(&self) -> Vec<HistogramSummary> {
        self.histograms
            .borrow()
            .iter()
            .map(|(name, h)| {
                let digest = TDigest::new_with_size(DIGEST_SIZE)
                    .merge_unsorted(h.values.iter().map(|v| *v as f64).collect());

                HistogramSummary {
                    name: name.clone(),
                    bucketing: h.bucketing,
                    count: h.values.len(),
                    underflows: h.underflows,
                    overflows: h.overflows,
                    mean: digest.mean(),
                    min: digest.min(),
                    max: digest.max(),
                    p50: digest.estimate_quantile(0.5),
                    p90: digest.estimate_quantile(0.9),
                    p99: digest.estimate_quantile(0.99),
                }
            })
            .collect()
    }
}

impl HistogramSink for HistogramRecorder {
    fn add_sample(&self, name: &str, bucketing: Option<&HistogramBucketing>, sample: i64) {
        let mut histograms = self.histograms.borrow_mut();
        let h = histograms.entry(name.to_owned()).or_default();

        if let Some(b) = bucketing {
            if h.bucketing.is_some_and(|prev| prev != *b) {
                tracing::warn!(name, "histogram recorded with differing bucketing");
            }
            h.bucketing = Some(*b);

            if sample < b.min as i64 {
                h.underflows += 1;
            } else if sample >= b.max as i64 {
                h.overflows += 1;
            }
        }

        h.values.push(sample);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BUCKETING: HistogramBucketing = HistogramBucketing {
        min: 1,
        max: 100,
        count: 10,
        version_suffix: "",
    };

    #[test]
    fn test_summary() {
        let h = HistogramRecorder::new();
        for v in [0, 10, 20, 30, 500] {
            h.add_sample("Foo", Some(&BUCKETING), v);
        }
        h.add_sample("Bar", None, 3);

        assert_eq!(h.names(), vec!["Bar".to_owned(), "Foo".to_owned()]);

        let summaries = h.summaries();
        let foo = &summaries[1];
        assert_eq!(foo.count, 5);
        assert_eq!(foo.underflows, 1);
        assert_eq!(foo.overflows, 1);
        assert_eq!(foo.min, 0.0);
        assert_eq!(foo.max, 500.0);
        assert_eq!(foo.mean, 112.0);
        assert!(summaries[0].bucketing.is_none());
    }
}

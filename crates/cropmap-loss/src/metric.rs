//! Training-loop metric built on the per-class diagnostics.

use burn::train::metric::{
    state::{FormatOptions, NumericMetricState},
    Metric, MetricEntry, MetricMetadata, Numeric,
};

use crate::per_class::PerClassLoss;

/// Tracks the macro-averaged per-class loss during training.
///
/// Consumes [`PerClassLoss`] reports: each update contributes the mean loss
/// over the classes that had valid elements, weighted by the batch's total
/// valid-element count. Classes without data in a batch do not drag the
/// average toward zero.
#[derive(Default)]
pub struct PerClassLossMetric {
    state: NumericMetricState,
}

impl PerClassLossMetric {
    /// Create the metric.
    pub fn new() -> Self {
        Self::default()
    }
}

impl Metric for PerClassLossMetric {
    type Input = PerClassLoss;

    fn name(&self) -> String {
        "Per-class Loss".to_string()
    }

    fn update(&mut self, item: &Self::Input, _metadata: &MetricMetadata) -> MetricEntry {
        let value = item.macro_average();
        let batch_size = item.total_valid().max(1);
        self.state.update(
            value,
            batch_size,
            FormatOptions::new(self.name()).precision(5),
        )
    }

    fn clear(&mut self) {
        self.state.reset();
    }
}

impl Numeric for PerClassLossMetric {
    fn value(&self) -> f64 {
        self.state.value()
    }
}

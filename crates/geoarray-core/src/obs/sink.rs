//! Metrics sink boundary.
//!
//! Layer and catalog code emit `MetricsEvent`s; only this module decides
//! whether they land in the process-local counters or in a scoped override.

use crate::{db::filter::Translation, obs::metrics};
use std::{cell::RefCell, sync::Arc};

thread_local! {
    static SINK_OVERRIDE: RefCell<Option<Arc<dyn MetricsSink>>> = const { RefCell::new(None) };
}

///
/// MetricsEvent
///

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MetricsEvent<'a> {
    LayerCreated {
        layer: &'a str,
    },
    FeatureCommitted {
        layer: &'a str,
    },
    FragmentCommitted {
        layer: &'a str,
        rows: u64,
    },
    RowsScanned {
        layer: &'a str,
        rows: u64,
    },
    FilterTranslated {
        layer: &'a str,
        translation: Translation,
    },
}

///
/// MetricsSink
///

pub trait MetricsSink {
    fn record(&self, event: MetricsEvent<'_>);
}

///
/// GlobalMetricsSink
/// Default sink writing into the process-local counters.
///

pub(crate) struct GlobalMetricsSink;

impl MetricsSink for GlobalMetricsSink {
    fn record(&self, event: MetricsEvent<'_>) {
        metrics::with_state_mut(|m| match event {
            MetricsEvent::LayerCreated { .. } => {
                m.totals.layers_created = m.totals.layers_created.saturating_add(1);
            }

            MetricsEvent::FeatureCommitted { layer } => {
                m.totals.features_committed = m.totals.features_committed.saturating_add(1);
                let entry = metrics::layer_entry(m, layer);
                entry.features_committed = entry.features_committed.saturating_add(1);
            }

            MetricsEvent::FragmentCommitted { layer, .. } => {
                m.totals.fragments_committed = m.totals.fragments_committed.saturating_add(1);
                let entry = metrics::layer_entry(m, layer);
                entry.fragments_committed = entry.fragments_committed.saturating_add(1);
            }

            MetricsEvent::RowsScanned { layer, rows } => {
                m.totals.rows_scanned = m.totals.rows_scanned.saturating_add(rows);
                let entry = metrics::layer_entry(m, layer);
                entry.rows_scanned = entry.rows_scanned.saturating_add(rows);
            }

            MetricsEvent::FilterTranslated { translation, .. } => {
                let slot = match translation {
                    Translation::Whole => &mut m.totals.filters_whole,
                    Translation::Partial => &mut m.totals.filters_partial,
                    Translation::None => &mut m.totals.filters_none,
                };
                *slot = slot.saturating_add(1);
            }
        });
    }
}

pub(crate) fn record(event: MetricsEvent<'_>) {
    let sink = SINK_OVERRIDE.with(|cell| cell.borrow().clone());
    match sink {
        Some(sink) => sink.record(event),
        None => GlobalMetricsSink.record(event),
    }
}

/// Snapshot the process-local counters.
#[must_use]
pub fn metrics_report() -> metrics::MetricsReport {
    metrics::with_state(Clone::clone)
}

/// Reset all process-local counters.
pub fn metrics_reset_all() {
    metrics::reset_all();
}

/// Run a closure with every event on this thread routed to `sink`.
pub fn with_metrics_sink<T>(sink: Arc<dyn MetricsSink>, f: impl FnOnce() -> T) -> T {
    struct Guard(Option<Arc<dyn MetricsSink>>);

    impl Drop for Guard {
        fn drop(&mut self) {
            let prev = self.0.take();
            SINK_OVERRIDE.with(|cell| *cell.borrow_mut() = prev);
        }
    }

    let prev = SINK_OVERRIDE.with(|cell| cell.borrow_mut().replace(sink));
    let _guard = Guard(prev);

    f()
}

use serde::{Deserialize, Serialize};
use std::{cell::RefCell, collections::BTreeMap};

///
/// MetricsTotals
///

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct MetricsTotals {
    pub layers_created: u64,
    pub features_committed: u64,
    pub fragments_committed: u64,
    pub rows_scanned: u64,

    // Filter translation outcomes
    pub filters_whole: u64,
    pub filters_partial: u64,
    pub filters_none: u64,
}

///
/// LayerCounters
///

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct LayerCounters {
    pub features_committed: u64,
    pub fragments_committed: u64,
    pub rows_scanned: u64,
}

///
/// MetricsReport
/// Snapshot of the process-local counters.
///

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct MetricsReport {
    pub totals: MetricsTotals,
    pub layers: BTreeMap<String, LayerCounters>,
}

thread_local! {
    static STATE: RefCell<MetricsReport> = RefCell::new(MetricsReport::default());
}

pub(crate) fn with_state<R>(f: impl FnOnce(&MetricsReport) -> R) -> R {
    STATE.with(|m| f(&m.borrow()))
}

pub(crate) fn with_state_mut<R>(f: impl FnOnce(&mut MetricsReport) -> R) -> R {
    STATE.with(|m| f(&mut m.borrow_mut()))
}

/// Per-layer entry, created on first use.
pub(crate) fn layer_entry<'a>(
    state: &'a mut MetricsReport,
    layer: &str,
) -> &'a mut LayerCounters {
    state.layers.entry(layer.to_string()).or_default()
}

pub(crate) fn reset_all() {
    with_state_mut(|m| *m = MetricsReport::default());
}

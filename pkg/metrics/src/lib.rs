use std::collections::BTreeMap;
use std::fmt::Write;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{PoisonError, RwLock};

/// Total reconcile cycles, labelled by `outcome`.
pub const RECONCILE_TOTAL: &str = "awssecret_reconcile_total";
/// Calls made to the secret store.
pub const RESOLVE_TOTAL: &str = "awssecret_resolve_total";
/// Calls to the secret store that failed or returned an undecodable payload.
pub const RESOLVE_ERRORS_TOTAL: &str = "awssecret_resolve_errors_total";
/// Identities waiting for their next cycle.
pub const QUEUE_DEPTH: &str = "awssecret_queue_depth";
/// Cycles currently running.
pub const INFLIGHT: &str = "awssecret_inflight";

/// A lightweight, thread-safe metrics registry that renders in Prometheus text exposition format.
pub struct MetricsRegistry {
    counters: RwLock<BTreeMap<String, CounterFamily>>,
    gauges: RwLock<BTreeMap<String, Gauge>>,
}

/// Monotonically increasing counters sharing a name, one per label set.
struct CounterFamily {
    help: String,
    series: BTreeMap<String, u64>,
}

/// Value that can go up or down.
struct Gauge {
    value: AtomicI64,
    help: String,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self {
            counters: RwLock::new(BTreeMap::new()),
            gauges: RwLock::new(BTreeMap::new()),
        }
    }

    /// Registry with every operator metric registered.
    pub fn for_operator() -> Self {
        let registry = Self::new();
        registry.register_counter(RECONCILE_TOTAL, "Reconcile cycles by outcome.");
        registry.register_counter(RESOLVE_TOTAL, "Secret store lookups.");
        registry.register_counter(RESOLVE_ERRORS_TOTAL, "Failed secret store lookups.");
        registry.register_gauge(QUEUE_DEPTH, "Identities scheduled for reconciliation.");
        registry.register_gauge(INFLIGHT, "Reconcile cycles in progress.");
        registry
    }

    /// Register a counter. If it already exists, this is a no-op.
    pub fn register_counter(&self, name: &str, help: &str) {
        let mut counters = self.counters.write().unwrap_or_else(PoisonError::into_inner);
        counters
            .entry(name.to_string())
            .or_insert_with(|| CounterFamily {
                help: help.to_string(),
                series: BTreeMap::new(),
            });
    }

    /// Register a gauge. If it already exists, this is a no-op.
    pub fn register_gauge(&self, name: &str, help: &str) {
        let mut gauges = self.gauges.write().unwrap_or_else(PoisonError::into_inner);
        gauges.entry(name.to_string()).or_insert_with(|| Gauge {
            value: AtomicI64::new(0),
            help: help.to_string(),
        });
    }

    /// Increment an unlabelled counter by 1.
    pub fn counter_inc(&self, name: &str) {
        self.counter_add_with(name, &[], 1);
    }

    /// Increment the counter series identified by `labels` by 1.
    pub fn counter_inc_with(&self, name: &str, labels: &[(&str, &str)]) {
        self.counter_add_with(name, labels, 1);
    }

    /// Increment the counter series identified by `labels` by `val`.
    /// Unregistered names are ignored.
    pub fn counter_add_with(&self, name: &str, labels: &[(&str, &str)], val: u64) {
        let mut counters = self.counters.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(family) = counters.get_mut(name) {
            *family.series.entry(render_labels(labels)).or_insert(0) += val;
        }
    }

    /// Current value of a counter series, 0 if it was never incremented.
    pub fn counter_value(&self, name: &str, labels: &[(&str, &str)]) -> u64 {
        let counters = self.counters.read().unwrap_or_else(PoisonError::into_inner);
        counters
            .get(name)
            .and_then(|f| f.series.get(&render_labels(labels)).copied())
            .unwrap_or(0)
    }

    /// Set a gauge to a specific value.
    pub fn gauge_set(&self, name: &str, val: i64) {
        let gauges = self.gauges.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(g) = gauges.get(name) {
            g.value.store(val, Ordering::Relaxed);
        }
    }

    /// Current value of a gauge, 0 if unregistered.
    pub fn gauge_value(&self, name: &str) -> i64 {
        let gauges = self.gauges.read().unwrap_or_else(PoisonError::into_inner);
        gauges
            .get(name)
            .map(|g| g.value.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    /// Render all metrics in Prometheus text exposition format.
    pub fn render(&self) -> String {
        let mut output = String::new();

        // Counters
        let counters = self.counters.read().unwrap_or_else(PoisonError::into_inner);
        for (name, family) in counters.iter() {
            let _ = writeln!(output, "# HELP {} {}", name, family.help);
            let _ = writeln!(output, "# TYPE {} counter", name);
            if family.series.is_empty() {
                let _ = writeln!(output, "{} 0", name);
            }
            for (labels, value) in &family.series {
                let _ = writeln!(output, "{}{} {}", name, labels, value);
            }
        }

        // Gauges
        let gauges = self.gauges.read().unwrap_or_else(PoisonError::into_inner);
        for (name, gauge) in gauges.iter() {
            let _ = writeln!(output, "# HELP {} {}", name, gauge.help);
            let _ = writeln!(output, "# TYPE {} gauge", name);
            let _ = writeln!(output, "{} {}", name, gauge.value.load(Ordering::Relaxed));
        }

        output
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// `{a="1",b="2"}`, or empty for no labels.
fn render_labels(labels: &[(&str, &str)]) -> String {
    if labels.is_empty() {
        return String::new();
    }
    let body: Vec<String> = labels
        .iter()
        .map(|(k, v)| {
            let escaped = v
                .replace('\\', "\\\\")
                .replace('"', "\\\"")
                .replace('\n', "\\n");
            format!("{}=\"{}\"", k, escaped)
        })
        .collect();
    format!("{{{}}}", body.join(","))
}

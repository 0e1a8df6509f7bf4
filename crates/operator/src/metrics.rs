//! Process-wide Prometheus registry and the gauges/counters/histograms named
//! in the observability surface (§4.14, §4.17), following the
//! lazily-registered-`Registry` idiom common to Kubernetes controllers.

use prometheus::{
    register_counter_vec_with_registry, register_gauge_with_registry, register_histogram_with_registry, CounterVec,
    Encoder, Gauge, Histogram, Registry, TextEncoder,
};
use std::sync::OnceLock;

pub struct Metrics {
    pub registry: Registry,
    pub tasks_total: CounterVec,
    pub tasks_active: Gauge,
    pub task_duration_seconds: Histogram,
    pub task_cost_usd: Histogram,
    pub budget_exceeded_total: prometheus::Counter,
    pub stuck_detected_total: CounterVec,
}

impl Metrics {
    #[allow(clippy::expect_used)]
    fn new() -> Self {
        let registry = Registry::new();

        let tasks_total = register_counter_vec_with_registry!(
            "hortator_tasks_total",
            "Tasks that have reached a terminal phase, by phase",
            &["phase"],
            registry
        )
        .expect("metric registration with a fixed name cannot fail");

        let tasks_active =
            register_gauge_with_registry!("hortator_tasks_active", "Tasks currently in the Running phase", registry)
                .expect("metric registration with a fixed name cannot fail");

        let task_duration_seconds = register_histogram_with_registry!(
            "hortator_task_duration_seconds",
            "Wall-clock duration of completed tasks",
            vec![1.0, 5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0, 3600.0],
            registry
        )
        .expect("metric registration with a fixed name cannot fail");

        let task_cost_usd = register_histogram_with_registry!(
            "hortator_task_cost_usd",
            "Estimated USD cost of completed tasks",
            vec![0.001, 0.01, 0.1, 0.5, 1.0, 5.0, 20.0],
            registry
        )
        .expect("metric registration with a fixed name cannot fail");

        let budget_exceeded_total = prometheus::register_counter_with_registry!(
            "hortator_budget_exceeded_total",
            "Tasks that self-reported a budget_exceeded status marker",
            registry
        )
        .expect("metric registration with a fixed name cannot fail");

        let stuck_detected_total = register_counter_vec_with_registry!(
            "hortator_stuck_detected_total",
            "Tasks flagged stuck by the log-signal detector, by action taken",
            &["action"],
            registry
        )
        .expect("metric registration with a fixed name cannot fail");

        Self {
            registry,
            tasks_total,
            tasks_active,
            task_duration_seconds,
            task_cost_usd,
            budget_exceeded_total,
            stuck_detected_total,
        }
    }

    #[allow(clippy::expect_used)]
    pub fn encode(&self) -> String {
        let metric_families = self.registry.gather();
        let mut buf = Vec::new();
        TextEncoder::new()
            .encode(&metric_families, &mut buf)
            .expect("prometheus text encoding of well-formed metric families cannot fail");
        String::from_utf8(buf).expect("prometheus text encoder only emits UTF-8")
    }
}

static METRICS: OnceLock<Metrics> = OnceLock::new();

pub fn metrics() -> &'static Metrics {
    METRICS.get_or_init(Metrics::new)
}

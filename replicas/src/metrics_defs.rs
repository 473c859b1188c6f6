//! Metrics definitions for the replicas client.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricType {
    Counter,
    Gauge,
    Histogram,
}

#[derive(Debug, Clone, Copy)]
pub struct MetricDef {
    pub name: &'static str,
    pub metric_type: MetricType,
    pub description: &'static str,
}

#[macro_export]
macro_rules! counter {
    ($def:expr) => {
        metrics::counter!($def.name)
    };
}

#[macro_export]
macro_rules! gauge {
    ($def:expr) => {
        metrics::gauge!($def.name)
    };
}

#[macro_export]
macro_rules! histogram {
    ($def:expr) => {
        metrics::histogram!($def.name)
    };
}

pub const DBLIST_CACHE_HIT: MetricDef = MetricDef {
    name: "dblist.cache.hit",
    metric_type: MetricType::Counter,
    description: "Number of dblist reads served from a fresh cache entry",
};

pub const DBLIST_CACHE_MISS: MetricDef = MetricDef {
    name: "dblist.cache.miss",
    metric_type: MetricType::Counter,
    description: "Number of dblist reads that required a rebuild",
};

pub const DBLIST_STALE_SERVED: MetricDef = MetricDef {
    name: "dblist.stale_served",
    metric_type: MetricType::Counter,
    description: "Number of times an expired dblist was served because the rebuild failed",
};

pub const DBLIST_FETCH_FAILURE: MetricDef = MetricDef {
    name: "dblist.fetch.failure",
    metric_type: MetricType::Counter,
    description: "Number of dblist rebuilds aborted by an upstream failure",
};

pub const DBLIST_FETCH_DURATION: MetricDef = MetricDef {
    name: "dblist.fetch.duration",
    metric_type: MetricType::Histogram,
    description: "Time to fetch every dblist in seconds",
};

pub const DBLIST_DATABASES: MetricDef = MetricDef {
    name: "dblist.databases",
    metric_type: MetricType::Gauge,
    description: "Number of databases in the most recently fetched dblist",
};

pub const ALL_METRICS: &[MetricDef] = &[
    DBLIST_CACHE_HIT,
    DBLIST_CACHE_MISS,
    DBLIST_STALE_SERVED,
    DBLIST_FETCH_FAILURE,
    DBLIST_FETCH_DURATION,
    DBLIST_DATABASES,
];

/// Registers descriptions for every metric with the installed recorder.
pub fn describe_metrics() {
    for def in ALL_METRICS {
        match def.metric_type {
            MetricType::Counter => metrics::describe_counter!(def.name, def.description),
            MetricType::Gauge => metrics::describe_gauge!(def.name, def.description),
            MetricType::Histogram => metrics::describe_histogram!(def.name, def.description),
        }
    }
}

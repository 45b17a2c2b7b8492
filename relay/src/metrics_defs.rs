use shared::metrics_defs::{MetricDef, MetricType};

pub const RELAY_ATTEMPTS: MetricDef = MetricDef {
    name: "relay.attempts",
    metric_type: MetricType::Counter,
    description: "Candidate attempts executed against the backend",
};

pub const RELAY_FALLBACKS: MetricDef = MetricDef {
    name: "relay.fallbacks",
    metric_type: MetricType::Counter,
    description: "Attempts that advanced to the next candidate (soft fail or transport error)",
};

pub const RELAY_HARD_FAILS: MetricDef = MetricDef {
    name: "relay.hard_fails",
    metric_type: MetricType::Counter,
    description: "Operations stopped by an authoritative backend rejection",
};

pub const RELAY_BUDGET_EXHAUSTED: MetricDef = MetricDef {
    name: "relay.budget_exhausted",
    metric_type: MetricType::Counter,
    description: "Operations that ran out of candidates or deadline",
};

pub const OPERATION_DURATION: MetricDef = MetricDef {
    name: "relay.operation.duration",
    metric_type: MetricType::Histogram,
    description: "End-to-end relay operation duration in seconds",
};

pub const ALL_METRICS: &[MetricDef] = &[
    RELAY_ATTEMPTS,
    RELAY_FALLBACKS,
    RELAY_HARD_FAILS,
    RELAY_BUDGET_EXHAUSTED,
    OPERATION_DURATION,
];

use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub connected_sessions: IntGauge,
    pub drivers_online: IntGauge,
    pub rides_total: IntCounterVec,
    pub accept_attempts_total: IntCounterVec,
    pub dispatch_candidates: Histogram,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let connected_sessions =
            IntGauge::new("connected_sessions", "Currently connected realtime sessions")
                .expect("valid connected_sessions metric");

        let drivers_online = IntGauge::new("drivers_online", "Drivers currently marked online")
            .expect("valid drivers_online metric");

        let rides_total = IntCounterVec::new(
            Opts::new("rides_total", "Ride lifecycle events by outcome"),
            &["outcome"],
        )
        .expect("valid rides_total metric");

        let accept_attempts_total = IntCounterVec::new(
            Opts::new(
                "accept_attempts_total",
                "Ride acceptance attempts by outcome",
            ),
            &["outcome"],
        )
        .expect("valid accept_attempts_total metric");

        let dispatch_candidates = Histogram::with_opts(
            HistogramOpts::new(
                "dispatch_candidates",
                "Number of candidate drivers per dispatched ride",
            )
            .buckets(vec![0.0, 1.0, 2.0, 5.0, 10.0, 20.0]),
        )
        .expect("valid dispatch_candidates metric");

        registry
            .register(Box::new(connected_sessions.clone()))
            .expect("register connected_sessions");
        registry
            .register(Box::new(drivers_online.clone()))
            .expect("register drivers_online");
        registry
            .register(Box::new(rides_total.clone()))
            .expect("register rides_total");
        registry
            .register(Box::new(accept_attempts_total.clone()))
            .expect("register accept_attempts_total");
        registry
            .register(Box::new(dispatch_candidates.clone()))
            .expect("register dispatch_candidates");

        Self {
            registry,
            connected_sessions,
            drivers_online,
            rides_total,
            accept_attempts_total,
            dispatch_candidates,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

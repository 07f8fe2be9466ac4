use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

/// All counters and gauges the service exposes. Built once at startup and shared as
/// Rocket state, the same way the reference codebase shares its `RateLimiter` and
/// `PresenceTracker` singletons. Labeled families use `prometheus::IntCounterVec`; the
/// text encoder produces the `# HELP` / `# TYPE` preamble per family for free.
pub struct Metrics {
    registry: Registry,
    pub connections_total: IntCounter,
    pub active_connections: IntGauge,
    pub messages_total: IntCounter,
    pub auth_failures_total: IntCounter,
    pub rate_limited_total: IntCounter,
    pub relay_usage_total: IntCounter,
    pub ice_state_total: IntCounterVec,
    pub failure_reason_total: IntCounterVec,
    pub region_carrier_total: IntCounterVec,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let connections_total = IntCounter::new(
            "bs_ws_connections_total",
            "Total number of signaling connections accepted",
        )
        .unwrap();
        let active_connections = IntGauge::new(
            "bs_ws_active_connections",
            "Number of signaling connections currently open",
        )
        .unwrap();
        let messages_total = IntCounter::new(
            "bs_ws_messages_total",
            "Total number of inbound signaling messages processed",
        )
        .unwrap();
        let auth_failures_total = IntCounter::new(
            "bs_ws_auth_failures_total",
            "Total number of authentication failures",
        )
        .unwrap();
        let rate_limited_total = IntCounter::new(
            "bs_ws_rate_limited_total",
            "Total number of rate-limit rejections (connection or message)",
        )
        .unwrap();
        let relay_usage_total = IntCounter::new(
            "bs_relay_usage_total",
            "Total number of telemetry reports indicating TURN relay usage",
        )
        .unwrap();
        let ice_state_total = IntCounterVec::new(
            Opts::new("bs_ice_state_total", "Telemetry reports by reported ICE state"),
            &["ice_state"],
        )
        .unwrap();
        let failure_reason_total = IntCounterVec::new(
            Opts::new(
                "bs_failure_reason_total",
                "Telemetry reports by reported failure reason",
            ),
            &["reason"],
        )
        .unwrap();
        let region_carrier_total = IntCounterVec::new(
            Opts::new(
                "bs_region_carrier_total",
                "Telemetry reports by reported region/carrier",
            ),
            &["region", "carrier"],
        )
        .unwrap();

        for collector in [
            Box::new(connections_total.clone()) as Box<dyn prometheus::core::Collector>,
            Box::new(active_connections.clone()),
            Box::new(messages_total.clone()),
            Box::new(auth_failures_total.clone()),
            Box::new(rate_limited_total.clone()),
            Box::new(relay_usage_total.clone()),
            Box::new(ice_state_total.clone()),
            Box::new(failure_reason_total.clone()),
            Box::new(region_carrier_total.clone()),
        ] {
            registry.register(collector).expect("metric names are unique");
        }

        Self {
            registry,
            connections_total,
            active_connections,
            messages_total,
            auth_failures_total,
            rate_limited_total,
            relay_usage_total,
            ice_state_total,
            failure_reason_total,
            region_carrier_total,
        }
    }

    /// Renders the full metric set as Prometheus text format (version 0.0.4).
    pub fn render(&self) -> String {
        let families = self.registry.gather();
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&families, &mut buffer)
            .expect("prometheus text encoding never fails for well-formed families");
        String::from_utf8(buffer).expect("prometheus text output is always valid utf-8")
    }

    pub fn record_telemetry(&self, fields: &crate::models::TelemetryFields) {
        if let Some(state) = &fields.ice_state {
            self.ice_state_total
                .with_label_values(&[state.as_str()])
                .inc();
        }
        if let Some(reason) = &fields.failure_reason {
            self.failure_reason_total
                .with_label_values(&[reason.as_str()])
                .inc();
        }
        if fields.relay_used.unwrap_or(false) {
            self.relay_usage_total.inc();
        }
        if fields.region.is_some() || fields.carrier.is_some() {
            let region = fields.region.as_deref().unwrap_or("unknown");
            let carrier = fields.carrier.as_deref().unwrap_or("unknown");
            self.region_carrier_total
                .with_label_values(&[region, carrier])
                .inc();
        }
    }
}

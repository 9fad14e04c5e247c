use prometheus::core::Collector;
use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};

#[derive(Clone)]
pub struct BusMetrics {
    pub transactions: IntCounter,
    pub comm_failures: IntCounter,
    pub absent_readings: IntCounter,
    pub motors_registered: IntGauge,
}

#[derive(Clone)]
pub struct MetricsHub {
    pub registry: Registry,
    pub bus: BusMetrics,
}

impl MetricsHub {
    pub fn new() -> Result<Self, String> {
        Self::with_registry(Registry::new())
    }

    /// Register the bus metrics into an existing registry. Fails when a
    /// metric of the same name is already there.
    pub fn with_registry(registry: Registry) -> Result<Self, String> {
        let transactions = IntCounter::new("lcr_bus_transactions", "Total bus transactions issued")
            .map_err(|e| format!("metrics init error: {e}"))?;
        let comm_failures = IntCounter::new(
            "lcr_bus_comm_failures",
            "Transactions that failed at the transport level or with a device error",
        )
        .map_err(|e| format!("metrics init error: {e}"))?;
        let absent_readings = IntCounter::new(
            "lcr_bus_absent_readings",
            "Per-motor values missing from synchronized reads",
        )
        .map_err(|e| format!("metrics init error: {e}"))?;
        let motors_registered =
            IntGauge::new("lcr_bus_motors", "Number of motors registered on the chain")
                .map_err(|e| format!("metrics init error: {e}"))?;
        let bus = BusMetrics {
            transactions,
            comm_failures,
            absent_readings,
            motors_registered,
        };
        let collectors: [Box<dyn Collector>; 4] = [
            Box::new(bus.transactions.clone()),
            Box::new(bus.comm_failures.clone()),
            Box::new(bus.absent_readings.clone()),
            Box::new(bus.motors_registered.clone()),
        ];
        for collector in collectors {
            registry
                .register(collector)
                .map_err(|e| format!("metrics register error: {e}"))?;
        }
        Ok(Self { registry, bus })
    }

    pub fn encode_text(&self) -> String {
        let mut buf = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buf) {
            return format!("error encoding metrics: {e}");
        }
        String::from_utf8(buf).unwrap_or_default()
    }
}

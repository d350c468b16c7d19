use std::future::Future;
use std::io::Write;

use btleplug::api::ScanFilter;
use log::{debug, error, info};
use uuid::Uuid;

use crate::messages::{AdapterState, Discovery, RecordFormat, ScanEvent};

/// Something that can be asked to start scanning, usually the platform adapter.
pub trait ScanTarget {
    fn start_scan(&self, filter: ScanFilter)
    -> impl Future<Output = btleplug::Result<()>> + Send;
}

impl ScanTarget for btleplug::platform::Adapter {
    async fn start_scan(&self, filter: ScanFilter) -> btleplug::Result<()> {
        btleplug::api::Central::start_scan(self, filter).await
    }
}

pub struct Scanner<T, W> {
    target: T,
    services: Vec<Uuid>,
    format: RecordFormat,
    out: W,
    scanning: bool,
}

impl<T: ScanTarget, W: Write> Scanner<T, W> {
    pub fn new(target: T, services: Vec<Uuid>, format: RecordFormat, out: W) -> Self {
        Scanner {
            target,
            services,
            format,
            out,
            scanning: false,
        }
    }

    pub async fn handle(&mut self, event: ScanEvent) -> std::io::Result<()> {
        match event {
            ScanEvent::StateChanged(state) => self.on_state(state).await,
            ScanEvent::Discovered(discovery) => self.on_discovery(&discovery),
        }
    }

    /// Starts a scan when the adapter becomes ready. Any other state is only
    /// reported.
    pub async fn on_state(&mut self, state: AdapterState) -> std::io::Result<()> {
        if !state.is_ready() {
            self.scanning = false;
            writeln!(self.out, "Central manager state: {state}")?;
            return Ok(());
        }

        if self.scanning {
            debug!("Adapter reported ready while already scanning");
            return Ok(());
        }

        writeln!(self.out, "Central manager is powered on, starting scan...")?;
        let filter = ScanFilter {
            services: self.services.clone(),
        };
        match self.target.start_scan(filter).await {
            Ok(()) => {
                info!("Scan started (service filter: {:?})", self.services);
                self.scanning = true;
            }
            Err(err) => {
                error!("Error starting scan in state {state}: {:?}", err);
            }
        }
        Ok(())
    }

    pub fn on_discovery(&mut self, discovery: &Discovery) -> std::io::Result<()> {
        match self.format {
            RecordFormat::Text => writeln!(self.out, "{discovery}")?,
            RecordFormat::Json => {
                let line = serde_json::to_string(discovery)?;
                writeln!(self.out, "{line}")?;
            }
        }
        self.out.flush()
    }

    #[cfg(test)]
    pub(crate) fn output(&self) -> &W {
        &self.out
    }
}

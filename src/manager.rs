use std::fmt;
use std::future::Future;
use std::io::Write;

use btleplug::api::{Central as _, CentralEvent, Peripheral as _, PeripheralProperties};
use btleplug::platform::{Adapter, PeripheralId};
use futures::StreamExt as _;
use futures::stream::BoxStream;
use log::{debug, info, warn};

use crate::messages::{AdapterState, Discovery, ScanEvent};
use crate::scanner::{ScanTarget, Scanner};

/// The adapter events the manager acts on.
#[derive(Debug)]
pub enum AdapterEvent<I> {
    StateUpdate(AdapterState),
    Discovered(I),
    Updated(I),
}

impl AdapterEvent<PeripheralId> {
    fn from_central(event: CentralEvent) -> Option<Self> {
        match event {
            CentralEvent::StateUpdate(state) => Some(AdapterEvent::StateUpdate(state.into())),
            CentralEvent::DeviceDiscovered(id) => Some(AdapterEvent::Discovered(id)),
            CentralEvent::DeviceUpdated(id) => Some(AdapterEvent::Updated(id)),
            _ => None,
        }
    }
}

/// Event and property side of a central adapter.
pub trait EventSource: ScanTarget {
    type Id: fmt::Display + Send + Sync;

    fn events(
        &self,
    ) -> impl Future<Output = btleplug::Result<BoxStream<'static, AdapterEvent<Self::Id>>>> + Send;

    fn adapter_state(&self) -> impl Future<Output = btleplug::Result<AdapterState>> + Send;

    fn properties(
        &self,
        id: &Self::Id,
    ) -> impl Future<Output = btleplug::Result<Option<PeripheralProperties>>> + Send;
}

impl EventSource for Adapter {
    type Id = PeripheralId;

    async fn events(&self) -> btleplug::Result<BoxStream<'static, AdapterEvent<PeripheralId>>> {
        let events = btleplug::api::Central::events(self).await?;
        Ok(events
            .filter_map(|event| futures::future::ready(AdapterEvent::from_central(event)))
            .boxed())
    }

    async fn adapter_state(&self) -> btleplug::Result<AdapterState> {
        Ok(btleplug::api::Central::adapter_state(self).await?.into())
    }

    async fn properties(&self, id: &PeripheralId) -> btleplug::Result<Option<PeripheralProperties>> {
        let peripheral = self.peripheral(id).await?;
        peripheral.properties().await
    }
}

pub struct Manager<S, W> {
    adapter: S,
    scanner: Scanner<S, W>,
    report_updates: bool,
}

impl<S: EventSource + Clone, W: Write> Manager<S, W> {
    pub fn new(adapter: S, scanner: Scanner<S, W>, report_updates: bool) -> Self {
        Manager {
            adapter,
            scanner,
            report_updates,
        }
    }

    /// Feeds adapter events to the scanner until the event stream closes.
    pub async fn run_loop(&mut self) -> anyhow::Result<()> {
        let mut events = self.adapter.events().await?;

        // the platform only reports state changes, so seed the current one
        let state = self.adapter.adapter_state().await?;
        self.scanner.handle(ScanEvent::StateChanged(state)).await?;

        while let Some(event) = events.next().await {
            match event {
                AdapterEvent::StateUpdate(state) => {
                    self.scanner.handle(ScanEvent::StateChanged(state)).await?;
                }
                AdapterEvent::Discovered(id) => self.discovered(&id).await?,
                AdapterEvent::Updated(id) if self.report_updates => self.discovered(&id).await?,
                AdapterEvent::Updated(id) => debug!("Skipping update from {id}"),
            }
        }

        info!("No more adapter events");
        Ok(())
    }

    async fn discovered(&mut self, id: &S::Id) -> std::io::Result<()> {
        match self.adapter.properties(id).await {
            Ok(properties) => {
                let discovery = Discovery::new(id, properties.unwrap_or_default());
                self.scanner.handle(ScanEvent::Discovered(discovery)).await
            }
            Err(err) => {
                warn!("Error reading properties of {id}: {:?}", err);
                Ok(())
            }
        }
    }
}

pub async fn pick_adapter(adapters: Vec<Adapter>, index: usize) -> anyhow::Result<Adapter> {
    debug!("Found {} Bluetooth adapter(s)", adapters.len());
    let adapter = adapters
        .into_iter()
        .nth(index)
        .ok_or_else(|| anyhow::anyhow!("no Bluetooth adapter at index {index}"))?;
    match adapter.adapter_info().await {
        Ok(info) => info!("Using adapter {info}"),
        Err(err) => debug!("Adapter info unavailable: {:?}", err),
    }
    Ok(adapter)
}

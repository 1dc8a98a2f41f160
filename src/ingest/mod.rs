pub mod payload;

use std::time::Duration;

use anyhow::Result;
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS};
use tokio::time;
use tracing::{debug, error, info, warn};

use crate::{
    config::MqttConfig,
    db::models::TemperatureReading,
    store::{format, ReadingsStore, StoreError},
};

const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Subscribes to the sensor topic and persists every valid payload through
/// the readings store.
pub struct MqttIngest {
    store: ReadingsStore,
    config: MqttConfig,
}

impl MqttIngest {
    pub fn new(store: ReadingsStore, config: MqttConfig) -> Self {
        Self { store, config }
    }

    /// Runs the MQTT event loop indefinitely.
    /// Spawn this via `tokio::spawn`.
    pub async fn run(self) {
        let mut options = MqttOptions::new(
            &self.config.client_id,
            &self.config.broker_host,
            self.config.broker_port,
        );
        options.set_keep_alive(Duration::from_secs(30));
        if let Some((username, password)) = &self.config.credentials {
            options.set_credentials(username, password);
        }

        let (client, mut eventloop) = AsyncClient::new(options, 10);
        info!(
            broker = %self.config.broker_host,
            port = self.config.broker_port,
            topic = %self.config.topic,
            "MQTT ingestion started"
        );

        loop {
            match eventloop.poll().await {
                // Clean sessions drop subscriptions, so subscribe on every (re)connect.
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    info!("Connected to MQTT broker");
                    if let Err(e) = client.subscribe(&self.config.topic, QoS::AtLeastOnce).await {
                        error!(error = %e, topic = %self.config.topic, "Failed to subscribe");
                    }
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    self.handle_message(&publish.topic, &publish.payload).await;
                }
                Ok(_) => {}
                Err(e) => {
                    error!(error = %e, "MQTT connection error; retrying");
                    time::sleep(RECONNECT_DELAY).await;
                }
            }
        }
    }

    /// Parses and persists one payload.
    pub async fn ingest(&self, payload: &[u8]) -> Result<TemperatureReading> {
        let new = payload::parse(payload, self.config.default_location.as_deref())?;
        Ok(self.store.create(new).await?)
    }

    async fn handle_message(&self, topic: &str, payload: &[u8]) {
        match self.ingest(payload).await {
            Ok(reading) => debug!(topic = %topic, reading = %format::describe(&reading), "Ingested reading"),
            Err(e) if e.downcast_ref::<StoreError>().is_some_and(StoreError::is_retryable) => {
                error!(topic = %topic, error = %e, "Failed to persist reading");
            }
            Err(e) => warn!(topic = %topic, error = %e, "Discarding invalid payload"),
        }
    }
}

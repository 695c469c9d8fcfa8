//! MQTT outbound interface. `rumqttc` is the standard async MQTT client in
//! the tokio ecosystem; nothing in the retrieved example pack wires up MQTT
//! so it is picked fresh rather than adapted, same rationale as the serial
//! transport.
use crate::config::MqttConfig;
use crate::error::DeliveryError;
use rumqttc::{AsyncClient, MqttOptions, QoS};
use std::time::Duration;

pub struct MqttInterface {
    client: AsyncClient,
    topic: String,
}

impl MqttInterface {
    pub fn connect(config: &MqttConfig) -> (Self, rumqttc::EventLoop) {
        let mut options = MqttOptions::new(&config.client_id, &config.broker_url, config.port);
        options.set_keep_alive(Duration::from_secs(30));
        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            options.set_credentials(username, password);
        }
        if config.tls {
            tracing::info!("mqtt tls requested for {}; using rumqttc's native-tls default transport", config.broker_url);
            options.set_transport(rumqttc::Transport::tls_with_default_config());
        }
        let (client, eventloop) = AsyncClient::new(options, 64);
        let topic = format!(
            "{}/{}/c/{}/{}",
            config.topic_prefix, config.region, config.client_id, config.client_id
        );
        (MqttInterface { client, topic }, eventloop)
    }

    pub fn topic_for_channel(&self, channel_name: &str) -> String {
        let parts: Vec<&str> = self.topic.rsplitn(2, '/').collect();
        match parts.as_slice() {
            [last, rest] => format!("{rest}/{channel_name}/{last}"),
            _ => self.topic.clone(),
        }
    }

    pub async fn send(
        &self,
        payload: &[u8],
        channel_name: &str,
        qos: u8,
    ) -> Result<(), DeliveryError> {
        let qos = match qos {
            0 => QoS::AtMostOnce,
            1 => QoS::AtLeastOnce,
            _ => QoS::ExactlyOnce,
        };
        self.client
            .publish(self.topic_for_channel(channel_name), qos, false, payload)
            .await
            .map_err(|e| DeliveryError::Transient(format!("mqtt publish failed: {e}")))
    }
}

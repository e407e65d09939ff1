//! [`MetricSource`] backed by an SNMPv2c agent over UDP.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicI32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, trace};
use tokio::net::UdpSocket;
use tokio::time::Instant;

use super::ber::{Message, PDU_GET_RESPONSE, check_oid};
use crate::address::Address;
use crate::config::CollectorConfig;
use crate::error::TransportError;
use crate::source::{MetricSource, Reading};

/// Largest datagram accepted from the agent.
const MAX_DATAGRAM: usize = 65_507;

/// One GetRequest per batch. Each fetch uses its own ephemeral socket, so
/// concurrent group fetches never read each other's responses.
pub struct SnmpSource {
    agent: SocketAddr,
    community: Vec<u8>,
    timeout: Duration,
    retries: u32,
    next_request_id: AtomicI32,
}

impl SnmpSource {
    /// Resolve `agent` (`host:port`) once and keep the address.
    pub async fn connect(
        agent: &str,
        community: &str,
        timeout: Duration,
        retries: u32,
    ) -> Result<Self, TransportError> {
        let agent = tokio::net::lookup_host(agent).await?.next().ok_or_else(|| {
            TransportError::Protocol(format!("agent {agent} did not resolve to an address"))
        })?;
        debug!("snmp agent {agent}, timeout {} ms, {retries} retries", timeout.as_millis());
        Ok(Self {
            agent,
            community: community.as_bytes().to_vec(),
            timeout,
            retries,
            next_request_id: AtomicI32::new(1),
        })
    }

    pub async fn from_config(config: &CollectorConfig) -> Result<Self, TransportError> {
        Self::connect(
            &config.agent,
            &config.community,
            config.request_timeout(),
            config.retries,
        )
        .await
    }

    pub fn agent(&self) -> SocketAddr {
        self.agent
    }

    fn request_id(&self) -> i32 {
        // Wraps within the positive i32 range.
        self.next_request_id.fetch_add(1, Ordering::Relaxed) & 0x7FFF_FFFF
    }

    async fn exchange(&self, request: &[u8], request_id: i64) -> Result<Message, TransportError> {
        let local: SocketAddr = if self.agent.is_ipv4() {
            ([0, 0, 0, 0], 0).into()
        } else {
            (std::net::Ipv6Addr::UNSPECIFIED, 0).into()
        };
        let socket = UdpSocket::bind(local).await?;
        socket.connect(self.agent).await?;

        let mut buf = vec![0u8; MAX_DATAGRAM];
        for attempt in 0..=self.retries {
            if attempt > 0 {
                debug!("request {request_id} retry {attempt}/{}", self.retries);
            }
            socket.send(request).await?;
            let deadline = Instant::now() + self.timeout;
            loop {
                let n = match tokio::time::timeout_at(deadline, socket.recv(&mut buf)).await {
                    Ok(received) => received?,
                    Err(_) => break,
                };
                let message = match Message::decode(&buf[..n]) {
                    Ok(message) => message,
                    Err(e) => {
                        debug!("discarding undecodable datagram: {e}");
                        continue;
                    }
                };
                if message.request_id != request_id {
                    trace!(
                        "discarding response {} while waiting for {request_id}",
                        message.request_id
                    );
                    continue;
                }
                return Ok(message);
            }
        }
        Err(TransportError::Timeout)
    }
}

/// Map a response onto the requested OIDs, positionally.
fn readings(response: &Message, requested: &[Vec<u32>]) -> Result<Vec<Reading>, TransportError> {
    if response.pdu_type != PDU_GET_RESPONSE {
        return Err(TransportError::Protocol(format!(
            "expected GetResponse, got pdu {:#04x}",
            response.pdu_type
        )));
    }
    if response.error_status != 0 {
        return Err(TransportError::AgentError {
            status: response.error_status,
            index: response.error_index,
        });
    }
    for (vb, oid) in response.varbinds.iter().zip(requested) {
        if vb.oid != *oid {
            return Err(TransportError::Protocol(
                "response varbinds out of order".to_string(),
            ));
        }
    }
    // Extra trailing varbinds are ignored; missing ones are left to the caller.
    Ok(response
        .varbinds
        .iter()
        .take(requested.len())
        .map(|vb| vb.value.to_reading())
        .collect())
}

#[async_trait]
impl MetricSource for SnmpSource {
    fn name(&self) -> &str {
        "snmp"
    }

    async fn fetch(&self, batch: &[Address]) -> Result<Vec<Reading>, TransportError> {
        let oids = batch
            .iter()
            .map(|address| {
                let arcs = address
                    .arcs()
                    .ok_or_else(|| TransportError::Protocol(format!("not an OID: {address}")))?;
                check_oid(&arcs).map_err(|e| TransportError::Protocol(format!("{address}: {e}")))?;
                Ok(arcs)
            })
            .collect::<Result<Vec<_>, TransportError>>()?;

        let request_id = i64::from(self.request_id());
        let request = Message::get_request(&self.community, request_id, &oids).encode();
        let response = self.exchange(&request, request_id).await?;
        readings(&response, &oids)
    }
}

use bytes::{Buf, Bytes};
use tokio::net::UdpSocket;
use tokio::sync::mpsc;

use speaker_pipeline::config::BridgeConfig;

/// Size of the sample time header in front of every datagram.
const HEADER_LEN: usize = 8;

/// One compressed packet with the sender's sample time in ns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaPacket {
    pub sample_time: u64,
    pub payload: Bytes,
}

/// Parse `[u64 big-endian sample time][payload]`. An empty payload marks a lost packet.
pub fn parse_datagram(datagram: &[u8]) -> Option<MediaPacket> {
    if datagram.len() < HEADER_LEN {
        return None;
    }
    let mut buf = Bytes::copy_from_slice(datagram);
    let sample_time = buf.get_u64();
    Some(MediaPacket {
        sample_time,
        payload: buf,
    })
}

/// Receives media packets over UDP and forwards them to the playback thread.
pub struct PacketBridge {
    socket: UdpSocket,
    tx: mpsc::Sender<MediaPacket>,
}

impl PacketBridge {
    pub async fn new(config: &BridgeConfig, tx: mpsc::Sender<MediaPacket>) -> anyhow::Result<Self> {
        let socket = UdpSocket::bind(format!("0.0.0.0:{}", config.listen_port)).await?;
        log::info!("Listening for media packets on UDP port {}", config.listen_port);
        Ok(Self { socket, tx })
    }

    pub async fn run(&self) -> anyhow::Result<()> {
        let mut buf = [0u8; 2048]; // 单个Opus包不会超过2KB
        loop {
            let (len, peer) = self.socket.recv_from(&mut buf).await?;
            let Some(packet) = parse_datagram(&buf[..len]) else {
                log::warn!("Dropping short datagram ({} bytes) from {}", len, peer);
                continue;
            };
            if self.tx.send(packet).await.is_err() {
                log::info!("Playback thread gone, stopping packet bridge");
                break;
            }
        }
        Ok(())
    }
}

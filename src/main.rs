mod packet_bridge;

use std::sync::Arc;
use std::thread;

use anyhow::Context;
use tokio::signal;
use tokio::sync::mpsc;

use packet_bridge::{MediaPacket, PacketBridge};
use speaker_pipeline::audio::{AlsaSinkOpener, OpusDecoderFactory};
use speaker_pipeline::{Config, Speaker, StreamHandle};

const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 初始化日志
    env_logger::init();

    // 加载配置，文件不存在时使用默认值
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());
    let config = if std::path::Path::new(&path).exists() {
        Config::load(&path).with_context(|| format!("Failed to load config from {}", path))?
    } else {
        log::warn!("Config file {} not found, using defaults", path);
        Config::default()
    };

    let speaker = Arc::new(Speaker::new(
        config.speaker.clone(),
        config.drift,
        Box::new(AlsaSinkOpener),
        Box::new(OpusDecoderFactory),
    ));

    let handle = speaker
        .start_stream(config.bridge.packet_time_ms, config.speaker.raw_sample_rate)
        .context("Failed to start speaker stream")?;
    speaker.set_volume(handle, config.bridge.volume)?;
    speaker.set_mute(handle, config.bridge.muted)?;

    // 网络任务 -> 播放线程
    let (tx, rx) = mpsc::channel::<MediaPacket>(config.bridge.channel_capacity);

    let play_handle = {
        let speaker = speaker.clone();
        thread::Builder::new()
            .name("speaker-play".into())
            .spawn(move || play_thread(&speaker, handle, rx))?
    };

    let bridge = PacketBridge::new(&config.bridge, tx).await?;
    let bridge_task = tokio::spawn(async move {
        if let Err(e) = bridge.run().await {
            log::error!("Packet bridge error: {}", e);
        }
    });

    signal::ctrl_c().await?;
    log::info!("Shutting down");

    // Dropping the bridge closes the channel, which ends the playback thread.
    bridge_task.abort();
    let _ = bridge_task.await;
    tokio::task::spawn_blocking(move || play_handle.join())
        .await?
        .map_err(|_| anyhow::anyhow!("Playback thread panicked"))?;

    Ok(())
}

fn play_thread(speaker: &Speaker, handle: StreamHandle, mut rx: mpsc::Receiver<MediaPacket>) {
    while let Some(packet) = rx.blocking_recv() {
        if let Err(e) = speaker.push(handle, &packet.payload, packet.sample_time) {
            log::error!("Speaker push failed: {}", e);
            break;
        }
    }

    match speaker.stop_stream(handle) {
        Ok(stats) => match serde_json::to_string(&stats) {
            Ok(json) => log::info!("Playback stopped: {}", json),
            Err(e) => log::warn!("Playback stopped, failed to encode stats: {}", e),
        },
        Err(e) => log::error!("Failed to stop speaker stream: {}", e),
    }
}

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

use crate::audio::TaggedFrame;
use crate::voice::transport::{ConnectOutcome, VoiceEndpoint, VoiceInbound, VoiceTransport};

const FRAME_MS: u64 = 20;

/// Development transport that replays a WAV fixture as a single tagged
/// participant stream. Stands in for the platform voice gateway, which
/// lives behind a platform SDK and is not part of this service.
pub struct LoopbackTransport {
    fixture: PathBuf,
    inbound: Option<mpsc::Receiver<VoiceInbound>>,
    feeder: Option<JoinHandle<()>>,
}

impl LoopbackTransport {
    pub fn new(fixture: PathBuf) -> Self {
        Self {
            fixture,
            inbound: None,
            feeder: None,
        }
    }
}

#[async_trait]
impl VoiceTransport for LoopbackTransport {
    async fn connect(&mut self, room: &str) -> Result<ConnectOutcome> {
        let reader = hound::WavReader::open(&self.fixture)
            .with_context(|| format!("open loopback fixture {}", self.fixture.display()))?;
        let spec = reader.spec();
        let samples: Vec<i16> = reader
            .into_samples::<i16>()
            .collect::<Result<Vec<_>, _>>()
            .context("read loopback fixture samples")?;

        info!(
            room,
            fixture = %self.fixture.display(),
            samples = samples.len(),
            "loopback transport connected"
        );

        let (tx, rx) = mpsc::channel(64);
        let samples_per_frame =
            (spec.sample_rate as usize / 1000) * FRAME_MS as usize * spec.channels as usize;

        let feeder = tokio::spawn(async move {
            let mut offset_ms = 0u64;
            for pcm in samples.chunks(samples_per_frame.max(1)) {
                let frame = TaggedFrame {
                    participant_id: "loopback".to_string(),
                    pcm: pcm.to_vec(),
                    sample_rate: spec.sample_rate,
                    channels: spec.channels,
                    offset_ms,
                };
                if tx.send(VoiceInbound::Frame(frame)).await.is_err() {
                    return;
                }
                offset_ms += FRAME_MS;
                tokio::time::sleep(Duration::from_millis(FRAME_MS)).await;
            }
            let _ = tx.send(VoiceInbound::Closed).await;
        });

        self.inbound = Some(rx);
        self.feeder = Some(feeder);

        Ok(ConnectOutcome::Ready {
            endpoint: VoiceEndpoint {
                host: "loopback".to_string(),
                port: 0,
                token: "local".to_string(),
            },
        })
    }

    async fn send_audio_ready_ack(&mut self) -> Result<()> {
        Ok(())
    }

    fn take_inbound(&mut self) -> Option<mpsc::Receiver<VoiceInbound>> {
        self.inbound.take()
    }

    async fn disconnect(&mut self, _force: bool) -> Result<()> {
        if let Some(feeder) = self.feeder.take() {
            feeder.abort();
        }
        self.inbound = None;
        Ok(())
    }
}

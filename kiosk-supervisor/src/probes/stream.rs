//! Stream-quality probe (spec §4.5 "Network & stream probes", §5 task 4,
//! §6 "stream-quality probe").
//!
//! The probe binary itself is opaque (spec §1 Non-goals: "the core only
//! spawns and kills child processes"); this module only knows its JSON
//! stdout contract (spec §6) and the invariant that two instances must
//! never run concurrently.

use std::ffi::OsString;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::metrics::{names, Registry};

/// Shape of the probe subprocess's JSON stdout (spec §6: "bitrate, width,
/// height, frame rate, audio channels, audio sample rate, plus elapsed
/// analysis seconds"). Only the fields with a metric counterpart in spec
/// §4.5's table feed a gauge; the rest are accepted so a well-formed
/// report never fails to parse, and logged for operator visibility.
#[derive(Debug, Deserialize)]
struct StreamProbeReport {
    bitrate_kbps: f64,
    width: u32,
    height: u32,
    framerate_fps: f64,
    #[serde(default)]
    audio_channels: Option<u32>,
    #[serde(default)]
    audio_sample_rate_hz: Option<u32>,
    #[serde(default)]
    elapsed_seconds: Option<f64>,
}

async fn probe_once(
    registry: &Registry,
    binary: &str,
    args: &[String],
    url: &str,
    timeout: Duration,
) -> Result<()> {
    let argv: Vec<OsString> = std::iter::once(OsString::from(binary))
        .chain(args.iter().map(OsString::from))
        .chain(std::iter::once(OsString::from(url)))
        .collect();

    let mut cmd = process_utils::tokio_command_from_vec(&argv)
        .ok_or_else(|| Error::Probe("empty stream probe command".to_string()))?;
    cmd.stdout(Stdio::piped()).stderr(Stdio::null());

    let child = cmd
        .spawn()
        .map_err(|err| Error::Probe(format!("failed to spawn stream probe: {err}")))?;

    let output = tokio::time::timeout(timeout, child.wait_with_output())
        .await
        .map_err(|_| Error::Probe("stream probe timed out".to_string()))?
        .map_err(Error::Io)?;

    if !output.status.success() {
        return Err(Error::Probe(format!(
            "stream probe exited with {:?}",
            output.status.code()
        )));
    }

    let report: StreamProbeReport = serde_json::from_slice(&output.stdout)
        .map_err(|err| Error::Probe(format!("malformed stream probe JSON: {err}")))?;

    debug!(
        audio_channels = ?report.audio_channels,
        audio_sample_rate_hz = ?report.audio_sample_rate_hz,
        elapsed_seconds = ?report.elapsed_seconds,
        "stream probe report"
    );

    registry.update(names::STREAM_BITRATE_KBPS, &[], report.bitrate_kbps);
    registry.update(names::STREAM_WIDTH_PIXELS, &[], report.width as f64);
    registry.update(names::STREAM_HEIGHT_PIXELS, &[], report.height as f64);
    registry.update(names::STREAM_FRAMERATE_FPS, &[], report.framerate_fps);
    Ok(())
}

/// Run the periodic stream-quality sampling loop until cancelled. Skips a
/// tick entirely if no stream URL is currently known, or if the previous
/// probe run is still in flight (spec §5 task 4).
pub async fn run(
    registry: Arc<Registry>,
    mut url: watch::Receiver<Option<String>>,
    binary: String,
    args: Vec<String>,
    timeout: Duration,
    interval: Duration,
    shutdown: CancellationToken,
) {
    let running = Arc::new(AtomicBool::new(false));
    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                let Some(current_url) = url.borrow().clone() else {
                    continue;
                };
                if running.swap(true, Ordering::AcqRel) {
                    debug!("skipping stream probe tick; previous run still in flight");
                    continue;
                }

                let registry = registry.clone();
                let running = running.clone();
                let binary = binary.clone();
                let args = args.clone();
                tokio::spawn(async move {
                    if let Err(err) = probe_once(&registry, &binary, &args, &current_url, timeout).await {
                        warn!(error = %err, "stream probe failed");
                    }
                    running.store(false, Ordering::Release);
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_probe_script(json: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let script_path = dir.path().join("fake_probe.sh");
        std::fs::write(&script_path, format!("#!/bin/sh\necho '{json}'\n")).unwrap();
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&script_path, std::fs::Permissions::from_mode(0o755)).unwrap();
        }
        (dir, script_path)
    }

    #[tokio::test]
    async fn probe_once_parses_well_formed_report() {
        let (_dir, script) = fake_probe_script(
            r#"{"bitrate_kbps": 4500.0, "width": 1920, "height": 1080, "framerate_fps": 30.0}"#,
        );
        let registry = Registry::new();
        probe_once(
            &registry,
            script.to_str().unwrap(),
            &[],
            "https://live/1.m3u8",
            Duration::from_secs(5),
        )
        .await
        .expect("well-formed report parses");

        let text = registry.render();
        assert!(text.contains("stream_bitrate_kbps 4500"));
        assert!(text.contains("stream_width_pixels 1920"));
    }

    #[tokio::test]
    async fn probe_once_rejects_malformed_output() {
        let (_dir, script) = fake_probe_script("not json");
        let registry = Registry::new();
        let err = probe_once(
            &registry,
            script.to_str().unwrap(),
            &[],
            "https://live/1.m3u8",
            Duration::from_secs(5),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Probe(_)));
    }

    #[tokio::test]
    async fn run_skips_ticks_with_no_known_url() {
        let (tx, rx) = watch::channel(None);
        let registry = Arc::new(Registry::new());
        let shutdown = CancellationToken::new();
        let shutdown_clone = shutdown.clone();

        let handle = tokio::spawn(run(
            registry.clone(),
            rx,
            "true".to_string(),
            vec![],
            Duration::from_secs(1),
            Duration::from_millis(20),
            shutdown_clone,
        ));

        tokio::time::sleep(Duration::from_millis(60)).await;
        shutdown.cancel();
        let _ = handle.await;
        drop(tx);

        // No URL was ever known, so no gauges should have been written.
        let text = registry.render();
        assert!(!text.contains("stream_bitrate_kbps 4500"));
    }
}

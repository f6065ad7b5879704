//! Yale Access Bluetooth activity harness
//!
//! Runs the activity integration in a host with simulated locks. Activity
//! is read from stdin, one JSON object per line:
//!
//! ```text
//! {"lock": "lock.front_door", "activity": {"type": "lock", "timestamp": "2025-05-20T10:51:32Z", "status": "LOCKED", "source": "AUTO_LOCK"}}
//! ```

mod config;
mod locks;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use hass_event_bus::JsonEvent;
use hass_host::{ConfigEntry, HomeAssistant};
use serde::Deserialize;
use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use yalexs_ble::{ActivityEvent, PushLock};
use yalexs_ble_activity::consts::{CONF_LOCK_ENTITIES, ENTRY_TITLE, EVENT_ACTIVITY};
use yalexs_ble_activity::{BundledLibrary, YaleXSBLEActivity, DOMAIN};

use crate::config::HarnessConfig;

const RECORDER_COMMIT_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct ActivityLine {
    lock: String,
    activity: ActivityEvent,
}

fn config_dir() -> Result<PathBuf> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                let Some(dir) = args.next() else {
                    bail!("--config needs a directory");
                };
                return Ok(PathBuf::from(dir));
            }
            other => bail!("unknown argument: {other}"),
        }
    }
    Ok(std::env::var_os("HASS_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(".")))
}

/// Make sure an activity entry exists, tracking every configured lock
async fn ensure_activity_entry(hass: &HomeAssistant, lock_entities: &[String]) -> Result<()> {
    if !hass.config_entries.get_by_domain(DOMAIN).is_empty() {
        return Ok(());
    }
    let entry = hass
        .config_entries
        .add(
            ConfigEntry::new(DOMAIN, ENTRY_TITLE)
                .with_data(HashMap::from([(CONF_LOCK_ENTITIES.to_string(), json!(lock_entities))])),
        )
        .await
        .context("adding activity entry")?;
    info!(entry_id = %entry.entry_id, "Created activity entry");
    Ok(())
}

async fn read_activity(locks: &HashMap<String, Arc<PushLock>>) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("reading stdin")? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let parsed: ActivityLine = match serde_json::from_str(line) {
            Ok(parsed) => parsed,
            Err(err) => {
                warn!(%err, line, "Skipping unreadable activity");
                continue;
            }
        };
        match locks.get(&parsed.lock) {
            Some(lock) => {
                debug!(lock = %parsed.lock, "Dispatching activity");
                lock.dispatch_activity(parsed.activity);
            }
            None => warn!(lock = %parsed.lock, "No such lock"),
        }
    }
    info!("End of input");
    Ok(())
}

async fn log_activity(mut activity_rx: broadcast::Receiver<JsonEvent>) {
    loop {
        match activity_rx.recv().await {
            Ok(event) => info!(
                entity_id = %event.data["entity_id"],
                state = %event.data["state"],
                attributes = %event.data["attributes"],
                "Lock activity"
            ),
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "Activity log lagged behind");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,yalexs_ble_activity=debug")),
        )
        .with_target(true)
        .init();

    let config_dir = config_dir()?;
    info!(config_dir = %config_dir.display(), "Starting Yale Access Bluetooth activity harness");
    let config = HarnessConfig::load(&config_dir)?;

    let hass = Arc::new(HomeAssistant::new(&config_dir));
    hass.load().await.context("loading storage")?;
    let recorder_task = hass.recorder.listen(&hass.bus);

    let mut locks = HashMap::new();
    for lock_config in &config.locks {
        let (entity_id, lock) = locks::register_lock(&hass, lock_config).await?;
        locks.insert(entity_id, lock);
    }
    let mut lock_entities: Vec<String> = locks.keys().cloned().collect();
    lock_entities.sort();
    ensure_activity_entry(&hass, &lock_entities).await?;

    yalexs_ble_activity::register(
        &hass,
        Arc::new(YaleXSBLEActivity::new(
            Arc::new(BundledLibrary),
            config.sensor_settings(),
        )),
    );
    for result in hass.setup_all().await {
        if let Err(err) = result {
            warn!(%err, "Entry did not set up");
        }
    }

    let activity_log = tokio::spawn(log_activity(hass.bus.subscribe(EVENT_ACTIVITY)));

    let commit_hass = Arc::clone(&hass);
    let committer = tokio::spawn(async move {
        let mut interval = tokio::time::interval(RECORDER_COMMIT_INTERVAL);
        loop {
            interval.tick().await;
            commit_hass.recorder.commit();
        }
    });

    info!(locks = locks.len(), "Running");
    tokio::select! {
        result = read_activity(&locks) => result?,
        signal = tokio::signal::ctrl_c() => {
            signal.context("waiting for ctrl-c")?;
            info!("Interrupted");
        }
    }

    info!("Shutting down...");
    hass.stop().await.context("saving state")?;
    committer.abort();
    activity_log.abort();
    recorder_task.abort();
    let committed = hass.recorder.commit();
    debug!(committed, "Flushed recorder queue");

    Ok(())
}

use log::{info, warn};
use tokio::task::JoinHandle;

use crate::models::{Machine, MachinesEnvelope};
use crate::store::StatusStore;

/// One-shot bulk snapshot: `GET {base}/api/machines`.
pub async fn fetch_machines(base_url: &str) -> anyhow::Result<Vec<Machine>> {
    let url = format!("{}/api/machines", base_url.trim_end_matches('/'));
    let envelope: MachinesEnvelope = reqwest::get(&url).await?.error_for_status()?.json().await?;
    Ok(envelope.data.machines)
}

/// Startup fetch for one view. Failure is absorbed: the store simply stays
/// empty until the first push delivery arrives.
pub fn spawn_initial_fetch(base_url: String, store: StatusStore) -> JoinHandle<()> {
    tokio::spawn(async move {
        match fetch_machines(&base_url).await {
            Ok(machines) => {
                let count = machines.len();
                store.load_initial(machines);
                info!("[fetch] loaded {count} machines from bulk snapshot");
            }
            Err(e) => warn!("[fetch] bulk snapshot failed, waiting for push: {e}"),
        }
    })
}

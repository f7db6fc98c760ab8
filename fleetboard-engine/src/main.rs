/**
 * FLEETBOARD ENGINE - Entry point of the status board service
 *
 * ROLE: Bootstraps the three operator views (flat table, section grouping,
 * machine detail), each with its own canonical store, bulk snapshot fetch
 * and push-channel subscription, then serves the derived views over HTTP.
 *
 * ARCHITECTURE: Event-driven - one-shot fetch + MQTT push deliveries +
 * operator input events are the only mutation sources; everything else is
 * pure derivation.
 */

mod classify;
mod config;
mod fetch;
mod http;
mod models;
mod push;
mod selection;
mod session;
mod store;
mod view;

use std::net::SocketAddr;

use crate::http::AppState;
use crate::session::SessionRegistry;
use crate::store::StatusStore;
use log::info;
use tokio::net::TcpListener;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    env_logger::init();

    let cfg = config::load_config().await;

    // one canonical copy per view, each fed independently
    let table = StatusStore::new();
    let sections = StatusStore::new();
    let detail = StatusStore::new();

    for (store, name) in [(&table, "table"), (&sections, "sections"), (&detail, "detail")] {
        fetch::spawn_initial_fetch(cfg.backend.base_url.clone(), store.clone());
        info!("[board] {name} view bootstrapped");
    }

    // subscriptions are disposal handles; keeping them here pins the
    // listeners to the lifetime of the service
    let _table_sub = push::subscribe_status(&cfg.mqtt, "fleetboard-table", table.clone());
    let _sections_sub = push::subscribe_status(&cfg.mqtt, "fleetboard-sections", sections.clone());
    let _detail_sub = push::subscribe_status(&cfg.mqtt, "fleetboard-detail", detail.clone());

    let app_state = AppState {
        table,
        sections,
        detail,
        sessions: SessionRegistry::new(),
    };

    let app = http::build_router(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.http.port));
    info!("[board] listening on http://{addr}");
    let listener = TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}

/**
 * FLEETBOARD API - HTTP surface of the board
 *
 * ROLE: Serves the derived views over addressable paths so every screen an
 * operator can look at is also a shareable link. Two kinds of routes:
 * - navigation surface: /machines (flat, deep-linkable through query
 *   params), /sections[/{section}] (grouped), /machine/{name} (detail);
 * - session surface: per-operator view state mutated by input events
 *   (filter typing goes through the 300 ms debounce, teardown releases it).
 *
 * Every failure degrades to "serve the most recent valid state"; a missing
 * machine or section is an explicit not-found presentation, never a 500.
 */

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{HealthClass, Machine, TargetKind};
use crate::selection::{resolve_machine, MachineLookup, Selection};
use crate::session::SessionRegistry;
use crate::store::StatusStore;
use crate::view::{self, FilterField, SectionGroup, SortDirection, ViewState};

/// Each operator view keeps its own canonical copy fed by its own push
/// subscription; they are eventually consistent, never transactionally so.
#[derive(Clone)]
pub struct AppState {
    pub table: StatusStore,
    pub sections: StatusStore,
    pub detail: StatusStore,
    pub sessions: SessionRegistry,
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/machines", get(get_machines))
        .route("/sections", get(get_sections))
        .route("/sections/{section}", get(get_section))
        .route("/machine/{name}", get(get_machine))
        .route("/session", post(create_session))
        .route("/session/{id}", delete(delete_session))
        .route("/session/{id}/view", get(session_view))
        .route("/session/{id}/sections", get(session_sections))
        .route("/session/{id}/selection", get(session_selection))
        .route("/session/{id}/filter", post(session_filter))
        .route("/session/{id}/sort", post(session_sort))
        .route("/session/{id}/page", post(session_page))
        .route("/session/{id}/section-filter", post(session_section_filter))
        .route("/session/{id}/select", post(session_select))
        .with_state(app_state)
}

// ----- navigation surface (stateless deep links) -----

#[derive(Debug, Default, Deserialize)]
pub struct MachinesQuery {
    pub page: Option<usize>,
    pub sort: Option<TargetKind>,
    pub dir: Option<SortDirection>,
    pub field: Option<FilterField>,
    pub q: Option<String>,
}

/// A deep link reconstructs the settled view state directly: the debounce
/// only exists for live typing, an address already carries the final text.
fn view_state_from_query(query: MachinesQuery) -> ViewState {
    let mut state = ViewState::default();
    state.page = query.page.unwrap_or(1).max(1);
    state.sort_key = query.sort;
    if let Some(dir) = query.dir {
        state.sort_dir = dir;
    }
    if let Some(field) = query.field {
        state.filter_field = field;
    }
    if let Some(text) = query.q {
        state.search_input = text.clone();
        state.search_text = text;
    }
    state
}

#[derive(Debug, Serialize)]
pub struct FlatViewBody {
    pub machines: Vec<Machine>,
    pub page: usize,
    pub total_pages: usize,
    pub last_updated: Option<String>,
}

// GET /machines (flat table, deep-linkable)
async fn get_machines(
    State(app): State<AppState>,
    Query(query): Query<MachinesQuery>,
) -> Json<FlatViewBody> {
    let state = view_state_from_query(query);
    let derived = view::page_view(&app.table.machines(), &state);
    Json(FlatViewBody {
        machines: derived.machines,
        page: derived.page,
        total_pages: derived.total_pages,
        last_updated: app.table.last_updated_rfc3339(),
    })
}

#[derive(Debug, Serialize)]
pub struct SectionsBody {
    pub groups: Vec<SectionGroup>,
    pub last_updated: Option<String>,
}

// GET /sections (all groups)
async fn get_sections(State(app): State<AppState>) -> Json<SectionsBody> {
    let groups = view::section_view(&app.sections.machines(), &ViewState::default());
    Json(SectionsBody { groups, last_updated: app.sections.last_updated_rfc3339() })
}

#[derive(Debug, Serialize)]
pub struct SectionBody {
    pub section: String,
    pub found: bool,
    pub groups: Vec<SectionGroup>,
    pub last_updated: Option<String>,
}

// GET /sections/{section} (grouped view scoped to one section; an unknown
// name is an empty presentation, not an error)
async fn get_section(
    State(app): State<AppState>,
    Path(section): Path<String>,
) -> Json<SectionBody> {
    let state = ViewState { selection: Selection::Section(section.clone()), ..ViewState::default() };
    let groups = view::section_view(&app.sections.machines(), &state);
    Json(SectionBody {
        found: !groups.is_empty(),
        section,
        groups,
        last_updated: app.sections.last_updated_rfc3339(),
    })
}

/// Detail payload: the machine plus presentation-ready status cells
/// (`ip (ping ms)` / `DOWN` / `N/A`).
#[derive(Debug, Serialize)]
pub struct MachineDetail {
    #[serde(flatten)]
    pub machine: Machine,
    pub overall: HealthClass,
    pub cells: StatusCells,
}

#[derive(Debug, Serialize)]
pub struct StatusCells {
    pub ip: String,
    pub gateway: String,
    pub kiosk_pc: String,
}

fn status_cell(machine: &Machine, kind: TargetKind) -> String {
    machine.probe(kind).map(|r| r.summary()).unwrap_or_else(|| "N/A".to_string())
}

fn machine_detail(machine: Machine) -> MachineDetail {
    let cells = StatusCells {
        ip: status_cell(&machine, TargetKind::Ip),
        gateway: status_cell(&machine, TargetKind::Gateway),
        kiosk_pc: status_cell(&machine, TargetKind::KioskPc),
    };
    MachineDetail { overall: machine.overall_health(), cells, machine }
}

#[derive(Debug, Serialize)]
pub struct MachineDetailBody {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub machine: Option<MachineDetail>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub last_updated: Option<String>,
}

// GET /machine/{name} (detail; a stale deep link degrades to an explicit
// not-found body)
async fn get_machine(
    State(app): State<AppState>,
    Path(name): Path<String>,
) -> (StatusCode, Json<MachineDetailBody>) {
    let last_updated = app.detail.last_updated_rfc3339();
    match resolve_machine(&app.detail, &name) {
        MachineLookup::Found(machine) => (
            StatusCode::OK,
            Json(MachineDetailBody {
                status: "ok",
                machine: Some(machine_detail(machine)),
                name: None,
                last_updated,
            }),
        ),
        MachineLookup::NotFound(name) => (
            StatusCode::NOT_FOUND,
            Json(MachineDetailBody { status: "not_found", machine: None, name: Some(name), last_updated }),
        ),
    }
}

// ----- session surface (operator input events) -----

// POST /session
async fn create_session(State(app): State<AppState>) -> Json<serde_json::Value> {
    let id = app.sessions.create();
    Json(serde_json::json!({ "id": id }))
}

// DELETE /session/{id} (teardown releases the debounce timer)
async fn delete_session(
    State(app): State<AppState>,
    Path(id): Path<Uuid>,
) -> StatusCode {
    if app.sessions.remove(&id) {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

fn require_session(
    app: &AppState,
    id: &Uuid,
) -> Result<std::sync::Arc<crate::session::ViewSession>, StatusCode> {
    app.sessions.get(id).ok_or(StatusCode::NOT_FOUND)
}

// GET /session/{id}/view (flat page through the memoization cache)
async fn session_view(
    State(app): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<FlatViewBody>, StatusCode> {
    let session = require_session(&app, &id)?;
    let derived = session.page_view(&app.table);
    Ok(Json(FlatViewBody {
        machines: derived.machines,
        page: derived.page,
        total_pages: derived.total_pages,
        last_updated: app.table.last_updated_rfc3339(),
    }))
}

// GET /session/{id}/sections
async fn session_sections(
    State(app): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SectionsBody>, StatusCode> {
    let session = require_session(&app, &id)?;
    let groups = session.section_view(&app.sections);
    Ok(Json(SectionsBody { groups, last_updated: app.sections.last_updated_rfc3339() }))
}

#[derive(Debug, Serialize)]
pub struct SelectionBody {
    pub status: &'static str,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub machine: Option<MachineDetail>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

// GET /session/{id}/selection (focused entity resolved against canonical
// state; a vanished machine is reported, not thrown)
async fn session_selection(
    State(app): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SelectionBody>, StatusCode> {
    let session = require_session(&app, &id)?;
    let selection = session.selection();
    let path = selection.to_path();
    let body = match selection {
        Selection::None => SelectionBody { status: "none", path, section: None, machine: None, name: None },
        Selection::Section(section) => SelectionBody {
            status: "section",
            path,
            section: Some(section),
            machine: None,
            name: None,
        },
        Selection::Machine(name) => match resolve_machine(&app.detail, &name) {
            MachineLookup::Found(machine) => SelectionBody {
                status: "machine",
                path,
                section: None,
                machine: Some(machine_detail(machine)),
                name: None,
            },
            MachineLookup::NotFound(name) => SelectionBody {
                status: "not_found",
                path,
                section: None,
                machine: None,
                name: Some(name),
            },
        },
    };
    Ok(Json(body))
}

/// Filter input events, tagged the way the board sends them.
#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum FilterAction {
    SetField { field: FilterField },
    SetText { text: String },
    Clear,
}

// POST /session/{id}/filter
async fn session_filter(
    State(app): State<AppState>,
    Path(id): Path<Uuid>,
    Json(action): Json<FilterAction>,
) -> Result<StatusCode, StatusCode> {
    let session = require_session(&app, &id)?;
    match action {
        FilterAction::SetField { field } => session.set_filter_field(field),
        FilterAction::SetText { text } => session.set_search(text),
        FilterAction::Clear => session.clear_filter(),
    }
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct SortBody {
    pub key: Option<TargetKind>,
    #[serde(default)]
    pub dir: Option<SortDirection>,
}

// POST /session/{id}/sort (key without direction = header click toggle;
// null key clears the sort)
async fn session_sort(
    State(app): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<SortBody>,
) -> Result<StatusCode, StatusCode> {
    let session = require_session(&app, &id)?;
    match (body.key, body.dir) {
        (Some(key), Some(dir)) => session.set_sort(Some(key), dir),
        (Some(key), None) => session.toggle_sort(key),
        (None, _) => session.set_sort(None, SortDirection::Asc),
    }
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct PageBody {
    pub page: usize,
}

// POST /session/{id}/page
async fn session_page(
    State(app): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<PageBody>,
) -> Result<StatusCode, StatusCode> {
    let session = require_session(&app, &id)?;
    session.set_page(body.page);
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct SectionFilterBody {
    pub section: String,
    pub text: String,
}

// POST /session/{id}/section-filter
async fn session_section_filter(
    State(app): State<AppState>,
    Path(id): Path<Uuid>,
    Json(body): Json<SectionFilterBody>,
) -> Result<StatusCode, StatusCode> {
    let session = require_session(&app, &id)?;
    session.set_section_filter(body.section, body.text);
    Ok(StatusCode::NO_CONTENT)
}

/// Focus changes, tagged like the filter events.
#[derive(Debug, Deserialize)]
#[serde(tag = "select", rename_all = "lowercase")]
pub enum SelectAction {
    Machine { name: String },
    Section { name: String },
    Clear,
}

// POST /session/{id}/select (returns the shareable path of the new focus)
async fn session_select(
    State(app): State<AppState>,
    Path(id): Path<Uuid>,
    Json(action): Json<SelectAction>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let session = require_session(&app, &id)?;
    match action {
        SelectAction::Machine { name } => session.select_machine(name),
        SelectAction::Section { name } => session.select_section(name),
        SelectAction::Clear => session.clear_selection(),
    }
    Ok(Json(serde_json::json!({ "path": session.selection().to_path() })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ProbeResult, ProbeResults};

    fn machine(name: &str, section: Option<&str>, ping: Option<f64>) -> Machine {
        Machine {
            name: name.to_string(),
            uplink: None,
            source_switch: None,
            column: None,
            bay: None,
            section: section.map(str::to_string),
            results: ProbeResults {
                ip: Some(ProbeResult {
                    ip: "10.0.0.1".into(),
                    alive: ping.is_some(),
                    ping,
                    color: None,
                }),
                gateway: None,
                kiosk_pc: None,
            },
        }
    }

    fn app_with(machines: Vec<Machine>) -> AppState {
        let app = AppState {
            table: StatusStore::new(),
            sections: StatusStore::new(),
            detail: StatusStore::new(),
            sessions: SessionRegistry::new(),
        };
        app.table.load_initial(machines.clone());
        app.sections.load_initial(machines.clone());
        app.detail.load_initial(machines);
        app
    }

    #[tokio::test]
    async fn deep_link_reconstructs_the_filtered_view() {
        let app = app_with(vec![
            machine("A1", None, Some(2.0)),
            machine("B2", None, Some(50.0)),
        ]);
        let query = MachinesQuery {
            field: Some(FilterField::Name),
            q: Some("b2".into()),
            ..MachinesQuery::default()
        };

        let Json(body) = get_machines(State(app), Query(query)).await;
        assert_eq!(body.machines.len(), 1);
        assert_eq!(body.machines[0].name, "B2");
        assert_eq!(body.total_pages, 1);
        assert!(body.last_updated.is_some());
    }

    #[tokio::test]
    async fn missing_machine_is_an_explicit_not_found_body() {
        let app = app_with(vec![machine("A1", None, Some(2.0))]);

        let (code, Json(body)) = get_machine(State(app), Path("gone".into())).await;
        assert_eq!(code, StatusCode::NOT_FOUND);
        assert_eq!(body.status, "not_found");
        assert_eq!(body.name.as_deref(), Some("gone"));
        assert!(body.machine.is_none());
    }

    #[tokio::test]
    async fn detail_body_carries_status_cells() {
        let app = app_with(vec![machine("A1", None, Some(2.0))]);

        let (code, Json(body)) = get_machine(State(app), Path("a1".into())).await;
        assert_eq!(code, StatusCode::OK);
        let detail = body.machine.unwrap();
        assert_eq!(detail.cells.ip, "10.0.0.1 (2 ms)");
        assert_eq!(detail.cells.gateway, "N/A");
    }

    #[tokio::test]
    async fn unknown_section_degrades_to_an_empty_presentation() {
        let app = app_with(vec![machine("A1", Some("East"), Some(2.0))]);

        let Json(body) = get_section(State(app), Path("West".into())).await;
        assert!(!body.found);
        assert!(body.groups.is_empty());
    }

    #[tokio::test]
    async fn session_round_trip_filter_and_view() {
        let app = app_with(vec![
            machine("A1", None, Some(2.0)),
            machine("B2", None, Some(50.0)),
        ]);
        let id = app.sessions.create();

        session_filter(
            State(app.clone()),
            Path(id),
            Json(FilterAction::SetText { text: "a1".into() }),
        )
        .await
        .unwrap();

        // before the debounce window the view is still unfiltered
        let Json(body) = session_view(State(app.clone()), Path(id)).await.unwrap();
        assert_eq!(body.machines.len(), 2);

        tokio::time::sleep(std::time::Duration::from_millis(crate::session::DEBOUNCE_MS + 80)).await;
        let Json(body) = session_view(State(app.clone()), Path(id)).await.unwrap();
        assert_eq!(body.machines.len(), 1);
        assert_eq!(body.machines[0].name, "A1");
    }

    #[tokio::test]
    async fn stale_selection_reports_not_found_after_a_push() {
        let app = app_with(vec![machine("A1", None, Some(2.0))]);
        let id = app.sessions.create();

        session_select(
            State(app.clone()),
            Path(id),
            Json(SelectAction::Machine { name: "A1".into() }),
        )
        .await
        .unwrap();

        // the machine disappears from the fleet
        app.detail.apply_push(crate::models::StatusPush {
            machines: vec![machine("B2", None, Some(1.0))],
            ts: 2_000,
        });

        let Json(body) = session_selection(State(app.clone()), Path(id)).await.unwrap();
        assert_eq!(body.status, "not_found");
        assert_eq!(body.name.as_deref(), Some("A1"));
        assert_eq!(body.path, "/machine/A1");
    }

    #[tokio::test]
    async fn unknown_session_is_404() {
        let app = app_with(vec![]);
        let err = session_view(State(app), Path(Uuid::new_v4())).await.err();
        assert_eq!(err, Some(StatusCode::NOT_FOUND));
    }

    #[tokio::test]
    async fn delete_session_tears_down() {
        let app = app_with(vec![]);
        let id = app.sessions.create();
        assert_eq!(delete_session(State(app.clone()), Path(id)).await, StatusCode::NO_CONTENT);
        assert_eq!(delete_session(State(app), Path(id)).await, StatusCode::NOT_FOUND);
    }
}

/**
 * VIEW PIPELINE - Pure derivation of what the operator looks at
 *
 * ROLE: Turns (canonical machine list, view state) into the rendered flat
 * page or the section grouping. Stages run in a fixed order: sort by probe
 * latency, filter on one field, paginate - or group by section with
 * per-section filters. Every stage is pure; nothing here mutates the
 * canonical list or keeps hidden derived state.
 *
 * RECOMPUTATION: callers go through ViewCache, which memoizes on the pair
 * (list fingerprint, view-state fingerprint) and only re-runs the pipeline
 * when one of the two inputs actually changed.
 */

use std::collections::hash_map::DefaultHasher;
use std::collections::{BTreeMap, HashMap};
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::models::{Machine, TargetKind};
use crate::selection::Selection;

/// Rows per page of the flat table.
pub const PAGE_SIZE: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn flipped(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }
}

/// Fields the flat view can filter on. Wire names match the filter dropdown
/// of the board ("switch" reads the source_switch attribute).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterField {
    #[default]
    Name,
    Ip,
    Gateway,
    KioskPc,
    Uplink,
    Switch,
    Column,
    Bay,
    Section,
}

impl FilterField {
    /// Fixed accessor table: the value this field reads from a machine.
    pub fn extract<'a>(&self, machine: &'a Machine) -> Option<&'a str> {
        match self {
            FilterField::Name => Some(machine.name.as_str()),
            FilterField::Ip => machine.probe_ip(TargetKind::Ip),
            FilterField::Gateway => machine.probe_ip(TargetKind::Gateway),
            FilterField::KioskPc => machine.probe_ip(TargetKind::KioskPc),
            FilterField::Uplink => machine.uplink.as_deref(),
            FilterField::Switch => machine.source_switch.as_deref(),
            FilterField::Column => machine.column.as_deref(),
            FilterField::Bay => machine.bay.as_deref(),
            FilterField::Section => machine.section.as_deref(),
        }
    }
}

/// Everything an operator can tweak about a view. Created with defaults at
/// session start, mutated only by explicit actions, never persisted.
/// `search_input` is what is being typed; `search_text` is the debounced
/// value the pipeline actually filters on.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewState {
    pub sort_key: Option<TargetKind>,
    pub sort_dir: SortDirection,
    pub filter_field: FilterField,
    pub search_input: String,
    pub search_text: String,
    pub page: usize,
    pub section_filters: HashMap<String, String>,
    pub selection: Selection,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            sort_key: None,
            sort_dir: SortDirection::Asc,
            filter_field: FilterField::Name,
            search_input: String::new(),
            search_text: String::new(),
            page: 1,
            section_filters: HashMap::new(),
            selection: Selection::None,
        }
    }
}

impl ViewState {
    /// Column-header click: picks the key and flips the direction.
    pub fn toggle_sort(&mut self, key: TargetKind) {
        self.sort_key = Some(key);
        self.sort_dir = self.sort_dir.flipped();
    }

    /// Back to the unfiltered table: empty text, name field, first page.
    pub fn clear_filter(&mut self) {
        self.search_input.clear();
        self.search_text.clear();
        self.filter_field = FilterField::Name;
        self.page = 1;
    }

    /// Fingerprint over the fields that affect pipeline output. The raw
    /// `search_input` is deliberately excluded: until the debounce commits
    /// it, typing must not invalidate the cached view.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.sort_key.hash(&mut hasher);
        self.sort_dir.hash(&mut hasher);
        self.filter_field.hash(&mut hasher);
        normalize(&self.search_text).hash(&mut hasher);
        self.page.hash(&mut hasher);
        let mut entries: Vec<(&String, &String)> = self.section_filters.iter().collect();
        entries.sort();
        for (section, text) in entries {
            section.hash(&mut hasher);
            normalize(text).hash(&mut hasher);
        }
        self.selection.hash(&mut hasher);
        hasher.finish()
    }
}

/// One page of the flat view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageView {
    pub machines: Vec<Machine>,
    pub page: usize,
    pub total_pages: usize,
}

/// One card of the grouped view.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectionGroup {
    pub section: String,
    pub machines: Vec<Machine>,
}

fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Latency used as the sort key: only an alive probe with a measured ping
/// counts, everything else sinks to the bottom.
fn sort_latency(machine: &Machine, kind: TargetKind) -> f64 {
    match machine.probe(kind) {
        Some(result) if result.alive => result.ping.unwrap_or(f64::INFINITY),
        _ => f64::INFINITY,
    }
}

/// Flat pipeline: sort -> filter -> paginate.
pub fn page_view(machines: &[Machine], state: &ViewState) -> PageView {
    let mut list: Vec<Machine> = machines.to_vec();

    if let Some(key) = state.sort_key {
        // stable sort: equal latencies keep their relative order, in both
        // directions, so re-renders of unchanged data never reshuffle rows
        list.sort_by(|a, b| {
            let ordering = sort_latency(a, key)
                .partial_cmp(&sort_latency(b, key))
                .unwrap_or(std::cmp::Ordering::Equal);
            match state.sort_dir {
                SortDirection::Asc => ordering,
                SortDirection::Desc => ordering.reverse(),
            }
        });
    }

    let term = normalize(&state.search_text);
    if !term.is_empty() {
        list.retain(|machine| {
            state
                .filter_field
                .extract(machine)
                .map(|value| value.to_lowercase().contains(&term))
                .unwrap_or(false)
        });
    }

    let total_pages = (list.len().div_ceil(PAGE_SIZE)).max(1);
    let start = state.page.saturating_sub(1) * PAGE_SIZE;
    let rows = if start >= list.len() {
        Vec::new()
    } else {
        list[start..(start + PAGE_SIZE).min(list.len())].to_vec()
    };

    PageView { machines: rows, page: state.page, total_pages }
}

/// Grouped pipeline: partition by section, scope to the focused section if
/// any, order groups and members ascending, apply each group's own filter
/// against name and the three probe addresses.
pub fn section_view(machines: &[Machine], state: &ViewState) -> Vec<SectionGroup> {
    let mut grouped: BTreeMap<String, Vec<Machine>> = BTreeMap::new();
    for machine in machines {
        let key = machine
            .section
            .clone()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "Unknown".to_string());
        grouped.entry(key).or_default().push(machine.clone());
    }

    grouped
        .into_iter()
        .filter(|(section, _)| state.selection.section().is_none_or(|sel| section.as_str() == sel))
        .map(|(section, mut members)| {
            members.sort_by(|a, b| a.name.to_lowercase().cmp(&b.name.to_lowercase()));
            if let Some(term) = state
                .section_filters
                .get(&section)
                .map(|t| normalize(t))
                .filter(|t| !t.is_empty())
            {
                members.retain(|machine| group_match(machine, &term));
            }
            SectionGroup { section, machines: members }
        })
        .collect()
}

fn group_match(machine: &Machine, term: &str) -> bool {
    if machine.name.to_lowercase().contains(term) {
        return true;
    }
    TargetKind::ALL
        .iter()
        .any(|kind| machine.probe_ip(*kind).is_some_and(|ip| ip.to_lowercase().contains(term)))
}

/// Memoized front of the pipeline, keyed by (list fingerprint, view-state
/// fingerprint). Holds the last flat page and the last grouping separately;
/// `recomputes` counts actual pipeline runs.
#[derive(Default)]
pub struct ViewCache {
    page: Option<((u64, u64), PageView)>,
    sections: Option<((u64, u64), Vec<SectionGroup>)>,
    recomputes: usize,
}

impl ViewCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page_view(&mut self, list_fingerprint: u64, machines: &[Machine], state: &ViewState) -> PageView {
        let key = (list_fingerprint, state.fingerprint());
        if let Some((cached_key, cached)) = &self.page {
            if *cached_key == key {
                return cached.clone();
            }
        }
        let fresh = page_view(machines, state);
        self.recomputes += 1;
        self.page = Some((key, fresh.clone()));
        fresh
    }

    pub fn section_view(
        &mut self,
        list_fingerprint: u64,
        machines: &[Machine],
        state: &ViewState,
    ) -> Vec<SectionGroup> {
        let key = (list_fingerprint, state.fingerprint());
        if let Some((cached_key, cached)) = &self.sections {
            if *cached_key == key {
                return cached.clone();
            }
        }
        let fresh = section_view(machines, state);
        self.recomputes += 1;
        self.sections = Some((key, fresh.clone()));
        fresh
    }

    pub fn recompute_count(&self) -> usize {
        self.recomputes
    }
}

//! Field descriptors and the versioned registry that owns them and their state.
//!
//! The registry is rebuilt wholesale from configuration. Each rebuild bumps a
//! generation counter; a field whose configuration did not change keeps its
//! descriptor (and generation), so results computed before the rebuild are
//! still accepted for it, while results for replaced or removed fields are
//! discarded.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use almanac_core::{LunarSnapshot, ScopeConfig};
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use tracing::{info, warn};

use crate::anniversary::AnniversaryResolver;
use crate::cache::SnapshotCache;
use crate::error::FieldError;
use crate::fields;
use crate::provider::{CalendarProvider, ProviderError};
use crate::scheduler::Cadence;

// ── Descriptors ─────────────────────────────────────────────────

/// A field is addressed by its scope and its display name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct FieldId {
    pub scope: String,
    pub name: String,
}

impl FieldId {
    pub fn new(scope: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.scope, self.name)
    }
}

/// Everything a recompute may read. Built once per group run.
pub struct FieldContext {
    /// Effective "now", simulated or real.
    pub now: NaiveDateTime,
    pub simulated: bool,
    /// Date-control epoch `now` was resolved in.
    pub epoch: u64,
    pub cache: Arc<SnapshotCache>,
    pub resolver: Arc<AnniversaryResolver>,
}

impl FieldContext {
    pub fn today(&self) -> NaiveDate {
        self.now.date()
    }

    /// Snapshot for the current hour.
    pub async fn snapshot(&self) -> Result<Arc<LunarSnapshot>, ProviderError> {
        self.cache.get(self.now).await
    }

    /// Snapshot for the current day, derived at midnight.
    pub async fn day_snapshot(&self) -> Result<Arc<LunarSnapshot>, ProviderError> {
        self.cache.get_day(self.now).await
    }
}

/// A notification a field asks to send. Deduplicated per calendar day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NotificationRequest {
    pub service: String,
    /// Message template rendered with `name`, `days` and `date`.
    pub template: String,
    pub name: String,
    pub days: i64,
    pub date: String,
}

/// Result of one successful recompute.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldOutput {
    pub value: String,
    pub attributes: BTreeMap<String, String>,
    pub notification: Option<NotificationRequest>,
    /// Tear the field down: no further recomputes, excluded from export.
    pub retire: bool,
}

impl FieldOutput {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            ..Self::default()
        }
    }

    pub fn attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn notify(mut self, request: Option<NotificationRequest>) -> Self {
        self.notification = request;
        self
    }

    pub fn retired(mut self) -> Self {
        self.retire = true;
        self
    }
}

/// A field's recompute function.
#[async_trait]
pub trait FieldCompute: Send + Sync {
    async fn compute(&self, ctx: &FieldContext) -> Result<FieldOutput, FieldError>;
}

/// A field as produced by a build, before it is installed.
pub struct FieldSpec {
    pub id: FieldId,
    pub cadence: Cadence,
    pub is_main: bool,
    /// Identity of the configuration the field was built from.
    pub signature: String,
    pub compute: Arc<dyn FieldCompute>,
}

/// An installed field descriptor. Stateless; state lives in the registry.
pub struct Field {
    pub id: FieldId,
    pub cadence: Cadence,
    pub is_main: bool,
    /// Registry generation that installed this descriptor.
    pub generation: u64,
    signature: String,
    compute: Arc<dyn FieldCompute>,
}

impl Field {
    fn install(spec: FieldSpec, generation: u64) -> Self {
        Self {
            id: spec.id,
            cadence: spec.cadence,
            is_main: spec.is_main,
            generation,
            signature: spec.signature,
            compute: spec.compute,
        }
    }

    pub fn signature(&self) -> &str {
        &self.signature
    }

    pub async fn compute(&self, ctx: &FieldContext) -> Result<FieldOutput, FieldError> {
        self.compute.compute(ctx).await
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("id", &self.id)
            .field("cadence", &self.cadence)
            .field("is_main", &self.is_main)
            .field("generation", &self.generation)
            .finish()
    }
}

// ── State ───────────────────────────────────────────────────────

/// The last published result of a field.
///
/// `available == false` means the last recompute failed; `value` then still
/// holds the previous good value.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FieldState {
    pub value: Option<String>,
    pub attributes: BTreeMap<String, String>,
    pub available: bool,
    pub last_updated_at: Option<NaiveDateTime>,
    pub last_notified_on: Option<NaiveDate>,
    pub torn_down: bool,
    #[serde(skip)]
    stamp: Option<Stamp>,
}

impl FieldState {
    /// Stamp of the recompute that produced this state.
    pub fn stamp(&self) -> Option<Stamp> {
        self.stamp
    }
}

/// Orders the results of one field. A later date-control epoch wins, then a
/// later input instant, then the recompute that started later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct Stamp {
    pub epoch: u64,
    pub at: NaiveDateTime,
    pub seq: u64,
}

impl Stamp {
    fn supersedes(self, stored: Option<Stamp>) -> bool {
        stored.map_or(true, |s| self > s)
    }
}

/// What happened to a recompute result handed to the registry.
#[derive(Debug, Clone, PartialEq)]
pub enum Recorded {
    Stored {
        state: FieldState,
        notification: Option<NotificationRequest>,
    },
    /// The field was torn down by this result.
    Retired,
    /// A result from a later recompute is already stored.
    Superseded,
    /// The descriptor was replaced or removed by a rebuild.
    Stale,
}

/// One field in a bulk export.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportedField {
    pub state: String,
    pub attributes: BTreeMap<String, String>,
}

// ── Build ───────────────────────────────────────────────────────

/// A configuration entry left out of the registry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DroppedEntry {
    pub scope: String,
    pub entry: String,
    pub reason: String,
}

impl DroppedEntry {
    pub fn new(scope: &str, entry: &str, reason: impl Into<String>) -> Self {
        Self {
            scope: scope.to_string(),
            entry: entry.to_string(),
            reason: reason.into(),
        }
    }
}

/// The output of [`build`]: field specs for every scope, in order.
pub struct BuildPlan {
    pub scopes: Vec<String>,
    pub specs: Vec<FieldSpec>,
    pub dropped: Vec<DroppedEntry>,
}

/// Derive the field set from configuration.
///
/// Malformed entries are dropped and reported; everything else builds.
/// Calls the provider for person birth data, so run it off the runtime.
pub fn build(scopes: &[ScopeConfig], provider: &dyn CalendarProvider) -> BuildPlan {
    let mut plan = BuildPlan {
        scopes: Vec::with_capacity(scopes.len()),
        specs: Vec::new(),
        dropped: Vec::new(),
    };
    let mut seen = HashSet::new();

    for scope in scopes {
        if plan.scopes.contains(&scope.id) {
            plan.dropped
                .push(DroppedEntry::new(&scope.id, &scope.id, "duplicate scope id"));
            continue;
        }
        plan.scopes.push(scope.id.clone());

        let scope = Arc::new(scope.clone());
        for spec in fields::for_scope(&scope, provider, &mut plan.dropped) {
            if seen.insert(spec.id.clone()) {
                plan.specs.push(spec);
            } else {
                plan.dropped.push(DroppedEntry::new(
                    &scope.id,
                    &spec.id.name,
                    "duplicate field name",
                ));
            }
        }
    }

    for d in &plan.dropped {
        warn!(scope = %d.scope, entry = %d.entry, reason = %d.reason, "configuration entry dropped");
    }
    plan
}

/// Summary of an install.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildReport {
    pub generation: u64,
    pub added: usize,
    pub replaced: usize,
    pub retained: usize,
    pub removed: usize,
    pub dropped: Vec<DroppedEntry>,
}

// ── Registry ────────────────────────────────────────────────────

#[derive(Default)]
struct RegistryInner {
    generation: u64,
    scopes: Vec<String>,
    fields: Vec<Arc<Field>>,
    index: HashMap<FieldId, usize>,
    states: HashMap<FieldId, FieldState>,
}

impl RegistryInner {
    fn field(&self, id: &FieldId) -> Option<&Arc<Field>> {
        self.index.get(id).map(|&i| &self.fields[i])
    }

    fn is_current(&self, field: &Field) -> bool {
        self.field(&field.id)
            .is_some_and(|f| f.generation == field.generation)
    }
}

/// Sole owner of field descriptors and field state.
#[derive(Default)]
pub struct FieldRegistry {
    inner: RwLock<RegistryInner>,
}

impl FieldRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, RegistryInner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryInner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Replace the field set. State of fields that persist by id is kept;
    /// state of fields no longer present is discarded.
    pub fn install(&self, plan: BuildPlan) -> BuildReport {
        let mut inner = self.write();
        let generation = inner.generation + 1;
        let mut report = BuildReport {
            generation,
            dropped: plan.dropped,
            ..BuildReport::default()
        };

        let mut fields = Vec::with_capacity(plan.specs.len());
        let mut index = HashMap::with_capacity(plan.specs.len());
        for spec in plan.specs {
            let field = match inner.field(&spec.id) {
                Some(old) if old.signature == spec.signature => {
                    report.retained += 1;
                    Arc::clone(old)
                }
                Some(_) => {
                    report.replaced += 1;
                    if let Some(state) = inner.states.get_mut(&spec.id) {
                        state.torn_down = false;
                    }
                    Arc::new(Field::install(spec, generation))
                }
                None => {
                    report.added += 1;
                    Arc::new(Field::install(spec, generation))
                }
            };
            index.insert(field.id.clone(), fields.len());
            fields.push(field);
        }

        report.removed = inner
            .fields
            .iter()
            .filter(|f| !index.contains_key(&f.id))
            .count();
        inner.states.retain(|id, _| index.contains_key(id));
        inner.fields = fields;
        inner.index = index;
        inner.scopes = plan.scopes;
        inner.generation = generation;

        info!(
            generation,
            added = report.added,
            replaced = report.replaced,
            retained = report.retained,
            removed = report.removed,
            dropped = report.dropped.len(),
            "field registry installed"
        );
        report
    }

    pub fn generation(&self) -> u64 {
        self.read().generation
    }

    pub fn scopes(&self) -> Vec<String> {
        self.read().scopes.clone()
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        self.read().scopes.iter().any(|s| s == scope)
    }

    pub fn len(&self) -> usize {
        self.read().fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, id: &FieldId) -> Option<Arc<Field>> {
        self.read().field(id).cloned()
    }

    pub fn state(&self, id: &FieldId) -> Option<FieldState> {
        self.read().states.get(id).cloned()
    }

    /// Live (not torn down) fields matching `filter`, in build order.
    pub fn select(&self, filter: impl Fn(&Field) -> bool) -> Vec<Arc<Field>> {
        let inner = self.read();
        inner
            .fields
            .iter()
            .filter(|f| !inner.states.get(&f.id).is_some_and(|s| s.torn_down))
            .filter(|f| filter(f))
            .cloned()
            .collect()
    }

    /// Store a successful result computed for `stamp.at`.
    ///
    /// A notification is handed back only when `allow_notify` is set and none
    /// was sent for this field on `stamp.at`'s calendar day.
    pub fn record_success(
        &self,
        field: &Field,
        stamp: Stamp,
        output: FieldOutput,
        allow_notify: bool,
    ) -> Recorded {
        let mut inner = self.write();
        if !inner.is_current(field) {
            return Recorded::Stale;
        }
        let state = inner.states.entry(field.id.clone()).or_default();
        if !stamp.supersedes(state.stamp) {
            return Recorded::Superseded;
        }
        state.stamp = Some(stamp);
        let at = stamp.at;

        if output.retire {
            state.torn_down = true;
            return Recorded::Retired;
        }

        state.value = Some(output.value);
        state.attributes = output.attributes;
        state.available = true;
        state.last_updated_at = Some(at);

        let today = at.date();
        let notification = match output.notification {
            Some(req) if allow_notify && state.last_notified_on != Some(today) => {
                state.last_notified_on = Some(today);
                Some(req)
            }
            _ => None,
        };
        Recorded::Stored {
            state: state.clone(),
            notification,
        }
    }

    /// Mark a field unavailable, keeping its previous value.
    pub fn record_failure(&self, field: &Field, stamp: Stamp) -> Recorded {
        let mut inner = self.write();
        if !inner.is_current(field) {
            return Recorded::Stale;
        }
        let state = inner.states.entry(field.id.clone()).or_default();
        if !stamp.supersedes(state.stamp) {
            return Recorded::Superseded;
        }
        state.stamp = Some(stamp);
        state.available = false;
        Recorded::Stored {
            state: state.clone(),
            notification: None,
        }
    }

    /// `{name: {state, attributes}}` for one scope, or the first value per
    /// name across all scopes. Unavailable, torn-down and never-computed
    /// fields are left out. `None` for an unknown scope.
    pub fn export(&self, scope: Option<&str>) -> Option<BTreeMap<String, ExportedField>> {
        let inner = self.read();
        if let Some(wanted) = scope {
            if !inner.scopes.iter().any(|s| s == wanted) {
                return None;
            }
        }

        let mut out = BTreeMap::new();
        for scope_id in inner
            .scopes
            .iter()
            .filter(|s| scope.map_or(true, |wanted| wanted == s.as_str()))
        {
            for field in inner.fields.iter().filter(|f| &f.id.scope == scope_id) {
                let Some(state) = inner.states.get(&field.id) else {
                    continue;
                };
                if !state.available || state.torn_down {
                    continue;
                }
                let Some(value) = &state.value else {
                    continue;
                };
                out.entry(field.id.name.clone())
                    .or_insert_with(|| ExportedField {
                        state: value.clone(),
                        attributes: state.attributes.clone(),
                    });
            }
        }
        Some(out)
    }
}

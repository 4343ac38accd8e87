//! Generic CRUD resource screen.
//!
//! # Design
//! One `ResourceScreen<R>` drives the list/dialog/mutation cycle for any
//! [`Resource`]. It is a plain state machine: actions that reach the network
//! return the `HttpRequest` to send, and the app reports the outcome back
//! through the matching `finish_*` method. The screen never touches the cache
//! itself; the app invalidates the key after a completed mutation.
//!
//! ```text
//! Idle ──open_create──▶ DialogOpenForCreate ─┐
//!  │  ──open_edit────▶ DialogOpenForEdit(r) ─┴─submit─▶ Submitting
//!  │                        ▲     │ close                 │ ok: Idle
//!  │                        │     ▼                       │ err: back to dialog
//!  │                        └── Idle ◀────────────────────┘
//!  └──request_delete (confirmed)──▶ Deleting(id) ──finish──▶ Idle
//! ```
//!
//! Per-record actions (project estimates) are tracked per record id, outside
//! the dialog state, so one running estimate only disables its own card.

use std::collections::BTreeSet;

use tracing::{debug, info, warn};

use crate::cache::{QueryCache, Snapshot, SubscriberId};
use crate::client::ApiClient;
use crate::error::{ApiError, ScreenError};
use crate::http::HttpRequest;
use crate::resource::{Card, CacheKey, FieldKind, FieldSpec, FormDraft, Resource, SelectOption};
use crate::types::{BuildingType, Id, Material, Project};

/// Blocking yes/no prompt used to gate deletion.
pub trait Confirm {
    fn confirm(&mut self, message: &str) -> bool;
}

impl<F: FnMut(&str) -> bool> Confirm for F {
    fn confirm(&mut self, message: &str) -> bool {
        self(message)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScreenState<R> {
    Idle,
    DialogOpenForCreate,
    DialogOpenForEdit(R),
    /// `editing` is the record being updated, `None` for a create.
    Submitting { editing: Option<R> },
    Deleting(Id),
}

impl<R> ScreenState<R> {
    pub fn name(&self) -> &'static str {
        match self {
            ScreenState::Idle => "idle",
            ScreenState::DialogOpenForCreate => "creating",
            ScreenState::DialogOpenForEdit(_) => "editing",
            ScreenState::Submitting { .. } => "submitting",
            ScreenState::Deleting(_) => "deleting",
        }
    }

    pub fn is_dialog_open(&self) -> bool {
        matches!(
            self,
            ScreenState::DialogOpenForCreate
                | ScreenState::DialogOpenForEdit(_)
                | ScreenState::Submitting { .. }
        )
    }
}

/// Everything a front end needs to draw one resource screen.
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenView {
    pub heading: &'static str,
    pub add_label: String,
    pub loading: bool,
    pub loading_text: String,
    pub cards: Vec<CardView>,
    pub dialog: Option<DialogView>,
    /// Failed delete/estimate or fetch, shown when no dialog is open.
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CardView {
    pub card: Card,
    pub action: Option<ActionView>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActionView {
    pub label: &'static str,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DialogView {
    pub title: String,
    pub fields: Vec<FieldView>,
    pub submit_label: &'static str,
    pub submitting: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldView {
    pub spec: FieldSpec,
    pub value: String,
    /// Choices for select fields; empty otherwise.
    pub options: Vec<SelectOption>,
}

#[derive(Debug)]
pub struct ResourceScreen<R: Resource> {
    subscriber: SubscriberId,
    state: ScreenState<R>,
    draft: R::Draft,
    error: Option<String>,
    busy: BTreeSet<Id>,
}

impl<R: Resource> ResourceScreen<R> {
    pub fn new(subscriber: SubscriberId) -> Self {
        Self {
            subscriber,
            state: ScreenState::Idle,
            draft: R::Draft::default(),
            error: None,
            busy: BTreeSet::new(),
        }
    }

    pub fn subscriber(&self) -> SubscriberId {
        self.subscriber
    }

    pub fn state(&self) -> &ScreenState<R> {
        &self.state
    }

    pub fn draft(&self) -> &R::Draft {
        &self.draft
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Whether a per-record action is running for `id`.
    pub fn is_busy(&self, id: &Id) -> bool {
        self.busy.contains(id)
    }

    fn require_idle(&self, action: &'static str) -> Result<(), ScreenError> {
        match self.state {
            ScreenState::Idle => Ok(()),
            ref other => Err(ScreenError::InvalidTransition {
                action,
                state: other.name(),
            }),
        }
    }

    fn reset(&mut self) {
        self.state = ScreenState::Idle;
        self.draft = R::Draft::default();
        self.error = None;
    }

    pub fn open_create(&mut self) -> Result<(), ScreenError> {
        self.require_idle("open the create dialog")?;
        self.draft = R::Draft::default();
        self.error = None;
        self.state = ScreenState::DialogOpenForCreate;
        Ok(())
    }

    pub fn open_edit(&mut self, record: R) -> Result<(), ScreenError> {
        self.require_idle("open the edit dialog")?;
        self.draft = R::Draft::from(&record);
        self.error = None;
        self.state = ScreenState::DialogOpenForEdit(record);
        Ok(())
    }

    pub fn set_field(&mut self, field: &str, value: &str) -> Result<(), ScreenError> {
        match self.state {
            ScreenState::DialogOpenForCreate | ScreenState::DialogOpenForEdit(_) => {
                self.draft.set(field, value)
            }
            ref other => Err(ScreenError::InvalidTransition {
                action: "edit a field",
                state: other.name(),
            }),
        }
    }

    /// Cancel the dialog. Discards the draft; no request is made.
    pub fn close(&mut self) -> Result<(), ScreenError> {
        match self.state {
            ScreenState::Idle => Ok(()),
            ScreenState::DialogOpenForCreate | ScreenState::DialogOpenForEdit(_) => {
                self.reset();
                Ok(())
            }
            ref other => Err(ScreenError::InvalidTransition {
                action: "close the dialog",
                state: other.name(),
            }),
        }
    }

    /// Start a create or update, depending on how the dialog was opened.
    /// A second submit while one is in flight is refused.
    pub fn submit(&mut self, client: &ApiClient) -> Result<HttpRequest, ScreenError> {
        let editing = match &self.state {
            ScreenState::DialogOpenForCreate => None,
            ScreenState::DialogOpenForEdit(record) => Some(record.clone()),
            ScreenState::Submitting { .. } => return Err(ScreenError::AlreadySubmitting),
            other => {
                return Err(ScreenError::InvalidTransition {
                    action: "submit",
                    state: other.name(),
                })
            }
        };
        let request = match &editing {
            Some(record) => client.build_update::<R>(record.id(), &self.draft)?,
            None => client.build_create::<R>(&self.draft)?,
        };
        self.error = None;
        self.state = ScreenState::Submitting { editing };
        Ok(request)
    }

    /// Apply the outcome of the in-flight submit. On success the dialog
    /// closes; on failure it reopens with the draft intact and the error set.
    /// Returns whether the save succeeded.
    pub fn finish_submit(&mut self, result: Result<R, ApiError>) -> bool {
        let editing = match &mut self.state {
            ScreenState::Submitting { editing } => editing.take(),
            other => {
                warn!(key = %R::KEY, state = other.name(), "submit result without a submit in flight");
                return false;
            }
        };
        match result {
            Ok(saved) => {
                info!(key = %R::KEY, id = %saved.id(), "saved");
                self.reset();
                true
            }
            Err(err) => {
                warn!(key = %R::KEY, error = %err, "save failed");
                self.error = Some(err.to_string());
                self.state = match editing {
                    Some(record) => ScreenState::DialogOpenForEdit(record),
                    None => ScreenState::DialogOpenForCreate,
                };
                false
            }
        }
    }

    /// Ask for confirmation and, if given, start deleting `id`. Returns
    /// `None` when the user declines; nothing is sent in that case.
    pub fn request_delete<C: Confirm + ?Sized>(
        &mut self,
        id: &Id,
        confirm: &mut C,
        client: &ApiClient,
    ) -> Result<Option<HttpRequest>, ScreenError> {
        self.require_idle("delete")?;
        let prompt = format!("Are you sure you want to delete this {}?", R::NOUN);
        if !confirm.confirm(&prompt) {
            debug!(key = %R::KEY, %id, "delete declined");
            return Ok(None);
        }
        self.error = None;
        self.state = ScreenState::Deleting(id.clone());
        Ok(Some(client.build_delete::<R>(id)))
    }

    /// Return to idle after a delete, whatever its outcome.
    pub fn finish_delete(&mut self, id: &Id, result: &Result<(), ApiError>) {
        if !matches!(self.state, ScreenState::Deleting(ref current) if current == id) {
            warn!(key = %R::KEY, %id, state = self.state.name(), "delete result for another record");
            return;
        }
        self.state = ScreenState::Idle;
        match result {
            Ok(()) => info!(key = %R::KEY, %id, "deleted"),
            Err(err) => {
                warn!(key = %R::KEY, %id, error = %err, "delete failed");
                self.error = Some(err.to_string());
            }
        }
    }

    /// Mark the per-record action for `id` as running.
    pub fn begin_record_action(&mut self, id: &Id) -> Result<(), ScreenError> {
        let Some(action) = R::RECORD_ACTION else {
            return Err(ScreenError::InvalidTransition {
                action: "run a record action",
                state: self.state.name(),
            });
        };
        if self.state.is_dialog_open() {
            return Err(ScreenError::InvalidTransition {
                action,
                state: self.state.name(),
            });
        }
        if !self.busy.insert(id.clone()) {
            return Err(ScreenError::RecordBusy(id.clone()));
        }
        self.error = None;
        Ok(())
    }

    pub fn finish_record_action(&mut self, id: &Id, error: Option<&ApiError>) {
        if !self.busy.remove(id) {
            warn!(key = %R::KEY, %id, "record action result without an action in flight");
            return;
        }
        if let Some(err) = error {
            warn!(key = %R::KEY, %id, error = %err, "record action failed");
            self.error = Some(err.to_string());
        }
    }

    /// Build the view model from the cached list and select options.
    pub fn view(
        &self,
        snapshot: &Snapshot<'_, R>,
        dependencies_loading: bool,
        options: impl Fn(CacheKey) -> Vec<SelectOption>,
    ) -> ScreenView {
        let cards = snapshot
            .data
            .iter()
            .map(|record| CardView {
                card: record.card(),
                action: R::RECORD_ACTION.map(|label| ActionView {
                    label,
                    enabled: !self.is_busy(record.id()),
                }),
            })
            .collect();

        let dialog = self.state.is_dialog_open().then(|| {
            let editing = matches!(
                self.state,
                ScreenState::DialogOpenForEdit(_) | ScreenState::Submitting { editing: Some(_) }
            );
            let submitting = matches!(self.state, ScreenState::Submitting { .. });
            DialogView {
                title: if editing {
                    format!("Edit {}", R::TITLE)
                } else {
                    format!("Add New {}", R::TITLE)
                },
                fields: R::Draft::schema()
                    .iter()
                    .map(|spec| FieldView {
                        spec: *spec,
                        value: self.draft.get(spec.name).unwrap_or_default(),
                        options: match spec.kind {
                            FieldKind::Select(key) => options(key),
                            _ => Vec::new(),
                        },
                    })
                    .collect(),
                submit_label: if submitting { "Saving..." } else { "Save" },
                submitting,
                error: self.error.clone(),
            }
        });

        let error = if dialog.is_some() {
            None
        } else {
            self.error
                .clone()
                .or_else(|| snapshot.error.map(str::to_string))
        };

        ScreenView {
            heading: R::HEADING,
            add_label: format!("Add {}", R::TITLE),
            loading: snapshot.is_loading || dependencies_loading,
            loading_text: format!("Loading {}...", R::HEADING.to_lowercase()),
            cards,
            dialog,
            error,
        }
    }
}

/// One screen per resource kind.
#[derive(Debug)]
pub struct Screens {
    pub(crate) building_types: ResourceScreen<BuildingType>,
    pub(crate) materials: ResourceScreen<Material>,
    pub(crate) projects: ResourceScreen<Project>,
}

impl Screens {
    pub fn new(cache: &mut QueryCache) -> Self {
        Self {
            building_types: ResourceScreen::new(cache.subscribe()),
            materials: ResourceScreen::new(cache.subscribe()),
            projects: ResourceScreen::new(cache.subscribe()),
        }
    }

    pub fn get<R: Resource>(&self) -> &ResourceScreen<R> {
        R::screen(self)
    }

    pub fn get_mut<R: Resource>(&mut self) -> &mut ResourceScreen<R> {
        R::screen_mut(self)
    }
}

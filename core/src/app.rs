//! The client event loop.
//!
//! # Design
//! `App` owns the client, the session, the cache, one screen per resource and
//! the dashboard. User actions queue `Outgoing` requests; the host pulls them
//! with [`App::poll_request`], executes them, and hands the outcome back with
//! [`App::deliver`]. Nothing runs concurrently: a delivery is the only point
//! at which the outcome of a request becomes visible, so hosts decide the
//! interleaving (and tests can reorder deliveries to reproduce races).
//!
//! Cache fetches are not queued directly; reads and invalidations schedule
//! them and `poll_request` turns whatever is scheduled into requests. The
//! bearer token is read from the session when a request is polled.

use std::collections::{BTreeSet, VecDeque};

use tracing::{info, warn};

use crate::cache::{FetchId, QueryCache, SubscriberId};
use crate::client::ApiClient;
use crate::config::ClientConfig;
use crate::dashboard::{Dashboard, DashboardView};
use crate::error::{ApiError, ScreenError, SessionError};
use crate::http::{HttpRequest, HttpResponse, Transport};
use crate::resource::{CacheKey, FieldKind, FormDraft, Resource};
use crate::screen::{Confirm, ResourceScreen, ScreenView, Screens};
use crate::session::SessionStore;
use crate::types::{AuthResponse, BuildingType, Credentials, Id, Material, Project, Registration};

/// What a response will be applied to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ticket {
    Fetch { key: CacheKey, fetch: FetchId },
    Submit { key: CacheKey },
    Delete { key: CacheKey, id: Id },
    Estimate { id: Id },
    Login,
    Register,
}

/// A request waiting to be executed by the host.
#[derive(Debug, Clone)]
pub struct Outgoing {
    pub ticket: Ticket,
    pub request: HttpRequest,
}

/// Outcomes of user-initiated requests, for hosts that report them.
#[derive(Debug, Clone)]
pub enum Event {
    Saved { key: CacheKey, id: Id },
    SaveFailed { key: CacheKey, error: ApiError },
    Deleted { key: CacheKey, id: Id },
    DeleteFailed { key: CacheKey, id: Id, error: ApiError },
    Estimated(Project),
    EstimateFailed { id: Id, error: ApiError },
    Authenticated(AuthResponse),
    AuthFailed(ApiError),
    /// The server accepted the credentials but the token could not be saved.
    SessionFailed(SessionError),
}

pub struct App<S: SessionStore> {
    config: ClientConfig,
    client: ApiClient,
    session: S,
    cache: QueryCache,
    screens: Screens,
    dashboard: Dashboard,
    outbox: VecDeque<Outgoing>,
    dirty: BTreeSet<SubscriberId>,
    events: Vec<Event>,
}

impl<S: SessionStore> App<S> {
    pub fn new(config: ClientConfig, session: S) -> Self {
        let mut cache = QueryCache::new();
        let screens = Screens::new(&mut cache);
        let dashboard = Dashboard::new(&mut cache);
        Self {
            client: ApiClient::new(&config),
            config,
            session,
            cache,
            screens,
            dashboard,
            outbox: VecDeque::new(),
            dirty: BTreeSet::new(),
            events: Vec::new(),
        }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn session(&self) -> &S {
        &self.session
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn screen<R: Resource>(&self) -> &ResourceScreen<R> {
        self.screens.get::<R>()
    }

    // -- rendering ----------------------------------------------------------

    /// Render the screen for `R`, subscribing it to its collection and to any
    /// collection its select fields draw from.
    pub fn view<R: Resource>(&mut self) -> ScreenView {
        let screen = R::screen(&self.screens);
        let subscriber = screen.subscriber();

        let mut dependencies_loading = false;
        for spec in R::Draft::schema() {
            if let FieldKind::Select(key) = spec.kind {
                let (loading, _) = self.cache.watch(key, subscriber);
                dependencies_loading |= loading;
            }
        }
        let options: Vec<_> = CacheKey::ALL
            .into_iter()
            .map(|key| (key, self.cache.options(key)))
            .collect();

        let snapshot = self.cache.read::<R>(subscriber);
        screen.view(&snapshot, dependencies_loading, |key| {
            options
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, o)| o.clone())
                .unwrap_or_default()
        })
    }

    pub fn dashboard(&mut self) -> DashboardView {
        self.dashboard.view(&mut self.cache)
    }

    pub fn dashboard_subscriber(&self) -> SubscriberId {
        self.dashboard.subscriber()
    }

    /// Subscribers whose data or state changed since the last call.
    pub fn take_dirty(&mut self) -> Vec<SubscriberId> {
        std::mem::take(&mut self.dirty).into_iter().collect()
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    // -- screen actions -----------------------------------------------------

    pub fn open_create<R: Resource>(&mut self) -> Result<(), ScreenError> {
        R::screen_mut(&mut self.screens).open_create()
    }

    /// Open the edit dialog for a record currently in the cached list.
    pub fn open_edit<R: Resource>(&mut self, id: &Id) -> Result<(), ScreenError> {
        let record = self
            .cache
            .collection::<R>()
            .find(id)
            .cloned()
            .ok_or_else(|| ScreenError::UnknownRecord(id.clone()))?;
        R::screen_mut(&mut self.screens).open_edit(record)
    }

    pub fn set_field<R: Resource>(&mut self, field: &str, value: &str) -> Result<(), ScreenError> {
        R::screen_mut(&mut self.screens).set_field(field, value)
    }

    pub fn close_dialog<R: Resource>(&mut self) -> Result<(), ScreenError> {
        R::screen_mut(&mut self.screens).close()
    }

    pub fn submit<R: Resource>(&mut self) -> Result<(), ScreenError> {
        let request = R::screen_mut(&mut self.screens).submit(&self.client)?;
        self.enqueue(Ticket::Submit { key: R::KEY }, request);
        Ok(())
    }

    /// Delete `id` after asking `confirm`. Returns false when declined.
    pub fn delete<R: Resource, C: Confirm + ?Sized>(
        &mut self,
        id: &Id,
        confirm: &mut C,
    ) -> Result<bool, ScreenError> {
        let screen = R::screen_mut(&mut self.screens);
        match screen.request_delete(id, confirm, &self.client)? {
            Some(request) => {
                self.enqueue(Ticket::Delete { key: R::KEY, id: id.clone() }, request);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Ask the backend to estimate project `id`.
    pub fn estimate(&mut self, id: &Id) -> Result<(), ScreenError> {
        self.screens.projects.begin_record_action(id)?;
        let request = self.client.build_estimate(id);
        self.enqueue(Ticket::Estimate { id: id.clone() }, request);
        Ok(())
    }

    // -- auth ---------------------------------------------------------------

    pub fn login(&mut self, credentials: &Credentials) -> Result<(), ApiError> {
        let request = self.client.build_login(credentials)?;
        self.enqueue(Ticket::Login, request);
        Ok(())
    }

    pub fn register(&mut self, registration: &Registration) -> Result<(), ApiError> {
        let request = self.client.build_register(registration)?;
        self.enqueue(Ticket::Register, request);
        Ok(())
    }

    pub fn logout(&mut self) -> Result<(), SessionError> {
        self.session.remove(&self.config.session_key)?;
        info!("logged out");
        Ok(())
    }

    pub fn is_authenticated(&self) -> bool {
        self.session
            .load(&self.config.session_key)
            .is_some_and(|t| !t.is_empty())
    }

    // -- event loop ---------------------------------------------------------

    fn enqueue(&mut self, ticket: Ticket, request: HttpRequest) {
        self.outbox.push_back(Outgoing { ticket, request });
    }

    fn flush_scheduled_fetches(&mut self) {
        for (key, fetch) in self.cache.take_scheduled() {
            let request = self.client.build_list_key(key);
            self.enqueue(Ticket::Fetch { key, fetch }, request);
        }
    }

    /// Next request to execute, with the current session token attached.
    pub fn poll_request(&mut self) -> Option<Outgoing> {
        self.flush_scheduled_fetches();
        let mut outgoing = self.outbox.pop_front()?;
        self.client.authorize(&mut outgoing.request, &self.session);
        Some(outgoing)
    }

    /// Apply the outcome of a polled request.
    pub fn deliver(&mut self, ticket: Ticket, result: Result<HttpResponse, ApiError>) {
        match ticket {
            Ticket::Fetch { key, fetch } => match key {
                CacheKey::BuildingTypes => self.finish_fetch::<BuildingType>(fetch, result),
                CacheKey::Materials => self.finish_fetch::<Material>(fetch, result),
                CacheKey::Projects => self.finish_fetch::<Project>(fetch, result),
            },
            Ticket::Submit { key } => match key {
                CacheKey::BuildingTypes => self.finish_submit::<BuildingType>(result),
                CacheKey::Materials => self.finish_submit::<Material>(result),
                CacheKey::Projects => self.finish_submit::<Project>(result),
            },
            Ticket::Delete { key, id } => match key {
                CacheKey::BuildingTypes => self.finish_delete::<BuildingType>(id, result),
                CacheKey::Materials => self.finish_delete::<Material>(id, result),
                CacheKey::Projects => self.finish_delete::<Project>(id, result),
            },
            Ticket::Estimate { id } => self.finish_estimate(id, result),
            Ticket::Login | Ticket::Register => self.finish_auth(result),
        }
    }

    /// Execute requests until nothing is queued or scheduled. Returns the
    /// number of requests executed.
    pub fn run_until_idle<T: Transport + ?Sized>(&mut self, transport: &mut T) -> usize {
        let mut executed = 0;
        while let Some(outgoing) = self.poll_request() {
            let result = transport.execute(&outgoing.request);
            self.deliver(outgoing.ticket, result);
            executed += 1;
        }
        executed
    }

    fn finish_fetch<R: Resource>(&mut self, fetch: FetchId, result: Result<HttpResponse, ApiError>) {
        let parsed = result.and_then(|response| self.client.parse_list::<R>(response));
        let notified = self.cache.resolve(fetch, parsed);
        self.dirty.extend(notified);
    }

    fn finish_submit<R: Resource>(&mut self, result: Result<HttpResponse, ApiError>) {
        let parsed = result.and_then(|response| self.client.parse_record::<R>(response));
        let event = match &parsed {
            Ok(saved) => Event::Saved {
                key: R::KEY,
                id: saved.id().clone(),
            },
            Err(error) => Event::SaveFailed {
                key: R::KEY,
                error: error.clone(),
            },
        };
        let screen = R::screen_mut(&mut self.screens);
        if screen.finish_submit(parsed) {
            self.cache.invalidate(R::KEY);
        }
        self.dirty.insert(screen.subscriber());
        self.events.push(event);
    }

    fn finish_delete<R: Resource>(&mut self, id: Id, result: Result<HttpResponse, ApiError>) {
        let parsed = result.and_then(|response| self.client.parse_delete(response));
        let screen = R::screen_mut(&mut self.screens);
        screen.finish_delete(&id, &parsed);
        self.dirty.insert(screen.subscriber());
        // Refetch regardless of outcome; a failed delete may still have
        // removed the record server-side.
        self.cache.invalidate(R::KEY);
        self.events.push(match parsed {
            Ok(()) => Event::Deleted { key: R::KEY, id },
            Err(error) => Event::DeleteFailed { key: R::KEY, id, error },
        });
    }

    fn finish_estimate(&mut self, id: Id, result: Result<HttpResponse, ApiError>) {
        let parsed = result.and_then(|response| self.client.parse_estimate(response));
        let screen = &mut self.screens.projects;
        screen.finish_record_action(&id, parsed.as_ref().err());
        self.dirty.insert(screen.subscriber());
        match parsed {
            Ok(project) => {
                info!(%id, cost = ?project.estimated_cost, status = %project.status, "estimated");
                self.cache.invalidate(CacheKey::Projects);
                self.events.push(Event::Estimated(project));
            }
            Err(error) => self.events.push(Event::EstimateFailed { id, error }),
        }
    }

    fn finish_auth(&mut self, result: Result<HttpResponse, ApiError>) {
        match result.and_then(|response| self.client.parse_auth(response)) {
            Ok(auth) => match self.session.store(&self.config.session_key, &auth.token) {
                Ok(()) => {
                    info!(user = ?auth.user.as_ref().map(|u| u.email.as_str()), "authenticated");
                    self.events.push(Event::Authenticated(auth));
                }
                Err(error) => {
                    warn!(%error, "authenticated but the token was not saved");
                    self.events.push(Event::SessionFailed(error));
                }
            },
            Err(error) => {
                warn!(%error, "authentication failed");
                self.events.push(Event::AuthFailed(error));
            }
        }
    }
}

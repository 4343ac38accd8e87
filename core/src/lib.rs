//! Client core for the construction cost estimator.
//!
//! # Overview
//! Manages building types, materials and projects held by a REST backend, and
//! triggers the backend's cost estimation for a project. Builds
//! `HttpRequest` values and parses `HttpResponse` values without touching the
//! network (host-does-IO pattern); the host executes the round-trips and feeds
//! the results back through [`App::deliver`].
//!
//! # Design
//! - `ApiClient` is stateless: base URL and session key only. Each operation
//!   is a `build_*` / `parse_*` pair, generic over [`Resource`].
//! - `QueryCache` holds the last fetched list per [`CacheKey`]; invalidation
//!   schedules a full refetch-and-replace.
//! - `ResourceScreen<R>` is one state machine for every resource's
//!   list/dialog/mutation cycle, parameterised by the resource's field schema.
//! - `App` wires them together into a single-threaded event loop.
//! - DTOs are defined independently from the mock-server crate; integration
//!   tests catch schema drift.

pub mod app;
pub mod cache;
pub mod client;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod http;
pub mod resource;
pub mod screen;
pub mod session;
pub mod types;

pub use app::{App, Event, Outgoing, Ticket};
pub use cache::{Collection, QueryCache, Snapshot, SubscriberId};
pub use client::ApiClient;
pub use config::ClientConfig;
pub use dashboard::{DashboardView, Stat};
pub use error::{ApiError, ScreenError, SessionError};
pub use http::{HttpMethod, HttpRequest, HttpResponse, Transport};
pub use resource::{CacheKey, Card, FieldKind, FieldSpec, FormDraft, Resource, SelectOption};
pub use screen::{Confirm, ResourceScreen, ScreenState, ScreenView};
pub use session::{MemoryStore, SessionStore};
pub use types::{
    AuthResponse, BuildingType, BuildingTypeDraft, Credentials, Id, Material, MaterialDraft,
    Project, ProjectDraft, ProjectStatus, Registration, User,
};

//! OpenAPI document for the REST surface.

use utoipa::OpenApi;

use super::dto::{
    BreakRequest, CreateEventRequest, CreatePackResponse, EventListResponse, JoinPackRequest,
    PackResponse, ProfileRequest, RefreshResponse, ReplyRequest, ReplyResponse, ScanRequest,
    StatsResponse, SyncStatusResponse, VoiceRequest,
};
use super::handlers;
use crate::domain::{
    DogEvent, DogProfile, EventId, EventMetadata, EventType, LifeStage, Origin, PackCode, Sex,
    StatsSnapshot, SyncStatus, UrgencyLevel, UserProfile, UserRole, VitalsEvent,
};
use crate::error::{ErrorBody, ErrorResponse};
use crate::intake::StoolAnalysis;
use crate::service::{MirrorState, ScanOutcome, VoiceOutcome};

/// Generated API description, served at `/api-docs/openapi.json` when the
/// `swagger-ui` feature is enabled.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "TailTalk",
        description = "Household dog-care tracker: event log, vitals gauges, pack sharing and voice or photo intake."
    ),
    paths(
        handlers::system::health_handler,
        handlers::events::create_event,
        handlers::events::list_events,
        handlers::events::delete_event,
        handlers::stats::get_stats,
        handlers::stats::take_break,
        handlers::sync::refresh,
        handlers::sync::status,
        handlers::profile::get_profile,
        handlers::profile::put_profile,
        handlers::profile::delete_profile,
        handlers::profile::get_users,
        handlers::profile::put_users,
        handlers::pack::create_pack,
        handlers::pack::join_pack,
        handlers::pack::get_pack,
        handlers::intake::voice,
        handlers::intake::scan,
        handlers::intake::reply,
    ),
    components(schemas(
        DogEvent, EventId, EventType, EventMetadata, DogProfile, LifeStage, Sex, UserProfile,
        UserRole, PackCode, StatsSnapshot, UrgencyLevel, SyncStatus, Origin, VitalsEvent,
        MirrorState, StoolAnalysis, VoiceOutcome, ScanOutcome, ErrorResponse, ErrorBody,
        CreateEventRequest, EventListResponse, StatsResponse, BreakRequest, SyncStatusResponse,
        RefreshResponse, ProfileRequest, CreatePackResponse, JoinPackRequest, PackResponse,
        VoiceRequest, ScanRequest, ReplyRequest, ReplyResponse,
        handlers::system::HealthResponse,
    )),
    tags(
        (name = "System", description = "Health"),
        (name = "Events", description = "Care event log"),
        (name = "Vitals", description = "Derived gauges"),
        (name = "Sync", description = "Remote mirror"),
        (name = "Profile", description = "Dog profile and household members"),
        (name = "Pack", description = "Shared packs"),
        (name = "Intake", description = "Voice, photo and avatar replies"),
    )
)]
pub struct ApiDoc;

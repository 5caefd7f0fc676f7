//! HTTP surface.
//!
//! Identity arrives in gateway-forwarded headers; handlers translate
//! between the wire and the domain operations and map `AppealError`
//! to status codes via its `IntoResponse` impl.

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use tribunal_core::{voting_urgency, AppealId, ReviewQueue, VoteChoice};

use crate::appeal::moderator::{override_appeal, OverrideApplied, OverrideRequest};
use crate::appeal::record::{Appeal, AppealStatus};
use crate::appeal::submit::{submit_appeal, SubmitRequest};
use crate::error::AppealError;
use crate::identity::CallerIdentity;
use crate::vote::cast_vote;
use crate::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/appeals", post(submit))
        .route("/appeals/mine", get(my_appeals))
        .route("/appeals/:id/vote", post(vote))
        .route("/_admin/appeals", get(admin_list))
        .route("/_admin/appeals/:id", get(admin_detail))
        .route("/_admin/appeals/:id/override", post(admin_override))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy", "service": "tribunal" }))
}

async fn submit(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<SubmitRequest>,
) -> Result<Response, AppealError> {
    let caller = CallerIdentity::from_headers(&headers)?;
    let appeal = submit_appeal(&state, &caller.user_id, req, Utc::now()).await?;
    Ok((StatusCode::CREATED, Json(appeal)).into_response())
}

#[derive(Debug, Deserialize)]
struct VoteBody {
    vote: VoteChoice,
    #[serde(default)]
    reason: Option<String>,
}

async fn vote(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<VoteBody>,
) -> Result<Response, AppealError> {
    let caller = CallerIdentity::from_headers(&headers)?;
    let appeal_id = AppealId::from(id.as_str());
    let receipt = cast_vote(
        &state,
        &appeal_id,
        &caller.user_id,
        body.vote,
        body.reason,
        Utc::now(),
    )
    .await?;
    Ok(Json(receipt).into_response())
}

async fn my_appeals(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Response, AppealError> {
    let caller = CallerIdentity::from_headers(&headers)?;
    let appeals: Vec<Appeal> = state
        .appeals
        .list_by_submitter(&caller.user_id)
        .await?
        .into_iter()
        .map(|v| v.value)
        .collect();
    Ok(Json(json!({ "appeals": appeals })).into_response())
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    /// Filter by status. Without one, the listing is the open review
    /// queue (pending and tallying appeals).
    status: Option<AppealStatus>,
    /// Opaque numeric cursor from the previous page's `nextCursor`.
    #[serde(default)]
    cursor: usize,
    #[serde(default = "default_limit")]
    limit: usize,
}

fn default_limit() -> usize {
    50
}

/// Scan depth when listing terminal statuses: those are served newest
/// first from a bounded window.
const LIST_SCAN_LIMIT: usize = 500;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListedAppeal {
    #[serde(flatten)]
    pub appeal: Appeal,
    pub urgency: f64,
}

/// Gather and urgency-sort the appeals for the admin listing.
///
/// Open appeals are collected in full from both review queues, so an
/// old appeal nearing expiry (the urgency scorer's final-day boost)
/// cannot fall off the queue behind newer submissions.
pub async fn collect_admin_listing(
    state: &AppState,
    status: Option<AppealStatus>,
    now: DateTime<Utc>,
) -> Result<Vec<ListedAppeal>, AppealError> {
    let rows = match status {
        Some(s) if s.is_terminal() => state.appeals.list(Some(s), 0, LIST_SCAN_LIMIT).await?,
        _ => {
            let mut open = state.appeals.list_open(ReviewQueue::Community).await?;
            open.extend(state.appeals.list_open(ReviewQueue::Admin).await?);
            if let Some(s) = status {
                open.retain(|v| v.value.status == s);
            }
            open
        }
    };

    let mut listed: Vec<ListedAppeal> = rows
        .into_iter()
        .map(|v| {
            let urgency = voting_urgency(
                v.value.total_votes,
                v.value.created_at,
                v.value.flag_count,
                now,
                &state.voting,
            );
            ListedAppeal {
                appeal: v.value,
                urgency,
            }
        })
        .collect();
    listed.sort_by(|a, b| b.urgency.total_cmp(&a.urgency));
    Ok(listed)
}

async fn admin_list(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Result<Response, AppealError> {
    let caller = CallerIdentity::from_headers(&headers)?;
    caller.require_moderator()?;

    let limit = query.limit.min(200);
    let listed = collect_admin_listing(&state, query.status, Utc::now()).await?;
    let total = listed.len();
    let page: Vec<ListedAppeal> = listed.into_iter().skip(query.cursor).take(limit).collect();
    let next_cursor = if query.cursor + page.len() < total {
        Some(query.cursor + page.len())
    } else {
        None
    };

    Ok(Json(json!({
        "appeals": page,
        "total": total,
        "nextCursor": next_cursor,
    }))
    .into_response())
}

async fn admin_detail(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Response, AppealError> {
    let caller = CallerIdentity::from_headers(&headers)?;
    caller.require_moderator()?;

    let appeal_id = AppealId::from(id.as_str());
    let appeal = state
        .appeals
        .get(&appeal_id)
        .await?
        .ok_or(AppealError::NotFound("appeal"))?
        .value;

    let votes = state.votes.list_for_appeal(&appeal_id).await?;
    let tally = tribunal_core::VoteTally::count(
        &votes.iter().map(|v| v.choice).collect::<Vec<_>>(),
    );
    let audit = state.audit.list_for_subject(&appeal_id.to_string()).await?;

    let window_closes_at =
        appeal.created_at + chrono::Duration::minutes(state.voting.timeout_minutes);
    let window_seconds_remaining = (window_closes_at - Utc::now()).num_seconds().max(0);

    Ok(Json(json!({
        "appeal": appeal,
        "tally": {
            "approve": tally.approve,
            "reject": tally.reject,
            "total": tally.total(),
            "required": appeal.required_votes,
            "quorumReached": tally.total() >= appeal.required_votes,
        },
        "voteWindowSecondsRemaining": window_seconds_remaining,
        "votes": votes,
        "audit": audit,
    }))
    .into_response())
}

async fn admin_override(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(req): Json<OverrideRequest>,
) -> Result<Response, AppealError> {
    let caller = CallerIdentity::from_headers(&headers)?;
    caller.require_moderator()?;

    let idempotency_key = headers
        .get("idempotency-key")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let appeal_id = AppealId::from(id.as_str());
    let (appeal, applied) = override_appeal(
        &state,
        &appeal_id,
        &caller.user_id,
        idempotency_key,
        req,
        Utc::now(),
    )
    .await?;

    let replayed = applied == OverrideApplied::Replay;
    Ok(Json(json!({ "appeal": appeal, "replayed": replayed })).into_response())
}

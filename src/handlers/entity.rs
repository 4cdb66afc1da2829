// Generic master-data handlers, mounted once per entity prefix
use std::collections::HashMap;

use axum::extract::{Extension, Json, Path, Query, State};
use serde::{Deserialize, Serialize};

use crate::database::models::{Entity, Status};
use crate::database::transaction::Actor;
use crate::filter::types::FindAllParams;
use crate::middleware::{ApiResponse, ApiResult};
use crate::services::{EntityService, Listing};

#[derive(Debug, Clone, Deserialize)]
pub struct StatusUpdate {
    pub ids: Vec<String>,
    pub new_status_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatusUpdated {
    pub updated: usize,
    pub status_id: String,
}

/// GET / - filtered, sorted, paginated listing
pub async fn list<T: Entity>(
    State(service): State<EntityService<T>>,
    Extension(actor): Extension<Actor>,
    Query(query): Query<HashMap<String, String>>,
) -> ApiResult<Listing<T>> {
    let params = FindAllParams::from_query(&query)?;
    Ok(ApiResponse::success(service.find_all(&actor, &params).await?))
}

/// GET /:id
pub async fn show<T: Entity>(
    State(service): State<EntityService<T>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
) -> ApiResult<T> {
    Ok(ApiResponse::success(service.find(&actor, &id).await?))
}

/// POST /
pub async fn create<T: Entity>(
    State(service): State<EntityService<T>>,
    Extension(actor): Extension<Actor>,
    Json(input): Json<T::Input>,
) -> ApiResult<T> {
    Ok(ApiResponse::created(service.create(&actor, input).await?))
}

/// PUT /:id
pub async fn update<T: Entity>(
    State(service): State<EntityService<T>>,
    Extension(actor): Extension<Actor>,
    Path(id): Path<String>,
    Json(input): Json<T::Input>,
) -> ApiResult<T> {
    Ok(ApiResponse::success(service.update(&actor, &id, input).await?))
}

/// PUT /status
pub async fn update_status<T: Entity>(
    State(service): State<EntityService<T>>,
    Extension(actor): Extension<Actor>,
    Json(body): Json<StatusUpdate>,
) -> ApiResult<StatusUpdated> {
    let updated = service.update_status(&actor, &body.ids, &body.new_status_id).await?;
    Ok(ApiResponse::success(StatusUpdated { updated, status_id: body.new_status_id }))
}

/// GET /statuses
pub async fn statuses<T: Entity>(
    State(service): State<EntityService<T>>,
    Extension(actor): Extension<Actor>,
) -> ApiResult<Vec<Status>> {
    Ok(ApiResponse::success(service.find_status(&actor).await?))
}

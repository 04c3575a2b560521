//! HTTP endpoint handlers

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use rmd_core::domain::{
    Authorship, DuplicateGroupId, DuplicatePublicationGroup, Import, NewImport, NewPublication,
    NonDuplicateGroupId, NonDuplicatePublicationGroup, Publication, PublicationId,
};
use rmd_core::persistence::StoreCounts;
use rmd_core::{
    AutoMergeReport, DetectionReport, GroupError, MergeError, MergeOutcome, MergeRequest,
    PersistenceError, Repository, RmdError,
};

use crate::extract::{ApiJson, ApiPath};
use crate::AppState;

/// Error response: status code plus `{"error": message}`
pub type ApiError = (StatusCode, Json<serde_json::Value>);

type ApiResult<T> = Result<Json<T>, ApiError>;

pub(crate) fn error_body(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(serde_json::json!({ "error": message.into() })))
}

/// Map a workflow error onto a response
pub fn api_error(err: RmdError) -> ApiError {
    let status = match &err {
        RmdError::NotFound(_) | RmdError::Group(GroupError::NotFound(_)) => StatusCode::NOT_FOUND,
        RmdError::Validation(_)
        | RmdError::Group(GroupError::TooFewPublications(_))
        | RmdError::Merge(MergeError::NothingToMerge(_)) => StatusCode::UNPROCESSABLE_ENTITY,
        RmdError::Group(GroupError::KnownNonDuplicate { .. })
        | RmdError::Group(GroupError::NotAMember { .. })
        | RmdError::Merge(MergeError::KnownNonDuplicate { .. })
        | RmdError::Merge(MergeError::NotInGroup { .. })
        | RmdError::Persistence(PersistenceError::Conflict(_)) => StatusCode::CONFLICT,
        RmdError::Persistence(_) | RmdError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        tracing::error!(error = %err, "Request failed");
    }
    error_body(status, err.to_string())
}

/// Run `f` with the repository locked
fn with_repository<T>(
    state: &AppState,
    f: impl FnOnce(&mut Repository) -> rmd_core::Result<T>,
) -> Result<T, ApiError> {
    let mut repo = state
        .repository()
        .map_err(|e| error_body(StatusCode::INTERNAL_SERVER_ERROR, e))?;
    f(&mut repo).map_err(api_error)
}

// ==================== Publications ====================

/// A publication with its provenance and authors
#[derive(Debug, Serialize)]
pub struct PublicationDetail {
    #[serde(flatten)]
    pub publication: Publication,
    pub imports: Vec<Import>,
    pub authorships: Vec<Authorship>,
    pub non_duplicate_group_ids: Vec<NonDuplicateGroupId>,
}

fn publication_detail(
    repo: &Repository,
    publication: Publication,
) -> rmd_core::Result<PublicationDetail> {
    let imports = repo.imports_for(publication.id)?;
    let authorships = repo.authorships_for(publication.id)?;
    let non_duplicate_group_ids = repo
        .non_duplicate_groups_for(publication.id)?
        .iter()
        .map(|g| g.id)
        .collect();
    Ok(PublicationDetail {
        publication,
        imports,
        authorships,
        non_duplicate_group_ids,
    })
}

fn find_publication(repo: &Repository, id: PublicationId) -> rmd_core::Result<Publication> {
    repo.get_publication(id)?
        .ok_or_else(|| RmdError::NotFound(format!("publication {}", id)))
}

/// List all publications
pub async fn list_publications(State(state): State<Arc<AppState>>) -> ApiResult<Vec<Publication>> {
    with_repository(&state, |repo| repo.list_publications()).map(Json)
}

/// Create a publication with its imports and authorships
pub async fn create_publication(
    State(state): State<Arc<AppState>>,
    ApiJson(request): ApiJson<NewPublication>,
) -> Result<(StatusCode, Json<PublicationDetail>), ApiError> {
    let detail = with_repository(&state, |repo| {
        let publication = repo.create_publication(&request)?;
        publication_detail(repo, publication)
    })?;
    Ok((StatusCode::CREATED, Json(detail)))
}

/// Get a publication with its imports and authorships
pub async fn get_publication(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<PublicationDetail> {
    with_repository(&state, |repo| {
        let publication = find_publication(repo, PublicationId(id))?;
        publication_detail(repo, publication)
    })
    .map(Json)
}

/// Delete a publication
pub async fn delete_publication(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
) -> Result<StatusCode, ApiError> {
    with_repository(&state, |repo| repo.delete_publication(PublicationId(id)))?;
    Ok(StatusCode::NO_CONTENT)
}

/// Attach an import to a publication
pub async fn add_import(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(request): ApiJson<NewImport>,
) -> Result<(StatusCode, Json<Import>), ApiError> {
    let import = with_repository(&state, |repo| repo.add_import(PublicationId(id), &request))?;
    Ok((StatusCode::CREATED, Json(import)))
}

#[derive(Debug, Serialize)]
pub struct DetectedGroupResponse {
    pub group: Option<DuplicatePublicationGroup>,
}

/// Detect and group duplicates of one publication
pub async fn find_duplicates_of(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<DetectedGroupResponse> {
    let config = &state.config.deduplication;
    let group = with_repository(&state, |repo| {
        rmd_core::group_duplicates_of(repo, PublicationId(id), config)
    })?;
    Ok(Json(DetectedGroupResponse { group }))
}

// ==================== Duplicate groups ====================

/// A duplicate group with everything needed to review it
#[derive(Debug, Serialize)]
pub struct DuplicateGroupDetail {
    #[serde(flatten)]
    pub group: DuplicatePublicationGroup,
    pub publications: Vec<PublicationDetail>,
}

/// List duplicate groups
pub async fn list_duplicate_groups(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Vec<DuplicatePublicationGroup>> {
    with_repository(&state, |repo| repo.list_duplicate_groups()).map(Json)
}

/// Request to group publications
#[derive(Debug, Deserialize)]
pub struct CreateGroupRequest {
    pub publication_ids: Vec<PublicationId>,
    #[serde(default)]
    pub allow_known_non_duplicates: bool,
}

/// Group publications as suspected duplicates
pub async fn create_duplicate_group(
    State(state): State<Arc<AppState>>,
    ApiJson(request): ApiJson<CreateGroupRequest>,
) -> Result<(StatusCode, Json<DuplicatePublicationGroup>), ApiError> {
    let group = with_repository(&state, |repo| {
        rmd_core::group_publications(
            repo,
            &request.publication_ids,
            request.allow_known_non_duplicates,
        )
    })?;
    Ok((StatusCode::CREATED, Json(group)))
}

/// Run duplicate detection over every publication
pub async fn detect_duplicates(State(state): State<Arc<AppState>>) -> ApiResult<DetectionReport> {
    let config = &state.config.deduplication;
    with_repository(&state, |repo| rmd_core::group_all_duplicates(repo, config)).map(Json)
}

/// Merge every unambiguous duplicate group
pub async fn auto_merge_groups(State(state): State<Arc<AppState>>) -> ApiResult<AutoMergeReport> {
    let config = &state.config.auto_merge;
    with_repository(&state, |repo| rmd_core::auto_merge(repo, config)).map(Json)
}

/// Get a duplicate group with its member publications
pub async fn get_duplicate_group(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<DuplicateGroupDetail> {
    let group_id = DuplicateGroupId(id);
    with_repository(&state, |repo| {
        let group = repo
            .get_duplicate_group(group_id)?
            .ok_or(GroupError::NotFound(group_id))?;
        let publications = group
            .publication_ids
            .iter()
            .map(|pid| {
                let publication = find_publication(repo, *pid)?;
                publication_detail(repo, publication)
            })
            .collect::<rmd_core::Result<Vec<_>>>()?;
        Ok(DuplicateGroupDetail {
            group,
            publications,
        })
    })
    .map(Json)
}

/// Dismiss a duplicate group, recording its members as non-duplicates
pub async fn ignore_duplicate_group(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
) -> ApiResult<NonDuplicatePublicationGroup> {
    with_repository(&state, |repo| rmd_core::ignore_group(repo, DuplicateGroupId(id))).map(Json)
}

/// Request to merge within a group
#[derive(Debug, Deserialize)]
pub struct GroupMergeRequest {
    pub survivor_id: PublicationId,
    /// Defaults to every other member of the group
    #[serde(default)]
    pub merged_ids: Option<Vec<PublicationId>>,
    #[serde(default)]
    pub allow_known_non_duplicates: bool,
}

/// Merge members of a duplicate group into a survivor
pub async fn merge_duplicate_group(
    State(state): State<Arc<AppState>>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(request): ApiJson<GroupMergeRequest>,
) -> ApiResult<MergeOutcome> {
    let group_id = DuplicateGroupId(id);
    with_repository(&state, |repo| {
        let merged_ids = match request.merged_ids {
            Some(ids) => ids,
            None => repo
                .get_duplicate_group(group_id)?
                .ok_or(GroupError::NotFound(group_id))?
                .publication_ids,
        };
        let mut merge_request =
            MergeRequest::new(request.survivor_id, merged_ids).in_group(group_id);
        if request.allow_known_non_duplicates {
            merge_request = merge_request.allowing_known_non_duplicates();
        }
        rmd_core::merge(repo, &merge_request)
    })
    .map(Json)
}

#[derive(Debug, Serialize)]
pub struct RemainingGroupResponse {
    /// `None` once the group has been deleted
    pub group: Option<DuplicatePublicationGroup>,
}

/// Take a publication out of a duplicate group
pub async fn remove_group_member(
    State(state): State<Arc<AppState>>,
    ApiPath((id, publication_id)): ApiPath<(i64, i64)>,
) -> ApiResult<RemainingGroupResponse> {
    let group = with_repository(&state, |repo| {
        rmd_core::remove_from_group(repo, DuplicateGroupId(id), PublicationId(publication_id))
    })?;
    Ok(Json(RemainingGroupResponse { group }))
}

// ==================== Non-duplicate decisions ====================

/// List recorded non-duplicate decisions
pub async fn list_non_duplicate_groups(
    State(state): State<Arc<AppState>>,
) -> ApiResult<Vec<NonDuplicatePublicationGroup>> {
    with_repository(&state, |repo| repo.list_non_duplicate_groups()).map(Json)
}

#[derive(Debug, Deserialize)]
pub struct NonDuplicateRequest {
    pub publication_ids: Vec<PublicationId>,
}

/// Record that publications are not duplicates of each other
pub async fn create_non_duplicate_group(
    State(state): State<Arc<AppState>>,
    ApiJson(request): ApiJson<NonDuplicateRequest>,
) -> Result<(StatusCode, Json<NonDuplicatePublicationGroup>), ApiError> {
    let decision = with_repository(&state, |repo| {
        rmd_core::record_non_duplicates(repo, &request.publication_ids)
    })?;
    Ok((StatusCode::CREATED, Json(decision)))
}

// ==================== System ====================

/// Liveness check
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    #[serde(flatten)]
    pub counts: StoreCounts,
    pub schema_version: u32,
    pub database: String,
}

/// Get system status
pub async fn get_status(State(state): State<Arc<AppState>>) -> ApiResult<StatusResponse> {
    let (counts, schema_version) =
        with_repository(&state, |repo| Ok((repo.counts()?, repo.schema_version())))?;
    Ok(Json(StatusResponse {
        counts,
        schema_version,
        database: state.database_path().display().to_string(),
    }))
}

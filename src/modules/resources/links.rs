use std::collections::BTreeMap;

use axum::{Json, extract::State};
use axum_extra::extract::cookie::CookieJar;
use futures::{StreamExt, stream};
use reqwest::{Client, StatusCode as HttpStatus};
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
    modules::admin_shared::db_failure,
    web::{ApiFailure, AppState, ResourceRow, admin::require_admin, data},
};

const LINK_CHECK_CONCURRENCY: usize = 8;

/// A resource field pointing at an external URL.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkReference {
    resource_id: Uuid,
    title: String,
    field: &'static str,
}

#[derive(Debug, Serialize)]
pub struct BrokenLink {
    url: String,
    status: Option<u16>,
    error: Option<String>,
    used_by: Vec<LinkReference>,
}

#[derive(Debug, Serialize)]
pub struct LinkReport {
    checked: usize,
    broken: Vec<BrokenLink>,
}

#[derive(Debug, PartialEq)]
enum LinkStatus {
    Reachable,
    Failed { status: Option<u16>, error: Option<String> },
}

/// External links grouped by URL so each one is requested once. Local `/files/` links are skipped.
fn collect_targets(resources: &[ResourceRow]) -> BTreeMap<String, Vec<LinkReference>> {
    let mut targets: BTreeMap<String, Vec<LinkReference>> = BTreeMap::new();

    for resource in resources {
        let fields = [
            ("link", &resource.link),
            ("preview_link", &resource.preview_link),
            ("download_link", &resource.download_link),
        ];
        for (field, value) in fields {
            let Some(url) = value.as_deref().map(str::trim) else {
                continue;
            };
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                continue;
            }
            targets
                .entry(url.to_string())
                .or_default()
                .push(LinkReference {
                    resource_id: resource.id,
                    title: resource.title.clone(),
                    field,
                });
        }
    }

    targets
}

/// Some hosts refuse HEAD; those get a second chance with GET.
fn retry_with_get(status: HttpStatus) -> bool {
    matches!(
        status,
        HttpStatus::METHOD_NOT_ALLOWED | HttpStatus::FORBIDDEN | HttpStatus::NOT_IMPLEMENTED
    )
}

fn status_outcome(status: HttpStatus) -> LinkStatus {
    if status.is_success() || status.is_redirection() {
        LinkStatus::Reachable
    } else {
        LinkStatus::Failed {
            status: Some(status.as_u16()),
            error: None,
        }
    }
}

async fn check_link(client: &Client, url: &str) -> LinkStatus {
    let head = client.head(url).send().await;
    let status = match head {
        Ok(response) if retry_with_get(response.status()) => {
            match client.get(url).send().await {
                Ok(response) => response.status(),
                Err(err) => {
                    return LinkStatus::Failed {
                        status: None,
                        error: Some(err.to_string()),
                    };
                }
            }
        }
        Ok(response) => response.status(),
        Err(err) => {
            debug!(%url, ?err, "link check request failed");
            return LinkStatus::Failed {
                status: None,
                error: Some(err.to_string()),
            };
        }
    };
    status_outcome(status)
}

/// `GET /api/admin/resources/link-report`: request every external link and list the failures.
pub async fn link_report(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<Json<LinkReport>, ApiFailure> {
    let admin = require_admin(&state, &jar).await?;

    let resources = data::fetch_all_resources(state.pool_ref())
        .await
        .map_err(db_failure)?;
    let targets = collect_targets(&resources);
    let checked = targets.len();

    let client = state.http_client();
    let mut broken: Vec<BrokenLink> = stream::iter(targets)
        .map(|(url, used_by)| {
            let client = client.clone();
            async move {
                match check_link(&client, &url).await {
                    LinkStatus::Reachable => None,
                    LinkStatus::Failed { status, error } => Some(BrokenLink {
                        url,
                        status,
                        error,
                        used_by,
                    }),
                }
            }
        })
        .buffer_unordered(LINK_CHECK_CONCURRENCY)
        .filter_map(|outcome| async move { outcome })
        .collect()
        .await;
    broken.sort_by(|a, b| a.url.cmp(&b.url));

    info!(admin = %admin.username, checked, broken = broken.len(), "link report generated");
    Ok(Json(LinkReport { checked, broken }))
}

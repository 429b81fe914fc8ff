//! Recommendation summaries for responders and volunteers

use serde::Serialize;
use std::convert::Infallible;

use crate::core::relay::SharedRelay;
use crate::moderation::SummaryRequest;

#[derive(Debug, Serialize)]
pub struct RecommendationResponse {
    pub summary: String,
    /// True when `summary` is the censorship marker because the backend failed
    pub restricted: bool,
}

pub async fn handle_recommendation(
    request: SummaryRequest,
    relay: SharedRelay,
) -> Result<impl warp::Reply, Infallible> {
    let summary = relay.summarize(&request).await;
    if let Some(failure) = &summary.failure {
        log::warn!(
            "Summary for {} ({}) failed closed: {}",
            request.destination,
            request.event_type,
            failure
        );
    }

    Ok(warp::reply::json(&RecommendationResponse {
        restricted: summary.failed_closed(),
        summary: summary.content,
    }))
}

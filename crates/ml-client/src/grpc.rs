//! gRPC implementation of `RankingModel`.
//!
//! Talks to the model-serving sidecar described by `proto/ranking.proto`.
//! The channel is cheap to clone, so every call clones the client instead of
//! locking a shared one.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tonic::transport::Channel;
use tonic::{Code, Status};
use tracing::{debug, error, info};

use crate::ranking::ranking_model_client::RankingModelClient;
use crate::ranking::{PredictRequest, PredictResponse};
use crate::{MLClientError, RankingModel, RankingQuery, ScoredCandidate};

/// Client for the ranking model sidecar
#[derive(Debug, Clone)]
pub struct GrpcRankingModel {
    client: RankingModelClient<Channel>,
    service_addr: String,
}

impl GrpcRankingModel {
    /// Connect to the ranking model service.
    ///
    /// # Arguments
    /// * `addr` - Address of the gRPC service (e.g., "http://localhost:50051")
    /// * `connect_timeout` - How long to wait for the TCP/HTTP2 handshake
    pub async fn connect(addr: impl Into<String>, connect_timeout: Duration) -> Result<Self> {
        let addr = addr.into();
        info!("Connecting to ranking model at {}", addr);

        let channel = Channel::from_shared(addr.clone())
            .context("Creating channel from address")?
            .connect_timeout(connect_timeout)
            .connect()
            .await
            .context("Connecting to ranking model")?;

        Ok(Self {
            client: RankingModelClient::new(channel),
            service_addr: addr,
        })
    }

    /// Get the address of the model service this client is connected to.
    pub fn service_address(&self) -> &str {
        &self.service_addr
    }
}

#[async_trait]
impl RankingModel for GrpcRankingModel {
    async fn predict(&self, query: &RankingQuery) -> Result<Vec<ScoredCandidate>, MLClientError> {
        debug!(
            "Requesting {} recommendations for {} rated items",
            query.k,
            query.items.len()
        );

        let k = u32::try_from(query.k)
            .map_err(|_| MLClientError::Rejected(format!("k is too large: {}", query.k)))?;
        let request = tonic::Request::new(PredictRequest {
            items: query.items.iter().map(|(id, r)| (id.clone(), *r)).collect(),
            k,
        });

        let mut client = self.client.clone();
        let response = client.predict(request).await.map_err(|status| {
            error!("gRPC error while ranking items: {}", status);
            status_to_error(&status)
        })?;

        rank_candidates(response.into_inner())
    }
}

/// Classify a gRPC status: input problems are rejections, the rest are failures
fn status_to_error(status: &Status) -> MLClientError {
    let message = status.message().to_string();
    match status.code() {
        Code::InvalidArgument | Code::NotFound | Code::FailedPrecondition | Code::OutOfRange => {
            MLClientError::Rejected(message)
        }
        Code::Unavailable => MLClientError::ConnectionError(message),
        code => MLClientError::ScoringError(format!("{:?}: {}", code, message)),
    }
}

/// Turn a `PredictResponse` into ordered candidates.
///
/// `recommendations` carries the ranking; each score is looked up in
/// `scores`. When a model only fills `scores`, it is ranked by descending
/// score with ties broken by id. Duplicate recommendations keep their first
/// position.
pub fn rank_candidates(response: PredictResponse) -> Result<Vec<ScoredCandidate>, MLClientError> {
    let PredictResponse {
        recommendations,
        scores,
    } = response;

    let mut candidates = Vec::with_capacity(recommendations.len().max(scores.len()));

    if recommendations.is_empty() {
        for (item_id, score) in scores {
            let score = checked_score(&item_id, score)?;
            candidates.push(ScoredCandidate::new(item_id, score));
        }
        // Scores are finite here, so partial_cmp never fails
        candidates.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.item_id.cmp(&b.item_id))
        });
        return Ok(candidates);
    }

    for item_id in recommendations {
        if candidates.iter().any(|c: &ScoredCandidate| c.item_id == item_id) {
            continue;
        }
        let score = scores.get(&item_id).copied().ok_or_else(|| {
            MLClientError::InvalidResponse(format!("No score for recommended item {}", item_id))
        })?;
        let score = checked_score(&item_id, score)?;
        candidates.push(ScoredCandidate::new(item_id, score));
    }
    Ok(candidates)
}

fn checked_score(item_id: &str, score: f64) -> Result<f64, MLClientError> {
    if score.is_finite() {
        Ok(score)
    } else {
        Err(MLClientError::InvalidResponse(format!(
            "Non-finite score {} for item {}",
            score, item_id
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn response(recommendations: &[&str], scores: &[(&str, f64)]) -> PredictResponse {
        PredictResponse {
            recommendations: recommendations.iter().map(|s| s.to_string()).collect(),
            scores: scores
                .iter()
                .map(|(id, s)| (id.to_string(), *s))
                .collect::<HashMap<_, _>>(),
        }
    }

    #[test]
    fn test_rank_candidates_follows_recommendation_order() {
        let resp = response(&["12", "3", "40"], &[("3", 0.9), ("12", 0.4), ("40", 0.7)]);
        let candidates = rank_candidates(resp).unwrap();

        let ids: Vec<_> = candidates.iter().map(|c| c.item_id.as_str()).collect();
        assert_eq!(ids, vec!["12", "3", "40"], "Model order must not be re-sorted");
        assert_eq!(candidates[0].score, 0.4);
    }

    #[test]
    fn test_rank_candidates_falls_back_to_scores() {
        let resp = response(&[], &[("3", 0.2), ("12", 0.9), ("1", 0.2)]);
        let candidates = rank_candidates(resp).unwrap();

        let ids: Vec<_> = candidates.iter().map(|c| c.item_id.as_str()).collect();
        assert_eq!(ids, vec!["12", "1", "3"]);
    }

    #[test]
    fn test_rank_candidates_skips_duplicates() {
        let resp = response(&["5", "5", "6"], &[("5", 0.5), ("6", 0.4)]);
        let candidates = rank_candidates(resp).unwrap();
        assert_eq!(candidates.len(), 2);
    }

    #[test]
    fn test_rank_candidates_requires_scores() {
        let resp = response(&["5", "6"], &[("5", 0.5)]);
        assert!(matches!(
            rank_candidates(resp),
            Err(MLClientError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_rank_candidates_rejects_nan_scores() {
        let resp = response(&["5"], &[("5", f64::NAN)]);
        assert!(matches!(
            rank_candidates(resp),
            Err(MLClientError::InvalidResponse(_))
        ));

        let resp = response(&[], &[("5", f64::INFINITY)]);
        assert!(rank_candidates(resp).is_err());
    }

    #[test]
    fn test_rank_candidates_empty_response() {
        let candidates = rank_candidates(response(&[], &[])).unwrap();
        assert!(candidates.is_empty());
    }

    #[test]
    fn test_status_classification() {
        let rejected = status_to_error(&Status::invalid_argument("unknown item 42"));
        assert_eq!(rejected, MLClientError::Rejected("unknown item 42".into()));

        let down = status_to_error(&Status::unavailable("connection refused"));
        assert!(matches!(down, MLClientError::ConnectionError(_)));

        let internal = status_to_error(&Status::internal("boom"));
        assert!(matches!(internal, MLClientError::ScoringError(_)));
    }

    // ============================================================================
    // Against a real tonic server
    // ============================================================================

    use std::sync::{Arc, Mutex};

    use tokio::net::TcpListener;
    use tokio_stream::wrappers::TcpListenerStream;
    use tonic::transport::Server;
    use tonic::{Request, Response};

    use crate::ranking::ranking_model_server::{
        RankingModel as RankingModelService, RankingModelServer,
    };

    /// Sidecar double: ranks "3" above "1", refuses item "404"
    #[derive(Default)]
    struct MockRanker {
        last_request: Arc<Mutex<Option<PredictRequest>>>,
    }

    #[tonic::async_trait]
    impl RankingModelService for MockRanker {
        async fn predict(
            &self,
            request: Request<PredictRequest>,
        ) -> Result<Response<PredictResponse>, Status> {
            let request = request.into_inner();
            *self.last_request.lock().unwrap() = Some(request.clone());

            if request.items.contains_key("404") {
                return Err(Status::not_found("unknown item 404"));
            }

            let ranked = ["3", "1", "8"];
            let k = (request.k as usize).min(ranked.len());
            Ok(Response::new(response(
                &ranked[..k],
                &[("3", 0.2), ("1", 0.9), ("8", 0.1)],
            )))
        }
    }

    /// Start the mock sidecar on a random port
    async fn start_mock_ranker(
        last_request: Arc<Mutex<Option<PredictRequest>>>,
    ) -> (String, tokio::task::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock ranking service");
        let addr = listener.local_addr().expect("Failed to get local address");
        let service = RankingModelServer::new(MockRanker { last_request });

        let handle = tokio::spawn(async move {
            Server::builder()
                .add_service(service)
                .serve_with_incoming(TcpListenerStream::new(listener))
                .await
                .expect("Mock ranking service failed");
        });

        (format!("http://{}", addr), handle)
    }

    #[tokio::test]
    async fn test_predict_over_grpc_keeps_served_order() {
        let seen = Arc::new(Mutex::new(None));
        let (addr, handle) = start_mock_ranker(seen.clone()).await;

        let model = GrpcRankingModel::connect(addr.clone(), Duration::from_secs(5))
            .await
            .expect("Failed to connect to mock ranking service");
        assert_eq!(model.service_address(), addr);

        let candidates = model
            .predict(&RankingQuery::single("7", 4.0, 2))
            .await
            .unwrap();
        assert_eq!(
            candidates,
            vec![ScoredCandidate::new("3", 0.2), ScoredCandidate::new("1", 0.9)]
        );

        let request = seen.lock().unwrap().clone().expect("Request not received");
        assert_eq!(request.k, 2);
        assert_eq!(request.items.get("7"), Some(&4.0));

        handle.abort();
    }

    #[tokio::test]
    async fn test_predict_over_grpc_maps_not_found_to_rejected() {
        let (addr, handle) = start_mock_ranker(Arc::default()).await;
        let model = GrpcRankingModel::connect(addr, Duration::from_secs(5))
            .await
            .expect("Failed to connect to mock ranking service");

        let err = model
            .predict(&RankingQuery::single("404", 5.0, 3))
            .await
            .unwrap_err();
        assert_eq!(err, MLClientError::Rejected("unknown item 404".into()));

        handle.abort();
    }

    #[tokio::test]
    async fn test_connect_rejects_invalid_address() {
        let result = GrpcRankingModel::connect("not a uri", Duration::from_millis(100)).await;
        assert!(result.is_err());
    }
}

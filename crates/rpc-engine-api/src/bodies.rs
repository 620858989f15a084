//! Body Queries (spec.md §4.10). Served directly against a [`PayloadBodyProvider`], never
//! through [`engine_tree::handle::EngineHandle`] — the tree's own collaborators only ever see
//! [`engine_primitives::ExecutionBlock`]'s header-only shape, and a body query is the one
//! request in this surface whose cost scales with caller-chosen input rather than chain depth,
//! so it is pushed onto a [`TaskSpawner`] the same way the teacher pushes its own
//! `get_payload_bodies_by_*_with` onto `reth_tasks::TaskSpawner::spawn_blocking`.

use crate::error::EngineApiError;
use alloy_primitives::BlockHash;
use alloy_rpc_types_engine::ExecutionPayloadBodyV1;
use engine_primitives::{PayloadBodyProvider, TaskSpawner};
use std::sync::Arc;
use tokio::sync::oneshot;

/// `getPayloadBodiesByHashV1`/`getPayloadBodiesByRangeV1` never return more than this many
/// entries in one call (spec.md §4.10) — the teacher's own `MAX_PAYLOAD_BODIES_LIMIT` is 1024;
/// this surface's matrix is deliberately smaller.
pub const MAX_PAYLOAD_BODIES: u64 = 32;

/// `getPayloadBodiesByHashV1`: one entry per hash, in request order, `null` for any hash that
/// doesn't resolve. No chain-tip context exists for a hash list, so (unlike the by-range query)
/// nothing here is ever truncated.
pub async fn get_payload_bodies_by_hash(
    provider: Arc<dyn PayloadBodyProvider>,
    spawner: Arc<dyn TaskSpawner>,
    hashes: Vec<BlockHash>,
) -> Result<Vec<Option<ExecutionPayloadBodyV1>>, EngineApiError> {
    if hashes.len() as u64 > MAX_PAYLOAD_BODIES {
        return Err(EngineApiError::TooManyHashes {
            len: hashes.len(),
            max: MAX_PAYLOAD_BODIES as usize,
        });
    }

    let (tx, rx) = oneshot::channel();
    spawner.spawn_blocking(Box::pin(async move {
        let mut result = Vec::with_capacity(hashes.len());
        for hash in hashes {
            match provider.body_by_hash(hash).await {
                Ok(body) => result.push(body),
                Err(_) => result.push(None),
            }
        }
        let _ = tx.send(result);
    }));

    rx.await.map_err(|_| EngineApiError::EngineGone(engine_tree::handle::EngineGone))
}

/// `getPayloadBodiesByRangeV1`: validates `start >= 1 && count >= 1`, caps `count` at
/// [`MAX_PAYLOAD_BODIES`], clamps the range so it never reports trailing nulls past the chain
/// tip, and fills any interior gap (a number with no known block) with `null`.
pub async fn get_payload_bodies_by_range(
    provider: Arc<dyn PayloadBodyProvider>,
    spawner: Arc<dyn TaskSpawner>,
    start: u64,
    count: u64,
) -> Result<Vec<Option<ExecutionPayloadBodyV1>>, EngineApiError> {
    if count > MAX_PAYLOAD_BODIES {
        return Err(EngineApiError::TooManyBlocksRequested { count, max: MAX_PAYLOAD_BODIES });
    }
    if start == 0 || count == 0 {
        return Err(EngineApiError::InvalidBodyRange { start, count });
    }

    let (tx, rx) = oneshot::channel();
    spawner.spawn_blocking(Box::pin(async move {
        let send = |v: Result<Vec<Option<ExecutionPayloadBodyV1>>, EngineApiError>| {
            let _ = tx.send(v);
        };

        let best = match provider.best_block_number().await {
            Ok(best) => best,
            Err(err) => return send(Err(EngineApiError::Internal(err.into()))),
        };

        if start > best {
            return send(Ok(Vec::new()));
        }

        let mut end = start.saturating_add(count - 1);
        if end > best {
            end = best;
        }

        let mut result = Vec::with_capacity((end - start + 1) as usize);
        for number in start..=end {
            match provider.body_by_number(number).await {
                Ok(body) => result.push(body),
                Err(err) => return send(Err(EngineApiError::Internal(err.into()))),
            }
        }
        send(Ok(result))
    }));

    rx.await.map_err(|_| EngineApiError::EngineGone(engine_tree::handle::EngineGone))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::future::Future;
    use std::pin::Pin;
    use tokio::sync::Mutex;

    struct ImmediateSpawner;
    impl TaskSpawner for ImmediateSpawner {
        fn spawn_blocking(&self, fut: Pin<Box<dyn Future<Output = ()> + Send>>) {
            tokio::spawn(fut);
        }
    }

    struct FixedChain {
        tip: u64,
        by_number: HashMap<u64, ExecutionPayloadBodyV1>,
        by_hash: Mutex<HashMap<BlockHash, ExecutionPayloadBodyV1>>,
    }

    fn body() -> ExecutionPayloadBodyV1 {
        ExecutionPayloadBodyV1 { transactions: Vec::new(), withdrawals: None }
    }

    #[async_trait]
    impl PayloadBodyProvider for FixedChain {
        async fn body_by_hash(
            &self,
            hash: BlockHash,
        ) -> eyre::Result<Option<ExecutionPayloadBodyV1>> {
            Ok(self.by_hash.lock().await.get(&hash).cloned())
        }
        async fn body_by_number(
            &self,
            number: u64,
        ) -> eyre::Result<Option<ExecutionPayloadBodyV1>> {
            Ok(self.by_number.get(&number).cloned())
        }
        async fn best_block_number(&self) -> eyre::Result<u64> {
            Ok(self.tip)
        }
    }

    fn chain(tip: u64, present: &[u64]) -> Arc<dyn PayloadBodyProvider> {
        Arc::new(FixedChain {
            tip,
            by_number: present.iter().map(|n| (*n, body())).collect(),
            by_hash: Mutex::new(HashMap::new()),
        })
    }

    #[tokio::test]
    async fn range_clamps_to_chain_tip_with_no_trailing_nulls() {
        let result =
            get_payload_bodies_by_range(chain(5, &[1, 2, 3, 4, 5]), Arc::new(ImmediateSpawner), 3, 10)
                .await
                .unwrap();
        assert_eq!(result.len(), 3);
        assert!(result.iter().all(Option::is_some));
    }

    #[tokio::test]
    async fn range_starting_past_tip_is_empty() {
        let result =
            get_payload_bodies_by_range(chain(5, &[]), Arc::new(ImmediateSpawner), 9, 3).await.unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn range_fills_interior_gaps_with_null() {
        let result =
            get_payload_bodies_by_range(chain(5, &[1, 3, 5]), Arc::new(ImmediateSpawner), 1, 5)
                .await
                .unwrap();
        assert_eq!(
            result.iter().map(Option::is_some).collect::<Vec<_>>(),
            vec![true, false, true, false, true]
        );
    }

    #[tokio::test]
    async fn range_rejects_zero_start() {
        let err = get_payload_bodies_by_range(chain(5, &[]), Arc::new(ImmediateSpawner), 0, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineApiError::InvalidBodyRange { start: 0, count: 1 }));
    }

    #[tokio::test]
    async fn range_rejects_over_cap() {
        let err = get_payload_bodies_by_range(chain(100, &[]), Arc::new(ImmediateSpawner), 1, 33)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineApiError::TooManyBlocksRequested { count: 33, max: 32 }));
    }

    #[tokio::test]
    async fn hash_query_never_truncates_missing_entries() {
        let hashes = vec![BlockHash::repeat_byte(1), BlockHash::repeat_byte(2)];
        let result =
            get_payload_bodies_by_hash(chain(5, &[]), Arc::new(ImmediateSpawner), hashes).await.unwrap();
        assert_eq!(result, vec![None, None]);
    }

    #[tokio::test]
    async fn hash_query_rejects_over_cap() {
        let hashes = (0..40).map(|i| BlockHash::repeat_byte(i)).collect();
        let err = get_payload_bodies_by_hash(chain(5, &[]), Arc::new(ImmediateSpawner), hashes)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineApiError::TooManyHashes { len: 40, max: 32 }));
    }
}

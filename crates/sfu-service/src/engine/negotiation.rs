//! Consumer capability negotiation.

use common::types::ProducerId;
use media_engine::EngineRouter;
use serde_json::Value;
use tracing::debug;

/// Whether a consumer with `rtp_capabilities` may consume `producer_id`.
///
/// Delegates to the router's compatibility predicate. Never fails: a missing router or
/// capabilities that are not a JSON object both yield `false`.
#[must_use]
pub fn can_consume(
    router: Option<&dyn EngineRouter>,
    producer_id: &ProducerId,
    rtp_capabilities: &Value,
) -> bool {
    let Some(router) = router else {
        debug!(
            target: "sfu.engine",
            producer_id = %producer_id,
            "No router, cannot consume"
        );
        return false;
    };

    if !rtp_capabilities.is_object() {
        debug!(
            target: "sfu.engine",
            producer_id = %producer_id,
            "RTP capabilities are not an object"
        );
        return false;
    }

    router.can_consume(producer_id, rtp_capabilities)
}

//! Resolves spec.md §9's `exchangeCapabilities` Open Question: rather than enumerate this
//! surface's own methods by runtime reflection, the supported set is simply declared.

/// Every `engine_`-prefixed method this surface answers, excluding `exchangeCapabilities`
/// itself (spec.md §6: "excluding `exchangeCapabilities` itself and any constructor").
pub const ENGINE_CAPABILITIES: &[&str] = &[
    "engine_newPayloadV1",
    "engine_newPayloadV2",
    "engine_newPayloadV3",
    "engine_forkchoiceUpdatedV1",
    "engine_forkchoiceUpdatedV2",
    "engine_forkchoiceUpdatedV3",
    "engine_getPayloadV1",
    "engine_getPayloadV2",
    "engine_getPayloadV3",
    "engine_getPayloadBodiesByHashV1",
    "engine_getPayloadBodiesByRangeV1",
    "engine_exchangeTransitionConfigurationV1",
];

/// Returns the static capability list as owned strings, ignoring whatever the caller claims to
/// support — this surface's own answer never depends on the peer's.
pub fn exchange_capabilities(_caller_capabilities: &[String]) -> Vec<String> {
    ENGINE_CAPABILITIES.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_list_never_includes_itself() {
        assert!(!ENGINE_CAPABILITIES.contains(&"engine_exchangeCapabilities"));
    }

    #[test]
    fn capability_list_is_independent_of_the_caller() {
        let with_claims = exchange_capabilities(&["anything".to_string()]);
        let without_claims = exchange_capabilities(&[]);
        assert_eq!(with_claims, without_claims);
    }
}

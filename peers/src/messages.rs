//! Typed JSON wire messages for block synchronization.
//!
//! Requests carry a `requestType` discriminator. Ids travel as unsigned
//! decimal strings and the cumulative difficulty as a decimal big-integer
//! string; blocks travel as their canonical JSON objects.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "requestType")]
pub enum PeerRequest {
    #[serde(rename = "getCumulativeDifficulty")]
    GetCumulativeDifficulty,

    #[serde(rename = "getMilestoneBlockIds", rename_all = "camelCase")]
    GetMilestoneBlockIds {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        last_block_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        last_milestone_block_id: Option<String>,
    },

    #[serde(rename = "getNextBlockIds", rename_all = "camelCase")]
    GetNextBlockIds { block_id: String },

    #[serde(rename = "getNextBlocks", rename_all = "camelCase")]
    GetNextBlocks { block_id: String },

    /// Gossip of a freshly accepted block: the block's JSON object with the
    /// `previousBlock` field doubling as the receiver's head precheck.
    #[serde(rename = "processBlock")]
    ProcessBlock {
        #[serde(flatten)]
        block: Value,
    },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CumulativeDifficultyResponse {
    /// Decimal string of the head's cumulative difficulty.
    pub cumulative_difficulty: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blockchain_height: Option<u32>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MilestoneBlockIdsResponse {
    pub milestone_block_ids: Vec<String>,
    /// Set when the anchor itself was found, ending the milestone walk.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last: Option<bool>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NextBlockIdsResponse {
    pub next_block_ids: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NextBlocksResponse {
    pub next_blocks: Vec<Value>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProcessBlockResponse {
    pub accepted: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_type_discriminator() {
        let encoded = serde_json::to_value(&PeerRequest::GetCumulativeDifficulty).unwrap();
        assert_eq!(encoded["requestType"], "getCumulativeDifficulty");
    }

    #[test]
    fn milestone_request_omits_absent_fields() {
        let request = PeerRequest::GetMilestoneBlockIds {
            last_block_id: Some("12345".into()),
            last_milestone_block_id: None,
        };
        let encoded = serde_json::to_value(&request).unwrap();
        assert_eq!(encoded["lastBlockId"], "12345");
        assert!(encoded.get("lastMilestoneBlockId").is_none());
    }

    #[test]
    fn process_block_flattens_block_fields() {
        let request = PeerRequest::ProcessBlock {
            block: json!({"previousBlock": "777", "version": 3}),
        };
        let encoded = serde_json::to_value(&request).unwrap();
        assert_eq!(encoded["requestType"], "processBlock");
        assert_eq!(encoded["previousBlock"], "777");
        assert_eq!(encoded["version"], 3);
    }

    #[test]
    fn request_roundtrip() {
        let request = PeerRequest::GetNextBlockIds {
            block_id: "9988".into(),
        };
        let encoded = serde_json::to_value(&request).unwrap();
        let decoded: PeerRequest = serde_json::from_value(encoded).unwrap();
        match decoded {
            PeerRequest::GetNextBlockIds { block_id } => assert_eq!(block_id, "9988"),
            other => panic!("unexpected request {other:?}"),
        }
    }

    #[test]
    fn difficulty_response_roundtrip() {
        let response = CumulativeDifficultyResponse {
            cumulative_difficulty: "123456789012345678901234567890".into(),
            blockchain_height: Some(4200),
        };
        let encoded = serde_json::to_value(&response).unwrap();
        assert_eq!(encoded["cumulativeDifficulty"], "123456789012345678901234567890");
        let decoded: CumulativeDifficultyResponse = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded.blockchain_height, Some(4200));
    }

    #[test]
    fn milestone_response_defaults_last_to_none() {
        let decoded: MilestoneBlockIdsResponse =
            serde_json::from_value(json!({"milestoneBlockIds": ["1", "2"]})).unwrap();
        assert_eq!(decoded.milestone_block_ids.len(), 2);
        assert!(decoded.last.is_none());
    }
}

use prost::Message;
use serde::Serialize;

use crate::error::{RecordError, Result};
use crate::schema::{BicyclePoseMessage, SimulationMessage};

/// Bicycle pose as reported by the device. Positions in metres, angles in
/// radians.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Pose {
    pub x: f32,
    pub y: f32,
    pub rear_wheel: f32,
    pub pitch: f32,
    pub yaw: f32,
    pub roll: f32,
    pub steer: f32,
}

/// One decoded telemetry record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PoseRecord {
    /// Device timestamp.
    pub timestamp: u32,
    pub pose: Pose,
    /// Firmware build tag, when the device includes it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub build: Option<String>,
}

impl PoseRecord {
    pub fn new(timestamp: u32, pose: Pose) -> Self {
        Self {
            timestamp,
            pose,
            build: None,
        }
    }

    pub fn with_build(mut self, build: impl Into<String>) -> Self {
        self.build = Some(build.into());
        self
    }

    /// Decode one unstuffed frame payload.
    ///
    /// The payload must be exactly the envelope; trailing bytes are parsed as
    /// protobuf fields and usually fail.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let message = SimulationMessage::decode(payload)?;
        let pose = message.pose.ok_or(RecordError::MissingPose)?;
        Ok(Self {
            timestamp: message.timestamp,
            pose: pose.into(),
            build: message.gitsha1,
        })
    }

    /// Encode as a `SimulationMessage`.
    pub fn encode_to_vec(&self) -> Vec<u8> {
        SimulationMessage::from(self).encode_to_vec()
    }
}

impl From<BicyclePoseMessage> for Pose {
    fn from(msg: BicyclePoseMessage) -> Self {
        Self {
            x: msg.x,
            y: msg.y,
            rear_wheel: msg.rear_wheel,
            pitch: msg.pitch,
            yaw: msg.yaw,
            roll: msg.roll,
            steer: msg.steer,
        }
    }
}

impl From<Pose> for BicyclePoseMessage {
    fn from(pose: Pose) -> Self {
        Self {
            x: pose.x,
            y: pose.y,
            rear_wheel: pose.rear_wheel,
            pitch: pose.pitch,
            yaw: pose.yaw,
            roll: pose.roll,
            steer: pose.steer,
        }
    }
}

impl From<&PoseRecord> for SimulationMessage {
    fn from(record: &PoseRecord) -> Self {
        Self {
            timestamp: record.timestamp,
            pose: Some(record.pose.into()),
            gitsha1: record.build.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> PoseRecord {
        PoseRecord::new(
            1_234,
            Pose {
                x: 1.5,
                y: -2.25,
                rear_wheel: 0.5,
                pitch: 0.01,
                yaw: 1.57,
                roll: -0.1,
                steer: 0.2,
            },
        )
    }

    #[test]
    fn decodes_what_it_encodes() {
        let record = sample().with_build("a1b2c3d");
        let decoded = PoseRecord::decode(&record.encode_to_vec()).unwrap();
        assert_eq!(decoded, record);
    }

    #[test]
    fn field_numbers_match_device_contract() {
        // timestamp = 1 (varint 5), pose = 2 (len-delimited), pose.x = 1 (fixed32 1.0)
        let bytes = [0x08, 0x05, 0x12, 0x05, 0x0D, 0x00, 0x00, 0x80, 0x3F];
        let record = PoseRecord::decode(&bytes).unwrap();

        assert_eq!(record.timestamp, 5);
        assert_eq!(record.pose.x, 1.0);
        assert_eq!(record.pose.steer, 0.0);
        assert!(record.build.is_none());
    }

    #[test]
    fn envelope_without_pose_is_rejected() {
        let bytes = SimulationMessage {
            timestamp: 9,
            pose: None,
            gitsha1: Some("deadbeef".into()),
        }
        .encode_to_vec();

        assert!(matches!(
            PoseRecord::decode(&bytes),
            Err(RecordError::MissingPose)
        ));
    }

    #[test]
    fn empty_payload_has_no_pose() {
        assert!(matches!(
            PoseRecord::decode(&[]),
            Err(RecordError::MissingPose)
        ));
    }

    #[test]
    fn truncated_payload_is_malformed() {
        let bytes = sample().encode_to_vec();
        let err = PoseRecord::decode(&bytes[..bytes.len() - 3]).unwrap_err();
        assert!(matches!(err, RecordError::Decode(_)));
    }

    #[test]
    fn serializes_for_display() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["timestamp"], 1_234);
        assert_eq!(json["pose"]["x"], 1.5);
        assert!(json.get("build").is_none());
    }
}

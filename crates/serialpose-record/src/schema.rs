//! Wire schema shared with the device firmware.
//!
//! ```text
//! message BicyclePoseMessage {
//!   float x = 1;  float y = 2;     float rear_wheel = 3;
//!   float pitch = 4;  float yaw = 5;  float roll = 6;  float steer = 7;
//! }
//! message SimulationMessage {
//!   uint32 timestamp = 1;
//!   BicyclePoseMessage pose = 2;
//!   optional string gitsha1 = 3;
//! }
//! ```
//!
//! Field numbers are part of the device contract and must not change.

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BicyclePoseMessage {
    #[prost(float, tag = "1")]
    pub x: f32,
    #[prost(float, tag = "2")]
    pub y: f32,
    #[prost(float, tag = "3")]
    pub rear_wheel: f32,
    #[prost(float, tag = "4")]
    pub pitch: f32,
    #[prost(float, tag = "5")]
    pub yaw: f32,
    #[prost(float, tag = "6")]
    pub roll: f32,
    #[prost(float, tag = "7")]
    pub steer: f32,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct SimulationMessage {
    #[prost(uint32, tag = "1")]
    pub timestamp: u32,
    #[prost(message, optional, tag = "2")]
    pub pose: Option<BicyclePoseMessage>,
    #[prost(string, optional, tag = "3")]
    pub gitsha1: Option<String>,
}

//! ATDECC Entity Model: the descriptor tree an entity exposes to
//! READ_DESCRIPTOR.
//!
//! Nothing here is cached. Every request builds a fresh record:
//!
//! ```text
//! READ_DESCRIPTOR(type, index)
//!        │
//!        ▼
//!   factory::build ──> builder for `type` ──> Descriptor ──> encode()
//!        ▲                  ▲
//!   EntityInfo        EntityConfig overrides (YAML)
//! ```

pub mod config;
pub mod descriptors;
pub mod factory;

use std::fmt;

use serde::Deserialize;

pub use config::EntityConfig;
pub use descriptors::Descriptor;
pub use factory::build;

/// Descriptor type tags (IEEE 1722.1-2021 Table 7-1) for the kinds this
/// entity model can build.
///
/// Variants are declared in ascending numeric order, so the derived `Ord`
/// matches wire order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[repr(u16)]
pub enum DescriptorType {
    Entity = 0x0000,
    Configuration = 0x0001,
    AudioUnit = 0x0002,
    StreamInput = 0x0005,
    StreamOutput = 0x0006,
    JackInput = 0x0007,
    JackOutput = 0x0008,
    AvbInterface = 0x0009,
    ClockSource = 0x000A,
    StreamPortInput = 0x000E,
    StreamPortOutput = 0x000F,
    AudioCluster = 0x0014,
    AudioMap = 0x0017,
    ClockDomain = 0x0024,
}

/// `descriptor_type` value meaning "no descriptor".
pub const DESCRIPTOR_TYPE_INVALID: u16 = 0xFFFF;

impl DescriptorType {
    pub const ALL: [DescriptorType; 14] = [
        Self::Entity,
        Self::Configuration,
        Self::AudioUnit,
        Self::StreamInput,
        Self::StreamOutput,
        Self::JackInput,
        Self::JackOutput,
        Self::AvbInterface,
        Self::ClockSource,
        Self::StreamPortInput,
        Self::StreamPortOutput,
        Self::AudioCluster,
        Self::AudioMap,
        Self::ClockDomain,
    ];

    pub fn from_u16(value: u16) -> Option<Self> {
        Self::ALL.into_iter().find(|t| *t as u16 == value)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Entity => "ENTITY",
            Self::Configuration => "CONFIGURATION",
            Self::AudioUnit => "AUDIO_UNIT",
            Self::StreamInput => "STREAM_INPUT",
            Self::StreamOutput => "STREAM_OUTPUT",
            Self::JackInput => "JACK_INPUT",
            Self::JackOutput => "JACK_OUTPUT",
            Self::AvbInterface => "AVB_INTERFACE",
            Self::ClockSource => "CLOCK_SOURCE",
            Self::StreamPortInput => "STREAM_PORT_INPUT",
            Self::StreamPortOutput => "STREAM_PORT_OUTPUT",
            Self::AudioCluster => "AUDIO_CLUSTER",
            Self::AudioMap => "AUDIO_MAP",
            Self::ClockDomain => "CLOCK_DOMAIN",
        }
    }
}

impl fmt::Display for DescriptorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_u16_matches_discriminant() {
        for kind in DescriptorType::ALL {
            assert_eq!(DescriptorType::from_u16(kind as u16), Some(kind));
        }
        assert_eq!(DescriptorType::from_u16(0x0003), None);
        assert_eq!(DescriptorType::from_u16(DESCRIPTOR_TYPE_INVALID), None);
    }

    #[test]
    fn ordering_follows_wire_value() {
        let mut sorted = DescriptorType::ALL;
        sorted.sort();
        assert_eq!(sorted, DescriptorType::ALL);
        assert!(DescriptorType::AudioMap < DescriptorType::ClockDomain);
    }

    #[test]
    fn names_deserialize() {
        let kind: DescriptorType = serde_yaml::from_str("STREAM_PORT_INPUT").unwrap();
        assert_eq!(kind, DescriptorType::StreamPortInput);
        assert_eq!(kind.to_string(), "STREAM_PORT_INPUT");
    }
}

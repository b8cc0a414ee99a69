//! YAML entity configuration.
//!
//! Top-level keys name descriptor kinds; each maps field names to
//! overrides. Anything left out keeps the builder default.
//!
//! ```yaml
//! ENTITY:
//!   entity_name: "aesrl 16-channel"
//!   group_name: "aesrl"
//! CONFIGURATION:
//!   descriptor_counts:
//!     AUDIO_UNIT: 1
//!     STREAM_INPUT: 1
//! STREAM_INPUT:
//!   object_name: "Audio Input Stream"
//!   stream_flags: [1, 2, 0x8000]
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use super::DescriptorType;
use crate::error::Result;

/// Bit flags given either as one integer or as a list of bits to add up.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Flags {
    Value(u16),
    Bits(Vec<u16>),
}

impl Flags {
    pub fn value(&self) -> u16 {
        match self {
            Flags::Value(v) => *v,
            Flags::Bits(bits) => bits.iter().fold(0u16, |acc, bit| acc.wrapping_add(*bit)),
        }
    }
}

/// Flag override resolved against a default.
pub(crate) fn flags_or(flags: &Option<Flags>, default: u16) -> u16 {
    flags.as_ref().map_or(default, Flags::value)
}

/// Descriptor overrides for one entity, loaded once at construction.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "SCREAMING_SNAKE_CASE")]
pub struct EntityConfig {
    pub entity: EntityOverrides,
    pub configuration: ConfigurationOverrides,
    pub audio_unit: AudioUnitOverrides,
    pub stream_input: StreamOverrides,
    pub stream_output: StreamOverrides,
    pub jack_input: JackOverrides,
    pub jack_output: JackOverrides,
    pub avb_interface: AvbInterfaceOverrides,
    pub clock_source: ClockSourceOverrides,
    pub stream_port_input: StreamPortOverrides,
    pub stream_port_output: StreamPortOverrides,
    pub audio_cluster: AudioClusterOverrides,
    pub audio_map: AudioMapOverrides,
    pub clock_domain: ClockDomainOverrides,
}

impl EntityConfig {
    pub fn from_yaml(text: &str) -> Result<Self> {
        // An empty document deserializes to unit, not to a map.
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let config = Self::from_yaml(&text)?;
        tracing::debug!(path = %path.display(), "entity configuration loaded");
        Ok(config)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EntityOverrides {
    pub entity_model_id: Option<u64>,
    pub association_id: Option<u64>,
    pub entity_name: Option<String>,
    pub vendor_name_string: Option<u16>,
    pub model_name_string: Option<u16>,
    pub firmware_version: Option<String>,
    pub group_name: Option<String>,
    pub serial_number: Option<String>,
    pub configurations_count: Option<u16>,
    pub current_configuration: Option<u16>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigurationOverrides {
    pub object_name: Option<String>,
    /// Number of descriptors of each kind in the configuration.
    pub descriptor_counts: BTreeMap<DescriptorType, u16>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AudioUnitOverrides {
    pub object_name: Option<String>,
    /// Supported rates in Hz. The first one is the current rate.
    pub sampling_rates: Option<Vec<u32>>,
    pub clock_domain_index: Option<u16>,
    pub number_of_stream_input_ports: Option<u16>,
    pub base_stream_input_port: Option<u16>,
    pub number_of_stream_output_ports: Option<u16>,
    pub base_stream_output_port: Option<u16>,
    pub number_of_external_input_ports: Option<u16>,
    pub base_external_input_port: Option<u16>,
    pub number_of_external_output_ports: Option<u16>,
    pub base_external_output_port: Option<u16>,
    pub number_of_internal_input_ports: Option<u16>,
    pub base_internal_input_port: Option<u16>,
    pub number_of_internal_output_ports: Option<u16>,
    pub base_internal_output_port: Option<u16>,
    pub number_of_controls: Option<u16>,
    pub base_control: Option<u16>,
    pub number_of_signal_selectors: Option<u16>,
    pub base_signal_selector: Option<u16>,
    pub number_of_mixers: Option<u16>,
    pub base_mixer: Option<u16>,
    pub number_of_matrices: Option<u16>,
    pub base_matrix: Option<u16>,
    pub number_of_splitters: Option<u16>,
    pub base_splitter: Option<u16>,
    pub number_of_combiners: Option<u16>,
    pub base_combiner: Option<u16>,
    pub number_of_demultiplexers: Option<u16>,
    pub base_demultiplexer: Option<u16>,
    pub number_of_multiplexers: Option<u16>,
    pub base_multiplexer: Option<u16>,
    pub number_of_transcoders: Option<u16>,
    pub base_transcoder: Option<u16>,
    pub number_of_control_blocks: Option<u16>,
    pub base_control_block: Option<u16>,
}

/// Shared by STREAM_INPUT and STREAM_OUTPUT.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StreamOverrides {
    /// Base name; the descriptor index (1-based) is appended.
    pub object_name: Option<String>,
    pub clock_domain_index: Option<u16>,
    pub stream_flags: Option<Flags>,
    /// Supported formats. The first one is the current format.
    pub stream_formats: Option<Vec<u64>>,
    pub avb_interface_index: Option<u16>,
    pub buffer_length: Option<u32>,
    pub timing: Option<u16>,
}

/// Shared by JACK_INPUT and JACK_OUTPUT.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JackOverrides {
    /// Base name; the descriptor index (1-based) is appended.
    pub object_name: Option<String>,
    pub jack_flags: Option<Flags>,
    pub jack_type: Option<u16>,
    pub number_of_controls: Option<u16>,
    pub base_control: Option<u16>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AvbInterfaceOverrides {
    pub object_name: Option<String>,
    /// MAC address as a 48-bit integer.
    pub mac_address: Option<u64>,
    pub interface_flags: Option<Flags>,
    pub clock_identity: Option<u64>,
    pub priority1: Option<u8>,
    pub clock_class: Option<u8>,
    pub offset_scaled_log_variance: Option<u16>,
    pub clock_accuracy: Option<u8>,
    pub priority2: Option<u8>,
    pub domain_number: Option<u8>,
    pub log_sync_interval: Option<u8>,
    pub log_announce_interval: Option<u8>,
    pub log_pdelay_interval: Option<u8>,
    pub port_number: Option<u16>,
    pub number_of_controls: Option<u16>,
    pub base_control: Option<u16>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClockSourceOverrides {
    pub object_name: Option<String>,
    pub clock_source_flags: Option<Flags>,
    pub clock_source_type: Option<u16>,
    pub clock_source_identifier: Option<u64>,
    pub clock_source_location_type: Option<u16>,
    pub clock_source_location_index: Option<u16>,
}

/// Shared by STREAM_PORT_INPUT and STREAM_PORT_OUTPUT.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StreamPortOverrides {
    pub clock_domain_index: Option<u16>,
    pub port_flags: Option<Flags>,
    pub number_of_controls: Option<u16>,
    pub base_control: Option<u16>,
    pub number_of_clusters: Option<u16>,
    pub base_cluster: Option<u16>,
    pub number_of_maps: Option<u16>,
    pub base_map: Option<u16>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AudioClusterOverrides {
    pub object_name: Option<String>,
    pub signal_type: Option<u16>,
    pub signal_index: Option<u16>,
    pub signal_output: Option<u16>,
    pub path_latency: Option<u32>,
    pub block_latency: Option<u32>,
    pub channel_count: Option<u16>,
    pub format: Option<u8>,
    pub aes3_data_type_ref: Option<u8>,
    pub aes3_data_type: Option<u16>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AudioMapOverrides {
    pub number_of_mappings: Option<u16>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClockDomainOverrides {
    pub object_name: Option<String>,
    pub clock_source_index: Option<u16>,
    /// CLOCK_SOURCE descriptor indices in this domain.
    pub clock_sources: Option<Vec<u16>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn flags_accept_integer_or_list() {
        let config = EntityConfig::from_yaml(
            "STREAM_INPUT:\n  stream_flags: [1, 2, 0x8000]\nSTREAM_OUTPUT:\n  stream_flags: 3\n",
        )
        .unwrap();
        assert_eq!(flags_or(&config.stream_input.stream_flags, 0), 0x8003);
        assert_eq!(flags_or(&config.stream_output.stream_flags, 0), 3);
        assert_eq!(flags_or(&config.jack_input.jack_flags, 7), 7);
    }

    #[test]
    fn descriptor_counts_are_keyed_by_kind_name() {
        let config = EntityConfig::from_yaml(
            "CONFIGURATION:\n  descriptor_counts:\n    CLOCK_DOMAIN: 1\n    AUDIO_UNIT: 2\n",
        )
        .unwrap();
        let counts: Vec<_> = config.configuration.descriptor_counts.into_iter().collect();
        assert_eq!(
            counts,
            vec![(DescriptorType::AudioUnit, 2), (DescriptorType::ClockDomain, 1)]
        );
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(EntityConfig::from_yaml("ENTITY:\n  entity_nme: typo\n").is_err());
        assert!(EntityConfig::from_yaml("GADGET:\n  x: 1\n").is_err());
        let unknown_type = "CONFIGURATION:\n  descriptor_counts:\n    WIDGET: 1\n";
        assert!(EntityConfig::from_yaml(unknown_type).is_err());
    }

    #[test]
    fn empty_document_is_default() {
        assert_eq!(EntityConfig::from_yaml("").unwrap(), EntityConfig::default());
        assert_eq!(EntityConfig::from_yaml("  \n").unwrap(), EntityConfig::default());
    }

    #[test]
    fn load_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "ENTITY:\n  group_name: studio").unwrap();
        let config = EntityConfig::load(file.path()).unwrap();
        assert_eq!(config.entity.group_name.as_deref(), Some("studio"));
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = EntityConfig::load(dir.path().join("absent.yml")).unwrap_err();
        assert!(matches!(err, crate::error::AvdeccError::Io(_)));
    }
}

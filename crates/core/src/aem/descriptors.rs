//! Descriptor records and their wire layouts (IEEE 1722.1-2021 §7.2).
//!
//! Every record starts with `descriptor_type` and `descriptor_index`.
//! Names are 64-byte null-padded strings; longer names are cut at 64
//! bytes. Variable-length lists follow the fixed part at the offset the
//! record advertises.

use super::DescriptorType;
use crate::codec::{MacAddr, put_bytes, put_mac, put_u8, put_u16, put_u32, put_u64};
use crate::error::{AvdeccError, Result};

/// Length of an AVDECC string field.
pub const STRING_LEN: usize = 64;

pub const ENTITY_LEN: usize = 312;
pub const CONFIGURATION_LEN: usize = 74;
pub const AUDIO_UNIT_LEN: usize = 144;
/// Fixed part of STREAM_INPUT/OUTPUT, before the redundancy triple.
pub const STREAM_LEN: usize = 132;
/// Where stream formats start (after the redundancy triple).
pub const STREAM_FORMATS_OFFSET: u16 = 138;
pub const JACK_LEN: usize = 78;
pub const AVB_INTERFACE_LEN: usize = 102;
pub const CLOCK_SOURCE_LEN: usize = 86;
pub const STREAM_PORT_LEN: usize = 20;
pub const AUDIO_CLUSTER_LEN: usize = 90;
pub const AUDIO_MAP_LEN: usize = 8;
pub const CLOCK_DOMAIN_LEN: usize = 76;

pub const JACK_TYPE_BALANCED_ANALOG: u16 = 0x0008;
pub const JACK_TYPE_DIGITAL: u16 = 0x0009;

pub const STREAM_FLAG_CLOCK_SYNC_SOURCE: u16 = 0x0001;
pub const STREAM_FLAG_CLASS_A: u16 = 0x0002;
pub const STREAM_FLAG_CLASS_B: u16 = 0x0004;
pub const STREAM_FLAG_SUPPORTS_NO_SRP: u16 = 0x8000;

pub const AVB_INTERFACE_FLAG_GPTP_GRANDMASTER_SUPPORTED: u16 = 0x0001;
pub const AVB_INTERFACE_FLAG_GPTP_SUPPORTED: u16 = 0x0002;
pub const AVB_INTERFACE_FLAG_SRP_SUPPORTED: u16 = 0x0004;

pub const CLOCK_SOURCE_FLAG_STREAM_ID: u16 = 0x0001;
pub const CLOCK_SOURCE_FLAG_LOCAL_ID: u16 = 0x0002;
pub const CLOCK_SOURCE_TYPE_INTERNAL: u16 = 0x0000;
pub const CLOCK_SOURCE_TYPE_EXTERNAL: u16 = 0x0001;
pub const CLOCK_SOURCE_TYPE_INPUT_STREAM: u16 = 0x0002;

pub const PORT_FLAG_CLOCK_SYNC_SOURCE: u16 = 0x0001;
pub const PORT_FLAG_ASYNC_SAMPLE_RATE_CONV: u16 = 0x0002;
pub const PORT_FLAG_SYNC_SAMPLE_RATE_CONV: u16 = 0x0004;

/// Multi-bit linear audio.
pub const AUDIO_CLUSTER_FORMAT_MBLA: u8 = 0x40;

/// AAF, 48 kHz, 32-bit integer, 8 channels, 6 samples per frame.
pub const DEFAULT_STREAM_FORMAT: u64 = 0x0205_0220_0200_6000;

fn put_string(buf: &mut [u8], pos: usize, value: &str) -> Result<()> {
    let bytes = value.as_bytes();
    let len = bytes.len().min(STRING_LEN);
    put_bytes(buf, pos, &[0u8; STRING_LEN])?;
    put_bytes(buf, pos, &bytes[..len])
}

/// Writes `descriptor_type`, `descriptor_index` and, when present, the
/// object name. `localized_description` (offset 68) stays 0.
fn put_common(buf: &mut [u8], kind: DescriptorType, index: u16, name: Option<&str>) -> Result<()> {
    put_u16(buf, 0, kind as u16)?;
    put_u16(buf, 2, index)?;
    if let Some(name) = name {
        put_string(buf, 4, name)?;
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityDescriptor {
    pub descriptor_index: u16,
    pub entity_id: u64,
    pub entity_model_id: u64,
    pub entity_capabilities: u32,
    pub talker_stream_sources: u16,
    pub talker_capabilities: u16,
    pub listener_stream_sinks: u16,
    pub listener_capabilities: u16,
    pub controller_capabilities: u32,
    pub available_index: u32,
    pub association_id: u64,
    pub entity_name: String,
    pub vendor_name_string: u16,
    pub model_name_string: u16,
    pub firmware_version: String,
    pub group_name: String,
    pub serial_number: String,
    pub configurations_count: u16,
    pub current_configuration: u16,
}

impl EntityDescriptor {
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; ENTITY_LEN];
        put_common(&mut buf, DescriptorType::Entity, self.descriptor_index, None)?;
        put_u64(&mut buf, 4, self.entity_id)?;
        put_u64(&mut buf, 12, self.entity_model_id)?;
        put_u32(&mut buf, 20, self.entity_capabilities)?;
        put_u16(&mut buf, 24, self.talker_stream_sources)?;
        put_u16(&mut buf, 26, self.talker_capabilities)?;
        put_u16(&mut buf, 28, self.listener_stream_sinks)?;
        put_u16(&mut buf, 30, self.listener_capabilities)?;
        put_u32(&mut buf, 32, self.controller_capabilities)?;
        put_u32(&mut buf, 36, self.available_index)?;
        put_u64(&mut buf, 40, self.association_id)?;
        put_string(&mut buf, 48, &self.entity_name)?;
        put_u16(&mut buf, 112, self.vendor_name_string)?;
        put_u16(&mut buf, 114, self.model_name_string)?;
        put_string(&mut buf, 116, &self.firmware_version)?;
        put_string(&mut buf, 180, &self.group_name)?;
        put_string(&mut buf, 244, &self.serial_number)?;
        put_u16(&mut buf, 308, self.configurations_count)?;
        put_u16(&mut buf, 310, self.current_configuration)?;
        Ok(buf)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigurationDescriptor {
    pub descriptor_index: u16,
    pub object_name: String,
    /// `(descriptor_type, count)` pairs in ascending type order.
    pub descriptor_counts: Vec<(u16, u16)>,
}

impl ConfigurationDescriptor {
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; CONFIGURATION_LEN + 4 * self.descriptor_counts.len()];
        put_common(
            &mut buf,
            DescriptorType::Configuration,
            self.descriptor_index,
            Some(&self.object_name),
        )?;
        put_u16(&mut buf, 70, self.descriptor_counts.len() as u16)?;
        put_u16(&mut buf, 72, CONFIGURATION_LEN as u16)?;
        for (i, (kind, count)) in self.descriptor_counts.iter().enumerate() {
            let pos = CONFIGURATION_LEN + 4 * i;
            put_u16(&mut buf, pos, *kind)?;
            put_u16(&mut buf, pos + 2, *count)?;
        }
        Ok(buf)
    }
}

/// Port and block counts of an AUDIO_UNIT, as `(number_of_x, base_x)` pairs
/// in wire order starting at offset 72.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AudioUnitPorts {
    pub stream_input: (u16, u16),
    pub stream_output: (u16, u16),
    pub external_input: (u16, u16),
    pub external_output: (u16, u16),
    pub internal_input: (u16, u16),
    pub internal_output: (u16, u16),
    pub controls: (u16, u16),
    pub signal_selectors: (u16, u16),
    pub mixers: (u16, u16),
    pub matrices: (u16, u16),
    pub splitters: (u16, u16),
    pub combiners: (u16, u16),
    pub demultiplexers: (u16, u16),
    pub multiplexers: (u16, u16),
    pub transcoders: (u16, u16),
    pub control_blocks: (u16, u16),
}

impl AudioUnitPorts {
    fn pairs(&self) -> [(u16, u16); 16] {
        [
            self.stream_input,
            self.stream_output,
            self.external_input,
            self.external_output,
            self.internal_input,
            self.internal_output,
            self.controls,
            self.signal_selectors,
            self.mixers,
            self.matrices,
            self.splitters,
            self.combiners,
            self.demultiplexers,
            self.multiplexers,
            self.transcoders,
            self.control_blocks,
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioUnitDescriptor {
    pub descriptor_index: u16,
    pub object_name: String,
    pub clock_domain_index: u16,
    pub ports: AudioUnitPorts,
    /// Supported rates; the first is reported as current.
    pub sampling_rates: Vec<u32>,
}

impl AudioUnitDescriptor {
    pub fn current_sampling_rate(&self) -> u32 {
        self.sampling_rates.first().copied().unwrap_or(0)
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; AUDIO_UNIT_LEN + 4 * self.sampling_rates.len()];
        put_common(
            &mut buf,
            DescriptorType::AudioUnit,
            self.descriptor_index,
            Some(&self.object_name),
        )?;
        put_u16(&mut buf, 70, self.clock_domain_index)?;
        for (i, (count, base)) in self.ports.pairs().into_iter().enumerate() {
            put_u16(&mut buf, 72 + 4 * i, count)?;
            put_u16(&mut buf, 74 + 4 * i, base)?;
        }
        put_u32(&mut buf, 136, self.current_sampling_rate())?;
        put_u16(&mut buf, 140, AUDIO_UNIT_LEN as u16)?;
        put_u16(&mut buf, 142, self.sampling_rates.len() as u16)?;
        for (i, rate) in self.sampling_rates.iter().enumerate() {
            put_u32(&mut buf, AUDIO_UNIT_LEN + 4 * i, *rate)?;
        }
        Ok(buf)
    }
}

/// STREAM_INPUT or STREAM_OUTPUT.
///
/// Backup talker fields are always zero and no redundant streams are
/// listed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamDescriptor {
    pub kind: DescriptorType,
    pub descriptor_index: u16,
    pub object_name: String,
    pub clock_domain_index: u16,
    pub stream_flags: u16,
    /// Supported formats; the first is reported as current.
    pub stream_formats: Vec<u64>,
    pub avb_interface_index: u16,
    pub buffer_length: u32,
    pub timing: u16,
}

impl StreamDescriptor {
    pub fn current_format(&self) -> u64 {
        self.stream_formats.first().copied().unwrap_or(0)
    }

    /// Offset just past the format list, where redundant stream indices
    /// would start. `None` when the list runs past a 16-bit offset.
    pub fn redundant_offset(&self) -> Option<u16> {
        u16::try_from(self.stream_formats.len())
            .ok()
            .and_then(|count| count.checked_mul(8))
            .and_then(|bytes| bytes.checked_add(STREAM_FORMATS_OFFSET))
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let formats_at = usize::from(STREAM_FORMATS_OFFSET);
        let len = formats_at + 8 * self.stream_formats.len();
        let redundant_offset = self
            .redundant_offset()
            .ok_or_else(|| AvdeccError::control_data_too_long(len))?;
        let mut buf = vec![0u8; len];
        put_common(&mut buf, self.kind, self.descriptor_index, Some(&self.object_name))?;
        put_u16(&mut buf, 70, self.clock_domain_index)?;
        put_u16(&mut buf, 72, self.stream_flags)?;
        put_u64(&mut buf, 74, self.current_format())?;
        put_u16(&mut buf, 82, STREAM_FORMATS_OFFSET)?;
        put_u16(&mut buf, 84, self.stream_formats.len() as u16)?;
        // 86..126: backup and backed-up talker ids, all zero.
        put_u16(&mut buf, 126, self.avb_interface_index)?;
        put_u32(&mut buf, 128, self.buffer_length)?;
        put_u16(&mut buf, STREAM_LEN, redundant_offset)?;
        put_u16(&mut buf, STREAM_LEN + 2, 0)?;
        put_u16(&mut buf, STREAM_LEN + 4, self.timing)?;
        for (i, format) in self.stream_formats.iter().enumerate() {
            put_u64(&mut buf, formats_at + 8 * i, *format)?;
        }
        Ok(buf)
    }
}

/// JACK_INPUT or JACK_OUTPUT.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JackDescriptor {
    pub kind: DescriptorType,
    pub descriptor_index: u16,
    pub object_name: String,
    pub jack_flags: u16,
    pub jack_type: u16,
    pub number_of_controls: u16,
    pub base_control: u16,
}

impl JackDescriptor {
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; JACK_LEN];
        put_common(&mut buf, self.kind, self.descriptor_index, Some(&self.object_name))?;
        put_u16(&mut buf, 70, self.jack_flags)?;
        put_u16(&mut buf, 72, self.jack_type)?;
        put_u16(&mut buf, 74, self.number_of_controls)?;
        put_u16(&mut buf, 76, self.base_control)?;
        Ok(buf)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvbInterfaceDescriptor {
    pub descriptor_index: u16,
    pub object_name: String,
    pub mac_address: MacAddr,
    pub interface_flags: u16,
    pub clock_identity: u64,
    pub priority1: u8,
    pub clock_class: u8,
    pub offset_scaled_log_variance: u16,
    pub clock_accuracy: u8,
    pub priority2: u8,
    pub domain_number: u8,
    pub log_sync_interval: u8,
    pub log_announce_interval: u8,
    pub log_pdelay_interval: u8,
    pub port_number: u16,
    pub number_of_controls: u16,
    pub base_control: u16,
}

impl AvbInterfaceDescriptor {
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; AVB_INTERFACE_LEN];
        put_common(
            &mut buf,
            DescriptorType::AvbInterface,
            self.descriptor_index,
            Some(&self.object_name),
        )?;
        put_mac(&mut buf, 70, self.mac_address)?;
        put_u16(&mut buf, 76, self.interface_flags)?;
        put_u64(&mut buf, 78, self.clock_identity)?;
        put_u8(&mut buf, 86, self.priority1)?;
        put_u8(&mut buf, 87, self.clock_class)?;
        put_u16(&mut buf, 88, self.offset_scaled_log_variance)?;
        put_u8(&mut buf, 90, self.clock_accuracy)?;
        put_u8(&mut buf, 91, self.priority2)?;
        put_u8(&mut buf, 92, self.domain_number)?;
        put_u8(&mut buf, 93, self.log_sync_interval)?;
        put_u8(&mut buf, 94, self.log_announce_interval)?;
        put_u8(&mut buf, 95, self.log_pdelay_interval)?;
        put_u16(&mut buf, 96, self.port_number)?;
        put_u16(&mut buf, 98, self.number_of_controls)?;
        put_u16(&mut buf, 100, self.base_control)?;
        Ok(buf)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClockSourceDescriptor {
    pub descriptor_index: u16,
    pub object_name: String,
    pub clock_source_flags: u16,
    pub clock_source_type: u16,
    pub clock_source_identifier: u64,
    pub clock_source_location_type: u16,
    pub clock_source_location_index: u16,
}

impl ClockSourceDescriptor {
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; CLOCK_SOURCE_LEN];
        put_common(
            &mut buf,
            DescriptorType::ClockSource,
            self.descriptor_index,
            Some(&self.object_name),
        )?;
        put_u16(&mut buf, 70, self.clock_source_flags)?;
        put_u16(&mut buf, 72, self.clock_source_type)?;
        put_u64(&mut buf, 74, self.clock_source_identifier)?;
        put_u16(&mut buf, 82, self.clock_source_location_type)?;
        put_u16(&mut buf, 84, self.clock_source_location_index)?;
        Ok(buf)
    }
}

/// STREAM_PORT_INPUT or STREAM_PORT_OUTPUT. Has no name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamPortDescriptor {
    pub kind: DescriptorType,
    pub descriptor_index: u16,
    pub clock_domain_index: u16,
    pub port_flags: u16,
    pub number_of_controls: u16,
    pub base_control: u16,
    pub number_of_clusters: u16,
    pub base_cluster: u16,
    pub number_of_maps: u16,
    pub base_map: u16,
}

impl StreamPortDescriptor {
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; STREAM_PORT_LEN];
        put_common(&mut buf, self.kind, self.descriptor_index, None)?;
        put_u16(&mut buf, 4, self.clock_domain_index)?;
        put_u16(&mut buf, 6, self.port_flags)?;
        put_u16(&mut buf, 8, self.number_of_controls)?;
        put_u16(&mut buf, 10, self.base_control)?;
        put_u16(&mut buf, 12, self.number_of_clusters)?;
        put_u16(&mut buf, 14, self.base_cluster)?;
        put_u16(&mut buf, 16, self.number_of_maps)?;
        put_u16(&mut buf, 18, self.base_map)?;
        Ok(buf)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioClusterDescriptor {
    pub descriptor_index: u16,
    pub object_name: String,
    /// Descriptor type of the signal source; INVALID on stream port inputs.
    pub signal_type: u16,
    pub signal_index: u16,
    pub signal_output: u16,
    pub path_latency: u32,
    pub block_latency: u32,
    pub channel_count: u16,
    pub format: u8,
    pub aes3_data_type_ref: u8,
    pub aes3_data_type: u16,
}

impl AudioClusterDescriptor {
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; AUDIO_CLUSTER_LEN];
        put_common(
            &mut buf,
            DescriptorType::AudioCluster,
            self.descriptor_index,
            Some(&self.object_name),
        )?;
        put_u16(&mut buf, 70, self.signal_type)?;
        put_u16(&mut buf, 72, self.signal_index)?;
        put_u16(&mut buf, 74, self.signal_output)?;
        put_u32(&mut buf, 76, self.path_latency)?;
        put_u32(&mut buf, 80, self.block_latency)?;
        put_u16(&mut buf, 84, self.channel_count)?;
        put_u8(&mut buf, 86, self.format)?;
        put_u8(&mut buf, 87, self.aes3_data_type_ref)?;
        put_u16(&mut buf, 88, self.aes3_data_type)?;
        Ok(buf)
    }
}

/// One AUDIO_MAP entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioMapping {
    pub stream_index: u16,
    pub stream_channel: u16,
    pub cluster_offset: u16,
    pub cluster_channel: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioMapDescriptor {
    pub descriptor_index: u16,
    pub mappings: Vec<AudioMapping>,
}

impl AudioMapDescriptor {
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; AUDIO_MAP_LEN + 8 * self.mappings.len()];
        put_common(&mut buf, DescriptorType::AudioMap, self.descriptor_index, None)?;
        put_u16(&mut buf, 4, AUDIO_MAP_LEN as u16)?;
        put_u16(&mut buf, 6, self.mappings.len() as u16)?;
        for (i, mapping) in self.mappings.iter().enumerate() {
            let pos = AUDIO_MAP_LEN + 8 * i;
            put_u16(&mut buf, pos, mapping.stream_index)?;
            put_u16(&mut buf, pos + 2, mapping.stream_channel)?;
            put_u16(&mut buf, pos + 4, mapping.cluster_offset)?;
            put_u16(&mut buf, pos + 6, mapping.cluster_channel)?;
        }
        Ok(buf)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClockDomainDescriptor {
    pub descriptor_index: u16,
    pub object_name: String,
    pub clock_source_index: u16,
    pub clock_sources: Vec<u16>,
}

impl ClockDomainDescriptor {
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; CLOCK_DOMAIN_LEN + 2 * self.clock_sources.len()];
        put_common(
            &mut buf,
            DescriptorType::ClockDomain,
            self.descriptor_index,
            Some(&self.object_name),
        )?;
        put_u16(&mut buf, 70, self.clock_source_index)?;
        put_u16(&mut buf, 72, CLOCK_DOMAIN_LEN as u16)?;
        put_u16(&mut buf, 74, self.clock_sources.len() as u16)?;
        for (i, source) in self.clock_sources.iter().enumerate() {
            put_u16(&mut buf, CLOCK_DOMAIN_LEN + 2 * i, *source)?;
        }
        Ok(buf)
    }
}

/// Any descriptor the factory can build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Descriptor {
    Entity(EntityDescriptor),
    Configuration(ConfigurationDescriptor),
    AudioUnit(AudioUnitDescriptor),
    Stream(StreamDescriptor),
    Jack(JackDescriptor),
    AvbInterface(AvbInterfaceDescriptor),
    ClockSource(ClockSourceDescriptor),
    StreamPort(StreamPortDescriptor),
    AudioCluster(AudioClusterDescriptor),
    AudioMap(AudioMapDescriptor),
    ClockDomain(ClockDomainDescriptor),
}

impl Descriptor {
    pub fn descriptor_type(&self) -> DescriptorType {
        match self {
            Descriptor::Entity(_) => DescriptorType::Entity,
            Descriptor::Configuration(_) => DescriptorType::Configuration,
            Descriptor::AudioUnit(_) => DescriptorType::AudioUnit,
            Descriptor::Stream(d) => d.kind,
            Descriptor::Jack(d) => d.kind,
            Descriptor::AvbInterface(_) => DescriptorType::AvbInterface,
            Descriptor::ClockSource(_) => DescriptorType::ClockSource,
            Descriptor::StreamPort(d) => d.kind,
            Descriptor::AudioCluster(_) => DescriptorType::AudioCluster,
            Descriptor::AudioMap(_) => DescriptorType::AudioMap,
            Descriptor::ClockDomain(_) => DescriptorType::ClockDomain,
        }
    }

    pub fn descriptor_index(&self) -> u16 {
        match self {
            Descriptor::Entity(d) => d.descriptor_index,
            Descriptor::Configuration(d) => d.descriptor_index,
            Descriptor::AudioUnit(d) => d.descriptor_index,
            Descriptor::Stream(d) => d.descriptor_index,
            Descriptor::Jack(d) => d.descriptor_index,
            Descriptor::AvbInterface(d) => d.descriptor_index,
            Descriptor::ClockSource(d) => d.descriptor_index,
            Descriptor::StreamPort(d) => d.descriptor_index,
            Descriptor::AudioCluster(d) => d.descriptor_index,
            Descriptor::AudioMap(d) => d.descriptor_index,
            Descriptor::ClockDomain(d) => d.descriptor_index,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        match self {
            Descriptor::Entity(d) => d.encode(),
            Descriptor::Configuration(d) => d.encode(),
            Descriptor::AudioUnit(d) => d.encode(),
            Descriptor::Stream(d) => d.encode(),
            Descriptor::Jack(d) => d.encode(),
            Descriptor::AvbInterface(d) => d.encode(),
            Descriptor::ClockSource(d) => d.encode(),
            Descriptor::StreamPort(d) => d.encode(),
            Descriptor::AudioCluster(d) => d.encode(),
            Descriptor::AudioMap(d) => d.encode(),
            Descriptor::ClockDomain(d) => d.encode(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u16_at(buf: &[u8], pos: usize) -> u16 {
        u16::from_be_bytes([buf[pos], buf[pos + 1]])
    }

    fn u64_at(buf: &[u8], pos: usize) -> u64 {
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&buf[pos..pos + 8]);
        u64::from_be_bytes(bytes)
    }

    fn stream(formats: Vec<u64>) -> StreamDescriptor {
        StreamDescriptor {
            kind: DescriptorType::StreamInput,
            descriptor_index: 1,
            object_name: "Input 2".to_string(),
            clock_domain_index: 0,
            stream_flags: STREAM_FLAG_CLASS_A,
            stream_formats: formats,
            avb_interface_index: 0,
            buffer_length: 666,
            timing: 0,
        }
    }

    #[test]
    fn string_is_null_padded_and_truncated() {
        let mut buf = [0xAAu8; 70];
        put_string(&mut buf, 0, "abc").unwrap();
        assert_eq!(&buf[..3], b"abc");
        assert!(buf[3..64].iter().all(|b| *b == 0));
        assert_eq!(buf[64], 0xAA);

        let long = "x".repeat(80);
        put_string(&mut buf, 0, &long).unwrap();
        assert!(buf[..64].iter().all(|b| *b == b'x'));
        assert_eq!(buf[64], 0xAA);
    }

    #[test]
    fn stream_trailer_layout() {
        let d = stream(vec![DEFAULT_STREAM_FORMAT, 0x1111]);
        let buf = d.encode().unwrap();
        assert_eq!(buf.len(), 138 + 16);
        assert_eq!(u16_at(&buf, 0), 0x0005);
        assert_eq!(u16_at(&buf, 2), 1);
        assert_eq!(u64_at(&buf, 74), DEFAULT_STREAM_FORMAT);
        assert_eq!(u16_at(&buf, 82), 138);
        assert_eq!(u16_at(&buf, 84), 2);
        assert_eq!(u16_at(&buf, 132), 138 + 16);
        assert_eq!(u16_at(&buf, 134), 0);
        assert_eq!(u64_at(&buf, 146), 0x1111);
    }

    #[test]
    fn format_list_past_a_16_bit_offset_is_an_error() {
        let largest = stream(vec![DEFAULT_STREAM_FORMAT; 8174]);
        assert_eq!(largest.redundant_offset(), Some(138 + 8 * 8174));

        let too_many = stream(vec![DEFAULT_STREAM_FORMAT; 8175]);
        assert_eq!(too_many.redundant_offset(), None);
        assert!(too_many.encode().is_err());
    }

    #[test]
    fn configuration_counts_follow_header() {
        let d = ConfigurationDescriptor {
            descriptor_index: 0,
            object_name: String::new(),
            descriptor_counts: vec![(0x0002, 1), (0x0024, 3)],
        };
        let buf = d.encode().unwrap();
        assert_eq!(buf.len(), 82);
        assert_eq!(u16_at(&buf, 70), 2);
        assert_eq!(u16_at(&buf, 72), 74);
        assert_eq!(u16_at(&buf, 78), 0x0024);
        assert_eq!(u16_at(&buf, 80), 3);
    }

    #[test]
    fn audio_unit_reports_first_rate() {
        let d = AudioUnitDescriptor {
            descriptor_index: 0,
            object_name: "unit".to_string(),
            clock_domain_index: 0,
            ports: AudioUnitPorts {
                stream_input: (2, 0),
                external_output: (16, 0),
                control_blocks: (1, 9),
                ..AudioUnitPorts::default()
            },
            sampling_rates: vec![48000, 96000],
        };
        let buf = d.encode().unwrap();
        assert_eq!(buf.len(), 152);
        assert_eq!(u16_at(&buf, 72), 2);
        assert_eq!(u16_at(&buf, 84), 16);
        assert_eq!(u16_at(&buf, 132), 1);
        assert_eq!(u16_at(&buf, 134), 9);
        assert_eq!(&buf[136..140], &48000u32.to_be_bytes());
        assert_eq!(u16_at(&buf, 140), 144);
        assert_eq!(&buf[148..152], &96000u32.to_be_bytes());
    }

    #[test]
    fn fixed_lengths() {
        let cluster = AudioClusterDescriptor {
            descriptor_index: 0,
            object_name: String::new(),
            signal_type: 0xFFFF,
            signal_index: 0,
            signal_output: 0,
            path_latency: 0,
            block_latency: 0,
            channel_count: 8,
            format: AUDIO_CLUSTER_FORMAT_MBLA,
            aes3_data_type_ref: 0,
            aes3_data_type: 0,
        };
        let buf = cluster.encode().unwrap();
        assert_eq!(buf.len(), AUDIO_CLUSTER_LEN);
        assert_eq!(buf[86], 0x40);

        let map = AudioMapDescriptor {
            descriptor_index: 0,
            mappings: vec![AudioMapping {
                stream_index: 0,
                stream_channel: 3,
                cluster_offset: 0,
                cluster_channel: 3,
            }],
        };
        let buf = map.encode().unwrap();
        assert_eq!(buf.len(), 16);
        assert_eq!(u16_at(&buf, 4), 8);
        assert_eq!(u16_at(&buf, 10), 3);
    }
}

use super::config::{EntityConfig, JackOverrides, StreamOverrides, StreamPortOverrides, flags_or};
use super::descriptors::*;
use super::{DESCRIPTOR_TYPE_INVALID, DescriptorType};
use crate::codec::MacAddr;
use crate::entity::EntityInfo;
use crate::error::{AvdeccError, Result};

/// Builds one descriptor kind from the entity record and its overrides.
type Builder = fn(u16, &EntityInfo, &EntityConfig) -> Descriptor;

const BUILDERS: [(DescriptorType, Builder); 14] = [
    (DescriptorType::Entity, entity),
    (DescriptorType::Configuration, configuration),
    (DescriptorType::AudioUnit, audio_unit),
    (DescriptorType::StreamInput, stream_input),
    (DescriptorType::StreamOutput, stream_output),
    (DescriptorType::JackInput, jack_input),
    (DescriptorType::JackOutput, jack_output),
    (DescriptorType::AvbInterface, avb_interface),
    (DescriptorType::ClockSource, clock_source),
    (DescriptorType::StreamPortInput, stream_port_input),
    (DescriptorType::StreamPortOutput, stream_port_output),
    (DescriptorType::AudioCluster, audio_cluster),
    (DescriptorType::AudioMap, audio_map),
    (DescriptorType::ClockDomain, clock_domain),
];

/// Build the descriptor `(descriptor_type, descriptor_index)` for an entity.
///
/// The index always comes from the request. Types without a builder fail
/// with [`AvdeccError::UnknownDescriptor`].
pub fn build(
    descriptor_type: u16,
    descriptor_index: u16,
    info: &EntityInfo,
    config: &EntityConfig,
) -> Result<Descriptor> {
    let kind = DescriptorType::from_u16(descriptor_type)
        .ok_or(AvdeccError::UnknownDescriptor(descriptor_type))?;
    let (_, builder) = BUILDERS
        .iter()
        .find(|(registered, _)| *registered == kind)
        .ok_or(AvdeccError::UnknownDescriptor(descriptor_type))?;
    Ok(builder(descriptor_index, info, config))
}

fn name_or(name: &Option<String>, default: &str) -> String {
    name.clone().unwrap_or_else(|| default.to_string())
}

fn entity(index: u16, info: &EntityInfo, config: &EntityConfig) -> Descriptor {
    let o = &config.entity;
    Descriptor::Entity(EntityDescriptor {
        descriptor_index: index,
        entity_id: info.entity_id,
        entity_model_id: o.entity_model_id.unwrap_or(info.entity_model_id),
        entity_capabilities: info.entity_capabilities,
        talker_stream_sources: info.talker_stream_sources,
        talker_capabilities: info.talker_capabilities,
        listener_stream_sinks: info.listener_stream_sinks,
        listener_capabilities: info.listener_capabilities,
        controller_capabilities: info.controller_capabilities,
        available_index: info.available_index,
        association_id: o.association_id.unwrap_or(info.association_id),
        entity_name: name_or(&o.entity_name, ""),
        vendor_name_string: o.vendor_name_string.unwrap_or(0),
        model_name_string: o.model_name_string.unwrap_or(0),
        firmware_version: name_or(&o.firmware_version, ""),
        group_name: name_or(&o.group_name, ""),
        serial_number: name_or(&o.serial_number, ""),
        configurations_count: o.configurations_count.unwrap_or(1),
        current_configuration: o.current_configuration.unwrap_or(info.current_configuration_index),
    })
}

fn configuration(index: u16, _: &EntityInfo, config: &EntityConfig) -> Descriptor {
    let o = &config.configuration;
    Descriptor::Configuration(ConfigurationDescriptor {
        descriptor_index: index,
        object_name: name_or(&o.object_name, ""),
        descriptor_counts: o
            .descriptor_counts
            .iter()
            .map(|(kind, count)| (*kind as u16, *count))
            .collect(),
    })
}

fn audio_unit(index: u16, _: &EntityInfo, config: &EntityConfig) -> Descriptor {
    let o = &config.audio_unit;
    let pair = |count: Option<u16>, base: Option<u16>| (count.unwrap_or(0), base.unwrap_or(0));
    Descriptor::AudioUnit(AudioUnitDescriptor {
        descriptor_index: index,
        object_name: name_or(&o.object_name, ""),
        clock_domain_index: o.clock_domain_index.unwrap_or(0),
        ports: AudioUnitPorts {
            stream_input: pair(o.number_of_stream_input_ports, o.base_stream_input_port),
            stream_output: pair(o.number_of_stream_output_ports, o.base_stream_output_port),
            external_input: pair(o.number_of_external_input_ports, o.base_external_input_port),
            external_output: pair(o.number_of_external_output_ports, o.base_external_output_port),
            internal_input: pair(o.number_of_internal_input_ports, o.base_internal_input_port),
            internal_output: pair(o.number_of_internal_output_ports, o.base_internal_output_port),
            controls: pair(o.number_of_controls, o.base_control),
            signal_selectors: pair(o.number_of_signal_selectors, o.base_signal_selector),
            mixers: pair(o.number_of_mixers, o.base_mixer),
            matrices: pair(o.number_of_matrices, o.base_matrix),
            splitters: pair(o.number_of_splitters, o.base_splitter),
            combiners: pair(o.number_of_combiners, o.base_combiner),
            demultiplexers: pair(o.number_of_demultiplexers, o.base_demultiplexer),
            multiplexers: pair(o.number_of_multiplexers, o.base_multiplexer),
            transcoders: pair(o.number_of_transcoders, o.base_transcoder),
            control_blocks: pair(o.number_of_control_blocks, o.base_control_block),
        },
        sampling_rates: o.sampling_rates.clone().unwrap_or_else(|| vec![48_000]),
    })
}

fn stream(kind: DescriptorType, base_name: &str, index: u16, o: &StreamOverrides) -> Descriptor {
    let base_name = o.object_name.as_deref().unwrap_or(base_name);
    Descriptor::Stream(StreamDescriptor {
        kind,
        descriptor_index: index,
        object_name: format!("{base_name} {}", u32::from(index) + 1),
        clock_domain_index: o.clock_domain_index.unwrap_or(0),
        stream_flags: flags_or(&o.stream_flags, 0),
        stream_formats: o
            .stream_formats
            .clone()
            .unwrap_or_else(|| vec![DEFAULT_STREAM_FORMAT]),
        avb_interface_index: o.avb_interface_index.unwrap_or(0),
        buffer_length: o.buffer_length.unwrap_or(0),
        timing: o.timing.unwrap_or(0),
    })
}

fn stream_input(index: u16, _: &EntityInfo, config: &EntityConfig) -> Descriptor {
    stream(DescriptorType::StreamInput, "Stream Input", index, &config.stream_input)
}

fn stream_output(index: u16, _: &EntityInfo, config: &EntityConfig) -> Descriptor {
    stream(DescriptorType::StreamOutput, "Stream Output", index, &config.stream_output)
}

fn jack(kind: DescriptorType, base_name: &str, index: u16, o: &JackOverrides) -> Descriptor {
    let base_name = o.object_name.as_deref().unwrap_or(base_name);
    Descriptor::Jack(JackDescriptor {
        kind,
        descriptor_index: index,
        object_name: format!("{base_name} {}", u32::from(index) + 1),
        jack_flags: flags_or(&o.jack_flags, 0),
        jack_type: o.jack_type.unwrap_or(JACK_TYPE_BALANCED_ANALOG),
        number_of_controls: o.number_of_controls.unwrap_or(0),
        base_control: o.base_control.unwrap_or(0),
    })
}

fn jack_input(index: u16, _: &EntityInfo, config: &EntityConfig) -> Descriptor {
    jack(DescriptorType::JackInput, "Jack Input", index, &config.jack_input)
}

fn jack_output(index: u16, _: &EntityInfo, config: &EntityConfig) -> Descriptor {
    jack(DescriptorType::JackOutput, "Jack Output", index, &config.jack_output)
}

fn avb_interface(index: u16, info: &EntityInfo, config: &EntityConfig) -> Descriptor {
    let o = &config.avb_interface;
    Descriptor::AvbInterface(AvbInterfaceDescriptor {
        descriptor_index: index,
        object_name: name_or(&o.object_name, ""),
        mac_address: o.mac_address.map_or(info.mac_address, MacAddr::from_u64),
        interface_flags: flags_or(&o.interface_flags, 0),
        clock_identity: o.clock_identity.unwrap_or(info.entity_id),
        priority1: o.priority1.unwrap_or(0),
        clock_class: o.clock_class.unwrap_or(0),
        offset_scaled_log_variance: o.offset_scaled_log_variance.unwrap_or(0),
        clock_accuracy: o.clock_accuracy.unwrap_or(0),
        priority2: o.priority2.unwrap_or(0),
        domain_number: o.domain_number.unwrap_or(info.gptp_domain_number),
        log_sync_interval: o.log_sync_interval.unwrap_or(0),
        log_announce_interval: o.log_announce_interval.unwrap_or(0),
        log_pdelay_interval: o.log_pdelay_interval.unwrap_or(0),
        port_number: o.port_number.unwrap_or(0),
        number_of_controls: o.number_of_controls.unwrap_or(0),
        base_control: o.base_control.unwrap_or(0),
    })
}

fn clock_source(index: u16, _: &EntityInfo, config: &EntityConfig) -> Descriptor {
    let o = &config.clock_source;
    Descriptor::ClockSource(ClockSourceDescriptor {
        descriptor_index: index,
        object_name: name_or(&o.object_name, ""),
        clock_source_flags: flags_or(&o.clock_source_flags, CLOCK_SOURCE_FLAG_LOCAL_ID),
        clock_source_type: o.clock_source_type.unwrap_or(CLOCK_SOURCE_TYPE_INTERNAL),
        clock_source_identifier: o.clock_source_identifier.unwrap_or(u64::MAX),
        clock_source_location_type: o
            .clock_source_location_type
            .unwrap_or(DescriptorType::ClockDomain as u16),
        clock_source_location_index: o.clock_source_location_index.unwrap_or(0),
    })
}

fn stream_port(kind: DescriptorType, index: u16, o: &StreamPortOverrides) -> Descriptor {
    Descriptor::StreamPort(StreamPortDescriptor {
        kind,
        descriptor_index: index,
        clock_domain_index: o.clock_domain_index.unwrap_or(0),
        port_flags: flags_or(&o.port_flags, 0),
        number_of_controls: o.number_of_controls.unwrap_or(0),
        base_control: o.base_control.unwrap_or(0),
        number_of_clusters: o.number_of_clusters.unwrap_or(0),
        base_cluster: o.base_cluster.unwrap_or(index),
        number_of_maps: o.number_of_maps.unwrap_or(0),
        base_map: o.base_map.unwrap_or(index),
    })
}

fn stream_port_input(index: u16, _: &EntityInfo, config: &EntityConfig) -> Descriptor {
    stream_port(DescriptorType::StreamPortInput, index, &config.stream_port_input)
}

fn stream_port_output(index: u16, _: &EntityInfo, config: &EntityConfig) -> Descriptor {
    stream_port(DescriptorType::StreamPortOutput, index, &config.stream_port_output)
}

fn audio_cluster(index: u16, _: &EntityInfo, config: &EntityConfig) -> Descriptor {
    let o = &config.audio_cluster;
    let first = u32::from(index) * 8;
    Descriptor::AudioCluster(AudioClusterDescriptor {
        descriptor_index: index,
        object_name: o
            .object_name
            .clone()
            .unwrap_or_else(|| format!("Channels {}-{}", first + 1, first + 8)),
        signal_type: o.signal_type.unwrap_or(DESCRIPTOR_TYPE_INVALID),
        signal_index: o.signal_index.unwrap_or(0),
        signal_output: o.signal_output.unwrap_or(0),
        path_latency: o.path_latency.unwrap_or(0),
        block_latency: o.block_latency.unwrap_or(0),
        channel_count: o.channel_count.unwrap_or(1),
        format: o.format.unwrap_or(AUDIO_CLUSTER_FORMAT_MBLA),
        aes3_data_type_ref: o.aes3_data_type_ref.unwrap_or(0),
        aes3_data_type: o.aes3_data_type.unwrap_or(0),
    })
}

fn audio_map(index: u16, _: &EntityInfo, config: &EntityConfig) -> Descriptor {
    let count = config.audio_map.number_of_mappings.unwrap_or(8);
    Descriptor::AudioMap(AudioMapDescriptor {
        descriptor_index: index,
        mappings: (0..count)
            .map(|channel| AudioMapping {
                stream_index: index,
                stream_channel: channel,
                cluster_offset: 0,
                cluster_channel: channel,
            })
            .collect(),
    })
}

fn clock_domain(index: u16, _: &EntityInfo, config: &EntityConfig) -> Descriptor {
    let o = &config.clock_domain;
    Descriptor::ClockDomain(ClockDomainDescriptor {
        descriptor_index: index,
        object_name: name_or(&o.object_name, ""),
        clock_source_index: o.clock_source_index.unwrap_or(0),
        clock_sources: o.clock_sources.clone().unwrap_or_else(|| vec![0]),
    })
}

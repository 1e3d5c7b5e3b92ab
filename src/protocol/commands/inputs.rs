//! Input properties.

use super::WireCommand;
use crate::core::Result;
use crate::protocol::fields::{Field, FieldValues, Layout, Wire, Width};

/// `InPr`: names, port types and where an input may be routed.
///
/// `source_availability` bits: 0 auxiliary, 1 multiviewer, 2 super-source
/// art, 3 super-source box, 4 key source. `mix_effect_availability` has one
/// bit per mix-effect block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputProperties {
    pub id: u16,
    pub long_name: String,
    pub short_name: String,
    pub are_names_default: bool,
    pub available_external_ports: u16,
    pub external_port_type: u16,
    pub internal_port_type: u8,
    pub source_availability: u8,
    pub mix_effect_availability: u8,
}

static INPUT_PROPERTIES: Layout = Layout {
    len: 36,
    fields: &[
        Field::new("id", 0, Wire::U16),
        Field::new("long_name", 2, Wire::Ascii(20)),
        Field::new("short_name", 22, Wire::Ascii(4)),
        Field::new("are_names_default", 26, Wire::Bool),
        Field::new("available_external_ports", 28, Wire::Flags(Width::U16)),
        Field::new("external_port_type", 30, Wire::U16),
        Field::new("internal_port_type", 32, Wire::U8),
        Field::new("source_availability", 34, Wire::Flags(Width::U8)),
        Field::new("mix_effect_availability", 35, Wire::Flags(Width::U8)),
    ],
};

impl WireCommand for InputProperties {
    const NAME: [u8; 4] = *b"InPr";
    single_layout!(INPUT_PROPERTIES);

    fn from_fields(f: &FieldValues) -> Result<Self> {
        Ok(InputProperties {
            id: f.u16("id")?,
            long_name: f.string("long_name")?,
            short_name: f.string("short_name")?,
            are_names_default: f.bool("are_names_default")?,
            available_external_ports: f.u16("available_external_ports")?,
            external_port_type: f.u16("external_port_type")?,
            internal_port_type: f.u8("internal_port_type")?,
            source_availability: f.u8("source_availability")?,
            mix_effect_availability: f.u8("mix_effect_availability")?,
        })
    }

    fn to_fields(&self) -> FieldValues {
        FieldValues::new()
            .int("id", self.id)
            .text("long_name", self.long_name.clone())
            .text("short_name", self.short_name.clone())
            .boolean("are_names_default", self.are_names_default)
            .int("available_external_ports", self.available_external_ports)
            .int("external_port_type", self.external_port_type)
            .int("internal_port_type", self.internal_port_type)
            .int("source_availability", self.source_availability)
            .int("mix_effect_availability", self.mix_effect_availability)
    }
}

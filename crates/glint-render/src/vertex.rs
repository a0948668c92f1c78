//! Vertex layout shared between the CPU mesh data and the vertex shader.

use ash::vk;
use bytemuck::{Pod, Zeroable};
use glam::Vec3;

/// A colored vertex, tightly packed for direct upload.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct Vertex {
    pub position: Vec3,
    pub color: Vec3,
}

impl Vertex {
    /// Packed size in bytes.
    pub const SIZE: u32 = std::mem::size_of::<Self>() as u32;

    pub const fn new(position: Vec3, color: Vec3) -> Self {
        Self { position, color }
    }

    /// Per-vertex binding at slot 0.
    pub fn binding_description() -> vk::VertexInputBindingDescription {
        vk::VertexInputBindingDescription::default()
            .binding(0)
            .stride(Self::SIZE)
            .input_rate(vk::VertexInputRate::VERTEX)
    }

    /// Attribute locations: 0 = position, 1 = color, both vec3.
    pub fn attribute_descriptions() -> [vk::VertexInputAttributeDescription; 2] {
        [
            vk::VertexInputAttributeDescription::default()
                .binding(0)
                .location(0)
                .format(vk::Format::R32G32B32_SFLOAT)
                .offset(0),
            vk::VertexInputAttributeDescription::default()
                .binding(0)
                .location(1)
                .format(vk::Format::R32G32B32_SFLOAT)
                .offset(std::mem::size_of::<Vec3>() as u32),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stride_is_two_packed_vec3s() {
        assert_eq!(Vertex::SIZE, 24);
        assert_eq!(Vertex::binding_description().stride, 24);
    }

    #[test]
    fn color_attribute_follows_position() {
        let attrs = Vertex::attribute_descriptions();
        assert_eq!(attrs[0].offset, 0);
        assert_eq!(attrs[1].offset, 12);
        assert_eq!(attrs[0].location, 0);
        assert_eq!(attrs[1].location, 1);
    }

    #[test]
    fn vertex_bytes_round_trip_through_pod_cast() {
        let vertex = Vertex::new(Vec3::new(1.0, 2.0, 3.0), Vec3::ONE);
        let bytes: &[u8] = bytemuck::bytes_of(&vertex);
        assert_eq!(bytes.len(), Vertex::SIZE as usize);

        let back: &Vertex = bytemuck::from_bytes(bytes);
        assert_eq!(back.position, vertex.position);
    }
}

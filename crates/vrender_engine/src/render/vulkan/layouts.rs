//! Descriptor-set-layout catalog
//!
//! A closed set of named binding shapes, each created exactly once at
//! startup. Pipelines and resources look layouts up by enum; asking for a
//! shape is infallible because the catalog is complete by construction.

use std::collections::HashMap;

use ash::vk;

use crate::render::vulkan::{device_call, VulkanContext, VulkanResult};

/// Names of the binding shapes used across the renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SetLayout {
    /// View/projection uniform, vertex stage
    Camera,
    /// Four combined image samplers (ambient, diffuse, specular, opacity), fragment stage
    MaterialSampler,
    /// Material scalar/color uniform, fragment stage
    MaterialUniform,
    /// Light array uniform, fragment stage
    Light,
    /// Per-instance dynamic color uniform, fragment stage
    DynamicColor,
    /// Cubemap sampler, fragment stage
    CubemapSampler,
    /// Two input attachments (color + depth of subpass 0), fragment stage
    PostProcessInput,
}

impl SetLayout {
    const ALL: [Self; 7] = [
        Self::Camera,
        Self::MaterialSampler,
        Self::MaterialUniform,
        Self::Light,
        Self::DynamicColor,
        Self::CubemapSampler,
        Self::PostProcessInput,
    ];

    /// Set index this layout occupies in the geometry pipeline layout.
    ///
    /// Must match the `set = N` qualifiers in the first-pass shaders.
    pub fn geometry_set_index(self) -> u32 {
        match self {
            Self::Camera => 0,
            Self::MaterialSampler => 1,
            Self::Light => 2,
            Self::DynamicColor => 3,
            Self::MaterialUniform => 4,
            Self::CubemapSampler | Self::PostProcessInput => {
                unreachable!("layout not part of the geometry pipeline")
            }
        }
    }

    fn bindings(self) -> Vec<vk::DescriptorSetLayoutBinding> {
        let binding = |index: u32,
                       ty: vk::DescriptorType,
                       count: u32,
                       stages: vk::ShaderStageFlags| {
            vk::DescriptorSetLayoutBinding::builder()
                .binding(index)
                .descriptor_type(ty)
                .descriptor_count(count)
                .stage_flags(stages)
                .build()
        };

        match self {
            Self::Camera => vec![binding(
                0,
                vk::DescriptorType::UNIFORM_BUFFER,
                1,
                vk::ShaderStageFlags::VERTEX,
            )],
            Self::MaterialSampler => (0..4)
                .map(|i| {
                    binding(
                        i,
                        vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                        1,
                        vk::ShaderStageFlags::FRAGMENT,
                    )
                })
                .collect(),
            Self::MaterialUniform | Self::Light => vec![binding(
                0,
                vk::DescriptorType::UNIFORM_BUFFER,
                1,
                vk::ShaderStageFlags::FRAGMENT,
            )],
            Self::DynamicColor => vec![binding(
                0,
                vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
                1,
                vk::ShaderStageFlags::FRAGMENT,
            )],
            Self::CubemapSampler => vec![binding(
                0,
                vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                1,
                vk::ShaderStageFlags::FRAGMENT,
            )],
            Self::PostProcessInput => (0..2)
                .map(|i| {
                    binding(
                        i,
                        vk::DescriptorType::INPUT_ATTACHMENT,
                        1,
                        vk::ShaderStageFlags::FRAGMENT,
                    )
                })
                .collect(),
        }
    }
}

/// Catalog owning one descriptor-set-layout object per named shape.
///
/// Created once by the frame orchestrator and injected into whichever
/// pipeline or resource constructors need it. `cleanup` must run exactly
/// once before device destruction.
pub struct SetLayoutCatalog {
    device: ash::Device,
    layouts: HashMap<SetLayout, vk::DescriptorSetLayout>,
}

impl SetLayoutCatalog {
    /// Create every registered layout
    pub fn new(ctx: &VulkanContext) -> VulkanResult<Self> {
        let mut layouts = HashMap::new();

        for name in SetLayout::ALL {
            let bindings = name.bindings();
            let info = vk::DescriptorSetLayoutCreateInfo::builder().bindings(&bindings);
            let layout = unsafe {
                match ctx.device.create_descriptor_set_layout(&info, None) {
                    Ok(layout) => layout,
                    Err(result) => {
                        // Roll back what was created before propagating
                        for (_, created) in layouts.drain() {
                            ctx.device.destroy_descriptor_set_layout(created, None);
                        }
                        return Err(device_call("vkCreateDescriptorSetLayout")(result));
                    }
                }
            };
            layouts.insert(name, layout);
        }

        Ok(Self {
            device: ctx.device.clone(),
            layouts,
        })
    }

    /// Look up a layout by name.
    ///
    /// Panics on an unregistered name: the set of names is closed and a miss
    /// is a programming error, not a runtime condition.
    pub fn get(&self, name: SetLayout) -> vk::DescriptorSetLayout {
        *self
            .layouts
            .get(&name)
            .unwrap_or_else(|| panic!("descriptor set layout {name:?} is not registered"))
    }

    /// Destroy every layout. Call exactly once, before device destruction.
    pub fn cleanup(&mut self) {
        for (_, layout) in self.layouts.drain() {
            unsafe {
                self.device.destroy_descriptor_set_layout(layout, None);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binding_shapes_match_their_documentation() {
        let shapes: Vec<(SetLayout, usize, vk::DescriptorType)> = vec![
            (SetLayout::Camera, 1, vk::DescriptorType::UNIFORM_BUFFER),
            (
                SetLayout::MaterialSampler,
                4,
                vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            ),
            (
                SetLayout::MaterialUniform,
                1,
                vk::DescriptorType::UNIFORM_BUFFER,
            ),
            (SetLayout::Light, 1, vk::DescriptorType::UNIFORM_BUFFER),
            (
                SetLayout::DynamicColor,
                1,
                vk::DescriptorType::UNIFORM_BUFFER_DYNAMIC,
            ),
            (
                SetLayout::CubemapSampler,
                1,
                vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            ),
            (
                SetLayout::PostProcessInput,
                2,
                vk::DescriptorType::INPUT_ATTACHMENT,
            ),
        ];

        for (layout, count, ty) in shapes {
            let bindings = layout.bindings();
            assert_eq!(bindings.len(), count, "{layout:?} binding count");
            assert!(
                bindings.iter().all(|b| b.descriptor_type == ty),
                "{layout:?} descriptor type"
            );
        }
    }

    #[test]
    fn camera_is_the_only_vertex_stage_layout() {
        for layout in SetLayout::ALL {
            let expected = if layout == SetLayout::Camera {
                vk::ShaderStageFlags::VERTEX
            } else {
                vk::ShaderStageFlags::FRAGMENT
            };
            assert!(
                layout.bindings().iter().all(|b| b.stage_flags == expected),
                "{layout:?} stage flags"
            );
        }
    }

    #[test]
    fn geometry_set_indices_are_dense_and_unique() {
        let mut indices: Vec<u32> = [
            SetLayout::Camera,
            SetLayout::MaterialSampler,
            SetLayout::Light,
            SetLayout::DynamicColor,
            SetLayout::MaterialUniform,
        ]
        .iter()
        .map(|l| l.geometry_set_index())
        .collect();
        indices.sort_unstable();
        assert_eq!(indices, vec![0, 1, 2, 3, 4]);
    }
}

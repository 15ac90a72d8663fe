use ash::vk;
use thiserror::Error;

/// Parameters shared by every chunk a pool creates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkCreationParams {
    pub usage: vk::BufferUsageFlags,
    pub memory_properties: vk::MemoryPropertyFlags,
    pub sharing_mode: vk::SharingMode,
    /// Only read when `sharing_mode` is `CONCURRENT`.
    pub queue_family_indices: Vec<u32>,
}

impl Default for ChunkCreationParams {
    fn default() -> Self {
        Self {
            usage: vk::BufferUsageFlags::VERTEX_BUFFER
                | vk::BufferUsageFlags::INDEX_BUFFER
                | vk::BufferUsageFlags::UNIFORM_BUFFER
                | vk::BufferUsageFlags::TRANSFER_DST,
            memory_properties: vk::MemoryPropertyFlags::DEVICE_LOCAL,
            sharing_mode: vk::SharingMode::EXCLUSIVE,
            queue_family_indices: Vec::new(),
        }
    }
}

impl ChunkCreationParams {
    /// Host visible, coherent memory used as a copy source.
    pub fn staging() -> Self {
        Self {
            usage: vk::BufferUsageFlags::TRANSFER_SRC,
            memory_properties: vk::MemoryPropertyFlags::HOST_VISIBLE
                | vk::MemoryPropertyFlags::HOST_COHERENT,
            ..Default::default()
        }
    }

    /// Host visible uniform memory, written by the cpu every frame.
    pub fn uniform() -> Self {
        Self {
            usage: vk::BufferUsageFlags::UNIFORM_BUFFER,
            memory_properties: vk::MemoryPropertyFlags::HOST_VISIBLE
                | vk::MemoryPropertyFlags::HOST_COHERENT,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackingStoreError {
    #[error("vulkan call failed: {0}")]
    Vulkan(#[from] vk::Result),
    #[error("no memory type matches bits {memory_type_bits:#b} with properties {required:?}")]
    NoSuitableMemoryType {
        memory_type_bits: u32,
        required: vk::MemoryPropertyFlags,
    },
}

/// Creates and releases the memory a chunk wraps.
pub trait BackingStoreFactory {
    type BackingStore;

    /// Creates one contiguous backing store of exactly `capacity` bytes.
    fn create_chunk_backing_store(
        &mut self,
        capacity: u64,
        params: &ChunkCreationParams,
    ) -> Result<Self::BackingStore, BackingStoreError>;

    fn destroy_chunk_backing_store(&mut self, backing_store: Self::BackingStore);
}

/// A buffer bound to its own dedicated device memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VulkanBackingStore {
    pub buffer: vk::Buffer,
    pub memory: vk::DeviceMemory,
    pub size: vk::DeviceSize,
}

#[derive(Debug, Clone, Copy)]
struct CachedMemoryType {
    memory_type_bits: u32,
    required: vk::MemoryPropertyFlags,
    index: u32,
}

pub struct VulkanBackingStoreFactory {
    device: ash::Device,
    memory_properties: vk::PhysicalDeviceMemoryProperties,
    // every chunk of a pool asks for the same thing, so the lookup only
    // runs once per distinct request.
    cached_memory_type: Option<CachedMemoryType>,
}

impl VulkanBackingStoreFactory {
    pub fn new(
        instance: &ash::Instance,
        physical_device: vk::PhysicalDevice,
        device: ash::Device,
    ) -> Self {
        let memory_properties =
            unsafe { instance.get_physical_device_memory_properties(physical_device) };
        Self {
            device,
            memory_properties,
            cached_memory_type: None,
        }
    }

    fn memory_type_index(
        &mut self,
        memory_type_bits: u32,
        required: vk::MemoryPropertyFlags,
    ) -> Result<u32, BackingStoreError> {
        if let Some(cached) = self.cached_memory_type {
            if cached.memory_type_bits == memory_type_bits && cached.required == required {
                return Ok(cached.index);
            }
        }

        let index = find_memory_type_index(&self.memory_properties, memory_type_bits, required)
            .ok_or(BackingStoreError::NoSuitableMemoryType {
                memory_type_bits,
                required,
            })?;

        log::debug!(
            "selected memory type {} for bits {:#b} and properties {:?}",
            index,
            memory_type_bits,
            required
        );
        self.cached_memory_type = Some(CachedMemoryType {
            memory_type_bits,
            required,
            index,
        });
        Ok(index)
    }
}

/// Index of the first memory type allowed by `memory_type_bits` that carries
/// every flag in `required`.
pub fn find_memory_type_index(
    memory_properties: &vk::PhysicalDeviceMemoryProperties,
    memory_type_bits: u32,
    required: vk::MemoryPropertyFlags,
) -> Option<u32> {
    let count = memory_properties.memory_type_count as usize;
    memory_properties.memory_types[..count]
        .iter()
        .enumerate()
        .find(|&(i, memory_type)| {
            memory_type_bits & (1 << i) != 0 && memory_type.property_flags.contains(required)
        })
        .map(|(i, _)| i as u32)
}

impl BackingStoreFactory for VulkanBackingStoreFactory {
    type BackingStore = VulkanBackingStore;

    fn create_chunk_backing_store(
        &mut self,
        capacity: u64,
        params: &ChunkCreationParams,
    ) -> Result<VulkanBackingStore, BackingStoreError> {
        let mut buffer_info = vk::BufferCreateInfo::default()
            .size(capacity)
            .usage(params.usage)
            .sharing_mode(params.sharing_mode);
        if params.sharing_mode == vk::SharingMode::CONCURRENT {
            buffer_info = buffer_info.queue_family_indices(&params.queue_family_indices);
        }

        let buffer = unsafe { self.device.create_buffer(&buffer_info, None)? };
        let requirements = unsafe { self.device.get_buffer_memory_requirements(buffer) };

        let memory_type_index =
            match self.memory_type_index(requirements.memory_type_bits, params.memory_properties) {
                Ok(index) => index,
                Err(e) => {
                    unsafe { self.device.destroy_buffer(buffer, None) };
                    return Err(e);
                }
            };

        let allocate_info = vk::MemoryAllocateInfo::default()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type_index);
        let memory = match unsafe { self.device.allocate_memory(&allocate_info, None) } {
            Ok(memory) => memory,
            Err(e) => {
                unsafe { self.device.destroy_buffer(buffer, None) };
                return Err(e.into());
            }
        };

        if let Err(e) = unsafe { self.device.bind_buffer_memory(buffer, memory, 0) } {
            unsafe {
                self.device.free_memory(memory, None);
                self.device.destroy_buffer(buffer, None);
            }
            return Err(e.into());
        }

        Ok(VulkanBackingStore {
            buffer,
            memory,
            size: capacity,
        })
    }

    fn destroy_chunk_backing_store(&mut self, backing_store: VulkanBackingStore) {
        unsafe {
            self.device.destroy_buffer(backing_store.buffer, None);
            self.device.free_memory(backing_store.memory, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_properties(flags: &[vk::MemoryPropertyFlags]) -> vk::PhysicalDeviceMemoryProperties {
        let mut props = vk::PhysicalDeviceMemoryProperties::default();
        props.memory_type_count = flags.len() as u32;
        for (i, &f) in flags.iter().enumerate() {
            props.memory_types[i].property_flags = f;
        }
        props
    }

    #[test]
    fn test_find_memory_type_respects_bits_and_flags() {
        let props = memory_properties(&[
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
            vk::MemoryPropertyFlags::HOST_VISIBLE,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        ]);
        let host = vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT;

        assert_eq!(
            find_memory_type_index(&props, 0b111, vk::MemoryPropertyFlags::DEVICE_LOCAL),
            Some(0)
        );
        assert_eq!(find_memory_type_index(&props, 0b111, host), Some(2));
        assert_eq!(
            find_memory_type_index(&props, 0b110, vk::MemoryPropertyFlags::HOST_VISIBLE),
            Some(1)
        );
        assert_eq!(find_memory_type_index(&props, 0b011, host), None);
    }

    #[test]
    fn test_types_past_count_are_ignored() {
        let mut props = memory_properties(&[vk::MemoryPropertyFlags::DEVICE_LOCAL]);
        props.memory_types[1].property_flags = vk::MemoryPropertyFlags::HOST_VISIBLE;
        assert_eq!(
            find_memory_type_index(&props, 0b11, vk::MemoryPropertyFlags::HOST_VISIBLE),
            None
        );
    }
}

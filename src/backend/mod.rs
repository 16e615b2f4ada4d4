// Backend module - Vulkan abstraction layer
//
// Thin RAII wrappers around ash; creation order runs down the module list,
// destruction runs back up through Drop.

pub mod device;
pub mod instance;
pub mod pipeline;
pub mod shader;
pub mod swapchain;
pub mod sync;

pub use device::VulkanDevice;
pub use instance::{Instance, Surface};
pub use pipeline::Pipeline;
pub use swapchain::Swapchain;

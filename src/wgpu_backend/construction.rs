use wgpu::InstanceDescriptor;

use super::{ShaderRegistry, WgpuBackend};
use crate::pipeline::create_linear_sampler;

impl WgpuBackend {
    /// Wrap an existing device, e.g. one shared with the host renderer.
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        let sampler = create_linear_sampler(&device);
        Self {
            device,
            queue,
            sampler,
            registry: ShaderRegistry::default(),
            programs: Vec::new(),
            program_names: Default::default(),
            blend_stack: Vec::new(),
            capture: None,
        }
    }

    /// Creates a backend without a window surface. Returns `None` if no
    /// suitable adapter or device is available.
    pub async fn try_new_headless() -> Option<Self> {
        let instance = wgpu::Instance::new(&InstanceDescriptor::default());

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok()?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("composite_blur_device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: Default::default(),
                trace: Default::default(),
            })
            .await
            .ok()?;

        Some(Self::new(device, queue))
    }
}

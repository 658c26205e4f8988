//! Compute pipeline helper

/// Build a compute pipeline from WGSL source with an explicit layout and
/// an optional push-constant range.
pub fn create_compute_pipeline(
    device: &wgpu::Device,
    label: &'static str,
    source: &str,
    entry_point: &str,
    bind_group_layouts: &[&wgpu::BindGroupLayout],
    push_constant_size: u32,
) -> wgpu::ComputePipeline {
    let module = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Wgsl(source.into()),
    });

    let push_constant_ranges = if push_constant_size > 0 {
        vec![wgpu::PushConstantRange {
            stages: wgpu::ShaderStages::COMPUTE,
            range: 0..push_constant_size,
        }]
    } else {
        Vec::new()
    };

    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some(label),
        bind_group_layouts,
        push_constant_ranges: &push_constant_ranges,
    });

    device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
        label: Some(label),
        layout: Some(&layout),
        module: &module,
        entry_point,
        compilation_options: wgpu::PipelineCompilationOptions::default(),
        cache: None,
    })
}

//! GPU forward/traceback kernel.
//!
//! One cooperative workgroup per sequence; lanes stripe over destination
//! states and a barrier separates frames (see `viterbi.wgsl`). The whole
//! batch is uploaded once, workgroups are dispatched in chunks below the
//! per-dimension limit, and the decoded paths come back through a staging
//! buffer after the last chunk. The back-pointer table lives only in
//! device memory.

use wgpu::util::DeviceExt;

use super::shaders;
use crate::error::DecodeError;
use crate::normalize::Normalized;

/// One dispatch dimension is capped at 65 535 workgroups.
const MAX_GROUPS_PER_DISPATCH: usize = 0xFFFF;

/// Uniform parameter block; layout matches `Params` in `viterbi.wgsl`.
#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct Params {
    batch: u32,
    frames: u32,
    states: u32,
    base_item: u32,
}

/// An acquired GPU adapter and device.
pub(crate) struct GpuContext {
    device: wgpu::Device,
    queue: wgpu::Queue,
}

impl GpuContext {
    /// Bind to the adapter at `index`, in enumeration order over all
    /// backends.
    pub(crate) fn new(index: usize) -> Result<Self, DecodeError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });
        let mut adapters = instance.enumerate_adapters(wgpu::Backends::all());
        if index >= adapters.len() {
            return Err(DecodeError::DeviceError(format!(
                "gpu index {index} out of range ({} adapters available)",
                adapters.len()
            )));
        }
        let adapter = adapters.swap_remove(index);
        tracing::debug!(name = %adapter.get_info().name, "binding gpu adapter");
        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("trellis-gpu"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::Performance,
            },
            None,
        ))
        .map_err(|e| DecodeError::DeviceError(format!("device request failed: {e}")))?;
        Ok(Self { device, queue })
    }

    /// Whether `states` fits the kernel's shared-memory score buffers on
    /// this device.
    pub(crate) fn fits_shared(&self, states: usize) -> bool {
        let budget = self.device.limits().max_compute_workgroup_storage_size as usize;
        states <= shaders::MAX_SHARED_STATES && 2 * shaders::MAX_SHARED_STATES * 4 <= budget
    }
}

/// Decode every batch item into `path`, shape `(batch, frames)`.
///
/// Nothing is written to `path` unless the whole submission succeeds, so
/// callers never observe partial output.
pub(crate) fn decode_batch(
    ctx: &GpuContext,
    norm: &Normalized<'_>,
    path: &mut [i32],
) -> Result<(), DecodeError> {
    let device = &ctx.device;
    let queue = &ctx.queue;
    let batch = norm.batch;
    let frames = norm.frames;
    let states = norm.states;

    let limits = device.limits();
    let max_binding = (limits.max_storage_buffer_binding_size as u64).min(limits.max_buffer_size);
    let grid_bytes = (batch * frames * states) as u64 * 4;
    let path_bytes = (batch * frames) as u64 * 4;
    for (label, bytes) in [
        ("observation", grid_bytes),
        ("back-pointer", grid_bytes),
        ("transition", (states * states) as u64 * 4),
        ("path", path_bytes),
    ] {
        if bytes > max_binding {
            return Err(DecodeError::OutOfResources(format!(
                "{label} buffer of {bytes} bytes exceeds the device limit of {max_binding}"
            )));
        }
    }

    // Validation faults and device OOM are collected through error scopes
    // so a failed decode reports instead of panicking in the uncaptured
    // error handler.
    device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
    device.push_error_scope(wgpu::ErrorFilter::Validation);

    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some("viterbi"),
        source: wgpu::ShaderSource::Wgsl(shaders::VITERBI.into()),
    });
    let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
        label: Some("viterbi_pipeline"),
        layout: None,
        module: &shader,
        entry_point: Some("viterbi"),
        compilation_options: Default::default(),
        cache: None,
    });

    let observation_buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("observation"),
        contents: bytemuck::cast_slice(norm.observation.as_ref()),
        usage: wgpu::BufferUsages::STORAGE,
    });
    let transition_buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("transition"),
        contents: bytemuck::cast_slice(norm.transition.as_ref()),
        usage: wgpu::BufferUsages::STORAGE,
    });
    let initial_buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("initial"),
        contents: bytemuck::cast_slice(norm.initial.as_ref()),
        usage: wgpu::BufferUsages::STORAGE,
    });
    let counts_buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("frame_counts"),
        contents: bytemuck::cast_slice(&norm.frame_counts),
        usage: wgpu::BufferUsages::STORAGE,
    });
    let backptr_buf = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("backptr"),
        size: grid_bytes,
        usage: wgpu::BufferUsages::STORAGE,
        mapped_at_creation: false,
    });
    let path_buf = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("path"),
        size: path_bytes,
        usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
        mapped_at_creation: false,
    });
    let staging_buf = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("staging"),
        size: path_bytes,
        usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });
    let params_buf = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some("params"),
        contents: bytemuck::bytes_of(&Params {
            batch: batch as u32,
            frames: frames as u32,
            states: states as u32,
            base_item: 0,
        }),
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
    });

    let bind_group_layout = pipeline.get_bind_group_layout(0);
    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("viterbi_bind_group"),
        layout: &bind_group_layout,
        entries: &[
            wgpu::BindGroupEntry {
                binding: 0,
                resource: observation_buf.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 1,
                resource: transition_buf.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 2,
                resource: initial_buf.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 3,
                resource: counts_buf.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 4,
                resource: backptr_buf.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 5,
                resource: path_buf.as_entire_binding(),
            },
            wgpu::BindGroupEntry {
                binding: 6,
                resource: params_buf.as_entire_binding(),
            },
        ],
    });

    let mut base = 0usize;
    while base < batch {
        let groups = (batch - base).min(MAX_GROUPS_PER_DISPATCH);
        if base > 0 {
            let params = Params {
                batch: batch as u32,
                frames: frames as u32,
                states: states as u32,
                base_item: base as u32,
            };
            queue.write_buffer(&params_buf, 0, bytemuck::bytes_of(&params));
        }
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("viterbi_encoder"),
        });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("viterbi_pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            pass.dispatch_workgroups(groups as u32, 1, 1);
        }
        base += groups;
        if base == batch {
            encoder.copy_buffer_to_buffer(&path_buf, 0, &staging_buf, 0, path_bytes);
        }
        queue.submit(std::iter::once(encoder.finish()));
    }

    let validation = pollster::block_on(device.pop_error_scope());
    let oom = pollster::block_on(device.pop_error_scope());
    if let Some(e) = oom {
        return Err(DecodeError::OutOfResources(format!(
            "device out of memory: {e}"
        )));
    }
    if let Some(e) = validation {
        return Err(DecodeError::DeviceError(format!(
            "kernel validation failed: {e}"
        )));
    }

    let slice = staging_buf.slice(..);
    let (tx, rx) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    device.poll(wgpu::Maintain::Wait);
    rx.recv()
        .map_err(|_| DecodeError::DeviceError("path readback channel closed".into()))?
        .map_err(|e| DecodeError::DeviceError(format!("path readback failed: {e}")))?;

    let data = slice.get_mapped_range();
    path.copy_from_slice(bytemuck::cast_slice(&data));
    drop(data);
    staging_buf.unmap();
    Ok(())
}

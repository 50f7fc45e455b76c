//! Offscreen frame capture.
//!
//! Quilt frames and screenshots render into a dedicated square texture at
//! the requested pixel size, so the interactive surface is never resized or
//! otherwise disturbed mid-session. The result comes back over a mapped
//! staging buffer and is encoded as PNG.

use std::io::Cursor;

use anyhow::{Context, Result, ensure};
use image::{ImageFormat, RgbaImage};

use crate::camera::OrbitCamera;
use crate::params::RenderParams;
use crate::render::displace::{CAPTURE_FORMAT, DisplacementRenderer, TargetKind};

/// Render the current scene at `size` x `size` pixels and return PNG bytes.
/// Overlays are always omitted from captures.
pub fn capture_png(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    renderer: &mut DisplacementRenderer,
    camera: &OrbitCamera,
    params: &RenderParams,
    size: u32,
) -> Result<Vec<u8>> {
    ensure!(size >= 1, "capture size must be at least one pixel");

    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("capture-target"),
        size: wgpu::Extent3d {
            width: size,
            height: size,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: CAPTURE_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

    // Buffer rows must be aligned for texture-to-buffer copies.
    let unpadded_bytes_per_row = 4 * size;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    let padded_bytes_per_row = unpadded_bytes_per_row.div_ceil(align) * align;

    let staging = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("capture-staging"),
        size: u64::from(padded_bytes_per_row) * u64::from(size),
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("capture-encoder"),
    });
    renderer.render(
        device,
        queue,
        &mut encoder,
        &view,
        (size, size),
        TargetKind::Capture,
        camera,
        params,
        false,
    );
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &staging,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(padded_bytes_per_row),
                rows_per_image: Some(size),
            },
        },
        wgpu::Extent3d {
            width: size,
            height: size,
            depth_or_array_layers: 1,
        },
    );
    queue.submit(Some(encoder.finish()));

    let slice = staging.slice(..);
    let (tx, rx) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    device
        .poll(wgpu::PollType::Wait {
            submission_index: None,
            timeout: None,
        })
        .context("waiting for capture readback")?;
    rx.recv()
        .context("capture readback callback dropped")?
        .context("mapping capture staging buffer")?;

    let mut pixels = Vec::with_capacity((unpadded_bytes_per_row * size) as usize);
    {
        let mapped = slice.get_mapped_range();
        for row in mapped.chunks_exact(padded_bytes_per_row as usize) {
            pixels.extend_from_slice(&row[..unpadded_bytes_per_row as usize]);
        }
    }
    staging.unmap();

    let img = RgbaImage::from_raw(size, size, pixels)
        .context("capture pixel buffer has unexpected length")?;
    let mut png = Cursor::new(Vec::new());
    img.write_to(&mut png, ImageFormat::Png)
        .context("encoding capture as PNG")?;
    Ok(png.into_inner())
}

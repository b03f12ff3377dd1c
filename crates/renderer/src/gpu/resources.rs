use wgpu::util::{DeviceExt, TextureDataOrder};

use crate::error::PipelineError;
use crate::types::{Bounds, Precision, SourceImage};

pub(crate) const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24Plus;

/// Color and depth formats used for every off-screen pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTargetFormat {
    pub color: wgpu::TextureFormat,
    pub depth: wgpu::TextureFormat,
}

/// A sampled texture.
pub struct WgpuTexture {
    pub(crate) _texture: wgpu::Texture,
    pub(crate) view: wgpu::TextureView,
    pub bounds: Bounds,
}

/// Picks the best 8-bit render-to-texture configuration the adapter offers.
pub(crate) fn choose_format(
    adapter: &wgpu::Adapter,
    precision: Precision,
) -> Option<RenderTargetFormat> {
    let wants_rgba8 = [
        precision.red_bits,
        precision.green_bits,
        precision.blue_bits,
        precision.alpha_bits,
    ]
    .iter()
    .all(|bits| *bits <= 8);
    if !wants_rgba8 || !precision.depth {
        return None;
    }

    let color_usage = wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING;
    let color = [wgpu::TextureFormat::Rgba8Unorm, wgpu::TextureFormat::Bgra8Unorm]
        .into_iter()
        .find(|format| {
            adapter
                .get_texture_format_features(*format)
                .allowed_usages
                .contains(color_usage)
        })?;
    let depth_supported = adapter
        .get_texture_format_features(DEPTH_FORMAT)
        .allowed_usages
        .contains(wgpu::TextureUsages::RENDER_ATTACHMENT);
    depth_supported.then_some(RenderTargetFormat {
        color,
        depth: DEPTH_FORMAT,
    })
}

pub(crate) fn create_source_texture(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    image: &SourceImage,
) -> Result<WgpuTexture, PipelineError> {
    let Bounds { width, height } = image.bounds;
    let expected = width as usize * height as usize * 4;
    if image.bounds.is_empty() || image.pixels.len() != expected {
        return Err(PipelineError::Allocation(format!(
            "image '{}' has {} bytes for {} pixels",
            image.name,
            image.pixels.len(),
            image.bounds
        )));
    }
    check_dimensions(device, image.bounds)?;

    let texture = device.create_texture_with_data(
        queue,
        &wgpu::TextureDescriptor {
            label: Some(&format!("source image {}", image.name)),
            size: extent(image.bounds),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        },
        TextureDataOrder::LayerMajor,
        &image.pixels,
    );
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    Ok(WgpuTexture {
        _texture: texture,
        view,
        bounds: image.bounds,
    })
}

/// Color target (sampled by later passes) plus its depth attachment.
pub(crate) fn create_render_target(
    device: &wgpu::Device,
    format: RenderTargetFormat,
    bounds: Bounds,
) -> Result<(WgpuTexture, wgpu::TextureView), PipelineError> {
    check_dimensions(device, bounds)?;

    let color = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("pass render target"),
        size: extent(bounds),
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: format.color,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
        view_formats: &[],
    });
    let color_view = color.create_view(&wgpu::TextureViewDescriptor::default());
    let depth_view = create_depth_view(device, format.depth, bounds);
    Ok((
        WgpuTexture {
            _texture: color,
            view: color_view,
            bounds,
        },
        depth_view,
    ))
}

pub(crate) fn create_depth_view(
    device: &wgpu::Device,
    format: wgpu::TextureFormat,
    bounds: Bounds,
) -> wgpu::TextureView {
    device
        .create_texture(&wgpu::TextureDescriptor {
            label: Some("pass depth"),
            size: extent(bounds),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        })
        .create_view(&wgpu::TextureViewDescriptor::default())
}

pub(crate) fn create_sampler(device: &wgpu::Device) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("pass sampler"),
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        address_mode_w: wgpu::AddressMode::ClampToEdge,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        mipmap_filter: wgpu::FilterMode::Nearest,
        ..Default::default()
    })
}

fn check_dimensions(device: &wgpu::Device, bounds: Bounds) -> Result<(), PipelineError> {
    let max = device.limits().max_texture_dimension_2d;
    if bounds.is_empty() || bounds.width > max || bounds.height > max {
        return Err(PipelineError::Allocation(format!(
            "texture size {bounds} outside 1..={max}"
        )));
    }
    Ok(())
}

fn extent(bounds: Bounds) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width: bounds.width,
        height: bounds.height,
        depth_or_array_layers: 1,
    }
}

//! Texel encoding for clears and box filtering for mip generation

use crate::*;

fn unorm8(value: f32) -> u8 {
    (value.max(0.0).min(1.0) * 255.0 + 0.5) as u8
}

fn linear_to_srgb(value: f32) -> f32 {
    let value = value.max(0.0).min(1.0);
    if value <= 0.003_130_8 {
        value * 12.92
    } else {
        1.055 * value.powf(1.0 / 2.4) - 0.055
    }
}

// Denormals flush to zero, out of range values saturate to infinity
fn f32_to_f16_bits(value: f32) -> u16 {
    let bits = value.to_bits();
    let sign = ((bits >> 16) & 0x8000) as u16;
    let exponent = ((bits >> 23) & 0xff) as i32;
    let mantissa = bits & 0x007f_ffff;

    if exponent == 0xff {
        let nan_bit = if mantissa != 0 { 0x0200 } else { 0 };
        return sign | 0x7c00 | nan_bit;
    }

    let half_exponent = exponent - 127 + 15;
    if half_exponent >= 0x1f {
        sign | 0x7c00
    } else if half_exponent <= 0 {
        sign
    } else {
        sign | ((half_exponent as u16) << 10) | ((mantissa >> 13) as u16)
    }
}

/// Bytes of a single texel of `format` holding `color`
pub(super) fn encode_color(
    format: FluentFormat,
    color: [f32; 4],
) -> FluentResult<Vec<u8>> {
    let [r, g, b, a] = color;
    let texel = match format {
        FluentFormat::R8_UNORM => vec![unorm8(r)],
        FluentFormat::R8G8_UNORM => vec![unorm8(r), unorm8(g)],
        FluentFormat::R8G8B8A8_UNORM => vec![unorm8(r), unorm8(g), unorm8(b), unorm8(a)],
        FluentFormat::R8G8B8A8_SRGB => vec![
            unorm8(linear_to_srgb(r)),
            unorm8(linear_to_srgb(g)),
            unorm8(linear_to_srgb(b)),
            unorm8(a),
        ],
        FluentFormat::B8G8R8A8_UNORM => vec![unorm8(b), unorm8(g), unorm8(r), unorm8(a)],
        FluentFormat::B8G8R8A8_SRGB => vec![
            unorm8(linear_to_srgb(b)),
            unorm8(linear_to_srgb(g)),
            unorm8(linear_to_srgb(r)),
            unorm8(a),
        ],
        FluentFormat::R16_SFLOAT => f32_to_f16_bits(r).to_le_bytes().to_vec(),
        FluentFormat::R16G16_SFLOAT => [r, g]
            .iter()
            .flat_map(|x| f32_to_f16_bits(*x).to_le_bytes().to_vec())
            .collect(),
        FluentFormat::R16G16B16A16_SFLOAT => color
            .iter()
            .flat_map(|x| f32_to_f16_bits(*x).to_le_bytes().to_vec())
            .collect(),
        FluentFormat::R32_UINT => (r.max(0.0) as u32).to_le_bytes().to_vec(),
        FluentFormat::R32_SFLOAT
        | FluentFormat::R32G32_SFLOAT
        | FluentFormat::R32G32B32_SFLOAT
        | FluentFormat::R32G32B32A32_SFLOAT => {
            let channel_count = format.block_size_in_bytes() as usize / 4;
            color[..channel_count]
                .iter()
                .flat_map(|x| x.to_le_bytes().to_vec())
                .collect()
        }
        _ => Err(format!("can't encode a color value as {:?}", format))?,
    };

    debug_assert_eq!(texel.len(), format.block_size_in_bytes() as usize);
    Ok(texel)
}

/// Bytes of a single depth/stencil texel
pub(super) fn encode_depth_stencil(
    format: FluentFormat,
    depth: f32,
    stencil: u32,
) -> FluentResult<Vec<u8>> {
    let depth = depth.max(0.0).min(1.0);
    let stencil = stencil as u8;
    let unorm16 = ((depth * 65535.0 + 0.5) as u16).to_le_bytes();
    let texel = match format {
        FluentFormat::D16_UNORM => unorm16.to_vec(),
        FluentFormat::D32_SFLOAT => depth.to_le_bytes().to_vec(),
        FluentFormat::S8_UINT => vec![stencil],
        FluentFormat::D16_UNORM_S8_UINT => vec![unorm16[0], unorm16[1], stencil],
        FluentFormat::D24_UNORM_S8_UINT => {
            // f32 can't hold 2^24 - 0.5, round in f64 so 1.0 stays 0xFFFFFF
            let unorm24 = ((depth as f64 * 16_777_215.0).round() as u32).to_le_bytes();
            vec![unorm24[0], unorm24[1], unorm24[2], stencil]
        }
        FluentFormat::D32_SFLOAT_S8_UINT => {
            let mut texel = depth.to_le_bytes().to_vec();
            texel.push(stencil);
            texel
        }
        _ => Err(format!("{:?} is not a depth/stencil format", format))?,
    };

    Ok(texel)
}

fn has_8bit_channels(format: FluentFormat) -> bool {
    match format {
        FluentFormat::R8_UNORM
        | FluentFormat::R8G8_UNORM
        | FluentFormat::R8G8B8A8_UNORM
        | FluentFormat::R8G8B8A8_SRGB
        | FluentFormat::B8G8R8A8_UNORM
        | FluentFormat::B8G8R8A8_SRGB => true,
        _ => false,
    }
}

fn has_f32_channels(format: FluentFormat) -> bool {
    match format {
        FluentFormat::R32_SFLOAT
        | FluentFormat::R32G32_SFLOAT
        | FluentFormat::R32G32B32_SFLOAT
        | FluentFormat::R32G32B32A32_SFLOAT => true,
        _ => false,
    }
}

/// Produce the next mip level with a 2x2 box filter. Unorm and float channels are averaged (in
/// encoded space), other formats take the top-left texel.
pub(super) fn downsample(
    format: FluentFormat,
    src: &[u8],
    src_width: u32,
    src_height: u32,
) -> Vec<u8> {
    let texel_size = format.block_size_in_bytes() as usize;
    let dst_width = (src_width / 2).max(1);
    let dst_height = (src_height / 2).max(1);
    let mut dst = Vec::with_capacity(dst_width as usize * dst_height as usize * texel_size);

    let texel_offset = |x: u32, y: u32| -> usize {
        let x = x.min(src_width - 1) as usize;
        let y = y.min(src_height - 1) as usize;
        (y * src_width as usize + x) * texel_size
    };

    for y in 0..dst_height {
        for x in 0..dst_width {
            let corners = [
                texel_offset(x * 2, y * 2),
                texel_offset(x * 2 + 1, y * 2),
                texel_offset(x * 2, y * 2 + 1),
                texel_offset(x * 2 + 1, y * 2 + 1),
            ];

            if has_8bit_channels(format) {
                for channel in 0..texel_size {
                    let sum: u32 = corners
                        .iter()
                        .map(|offset| src[offset + channel] as u32)
                        .sum();
                    dst.push(((sum + 2) / 4) as u8);
                }
            } else if has_f32_channels(format) {
                for channel in 0..texel_size / 4 {
                    let sum: f32 = corners
                        .iter()
                        .map(|offset| {
                            let start = offset + channel * 4;
                            let mut bytes = [0; 4];
                            bytes.copy_from_slice(&src[start..start + 4]);
                            f32::from_le_bytes(bytes)
                        })
                        .sum();
                    dst.extend_from_slice(&(sum / 4.0).to_le_bytes());
                }
            } else {
                dst.extend_from_slice(&src[corners[0]..corners[0] + texel_size]);
            }
        }
    }

    dst
}

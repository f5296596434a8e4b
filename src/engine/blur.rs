//! Separable box blur over interleaved f32 RGB buffers.
//!
//! This is the low-pass base for the texture/clarity unsharp masks and
//! for smoothing the dehaze transmission estimate. Edges clamp to the
//! border pixel.

use rayon::prelude::*;

use crate::foundation::error::{TonecraftError, TonecraftResult};

pub fn box_blur_rgb(
    src: &[f32],
    width: u32,
    height: u32,
    radius: u32,
) -> TonecraftResult<Vec<f32>> {
    let expected_len = (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(3))
        .ok_or_else(|| TonecraftError::engine("blur buffer size overflow"))?;
    if src.len() != expected_len {
        return Err(TonecraftError::engine(
            "box_blur_rgb expects src matching width*height*3",
        ));
    }
    if radius == 0 || width == 0 || height == 0 {
        return Ok(src.to_vec());
    }

    let mut tmp = vec![0.0f32; expected_len];
    let mut out = vec![0.0f32; expected_len];

    horizontal_pass(src, &mut tmp, width, radius);
    vertical_pass(&tmp, &mut out, width, height, radius);
    Ok(out)
}

fn horizontal_pass(src: &[f32], dst: &mut [f32], width: u32, radius: u32) {
    let w = width as i32;
    let r = radius as i32;
    let row_len = width as usize * 3;
    let inv = 1.0 / (2 * r + 1) as f32;

    dst.par_chunks_mut(row_len)
        .zip(src.par_chunks(row_len))
        .for_each(|(drow, srow)| {
            for x in 0..w {
                let mut acc = [0.0f32; 3];
                for dx in -r..=r {
                    let sx = (x + dx).clamp(0, w - 1) as usize * 3;
                    acc[0] += srow[sx];
                    acc[1] += srow[sx + 1];
                    acc[2] += srow[sx + 2];
                }
                let di = x as usize * 3;
                drow[di] = acc[0] * inv;
                drow[di + 1] = acc[1] * inv;
                drow[di + 2] = acc[2] * inv;
            }
        });
}

fn vertical_pass(src: &[f32], dst: &mut [f32], width: u32, height: u32, radius: u32) {
    let h = height as i32;
    let r = radius as i32;
    let row_len = width as usize * 3;
    let inv = 1.0 / (2 * r + 1) as f32;

    dst.par_chunks_mut(row_len).enumerate().for_each(|(y, drow)| {
        let y = y as i32;
        for i in 0..row_len {
            let mut acc = 0.0f32;
            for dy in -r..=r {
                let sy = (y + dy).clamp(0, h - 1) as usize;
                acc += src[sy * row_len + i];
            }
            drow[i] = acc * inv;
        }
    });
}

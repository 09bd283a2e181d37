//! Binary PF (3-channel float) PFM codec, used for the environment map input
//! and the rendered output. Bit-exact with §6: rows are stored bottom-up on
//! disk (the loader flips vertically to make the in-memory buffer top-down),
//! and the header's scale value picks the on-disk endianness.

use std::io::{Read, Write};
use std::path::Path;

use glam::Vec3;

use crate::error::RenderError;
use crate::film::Film;
use crate::texture::Texture;

pub fn load(path: &Path) -> Result<Texture, RenderError> {
    let mut file = std::fs::File::open(path)?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;

    let (magic, rest) = split_token(&bytes).ok_or_else(|| header_error(path))?;
    if magic != "PF" {
        return Err(RenderError::ImageFormat {
            path: path.display().to_string(),
            message: format!("unsupported PFM magic '{magic}'"),
        });
    }
    let (w_tok, rest) = split_token(rest).ok_or_else(|| header_error(path))?;
    let (h_tok, rest) = split_token(rest).ok_or_else(|| header_error(path))?;
    let (scale_tok, rest) = split_token(rest).ok_or_else(|| header_error(path))?;

    let width: usize = w_tok.parse().map_err(|_| header_error(path))?;
    let height: usize = h_tok.parse().map_err(|_| header_error(path))?;
    let scale: f64 = scale_tok.parse().map_err(|_| header_error(path))?;
    let little_endian = scale < 0.0;
    let data = &rest[1..];

    let n = width * height * 3;
    if data.len() < n * 4 {
        return Err(RenderError::ImageFormat {
            path: path.display().to_string(),
            message: "truncated pixel data".to_string(),
        });
    }

    let mut floats = vec![0f32; n];
    for (i, f) in floats.iter_mut().enumerate() {
        let b = [data[i * 4], data[i * 4 + 1], data[i * 4 + 2], data[i * 4 + 3]];
        *f = if little_endian {
            f32::from_le_bytes(b)
        } else {
            f32::from_be_bytes(b)
        };
    }

    // On-disk rows are bottom-up; flip into top-down storage.
    let mut pixels = vec![Vec3::ZERO; width * height];
    for y in 0..height {
        for x in 0..width {
            let src = ((height - 1 - y) * width + x) * 3;
            pixels[y * width + x] = Vec3::new(floats[src], floats[src + 1], floats[src + 2]);
        }
    }

    Ok(Texture::new(width, height, pixels))
}

/// Writes `film` as a little-endian PFM, per §6: `PF\n<w> <h>\n-1\n` followed
/// by `film[(h-1-y) * w + (w-1-x)]` ordering (both vertical and horizontal
/// flip relative to the in-memory row-major, left-to-right film buffer).
pub fn write(path: &Path, film: &Film) -> Result<(), RenderError> {
    let mut file = std::fs::File::create(path)?;
    write!(file, "PF\n{} {}\n-1\n", film.width, film.height)?;

    let mut data = Vec::with_capacity(film.width * film.height * 3 * 4);
    for y in 0..film.height {
        for x in 0..film.width {
            let p = film.get(film.width - 1 - x, film.height - 1 - y);
            data.extend_from_slice(&p.x.to_le_bytes());
            data.extend_from_slice(&p.y.to_le_bytes());
            data.extend_from_slice(&p.z.to_le_bytes());
        }
    }
    file.write_all(&data)?;
    Ok(())
}

fn header_error(path: &Path) -> RenderError {
    RenderError::ImageFormat {
        path: path.display().to_string(),
        message: "malformed PFM header".to_string(),
    }
}

fn split_token(buf: &[u8]) -> Option<(&str, &[u8])> {
    let mut i = 0;
    while i < buf.len() && buf[i].is_ascii_whitespace() {
        i += 1;
    }
    let start = i;
    while i < buf.len() && !buf[i].is_ascii_whitespace() {
        i += 1;
    }
    if i == start {
        return None;
    }
    let token = std::str::from_utf8(&buf[start..i]).ok()?;
    Some((token, &buf[i..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_raw_pfm(path: &Path, w: usize, h: usize, scale: f32, row_major_bottom_up: &[f32]) {
        use std::io::Write;
        let mut f = std::fs::File::create(path).unwrap();
        write!(f, "PF\n{w} {h}\n{scale}\n").unwrap();
        for v in row_major_bottom_up {
            f.write_all(&v.to_le_bytes()).unwrap();
        }
    }

    #[test]
    fn load_flips_bottom_up_rows() {
        let dir = std::env::temp_dir();
        let path = dir.join("rustic_test_pfm_flip.pfm");
        // Two 1x1-row pixels stacked: bottom row red, top row green on disk.
        let data = [1.0, 0.0, 0.0, 0.0, 1.0, 0.0];
        write_raw_pfm(&path, 1, 2, -1.0, &data);
        let tex = load(&path).unwrap();
        assert_eq!(tex.pixels[0], Vec3::new(0.0, 1.0, 0.0));
        assert_eq!(tex.pixels[1], Vec3::new(1.0, 0.0, 0.0));
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn write_applies_both_axis_flip_per_spec() {
        // The output writer mirrors both axes (`film[(h-1-y)*w+(w-1-x)]`),
        // unlike a generic PFM loader which only compensates for the
        // bottom-up row order; this locks in that asymmetry.
        let dir = std::env::temp_dir();
        let path = dir.join("rustic_test_pfm_roundtrip.pfm");
        let mut film = Film::new(2, 2);
        film.set(0, 0, Vec3::new(0.1, 0.2, 0.3));
        film.set(1, 1, Vec3::new(0.9, 0.8, 0.7));
        write(&path, &film).unwrap();
        let tex = load(&path).unwrap();
        assert_eq!(tex.width, 2);
        assert_eq!(tex.height, 2);
        assert_eq!(tex.pixels[0 * 2 + 1], Vec3::new(0.1, 0.2, 0.3));
        assert_eq!(tex.pixels[1 * 2 + 0], Vec3::new(0.9, 0.8, 0.7));
        assert_eq!(tex.pixels[0 * 2 + 0], Vec3::ZERO);
        assert_eq!(tex.pixels[1 * 2 + 1], Vec3::ZERO);
        std::fs::remove_file(&path).ok();
    }
}

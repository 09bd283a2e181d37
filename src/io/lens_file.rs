//! Lens prescription file parser: one element per non-comment, non-blank
//! line, four whitespace-separated fields in millimeters/diopters, scaled to
//! meters per §6 (radius and thickness by 0.001, diameter-to-radius by
//! 0.0005).

use std::path::Path;

use crate::error::RenderError;
use crate::lens::LensElement;

pub fn parse(path: &Path) -> Result<Vec<LensElement>, RenderError> {
    let text = std::fs::read_to_string(path)?;
    let mut elements = Vec::new();

    for (line_no, line) in text.lines().enumerate() {
        let line_no = line_no + 1;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split_ascii_whitespace().collect();
        if fields.len() < 4 {
            return Err(RenderError::LensFile {
                line: line_no,
                message: "expected 4 fields: radius thickness ior diameter".to_string(),
            });
        }
        let parse_f = |s: &str| -> Result<f32, RenderError> {
            s.parse().map_err(|_| RenderError::LensFile {
                line: line_no,
                message: format!("bad number '{s}'"),
            })
        };
        let curvature_radius_mm = parse_f(fields[0])?;
        let thickness_mm = parse_f(fields[1])?;
        let eta = parse_f(fields[2])?;
        let diameter_mm = parse_f(fields[3])?;

        elements.push(LensElement {
            curvature_radius: curvature_radius_mm * 0.001,
            thickness: thickness_mm * 0.001,
            eta,
            aperture_radius: diameter_mm * 0.0005,
        });
    }

    if elements.is_empty() {
        return Err(RenderError::LensFile {
            line: 0,
            message: "lens file has no elements".to_string(),
        });
    }
    Ok(elements)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_elements_and_scales_units() {
        let dir = std::env::temp_dir();
        let path = dir.join("rustic_test_lens_basic.txt");
        std::fs::write(&path, "# comment\n50.0 10.0 1.5 20.0\n0.0 5.0 0.0 10.0\n\n-40.0 30.0 1.5 20.0\n").unwrap();
        let elements = parse(&path).unwrap();
        assert_eq!(elements.len(), 3);
        assert!((elements[0].curvature_radius - 0.05).abs() < 1e-6);
        assert!((elements[0].thickness - 0.01).abs() < 1e-6);
        assert!((elements[0].aperture_radius - 0.01).abs() < 1e-6);
        assert_eq!(elements[1].curvature_radius, 0.0);
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn rejects_malformed_line() {
        let dir = std::env::temp_dir();
        let path = dir.join("rustic_test_lens_bad.txt");
        std::fs::write(&path, "50.0 10.0 1.5\n").unwrap();
        assert!(parse(&path).is_err());
        std::fs::remove_file(&path).ok();
    }
}

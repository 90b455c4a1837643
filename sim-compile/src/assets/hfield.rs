//! Height-field asset compilation.
//!
//! Elevation grids come from inline data, a custom binary file
//! (`2 x i32` dims followed by `nrow * ncol` `f32` elevations, native
//! endian), or an 8-bit greyscale PNG. Author grids store row 0 at the top;
//! the runtime grid stores row 0 at the bottom, so rows are flipped during
//! normalization (and flipped back by the decompiler). The compiled grid is
//! normalized to `[0, 1]`.

use sim_model::ObjectType;

use crate::error::{CompileError, Result};
use crate::resources::{Resources, file_stem, resolve_path};
use crate::spec::asset::HField;

/// Compile one height field in place.
pub fn compile_hfield(
    hfield: &mut HField,
    id: usize,
    modelfiledir: &str,
    texturedir: &str,
    resources: &dyn Resources,
) -> Result<()> {
    compile_inner(hfield, modelfiledir, texturedir, resources)
        .map_err(|e| e.with_object(ObjectType::HField, hfield.name.clone(), id))
}

fn compile_inner(
    hfield: &mut HField,
    modelfiledir: &str,
    texturedir: &str,
    resources: &dyn Resources,
) -> Result<()> {
    if let Some(file) = hfield.file.clone() {
        if !hfield.userdata.is_empty() {
            return Err(CompileError::spec(
                "height field cannot have both a file and inline data",
            ));
        }
        let path = resolve_path(modelfiledir, texturedir, &file);
        let bytes = resources.read(&path)?;
        if is_png(&bytes) {
            let img = resources.decode_png(&bytes, &path)?;
            if img.channels != 1 {
                return Err(CompileError::asset(format!(
                    "height field PNG must be greyscale, '{path}' has {} channels",
                    img.channels
                )));
            }
            hfield.nrow = img.height;
            hfield.ncol = img.width;
            hfield.userdata = img.data.iter().map(|&b| f64::from(b)).collect();
        } else {
            let (nrow, ncol, data) = parse_binary_hfield(&bytes, &path)?;
            hfield.nrow = nrow;
            hfield.ncol = ncol;
            hfield.userdata = data;
        }
        if hfield.name.is_empty() {
            hfield.name = file_stem(&file);
        }
    }

    if hfield.nrow == 0 || hfield.ncol == 0 {
        return Err(CompileError::spec("height field has empty size"));
    }
    if hfield.userdata.len() != hfield.nrow * hfield.ncol {
        return Err(CompileError::asset(format!(
            "height field data length {} does not match {}x{} grid",
            hfield.userdata.len(),
            hfield.nrow,
            hfield.ncol
        )));
    }
    for (i, s) in hfield.size.iter().enumerate() {
        if !s.is_finite() || (*s <= 0.0 && i != 3) {
            return Err(CompileError::spec(format!(
                "height field size[{i}] must be positive, is {s}"
            )));
        }
    }

    // Normalize to [0, 1]; a flat grid becomes all zeros.
    let min = hfield.userdata.iter().copied().fold(f64::INFINITY, f64::min);
    let max = hfield
        .userdata
        .iter()
        .copied()
        .fold(f64::NEG_INFINITY, f64::max);
    if !min.is_finite() || !max.is_finite() {
        return Err(CompileError::asset("height field data is not finite"));
    }
    let span = max - min;
    let (nrow, ncol) = (hfield.nrow, hfield.ncol);
    let mut data = Vec::with_capacity(nrow * ncol);
    for r in (0..nrow).rev() {
        for c in 0..ncol {
            let h = hfield.userdata[r * ncol + c];
            data.push(if span > 0.0 { (h - min) / span } else { 0.0 });
        }
    }
    hfield.data = data;

    Ok(())
}

fn is_png(bytes: &[u8]) -> bool {
    bytes.starts_with(&[0x89, b'P', b'N', b'G'])
}

fn parse_binary_hfield(bytes: &[u8], path: &str) -> Result<(usize, usize, Vec<f64>)> {
    let fail = |msg: String| CompileError::asset(format!("{msg} in '{path}'"));
    if bytes.len() < 8 {
        return Err(fail("height field file too short".to_string()));
    }
    let nrow = i32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    let ncol = i32::from_ne_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    if nrow <= 0 || ncol <= 0 {
        return Err(fail(format!("invalid height field dims {nrow}x{ncol}")));
    }
    let n = nrow as usize * ncol as usize;
    if bytes.len() != 8 + 4 * n {
        return Err(fail(format!(
            "height field size mismatch: expected {} bytes, got {}",
            8 + 4 * n,
            bytes.len()
        )));
    }
    let data = bytes[8..]
        .chunks_exact(4)
        .map(|c| f64::from(f32::from_ne_bytes([c[0], c[1], c[2], c[3]])))
        .collect();
    Ok((nrow as usize, ncol as usize, data))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::resources::{MemResources, PngImage};
    use approx::assert_relative_eq;

    #[test]
    fn inline_data_normalizes_and_flips() {
        let mut h = HField {
            nrow: 2,
            ncol: 2,
            userdata: vec![1.0, 3.0, 2.0, 5.0],
            ..HField::default()
        };
        compile_hfield(&mut h, 0, "", "", &MemResources::new()).unwrap();
        // Author row 1 becomes runtime row 0 (bottom).
        assert_relative_eq!(h.data[0], 0.25);
        assert_relative_eq!(h.data[1], 1.0);
        assert_relative_eq!(h.data[2], 0.0);
        assert_relative_eq!(h.data[3], 0.5);
    }

    #[test]
    fn flat_grid_becomes_zeros() {
        let mut h = HField {
            nrow: 1,
            ncol: 3,
            userdata: vec![7.0; 3],
            ..HField::default()
        };
        compile_hfield(&mut h, 0, "", "", &MemResources::new()).unwrap();
        assert!(h.data.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn binary_file_parses() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&2i32.to_ne_bytes());
        bytes.extend_from_slice(&3i32.to_ne_bytes());
        for v in [0.0f32, 1.0, 2.0, 3.0, 4.0, 5.0] {
            bytes.extend_from_slice(&v.to_ne_bytes());
        }
        let mut res = MemResources::new();
        res.insert("terrain.bin", bytes);

        let mut h = HField {
            file: Some("terrain.bin".to_string()),
            ..HField::default()
        };
        compile_hfield(&mut h, 0, "", "", &res).unwrap();
        assert_eq!(h.name, "terrain");
        assert_eq!((h.nrow, h.ncol), (2, 3));
        // Author row 1 ([3,4,5]) lands at the bottom of the runtime grid.
        assert_relative_eq!(h.data[2], 1.0);
        assert_relative_eq!(h.data[3], 0.0);
    }

    #[test]
    fn png_rows_flip() {
        let mut res = MemResources::new();
        // 2x2 grey image: top row bright, bottom row dark.
        res.insert_image(
            "hill.png",
            PngImage {
                width: 2,
                height: 2,
                channels: 1,
                data: vec![200, 200, 10, 10],
            },
        );
        // Marker bytes must look like a PNG for format sniffing.
        res.insert("hill.png", vec![0x89, b'P', b'N', b'G']);
        let mut h = HField {
            file: Some("hill.png".to_string()),
            ..HField::default()
        };
        compile_hfield(&mut h, 0, "", "", &res).unwrap();
        // Terrain row 0 (bottom) came from image row 1 (dark).
        assert_relative_eq!(h.data[0], 0.0);
        assert_relative_eq!(h.data[2], 1.0);
    }

    #[test]
    fn binary_rows_also_flip() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&2i32.to_ne_bytes());
        bytes.extend_from_slice(&1i32.to_ne_bytes());
        for v in [1.0f32, 0.0] {
            bytes.extend_from_slice(&v.to_ne_bytes());
        }
        let mut res = MemResources::new();
        res.insert("strip.bin", bytes);
        let mut h = HField {
            file: Some("strip.bin".to_string()),
            ..HField::default()
        };
        compile_hfield(&mut h, 0, "", "", &res).unwrap();
        assert_relative_eq!(h.data[0], 0.0);
        assert_relative_eq!(h.data[1], 1.0);
    }

    #[test]
    fn dimension_mismatch_fails() {
        let mut h = HField {
            nrow: 2,
            ncol: 2,
            userdata: vec![0.0; 3],
            ..HField::default()
        };
        let err = compile_hfield(&mut h, 0, "", "", &MemResources::new()).unwrap_err();
        assert!(err.to_string().contains("does not match"));
    }
}

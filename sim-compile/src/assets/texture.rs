//! Texture asset compilation.
//!
//! 2D textures come from an RGB PNG, a custom binary file (`2 x i32` dims
//! followed by `w * h * 3` RGB bytes), or a flat `rgb1` fill. Cube textures
//! come from one file with a `gridsize`/`gridlayout` face selection, from six
//! per-face files, or from a flat fill; missing faces are filled with `rgb1`.
//! Compiled cube storage stacks the six faces vertically, face order
//! right/left/up/down/front/back.

use sim_model::{ObjectType, TextureType};

use crate::error::{CompileError, Result};
use crate::resources::{Resources, file_stem, resolve_path};
use crate::spec::asset::Texture;

/// Compile one texture in place.
pub fn compile_texture(
    tex: &mut Texture,
    id: usize,
    modelfiledir: &str,
    texturedir: &str,
    resources: &dyn Resources,
) -> Result<()> {
    let name = tex.name.clone();
    let ctx = move |e: CompileError| e.with_object(ObjectType::Texture, name.clone(), id);

    match tex.ttype {
        TextureType::TwoD => compile_2d(tex, modelfiledir, texturedir, resources).map_err(ctx),
        TextureType::Cube | TextureType::Skybox => {
            compile_cube(tex, modelfiledir, texturedir, resources).map_err(ctx)
        }
    }
}

fn load_rgb(
    path: &str,
    resources: &dyn Resources,
) -> Result<(usize, usize, Vec<u8>)> {
    let bytes = resources.read(path)?;
    if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
        let img = resources.decode_png(&bytes, path)?;
        if img.channels != 3 {
            return Err(CompileError::asset(format!(
                "texture PNG must be RGB, '{path}' has {} channels",
                img.channels
            )));
        }
        return Ok((img.width, img.height, img.data));
    }
    // Custom binary: w, h as i32 then w*h*3 RGB bytes.
    if bytes.len() < 8 {
        return Err(CompileError::asset(format!(
            "texture file too short: '{path}'"
        )));
    }
    let w = i32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
    let h = i32::from_ne_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    if w <= 0 || h <= 0 {
        return Err(CompileError::asset(format!(
            "invalid texture dims {w}x{h} in '{path}'"
        )));
    }
    let n = 3 * w as usize * h as usize;
    if bytes.len() != 8 + n {
        return Err(CompileError::asset(format!(
            "texture size mismatch in '{path}': expected {} bytes, got {}",
            8 + n,
            bytes.len()
        )));
    }
    Ok((w as usize, h as usize, bytes[8..].to_vec()))
}

fn flat_fill(w: usize, h: usize, rgb: [f64; 3]) -> Vec<u8> {
    let px = [
        (rgb[0].clamp(0.0, 1.0) * 255.0) as u8,
        (rgb[1].clamp(0.0, 1.0) * 255.0) as u8,
        (rgb[2].clamp(0.0, 1.0) * 255.0) as u8,
    ];
    px.iter().copied().cycle().take(3 * w * h).collect()
}

fn compile_2d(
    tex: &mut Texture,
    modelfiledir: &str,
    texturedir: &str,
    resources: &dyn Resources,
) -> Result<()> {
    if let Some(file) = tex.file.clone() {
        let path = resolve_path(modelfiledir, texturedir, &file);
        let (w, h, data) = load_rgb(&path, resources)?;
        tex.width = w;
        tex.height = h;
        tex.data = data;
        if tex.name.is_empty() {
            tex.name = file_stem(&file);
        }
    } else {
        if tex.width == 0 || tex.height == 0 {
            return Err(CompileError::spec("texture has empty size"));
        }
        tex.data = flat_fill(tex.width, tex.height, tex.rgb1);
    }
    Ok(())
}

/// Face index per grid symbol; `.` skips a cell.
fn face_index(symbol: char) -> Result<Option<usize>> {
    match symbol {
        '.' => Ok(None),
        'R' => Ok(Some(0)),
        'L' => Ok(Some(1)),
        'U' => Ok(Some(2)),
        'D' => Ok(Some(3)),
        'F' => Ok(Some(4)),
        'B' => Ok(Some(5)),
        other => Err(CompileError::asset(format!(
            "invalid cube grid symbol '{other}', expected one of \".RLUDFB\""
        ))),
    }
}

fn compile_cube(
    tex: &mut Texture,
    modelfiledir: &str,
    texturedir: &str,
    resources: &dyn Resources,
) -> Result<()> {
    // Face bitmaps in R L U D F B order; None = fill with rgb1.
    let mut faces: [Option<(usize, Vec<u8>)>; 6] = [None, None, None, None, None, None];
    let mut facesize = 0usize;

    if let Some(file) = tex.file.clone() {
        // Single file carrying a grid of faces.
        let path = resolve_path(modelfiledir, texturedir, &file);
        let (w, h, data) = load_rgb(&path, resources)?;
        let (rows, cols) = tex.gridsize;
        if rows == 0 || cols == 0 || rows * cols > 12 {
            return Err(CompileError::spec(format!(
                "invalid cube grid size {rows}x{cols}"
            )));
        }
        if tex.gridlayout.chars().count() != rows * cols {
            return Err(CompileError::asset(format!(
                "cube grid layout has {} symbols, grid needs {}",
                tex.gridlayout.chars().count(),
                rows * cols
            )));
        }
        if w % cols != 0 || h % rows != 0 || w / cols != h / rows {
            return Err(CompileError::asset(format!(
                "cube grid image {w}x{h} does not divide into square {rows}x{cols} cells"
            )));
        }
        facesize = w / cols;
        for (cell, symbol) in tex.gridlayout.chars().enumerate() {
            let Some(face) = face_index(symbol)? else {
                continue;
            };
            let (row, col) = (cell / cols, cell % cols);
            let mut bitmap = Vec::with_capacity(3 * facesize * facesize);
            for r in 0..facesize {
                let src = 3 * ((row * facesize + r) * w + col * facesize);
                bitmap.extend_from_slice(&data[src..src + 3 * facesize]);
            }
            faces[face] = Some((facesize, bitmap));
        }
        if tex.name.is_empty() {
            tex.name = file_stem(&file);
        }
    } else if tex.cubefiles.iter().any(Option::is_some) {
        // Six separate files; missing faces are filled below.
        for (face, file) in tex.cubefiles.clone().iter().enumerate() {
            let Some(file) = file else { continue };
            let path = resolve_path(modelfiledir, texturedir, file);
            let (w, h, data) = load_rgb(&path, resources)?;
            if w != h {
                return Err(CompileError::asset(format!(
                    "cube face must be square, '{path}' is {w}x{h}"
                )));
            }
            if facesize != 0 && w != facesize {
                return Err(CompileError::asset(format!(
                    "cube face size mismatch: '{path}' is {w}, expected {facesize}"
                )));
            }
            facesize = w;
            if tex.name.is_empty() {
                tex.name = file_stem(file);
            }
            faces[face] = Some((w, data));
        }
    } else {
        // Procedural flat cube.
        if tex.width == 0 {
            return Err(CompileError::spec("texture has empty size"));
        }
        facesize = tex.width;
    }

    if facesize == 0 {
        return Err(CompileError::asset("cube texture has no face data"));
    }

    // Stack faces vertically, filling gaps with rgb1.
    let fill = flat_fill(facesize, facesize, tex.rgb1);
    let mut data = Vec::with_capacity(3 * facesize * facesize * 6);
    for face in faces {
        match face {
            Some((_, bitmap)) => data.extend_from_slice(&bitmap),
            None => data.extend_from_slice(&fill),
        }
    }
    tex.width = facesize;
    tex.height = 6 * facesize;
    tex.data = data;
    Ok(())
}

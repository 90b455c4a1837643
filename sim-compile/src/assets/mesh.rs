//! Mesh asset compilation.
//!
//! Canonicalizes a mesh: loads file data when present, scales, validates
//! faces, synthesizes missing normals, computes volume/COM/inertia by the
//! divergence theorem, re-centers vertices to the COM and aligns them with
//! the principal inertia axes. The removed transform is kept on the asset so
//! geoms can compose it back in.

use nalgebra::{Matrix3, Rotation3, UnitQuaternion, Vector3};
use sim_model::ObjectType;

use crate::error::{CompileError, Result};
use crate::resources::{Resources, file_stem, resolve_path};
use crate::spec::asset::Mesh;

/// Volumes below this are degenerate.
const MIN_VOLUME: f64 = 1e-12;

/// Compile one mesh asset in place. `id` is used only for error context.
pub fn compile_mesh(
    mesh: &mut Mesh,
    id: usize,
    modelfiledir: &str,
    meshdir: &str,
    resources: &dyn Resources,
) -> Result<()> {
    compile_inner(mesh, modelfiledir, meshdir, resources)
        .map_err(|e| e.with_object(ObjectType::Mesh, mesh.name.clone(), id))
}

fn compile_inner(
    mesh: &mut Mesh,
    modelfiledir: &str,
    meshdir: &str,
    resources: &dyn Resources,
) -> Result<()> {
    // File data fills whatever the author did not give inline.
    if let Some(file) = mesh.file.clone() {
        let path = resolve_path(modelfiledir, meshdir, &file);
        let bytes = resources.read(&path)?;
        let parsed = parse_binary_mesh(&bytes, &path)?;
        if mesh.uservert.is_empty() {
            mesh.uservert = parsed.vert;
        }
        if mesh.usernormal.is_empty() {
            mesh.usernormal = parsed.normal;
        }
        if mesh.usertexcoord.is_empty() {
            mesh.usertexcoord = parsed.texcoord;
        }
        if mesh.userface.is_empty() {
            mesh.userface = parsed.face;
        }
        if mesh.name.is_empty() {
            mesh.name = file_stem(&file);
        }
    }

    if mesh.uservert.len() % 3 != 0 {
        return Err(CompileError::asset("vertex data size must be a multiple of 3"));
    }
    if mesh.userface.len() % 3 != 0 {
        return Err(CompileError::asset("face data size must be a multiple of 3"));
    }
    let nvert = mesh.uservert.len() / 3;
    let nface = mesh.userface.len() / 3;
    if nvert < 4 {
        return Err(CompileError::asset(format!(
            "mesh must have at least 4 vertices, has {nvert}"
        )));
    }
    if nface == 0 {
        return Err(CompileError::asset("mesh must specify faces"));
    }
    for &f in &mesh.userface {
        if f < 0 || f as usize >= nvert {
            return Err(CompileError::asset(format!(
                "face vertex index {f} out of range (nvert={nvert})"
            )));
        }
    }

    // Scale and finiteness.
    let scale = mesh.scale.unwrap_or_else(|| Vector3::new(1.0, 1.0, 1.0));
    let mut vert: Vec<Vector3<f64>> = mesh
        .uservert
        .chunks_exact(3)
        .map(|c| Vector3::new(c[0] * scale.x, c[1] * scale.y, c[2] * scale.z))
        .collect();
    if vert.iter().any(|v| !v.iter().all(|x| x.is_finite())) {
        return Err(CompileError::asset("mesh vertex data is not finite"));
    }

    // Volume, COM and second moments via signed tetrahedra against the origin.
    let faces: Vec<[usize; 3]> = mesh
        .userface
        .chunks_exact(3)
        .map(|f| [f[0] as usize, f[1] as usize, f[2] as usize])
        .collect();
    let mut volume = 0.0;
    let mut com = Vector3::zeros();
    for f in &faces {
        let (a, b, c) = (vert[f[0]], vert[f[1]], vert[f[2]]);
        let v = a.dot(&b.cross(&c)) / 6.0;
        volume += v;
        com += (a + b + c) / 4.0 * v;
    }
    if volume < MIN_VOLUME {
        return Err(CompileError::geometry(format!(
            "mesh volume is too small: {volume:.3e}"
        )));
    }
    com /= volume;

    // Second-moment matrix about the origin, then inertia about the COM.
    let mut p = Matrix3::zeros();
    for f in &faces {
        let (a, b, c) = (vert[f[0]], vert[f[1]], vert[f[2]]);
        let v = a.dot(&b.cross(&c)) / 6.0;
        let sum = a + b + c;
        p += (v / 20.0) * (a * a.transpose() + b * b.transpose() + c * c.transpose()
            + sum * sum.transpose());
    }
    let inertia_origin = Matrix3::identity() * p.trace() - p;
    let shift = Matrix3::identity() * com.dot(&com) - com * com.transpose();
    let inertia_com = inertia_origin - volume * shift;

    // Principal axes; ensure a right-handed eigenbasis.
    let eigen = inertia_com.symmetric_eigen();
    let principal = Vector3::new(
        eigen.eigenvalues[0].abs(),
        eigen.eigenvalues[1].abs(),
        eigen.eigenvalues[2].abs(),
    );
    let mut rot = eigen.eigenvectors;
    if rot.determinant() < 0.0 {
        rot.set_column(2, &(-rot.column(2)));
    }
    let quat = UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(rot));

    // Re-center and re-orient vertices into the principal frame.
    let inv = quat.inverse();
    for v in &mut vert {
        *v = inv * (*v - com);
    }

    mesh.refpos = com;
    mesh.refquat = quat;
    mesh.volume = volume;
    mesh.com = com;
    mesh.inertia = principal;
    mesh.inertia_quat = quat;
    mesh.vert = vert.iter().flat_map(|v| [v.x, v.y, v.z]).collect();
    mesh.face.clone_from(&mesh.userface);

    // Normals: keep author normals (rotated with the vertices), else
    // synthesize area-weighted vertex normals.
    if mesh.usernormal.is_empty() {
        let normals = vertex_normals(&vert, &faces);
        mesh.normal = normals.iter().flat_map(|n| [n.x, n.y, n.z]).collect();
        mesh.facenormal.clone_from(&mesh.userface);
    } else {
        if mesh.usernormal.len() % 3 != 0 {
            return Err(CompileError::asset("normal data size must be a multiple of 3"));
        }
        mesh.normal = mesh
            .usernormal
            .chunks_exact(3)
            .flat_map(|c| {
                let n = inv * Vector3::new(c[0], c[1], c[2]);
                [n.x, n.y, n.z]
            })
            .collect();
        mesh.facenormal.clone_from(&mesh.userface);
    }

    if !mesh.usertexcoord.is_empty() {
        if mesh.usertexcoord.len() % 2 != 0 {
            return Err(CompileError::asset("texcoord data size must be a multiple of 2"));
        }
        mesh.texcoord.clone_from(&mesh.usertexcoord);
    }

    // AABB as center + half-size over the canonical vertices.
    let mut lo = Vector3::repeat(f64::INFINITY);
    let mut hi = Vector3::repeat(f64::NEG_INFINITY);
    for v in &vert {
        lo = lo.inf(v);
        hi = hi.sup(v);
    }
    let center = (lo + hi) / 2.0;
    let half = (hi - lo) / 2.0;
    mesh.aabb = [center.x, center.y, center.z, half.x, half.y, half.z];

    Ok(())
}

/// Area-weighted per-vertex normals.
fn vertex_normals(vert: &[Vector3<f64>], faces: &[[usize; 3]]) -> Vec<Vector3<f64>> {
    let mut normals = vec![Vector3::zeros(); vert.len()];
    for f in faces {
        let n = (vert[f[1]] - vert[f[0]]).cross(&(vert[f[2]] - vert[f[0]]));
        for &i in f {
            normals[i] += n;
        }
    }
    for n in &mut normals {
        let len = n.norm();
        if len > 1e-12 {
            *n /= len;
        } else {
            *n = Vector3::z();
        }
    }
    normals
}

struct ParsedMesh {
    vert: Vec<f64>,
    normal: Vec<f64>,
    texcoord: Vec<f64>,
    face: Vec<i32>,
}

/// Binary mesh format: header `4 x i32` (nvert, nnormal, ntexcoord, nface)
/// followed by `f32` vertex, normal and texcoord blocks and an `i32` face
/// block, native endian.
fn parse_binary_mesh(bytes: &[u8], path: &str) -> Result<ParsedMesh> {
    let fail = |msg: &str| CompileError::asset(format!("{msg} in '{path}'"));
    if bytes.len() < 16 {
        return Err(fail("mesh file too short"));
    }
    let header: Vec<i32> = bytes[..16]
        .chunks_exact(4)
        .map(|c| i32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
        .collect();
    let (nvert, nnormal, ntexcoord, nface) = (header[0], header[1], header[2], header[3]);
    if nvert < 0 || nnormal < 0 || ntexcoord < 0 || nface < 0 {
        return Err(fail("negative count in mesh header"));
    }
    let nfloat = 3 * nvert as usize + 3 * nnormal as usize + 2 * ntexcoord as usize;
    let nint = 3 * nface as usize;
    let expected = 16 + 4 * (nfloat + nint);
    if bytes.len() != expected {
        return Err(fail(&format!(
            "mesh file size mismatch: expected {expected} bytes, got {}",
            bytes.len()
        )));
    }

    let mut offset = 16;
    let mut read_f32 = |n: usize| -> Vec<f64> {
        let out = bytes[offset..offset + 4 * n]
            .chunks_exact(4)
            .map(|c| f64::from(f32::from_ne_bytes([c[0], c[1], c[2], c[3]])))
            .collect();
        offset += 4 * n;
        out
    };
    let vert = read_f32(3 * nvert as usize);
    let normal = read_f32(3 * nnormal as usize);
    let texcoord = read_f32(2 * ntexcoord as usize);
    let face = bytes[offset..]
        .chunks_exact(4)
        .map(|c| i32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
        .collect();

    Ok(ParsedMesh {
        vert,
        normal,
        texcoord,
        face,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::resources::MemResources;
    use approx::assert_relative_eq;

    /// Axis-aligned unit cube centered at (0.5, 0.5, 0.5), 12 triangles with
    /// outward winding.
    fn cube() -> (Vec<f64>, Vec<i32>) {
        let vert = vec![
            0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 0.0, // bottom ring
            0.0, 0.0, 1.0, 1.0, 0.0, 1.0, 1.0, 1.0, 1.0, 0.0, 1.0, 1.0, // top ring
        ];
        let face = vec![
            0, 2, 1, 0, 3, 2, // -z
            4, 5, 6, 4, 6, 7, // +z
            0, 1, 5, 0, 5, 4, // -y
            3, 6, 2, 3, 7, 6, // +y
            1, 2, 6, 1, 6, 5, // +x
            0, 4, 7, 0, 7, 3, // -x
        ];
        (vert, face)
    }

    #[test]
    fn cube_volume_com_inertia() {
        let (vert, face) = cube();
        let mut mesh = Mesh {
            uservert: vert,
            userface: face,
            ..Mesh::default()
        };
        compile_mesh(&mut mesh, 0, "", "", &MemResources::new()).unwrap();

        assert_relative_eq!(mesh.volume, 1.0, epsilon = 1e-9);
        assert_relative_eq!(mesh.com.x, 0.5, epsilon = 1e-9);
        assert_relative_eq!(mesh.com.y, 0.5, epsilon = 1e-9);
        assert_relative_eq!(mesh.com.z, 0.5, epsilon = 1e-9);
        // Unit-density cube: I = m/6 on each axis for a unit cube.
        for k in 0..3 {
            assert_relative_eq!(mesh.inertia[k], 1.0 / 6.0, epsilon = 1e-6);
        }
        // Vertices are re-centered: the AABB is symmetric about the origin.
        assert_relative_eq!(mesh.aabb[0], 0.0, epsilon = 1e-9);
        assert_relative_eq!(mesh.aabb[3], 0.5, epsilon = 1e-9);
    }

    #[test]
    fn scale_applies_before_inertia() {
        let (vert, face) = cube();
        let mut mesh = Mesh {
            uservert: vert,
            userface: face,
            scale: Some(Vector3::new(2.0, 1.0, 1.0)),
            ..Mesh::default()
        };
        compile_mesh(&mut mesh, 0, "", "", &MemResources::new()).unwrap();
        assert_relative_eq!(mesh.volume, 2.0, epsilon = 1e-9);
    }

    #[test]
    fn too_few_vertices_fail() {
        let mut mesh = Mesh {
            uservert: vec![0.0; 9],
            userface: vec![0, 1, 2],
            ..Mesh::default()
        };
        let err = compile_mesh(&mut mesh, 0, "", "", &MemResources::new()).unwrap_err();
        assert!(err.to_string().contains("at least 4 vertices"));
    }

    #[test]
    fn flat_mesh_fails_with_degenerate_volume() {
        // Two triangles in the z=0 plane: zero enclosed volume.
        let mut mesh = Mesh {
            uservert: vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 0.0],
            userface: vec![0, 1, 2, 0, 2, 3],
            ..Mesh::default()
        };
        let err = compile_mesh(&mut mesh, 0, "", "", &MemResources::new()).unwrap_err();
        assert!(err.to_string().contains("volume"));
    }

    #[test]
    fn face_index_out_of_range_fails() {
        let mut mesh = Mesh {
            uservert: vec![0.0; 12],
            userface: vec![0, 1, 9],
            ..Mesh::default()
        };
        assert!(compile_mesh(&mut mesh, 0, "", "", &MemResources::new()).is_err());
    }

    #[test]
    fn binary_file_round_trip_and_naming() {
        let (vert, face) = cube();
        let mut bytes = Vec::new();
        for n in [8i32, 0, 0, 12] {
            bytes.extend_from_slice(&n.to_ne_bytes());
        }
        for v in &vert {
            bytes.extend_from_slice(&(*v as f32).to_ne_bytes());
        }
        for f in &face {
            bytes.extend_from_slice(&f.to_ne_bytes());
        }
        let mut res = MemResources::new();
        res.insert("assets/box.msh", bytes);

        let mut mesh = Mesh {
            file: Some("box.msh".to_string()),
            ..Mesh::default()
        };
        compile_mesh(&mut mesh, 0, "", "assets", &res).unwrap();
        assert_eq!(mesh.name, "box", "unnamed mesh takes the file stem");
        assert_relative_eq!(mesh.volume, 1.0, epsilon = 1e-6);
        assert_eq!(mesh.face.len(), 36);
    }

    #[test]
    fn truncated_binary_file_fails() {
        let mut res = MemResources::new();
        res.insert("bad.msh", vec![1, 2, 3]);
        let mut mesh = Mesh {
            file: Some("bad.msh".to_string()),
            ..Mesh::default()
        };
        let err = compile_mesh(&mut mesh, 0, "", "", &res).unwrap_err();
        assert!(err.to_string().contains("too short"));
    }
}

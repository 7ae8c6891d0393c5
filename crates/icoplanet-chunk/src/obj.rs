//! Wavefront OBJ export of the committed chunk mesh.

use std::io::{self, Write};

use crate::mesh::ChunkMeshGenerator;

/// Write every vertex referenced by the index buffer and every triangle.
///
/// Vertices are renumbered densely in first-use order; OBJ indices start at 1.
pub fn write_obj<W: Write>(chunks: &ChunkMeshGenerator, mut writer: W) -> io::Result<()> {
    let buffers = chunks.buffers();
    let mut remap = vec![0u32; buffers.vertices().len()];
    let mut next = 1u32;
    let mut order = Vec::new();
    for &index in buffers.indices() {
        let slot = &mut remap[index as usize];
        if *slot == 0 {
            *slot = next;
            next += 1;
            order.push(index);
        }
    }

    writeln!(writer, "# icoplanet: {} chunks", chunks.chunk_count())?;
    for &index in &order {
        let [x, y, z] = buffers.vertex(index).position;
        writeln!(writer, "v {x} {y} {z}")?;
    }
    for &index in &order {
        let [x, y, z] = buffers.vertex(index).normal;
        writeln!(writer, "vn {x} {y} {z}")?;
    }
    for triangle in buffers.indices().chunks_exact(3) {
        let [a, b, c] = [0, 1, 2].map(|i| remap[triangle[i] as usize]);
        writeln!(writer, "f {a}//{a} {b}//{b} {c}//{c}")?;
    }
    writer.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use icoplanet_math::UnitScale;
    use icoplanet_skeleton::{SkTriId, SphereSurface, TerrainParams, TerrainSkeleton};

    fn chunked() -> ChunkMeshGenerator {
        let params = TerrainParams {
            radius_m: 100.0,
            min_height_m: 0.0,
            max_height_m: 0.0,
            scale: UnitScale::new(8),
        };
        let terrain =
            TerrainSkeleton::new(params, Box::new(SphereSurface { radius_m: 100.0 })).unwrap();
        let mut chunks = ChunkMeshGenerator::new(3, 4, 64);
        chunks.chunk_add(&terrain, SkTriId(0)).unwrap();
        chunks.chunk_add(&terrain, SkTriId(1)).unwrap();
        chunks
    }

    #[test]
    fn test_obj_counts() {
        let chunks = chunked();
        let mut out = Vec::new();
        write_obj(&chunks, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        let count = |prefix: &str| text.lines().filter(|l| l.starts_with(prefix)).count();
        let vertices = chunks.stats().shared_vertices as usize;
        assert_eq!(count("v "), vertices);
        assert_eq!(count("vn "), vertices);
        assert_eq!(count("f "), 8);
        assert!(text.lines().filter(|l| l.starts_with("f ")).all(|l| !l.contains(" 0/")));
    }

    #[test]
    fn test_obj_to_file() {
        let chunks = chunked();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mesh.obj");
        write_obj(&chunks, std::fs::File::create(&path).unwrap()).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("# icoplanet: 2 chunks"));
    }
}

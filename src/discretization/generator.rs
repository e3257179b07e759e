use super::mesh::{Cell, Face, Mesh, Node};
use glam::DVec3;
use meshless_voronoi::{Dimensionality, Voronoi};

/// Build the raw Voronoi diagram using the external library.
pub fn build_voronoi(generators: &[DVec3], width: [f64; 3]) -> Voronoi {
    Voronoi::build(
        generators,
        [-width[0] / 2.0, -width[1] / 2.0, -width[2] / 2.0].into(),
        width.into(),
        Dimensionality::ThreeD,
        false,
    )
}

/// Convert a `Voronoi` diagram into the library's [`Mesh`] representation.
pub fn parse_voronoi(voronoi: &Voronoi, generators: &[DVec3]) -> Mesh {
    let cells = voronoi
        .cells()
        .into_iter()
        .enumerate()
        .map(|(cell_id, cell)| Cell {
            id: cell_id,
            volume: cell.volume(),
            centroid: cell.centroid().to_array(),
            face_ids: cell.face_indices(voronoi).to_vec(),
        })
        .collect();

    let faces = voronoi
        .faces()
        .into_iter()
        .map(|face| Face {
            area: face.area(),
            normal: face.normal().to_array(),
            neighbor_cell_ids: (face.left(), face.right()),
            centroid: face.centroid().to_array(),
        })
        .collect();

    let nodes = generators
        .iter()
        .map(|g| Node {
            position: g.to_array(),
        })
        .collect();

    Mesh {
        cells,
        faces,
        nodes,
    }
}

/// Convenience wrapper that builds and immediately parses a Voronoi mesh.
pub fn create_voronoi_mesh(generators: &[DVec3], width: [f64; 3]) -> Mesh {
    let voronoi = build_voronoi(generators, width);
    parse_voronoi(&voronoi, generators)
}

/// Create a flat 3D Voronoi mesh from a 2D point cloud.
/// The mesh will have a single cell thickness in the z-direction.
pub fn create_flat_3d_mesh(points_2d: &[(f64, f64)], width: [f64; 2], thickness: f64) -> Mesh {
    let generators: Vec<DVec3> = points_2d
        .iter()
        .map(|(x, y)| DVec3::new(*x - width[0] / 2.0, *y - width[1] / 2.0, 0.0))
        .collect();

    create_voronoi_mesh(&generators, [width[0], width[1], thickness])
}

/// Create a regular 2D grid of points in the range [0, width[0]] × [0, width[1]].
pub fn create_regular_2d_grid(width: [f64; 2], nx: usize, ny: usize) -> Vec<(f64, f64)> {
    let dx = width[0] / nx as f64;
    let dy = width[1] / ny as f64;

    (0..ny)
        .flat_map(|j| (0..nx).map(move |i| ((i as f64 + 0.5) * dx, (j as f64 + 0.5) * dy)))
        .collect()
}

/// Build a 1D tensor mesh along x from sorted cell edges.
///
/// Every cell has the same `cross_section` area, so volumes are
/// `width * cross_section`. The two end faces are boundary faces whose
/// normals point out of the domain.
pub fn create_tensor_line_mesh(edges: &[f64], cross_section: f64) -> Mesh {
    let n = edges.len().saturating_sub(1);
    let mut cells = Vec::with_capacity(n);
    let mut faces = Vec::with_capacity(n + 1);

    if n == 0 {
        return Mesh {
            cells,
            faces,
            nodes: Vec::new(),
        };
    }

    // face i sits at edges[i]
    faces.push(Face {
        area: cross_section,
        normal: [-1.0, 0.0, 0.0],
        neighbor_cell_ids: (0, None),
        centroid: [edges[0], 0.0, 0.0],
    });
    for i in 1..n {
        faces.push(Face {
            area: cross_section,
            normal: [1.0, 0.0, 0.0],
            neighbor_cell_ids: (i - 1, Some(i)),
            centroid: [edges[i], 0.0, 0.0],
        });
    }
    faces.push(Face {
        area: cross_section,
        normal: [1.0, 0.0, 0.0],
        neighbor_cell_ids: (n - 1, None),
        centroid: [edges[n], 0.0, 0.0],
    });

    for i in 0..n {
        let width = edges[i + 1] - edges[i];
        cells.push(Cell {
            id: i,
            volume: width * cross_section,
            centroid: [0.5 * (edges[i] + edges[i + 1]), 0.0, 0.0],
            face_ids: vec![i, i + 1],
        });
    }

    let nodes = cells
        .iter()
        .map(|c| Node {
            position: c.centroid,
        })
        .collect();

    Mesh {
        cells,
        faces,
        nodes,
    }
}

/// Uniform line mesh on `[0, length]` with `n_cells` cells.
pub fn create_uniform_line_mesh(length: f64, n_cells: usize, cross_section: f64) -> Mesh {
    let h = length / n_cells.max(1) as f64;
    let edges: Vec<f64> = (0..=n_cells).map(|i| i as f64 * h).collect();
    create_tensor_line_mesh(&edges, cross_section)
}

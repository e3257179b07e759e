/// The complete computational grid.
#[derive(Clone, Debug)]
pub struct Mesh {
    pub cells: Vec<Cell>,
    pub faces: Vec<Face>,
    pub nodes: Vec<Node>,
}

/// A single control volume.
#[derive(Clone, Debug)]
pub struct Cell {
    pub id: usize,
    pub volume: f64,
    pub centroid: [f64; 3],
    pub face_ids: Vec<usize>,
}

/// An interface between two cells.
#[derive(Clone, Debug)]
pub struct Face {
    pub area: f64,
    /// Unit normal. For boundary faces it points out of the domain.
    pub normal: [f64; 3],
    /// Tuple of (cell1_id, optional cell2_id). `None` indicates a boundary face.
    pub neighbor_cell_ids: (usize, Option<usize>),
    pub centroid: [f64; 3],
}

#[derive(Clone, Debug)]
pub struct Node {
    pub position: [f64; 3],
}

impl Mesh {
    pub fn n_cells(&self) -> usize {
        self.cells.len()
    }

    /// Index of the cell whose centroid is closest to `point`.
    /// Returns `None` for an empty mesh.
    pub fn nearest_cell(&self, point: [f64; 3]) -> Option<usize> {
        self.cells
            .iter()
            .map(|cell| (cell.id, distance(cell.centroid, point)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(id, _)| id)
    }

    pub fn boundary_faces(&self) -> impl Iterator<Item = (usize, &Face)> {
        self.faces
            .iter()
            .enumerate()
            .filter(|(_, face)| face.neighbor_cell_ids.1.is_none())
    }
}

/// Euclidean distance between two points.
#[inline]
pub fn distance(p1: [f64; 3], p2: [f64; 3]) -> f64 {
    (0..=2).map(|i| (p2[i] - p1[i]).powi(2)).sum::<f64>().sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discretization::generator::create_uniform_line_mesh;

    #[test]
    fn nearest_cell_picks_closest_centroid() {
        let mesh = create_uniform_line_mesh(1.0, 10, 1.0);
        assert_eq!(mesh.nearest_cell([0.0, 0.0, 0.0]), Some(0));
        assert_eq!(mesh.nearest_cell([0.26, 0.0, 0.0]), Some(2));
        assert_eq!(mesh.nearest_cell([5.0, 0.0, 0.0]), Some(9));
    }

    #[test]
    fn line_mesh_has_two_boundary_faces() {
        let mesh = create_uniform_line_mesh(2.0, 4, 1.0);
        assert_eq!(mesh.boundary_faces().count(), 2);
        assert_eq!(mesh.n_cells(), 4);
    }
}

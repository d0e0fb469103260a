//! Planar grid partitioning of a point set
//!
//! The xy extent of the points is cut into a grid of roughly square cells so
//! that each cell can be regularized on its own.

use pointclass_core::{BoundingBox, Point3f};
use rayon::prelude::*;

/// Lower bound on the number of requested subdivisions
pub const MIN_SUBDIVISIONS: usize = 4;

/// Disjoint cover of a point set by grid cells
#[derive(Debug, Clone, PartialEq)]
pub struct GridPartition {
    /// Cell boxes, x-major then y
    pub cells: Vec<BoundingBox>,
    /// Point indices per cell
    pub indices: Vec<Vec<usize>>,
    /// Number of columns along x
    pub nb_x: usize,
    /// Number of rows along y
    pub nb_y: usize,
    /// `(cell, local index)` per point
    membership: Vec<(usize, usize)>,
}

impl GridPartition {
    /// Split `points` into about `subdivisions` cells (at least [`MIN_SUBDIVISIONS`])
    ///
    /// A point on a shared cell boundary belongs to the first cell that
    /// contains it, in x-major, y-minor order.
    pub fn new(points: &[Point3f], subdivisions: usize) -> Self {
        let bbox = match BoundingBox::from_points(points) {
            Some(bbox) => bbox,
            None => {
                return Self {
                    cells: Vec::new(),
                    indices: Vec::new(),
                    nb_x: 0,
                    nb_y: 0,
                    membership: Vec::new(),
                }
            }
        };

        let (nb_x, nb_y) = grid_dimensions(&bbox, subdivisions.max(MIN_SUBDIVISIONS));
        let cells = grid_cells(&bbox, nb_x, nb_y);

        let cell_of: Vec<usize> = points
            .par_iter()
            .map(|p| cells.iter().position(|c| c.contains(p)).unwrap_or(0))
            .collect();

        let mut indices = vec![Vec::new(); cells.len()];
        let mut membership = Vec::with_capacity(points.len());
        for (i, &cell) in cell_of.iter().enumerate() {
            membership.push((cell, indices[cell].len()));
            indices[cell].push(i);
        }

        Self {
            cells,
            indices,
            nb_x,
            nb_y,
            membership,
        }
    }

    /// Cell holding point `point`
    pub fn cell_of(&self, point: usize) -> usize {
        self.membership[point].0
    }

    /// `(cell, index within the cell)` of point `point`
    pub fn locate(&self, point: usize) -> (usize, usize) {
        self.membership[point]
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Cells that received at least one point
    pub fn non_empty(&self) -> impl Iterator<Item = (usize, &[usize])> + '_ {
        self.indices
            .iter()
            .enumerate()
            .filter(|(_, idx)| !idx.is_empty())
            .map(|(cell, idx)| (cell, idx.as_slice()))
    }
}

/// Grid columns and rows for a box and a target cell count
///
/// The cell side is the square root of the box area divided by the target;
/// degenerate (zero-area) boxes get a single cell.
pub fn grid_dimensions(bbox: &BoundingBox, subdivisions: usize) -> (usize, usize) {
    let dx = bbox.width();
    let dy = bbox.depth();
    let area = dx * dy;
    let cell_area = area / subdivisions as f32;

    if !(cell_area > 0.0) || !cell_area.is_finite() {
        return (1, 1);
    }

    let side = cell_area.sqrt();
    let nb_x = (dx / side) as usize + 1;
    let nb_y = (area / nb_x as f32 / cell_area) as usize + 1;
    (nb_x, nb_y)
}

fn grid_cells(bbox: &BoundingBox, nb_x: usize, nb_y: usize) -> Vec<BoundingBox> {
    let dx = bbox.width();
    let dy = bbox.depth();
    let mut cells = Vec::with_capacity(nb_x * nb_y);

    for x in 0..nb_x {
        for y in 0..nb_y {
            let min = Point3f::new(
                bbox.min.x + dx * (x as f32 / nb_x as f32),
                bbox.min.y + dy * (y as f32 / nb_y as f32),
                bbox.min.z,
            );
            let max = Point3f::new(
                if x == nb_x - 1 {
                    bbox.max.x
                } else {
                    bbox.min.x + dx * ((x + 1) as f32 / nb_x as f32)
                },
                if y == nb_y - 1 {
                    bbox.max.y
                } else {
                    bbox.min.y + dy * ((y + 1) as f32 / nb_y as f32)
                },
                bbox.max.z,
            );
            cells.push(BoundingBox::new(min, max));
        }
    }

    cells
}

use geo::{BoundingRect, Geometry, Rect};
use rstar::{RTree, RTreeObject, AABB};

/// Envelope of one donor geometry, indexed by its row.
#[derive(Debug, Clone)]
pub(super) struct BoundingBox {
    row: usize,
    bbox: Rect<f64>,
}

impl BoundingBox {
    pub(super) fn new(row: usize, bbox: Rect<f64>) -> Self {
        Self { row, bbox }
    }

    /// Row of the donor geometry.
    #[inline] pub(super) fn row(&self) -> usize { self.row }
}

impl RTreeObject for BoundingBox {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(self.bbox.min().into(), self.bbox.max().into())
    }
}

/// R-tree over every non-empty geometry.
pub(super) fn index(geometry: &[Option<Geometry<f64>>]) -> RTree<BoundingBox> {
    RTree::bulk_load(geometry.iter().enumerate()
        .filter_map(|(row, geom)| Some(BoundingBox::new(row, geom.as_ref()?.bounding_rect()?)))
        .collect())
}

/// Rows whose envelope meets `geom`'s, ascending.
pub(super) fn candidates(tree: &RTree<BoundingBox>, geom: &Geometry<f64>) -> Vec<usize> {
    let Some(rect) = geom.bounding_rect() else { return Vec::new() };
    let search = AABB::from_corners(rect.min().into(), rect.max().into());
    let mut rows: Vec<usize> = tree.locate_in_envelope_intersecting(&search).map(BoundingBox::row).collect();
    rows.sort_unstable();
    rows
}

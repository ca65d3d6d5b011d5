//! Hierarchical greedy point clustering for map display.
//!
//! Points are projected to the unit Web-Mercator square. Starting from the
//! raw points at `max_zoom + 1`, each lower zoom level is built from the one
//! above it: every not-yet-consumed item, in order, absorbs all unconsumed
//! items within `pixel_radius` screen pixels of it. A merged item's
//! centroid is the mean of its member coordinates.
//!
//! Neighbour candidates come from a uniform grid whose cell size equals the
//! merge radius, so a level costs roughly linear time. Seeds are visited in
//! input order and candidates in ascending position, which makes the
//! partition reproducible for a given input.

use std::collections::HashMap;
use std::f64::consts::PI;

use crate::map::viewport::BoundingBox;
use crate::model::GeoPoint;

pub type ClusterId = usize;

/// Smallest neighbour-grid cell, in unit-square coordinates.
const MIN_CELL_SIZE: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusterOptions {
    /// Merge radius in screen pixels.
    pub pixel_radius: f64,
    /// Highest zoom at which merging still happens.
    pub max_zoom: u8,
    pub min_zoom: u8,
    /// Tile size in pixels the radius is measured against.
    pub extent: f64,
}

impl Default for ClusterOptions {
    fn default() -> Self {
        ClusterOptions {
            pixel_radius: 40.0,
            max_zoom: 16,
            min_zoom: 0,
            extent: 512.0,
        }
    }
}

/// One entry visible at a zoom level: a multi-point cluster or a single
/// point.
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    pub id: ClusterId,
    pub centroid: GeoPoint,
    pub member_count: usize,
    /// Index into the input slice when this entry is a single point.
    pub point_index: Option<usize>,
}

impl Cluster {
    pub fn is_singleton(&self) -> bool {
        self.member_count == 1
    }
}

#[derive(Debug, Clone)]
struct Node {
    x: f64,
    y: f64,
    lat_sum: f64,
    lon_sum: f64,
    count: usize,
    point_index: Option<usize>,
    children: Vec<ClusterId>,
    /// Zoom whose level first contains this node as a merge result.
    formed_at: Option<u8>,
}

impl Node {
    fn leaf(index: usize, point: GeoPoint) -> Node {
        Node {
            x: project_x(point.lon),
            y: project_y(point.lat),
            lat_sum: point.lat,
            lon_sum: point.lon,
            count: 1,
            point_index: Some(index),
            children: Vec::new(),
            formed_at: None,
        }
    }

    fn centroid(&self) -> GeoPoint {
        let n = self.count as f64;
        GeoPoint::new(self.lat_sum / n, self.lon_sum / n)
    }
}

fn project_x(lon: f64) -> f64 {
    lon / 360.0 + 0.5
}

fn project_y(lat: f64) -> f64 {
    let sin = lat.to_radians().sin();
    let y = 0.5 - 0.25 * ((1.0 + sin) / (1.0 - sin)).ln() / PI;
    y.clamp(0.0, 1.0)
}

/// Spatial index over one fixed set of points, covering every zoom level.
#[derive(Debug, Clone)]
pub struct ClusterIndex {
    options: ClusterOptions,
    nodes: Vec<Node>,
    /// `levels[z]` lists the node ids visible at zoom `z`.
    levels: Vec<Vec<ClusterId>>,
}

impl ClusterIndex {
    /// Builds the full hierarchy. Points with non-finite coordinates are
    /// dropped; the remaining points keep their original indices.
    pub fn build(points: &[GeoPoint], options: ClusterOptions) -> ClusterIndex {
        let min_zoom = options.min_zoom.min(options.max_zoom);
        let top = options.max_zoom as usize + 1;

        let mut nodes: Vec<Node> = points
            .iter()
            .enumerate()
            .filter(|(_, p)| p.is_valid())
            .map(|(i, p)| Node::leaf(i, *p))
            .collect();

        let mut levels = vec![Vec::new(); top + 1];
        levels[top] = (0..nodes.len()).collect();

        for zoom in (min_zoom as usize..top).rev() {
            let radius = options.pixel_radius / (options.extent * 2f64.powi(zoom as i32));
            levels[zoom] = merge_level(&mut nodes, &levels[zoom + 1], zoom as u8, radius);
        }

        ClusterIndex { options: ClusterOptions { min_zoom, ..options }, nodes, levels }
    }

    pub fn options(&self) -> &ClusterOptions {
        &self.options
    }

    /// Number of indexed (valid) points.
    pub fn point_count(&self) -> usize {
        self.levels.last().map_or(0, Vec::len)
    }

    fn level_for(&self, zoom: f64) -> usize {
        let lo = self.options.min_zoom as f64;
        let hi = self.options.max_zoom as f64 + 1.0;
        if zoom.is_nan() {
            return lo as usize;
        }
        zoom.floor().clamp(lo, hi) as usize
    }

    fn describe(&self, id: ClusterId) -> Cluster {
        let node = &self.nodes[id];
        Cluster {
            id,
            centroid: node.centroid(),
            member_count: node.count,
            point_index: node.point_index,
        }
    }

    /// Entries visible at `zoom` whose centroid lies inside `bbox`.
    pub fn clusters(&self, bbox: &BoundingBox, zoom: f64) -> Vec<Cluster> {
        self.levels[self.level_for(zoom)]
            .iter()
            .filter(|&&id| bbox.contains(self.nodes[id].centroid()))
            .map(|&id| self.describe(id))
            .collect()
    }

    /// Lowest zoom at which `id` is shown as its direct children. `None`
    /// for unknown ids and for single points.
    pub fn expansion_zoom(&self, id: ClusterId) -> Option<u8> {
        self.nodes.get(id)?.formed_at.map(|zoom| zoom + 1)
    }

    /// Direct children of a cluster; empty for a single point.
    pub fn children(&self, id: ClusterId) -> Option<Vec<Cluster>> {
        let node = self.nodes.get(id)?;
        Some(node.children.iter().map(|&child| self.describe(child)).collect())
    }

    /// Input indices of every point under `id`, in ascending order.
    pub fn leaves(&self, id: ClusterId) -> Vec<usize> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            let Some(node) = self.nodes.get(current) else {
                continue;
            };
            match node.point_index {
                Some(index) => out.push(index),
                None => stack.extend(node.children.iter().copied()),
            }
        }
        out.sort_unstable();
        out
    }
}

/// Builds one level from the level above it.
fn merge_level(nodes: &mut Vec<Node>, input: &[ClusterId], zoom: u8, radius: f64) -> Vec<ClusterId> {
    // Grid cells never shrink below MIN_CELL_SIZE, so a zero or denormal
    // radius still yields bounded cell coordinates. Any merge partner lies
    // within `radius <= cell_size` and therefore in an adjacent cell.
    let cell_size = radius.max(MIN_CELL_SIZE);
    let cell = |v: f64| (v / cell_size).floor() as i64;

    let mut grid: HashMap<(i64, i64), Vec<usize>> = HashMap::new();
    for (pos, &id) in input.iter().enumerate() {
        grid.entry((cell(nodes[id].x), cell(nodes[id].y))).or_default().push(pos);
    }

    let r2 = radius * radius;
    let mut consumed = vec![false; input.len()];
    let mut output = Vec::with_capacity(input.len());
    let mut candidates = Vec::new();

    for (pos, &seed) in input.iter().enumerate() {
        if consumed[pos] {
            continue;
        }
        consumed[pos] = true;

        let (sx, sy) = (nodes[seed].x, nodes[seed].y);
        let (cx, cy) = (cell(sx), cell(sy));

        candidates.clear();
        for gx in cx.saturating_sub(1)..=cx.saturating_add(1) {
            for gy in cy.saturating_sub(1)..=cy.saturating_add(1) {
                if let Some(bucket) = grid.get(&(gx, gy)) {
                    candidates.extend(bucket.iter().copied());
                }
            }
        }
        candidates.sort_unstable();

        let mut members = vec![seed];
        for &other_pos in &candidates {
            if consumed[other_pos] {
                continue;
            }
            let other = &nodes[input[other_pos]];
            let (dx, dy) = (other.x - sx, other.y - sy);
            if dx * dx + dy * dy <= r2 {
                consumed[other_pos] = true;
                members.push(input[other_pos]);
            }
        }

        if members.len() == 1 {
            output.push(seed);
            continue;
        }

        let (lat_sum, lon_sum, count) = members.iter().fold((0.0, 0.0, 0), |(la, lo, n), &m| {
            (la + nodes[m].lat_sum, lo + nodes[m].lon_sum, n + nodes[m].count)
        });
        let centroid = GeoPoint::new(lat_sum / count as f64, lon_sum / count as f64);

        nodes.push(Node {
            x: project_x(centroid.lon),
            y: project_y(centroid.lat),
            lat_sum,
            lon_sum,
            count,
            point_index: None,
            children: members,
            formed_at: Some(zoom),
        });
        output.push(nodes.len() - 1);
    }

    output
}

/// One-shot clustering for a viewport: build, query, discard.
pub fn cluster(
    points: &[GeoPoint],
    bbox: &BoundingBox,
    zoom: f64,
    options: ClusterOptions,
) -> Vec<Cluster> {
    ClusterIndex::build(points, options).clusters(bbox, zoom)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn turkey() -> BoundingBox {
        BoundingBox::new(25.0, 35.0, 45.0, 43.0)
    }

    /// Two points 0.001° of longitude apart.
    fn close_pair() -> Vec<GeoPoint> {
        vec![GeoPoint::new(39.0, 35.0), GeoPoint::new(39.0, 35.001)]
    }

    #[test]
    fn test_close_pair_merges_into_one_cluster() {
        let found = cluster(&close_pair(), &turkey(), 10.0, ClusterOptions::default());
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].member_count, 2);
        assert_eq!(found[0].point_index, None);
        assert!((found[0].centroid.lon - 35.0005).abs() < 1e-9);
        assert!((found[0].centroid.lat - 39.0).abs() < 1e-9);
    }

    #[test]
    fn test_cluster_splits_at_expansion_zoom() {
        let index = ClusterIndex::build(&close_pair(), ClusterOptions::default());
        let merged = index.clusters(&turkey(), 10.0);
        let expansion = index.expansion_zoom(merged[0].id).expect("merged cluster has expansion zoom");

        // 0.001° is ~2.8e-6 of the world width: 40px covers it up to zoom 14.
        assert_eq!(expansion, 15);

        let below = index.clusters(&turkey(), expansion as f64 - 1.0);
        assert_eq!(below.len(), 1);

        let split = index.clusters(&turkey(), expansion as f64);
        assert_eq!(split.len(), 2);
        assert!(split.iter().all(Cluster::is_singleton));
        let mut indices: Vec<usize> = split.iter().filter_map(|c| c.point_index).collect();
        indices.sort_unstable();
        assert_eq!(indices, vec![0, 1]);
    }

    #[test]
    fn test_clusters_merge_again_at_lower_zoom() {
        let mut points = close_pair();
        points.push(GeoPoint::new(39.0, 35.05));
        let index = ClusterIndex::build(&points, ClusterOptions::default());

        let top = index.clusters(&turkey(), 5.0);
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].member_count, 3);
        assert_eq!(index.expansion_zoom(top[0].id), Some(10));

        let children = index.children(top[0].id).expect("known id");
        let mut counts: Vec<usize> = children.iter().map(|c| c.member_count).collect();
        counts.sort_unstable();
        assert_eq!(counts, vec![1, 2]);

        let at_ten = index.clusters(&turkey(), 10.0);
        assert_eq!(at_ten.len(), 2);
        assert_eq!(index.leaves(top[0].id), vec![0, 1, 2]);
    }

    #[test]
    fn test_distant_points_never_merge() {
        let points = vec![GeoPoint::new(38.0, 27.0), GeoPoint::new(40.0, 43.0)];
        for zoom in [3.0, 6.0, 12.0] {
            let found = cluster(&points, &turkey(), zoom, ClusterOptions::default());
            assert_eq!(found.len(), 2, "zoom {}", zoom);
        }
    }

    #[test]
    fn test_non_finite_points_are_excluded() {
        let points = vec![
            GeoPoint::new(39.0, 35.0),
            GeoPoint::new(f64::NAN, 35.0),
            GeoPoint::new(39.0, f64::INFINITY),
            GeoPoint::new(39.0, 35.001),
        ];
        let index = ClusterIndex::build(&points, ClusterOptions::default());
        assert_eq!(index.point_count(), 2);

        let found = index.clusters(&BoundingBox::world(), 8.0);
        assert_eq!(found.len(), 1);
        assert_eq!(index.leaves(found[0].id), vec![0, 3]);
    }

    #[test]
    fn test_coincident_points_resolve_only_past_max_zoom() {
        let points = vec![GeoPoint::new(39.0, 35.0), GeoPoint::new(39.0, 35.0)];
        let index = ClusterIndex::build(&points, ClusterOptions::default());
        let found = index.clusters(&turkey(), 16.0);
        assert_eq!(found.len(), 1);
        assert_eq!(index.expansion_zoom(found[0].id), Some(17));
        assert_eq!(index.clusters(&turkey(), 30.0).len(), 2, "zoom clamps to raw level");
    }

    #[test]
    fn test_partition_is_reproducible() {
        let points: Vec<GeoPoint> = (0..60)
            .map(|i| GeoPoint::new(36.0 + (i % 7) as f64 * 0.9, 27.0 + (i % 11) as f64 * 1.3))
            .collect();
        let a = cluster(&points, &turkey(), 5.0, ClusterOptions::default());
        let b = cluster(&points, &turkey(), 5.0, ClusterOptions::default());
        assert_eq!(a, b);
        let total: usize = a.iter().map(|c| c.member_count).sum();
        assert!(total <= points.len());
    }

    #[test]
    fn test_query_respects_antimeridian_bbox() {
        let points = vec![GeoPoint::new(-20.0, 179.5), GeoPoint::new(-20.0, -179.5), GeoPoint::new(-20.0, 0.0)];
        let pacific = BoundingBox::new(170.0, -50.0, -170.0, 0.0);
        let found = cluster(&points, &pacific, 10.0, ClusterOptions::default());
        let mut indices: Vec<usize> = found.iter().filter_map(|c| c.point_index).collect();
        indices.sort_unstable();
        assert_eq!(indices, vec![0, 1]);
    }

    #[test]
    fn test_unknown_and_leaf_ids() {
        let index = ClusterIndex::build(&close_pair(), ClusterOptions::default());
        assert_eq!(index.expansion_zoom(0), None);
        assert_eq!(index.expansion_zoom(999), None);
        assert_eq!(index.children(0), Some(Vec::new()));
        assert!(index.children(999).is_none());
    }

    #[test]
    fn test_zero_radius_merges_only_coincident_points() {
        let points = vec![
            GeoPoint::new(39.0, 35.0),
            GeoPoint::new(39.0, 35.0),
            GeoPoint::new(39.0, 35.0001),
        ];
        let options = ClusterOptions { pixel_radius: 0.0, ..ClusterOptions::default() };
        let found = cluster(&points, &turkey(), 3.0, options);

        let mut counts: Vec<usize> = found.iter().map(|c| c.member_count).collect();
        counts.sort_unstable();
        assert_eq!(counts, vec![1, 2]);
    }

    #[test]
    fn test_tiny_radius_builds_without_overflow() {
        let points = vec![GeoPoint::new(39.0, 35.0), GeoPoint::new(39.0, 35.0), GeoPoint::new(40.0, 36.0)];
        let options = ClusterOptions { pixel_radius: 1e-20, ..ClusterOptions::default() };
        let index = ClusterIndex::build(&points, options);

        assert_eq!(index.point_count(), 3);
        assert_eq!(index.clusters(&turkey(), 0.0).len(), 2);
        assert_eq!(index.clusters(&turkey(), 17.0).len(), 3);
    }

    #[test]
    fn test_empty_input() {
        let index = ClusterIndex::build(&[], ClusterOptions::default());
        assert_eq!(index.point_count(), 0);
        assert!(index.clusters(&BoundingBox::world(), 3.0).is_empty());
    }
}

//! Rectangle packer for atlas tiles
//!
//! A binary-split packer stored as an arena of node records with
//! parent/child indices. Free slots are recycled through a free list, so
//! churn from tile resize does not grow the arena without bound.

/// Tile rectangle in atlas texels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }

    pub fn overlaps(&self, other: &Rect) -> bool {
        self.x < other.x + other.width
            && other.x < self.x + self.width
            && self.y < other.y + other.height
            && other.y < self.y + self.height
    }
}

/// Handle to an allocated tile rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileId(u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeState {
    Free,
    Split,
    Used,
}

#[derive(Debug, Clone)]
struct PackNode {
    rect: Rect,
    state: NodeState,
    parent: Option<u32>,
    children: Option<(u32, u32)>,
}

/// Binary-split rectangle packer.
pub struct RectAtlas {
    nodes: Vec<PackNode>,
    recycled: Vec<u32>,
    width: u32,
    height: u32,
}

impl RectAtlas {
    pub fn new(width: u32, height: u32) -> Self {
        let root = PackNode {
            rect: Rect::new(0, 0, width, height),
            state: NodeState::Free,
            parent: None,
            children: None,
        };
        Self {
            nodes: vec![root],
            recycled: Vec::new(),
            width,
            height,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Allocate a `width x height` rectangle. `None` when nothing fits;
    /// the caller degrades (tile stays unallocated this frame).
    pub fn insert(&mut self, width: u32, height: u32) -> Option<TileId> {
        if width == 0 || height == 0 || width > self.width || height > self.height {
            return None;
        }
        let node = self.find_free(0, width, height)?;
        let id = self.place(node, width, height);
        Some(TileId(id))
    }

    pub fn rect(&self, id: TileId) -> Rect {
        self.nodes[id.0 as usize].rect
    }

    /// Return a tile to the packer and collapse fully-free siblings back
    /// into their parent.
    pub fn free(&mut self, id: TileId) {
        let mut index = id.0;
        self.nodes[index as usize].state = NodeState::Free;
        while let Some(parent) = self.nodes[index as usize].parent {
            let (a, b) = match self.nodes[parent as usize].children {
                Some(pair) => pair,
                None => break,
            };
            let both_free = self.is_free_leaf(a) && self.is_free_leaf(b);
            if !both_free {
                break;
            }
            self.recycled.push(a);
            self.recycled.push(b);
            let parent_node = &mut self.nodes[parent as usize];
            parent_node.children = None;
            parent_node.state = NodeState::Free;
            index = parent;
        }
    }

    /// Drop every allocation. Used by atlas defragmentation.
    pub fn reset(&mut self) {
        self.nodes.clear();
        self.recycled.clear();
        self.nodes.push(PackNode {
            rect: Rect::new(0, 0, self.width, self.height),
            state: NodeState::Free,
            parent: None,
            children: None,
        });
    }

    /// All currently allocated rectangles (test/debug aid).
    pub fn used_rects(&self) -> Vec<Rect> {
        self.nodes
            .iter()
            .filter(|n| n.state == NodeState::Used)
            .map(|n| n.rect)
            .collect()
    }

    fn is_free_leaf(&self, index: u32) -> bool {
        let node = &self.nodes[index as usize];
        node.state == NodeState::Free && node.children.is_none()
    }

    fn find_free(&self, index: u32, width: u32, height: u32) -> Option<u32> {
        let node = &self.nodes[index as usize];
        match node.state {
            NodeState::Used => None,
            NodeState::Split => {
                let (a, b) = node.children?;
                self.find_free(a, width, height)
                    .or_else(|| self.find_free(b, width, height))
            }
            NodeState::Free => {
                if node.rect.width >= width && node.rect.height >= height {
                    Some(index)
                } else {
                    None
                }
            }
        }
    }

    /// Split `index` down until the target size fits exactly, then mark
    /// the final node used.
    fn place(&mut self, mut index: u32, width: u32, height: u32) -> u32 {
        loop {
            let rect = self.nodes[index as usize].rect;
            if rect.width == width && rect.height == height {
                self.nodes[index as usize].state = NodeState::Used;
                return index;
            }

            let spare_w = rect.width - width;
            let spare_h = rect.height - height;
            // Cut across the larger leftover so the remainder stays whole.
            let (first, second) = if spare_w > spare_h {
                (
                    Rect::new(rect.x, rect.y, width, rect.height),
                    Rect::new(rect.x + width, rect.y, spare_w, rect.height),
                )
            } else {
                (
                    Rect::new(rect.x, rect.y, rect.width, height),
                    Rect::new(rect.x, rect.y + height, rect.width, spare_h),
                )
            };

            let a = self.alloc_node(first, index);
            let b = self.alloc_node(second, index);
            let node = &mut self.nodes[index as usize];
            node.state = NodeState::Split;
            node.children = Some((a, b));
            index = a;
        }
    }

    fn alloc_node(&mut self, rect: Rect, parent: u32) -> u32 {
        let node = PackNode {
            rect,
            state: NodeState::Free,
            parent: Some(parent),
            children: None,
        };
        match self.recycled.pop() {
            Some(slot) => {
                self.nodes[slot as usize] = node;
                slot
            }
            None => {
                self.nodes.push(node);
                (self.nodes.len() - 1) as u32
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocations_stay_inside_and_disjoint() {
        let mut atlas = RectAtlas::new(256, 256);
        let sizes = [(64, 64), (128, 32), (32, 128), (64, 96), (96, 64)];
        let mut ids = Vec::new();
        for (w, h) in sizes {
            ids.push(atlas.insert(w, h).unwrap());
        }
        let rects = atlas.used_rects();
        for rect in &rects {
            assert!(rect.x + rect.width <= 256 && rect.y + rect.height <= 256);
        }
        for (i, a) in rects.iter().enumerate() {
            for b in rects.iter().skip(i + 1) {
                assert!(!a.overlaps(b), "{a:?} overlaps {b:?}");
            }
        }
    }

    #[test]
    fn test_exactly_one_tile_fits() {
        let mut atlas = RectAtlas::new(64, 64);
        let first = atlas.insert(64, 64);
        assert!(first.is_some());
        let second = atlas.insert(64, 64);
        assert!(second.is_none());
    }

    #[test]
    fn test_free_makes_space_again() {
        let mut atlas = RectAtlas::new(64, 64);
        let id = atlas.insert(64, 64).unwrap();
        assert!(atlas.insert(8, 8).is_none());
        atlas.free(id);
        assert!(atlas.insert(64, 64).is_some());
    }

    #[test]
    fn test_sibling_collapse_restores_full_rect() {
        let mut atlas = RectAtlas::new(128, 128);
        let a = atlas.insert(64, 128).unwrap();
        let b = atlas.insert(64, 128).unwrap();
        atlas.free(a);
        atlas.free(b);
        // After both halves return, the whole atlas is one free rect.
        assert!(atlas.insert(128, 128).is_some());
    }

    #[test]
    fn test_oversized_request_rejected() {
        let mut atlas = RectAtlas::new(64, 64);
        assert!(atlas.insert(65, 8).is_none());
        assert!(atlas.insert(0, 8).is_none());
    }

    #[test]
    fn test_node_recycling_bounds_arena() {
        let mut atlas = RectAtlas::new(256, 256);
        let baseline = {
            let id = atlas.insert(32, 32).unwrap();
            atlas.free(id);
            atlas.nodes.len()
        };
        // Repeated churn must not keep growing the arena.
        for _ in 0..100 {
            let id = atlas.insert(32, 32).unwrap();
            atlas.free(id);
        }
        assert_eq!(atlas.nodes.len(), baseline);
    }
}

use std::cmp;
use std::collections::VecDeque;

use image::{GrayImage, Luma};

use crate::config::BlobOptions;
use crate::geometry::Point;

/// Horizontal run of foreground pixels, `start..end` on `row`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RowRun {
    pub row: usize,
    pub start: usize,
    pub end: usize,
    label: u32,
}

impl RowRun {
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }
}

/// One 8-connected foreground component.
#[derive(Clone, Debug)]
pub struct Blob {
    runs: Vec<RowRun>,
    area: usize,
}

impl Blob {
    pub fn area(&self) -> usize {
        self.area
    }

    pub fn runs(&self) -> &[RowRun] {
        &self.runs
    }

    /// Leftmost and rightmost pixel centre of every run, top to bottom.
    pub fn boundary(&self) -> Vec<Point> {
        let mut points = Vec::with_capacity(self.runs.len() * 2);
        for run in &self.runs {
            let y = run.row as f64;
            points.push(Point::new(run.start as f64, y));
            if run.len() > 1 {
                points.push(Point::new((run.end - 1) as f64, y));
            }
        }
        points
    }
}

/// Labels every non-zero component of `mask`, largest first. Components of
/// equal area keep their top-left scan order.
pub fn find_blobs(mask: &GrayImage) -> Vec<Blob> {
    let width = mask.width() as usize;
    let height = mask.height() as usize;
    if width == 0 || height == 0 {
        return Vec::new();
    }

    let data = mask.as_raw();
    let mut runs = Vec::new();
    let mut offsets = vec![0usize; height + 1];
    for row in 0..height {
        offsets[row] = runs.len();
        let row_data = &data[row * width..(row + 1) * width];
        let mut x = 0usize;
        while x < width {
            while x < width && row_data[x] == 0 {
                x += 1;
            }
            if x >= width {
                break;
            }
            let start = x;
            while x < width && row_data[x] != 0 {
                x += 1;
            }
            runs.push(RowRun {
                row,
                start,
                end: x,
                label: 0,
            });
        }
    }
    offsets[height] = runs.len();

    if runs.is_empty() {
        return Vec::new();
    }

    let mut dsu = DisjointSet::new();
    for run in runs.iter_mut() {
        run.label = dsu.make_set();
    }

    for row in 1..height {
        let mut prev = offsets[row - 1];
        let prev_end = offsets[row];
        let mut curr = offsets[row];
        let curr_end = offsets[row + 1];

        while prev < prev_end && curr < curr_end {
            let run_a = runs[prev];
            let run_b = runs[curr];
            if runs_touch(&run_a, &run_b) {
                dsu.union(run_a.label, run_b.label);
            }
            if run_a.end <= run_b.end {
                prev += 1;
            } else {
                curr += 1;
            }
        }
    }

    let mut slots: Vec<Option<usize>> = vec![None; dsu.len()];
    let mut blobs: Vec<Blob> = Vec::new();
    for run in &runs {
        let root = dsu.find(run.label) as usize;
        let idx = *slots[root].get_or_insert_with(|| {
            blobs.push(Blob {
                runs: Vec::new(),
                area: 0,
            });
            blobs.len() - 1
        });
        let blob = &mut blobs[idx];
        blob.area += run.len();
        blob.runs.push(*run);
    }

    blobs.sort_by(|a, b| b.area.cmp(&a.area));
    blobs
}

/// Keeps at most `max_blobs` of the largest blobs, then drops those whose
/// area does not exceed `min_area`.
pub fn select_blobs(blobs: Vec<Blob>, options: &BlobOptions) -> Vec<Blob> {
    blobs
        .into_iter()
        .take(options.max_blobs)
        .filter(|blob| blob.area > options.min_area)
        .collect()
}

/// Rasterises `blobs` as solid regions. Background pockets that cannot reach
/// the image border are treated as holes and filled.
pub fn fill_blobs(blobs: &[Blob], width: u32, height: u32) -> GrayImage {
    let mut mask = GrayImage::new(width, height);
    for blob in blobs {
        for run in &blob.runs {
            for x in run.start..run.end {
                mask.put_pixel(x as u32, run.row as u32, Luma([255]));
            }
        }
    }
    fill_holes(&mut mask);
    mask
}

fn fill_holes(mask: &mut GrayImage) {
    let width = mask.width() as usize;
    let height = mask.height() as usize;
    if width == 0 || height == 0 {
        return;
    }
    let data: &mut [u8] = mask;
    let mut outside = vec![false; width * height];
    let mut queue = VecDeque::new();

    let seed = |idx: usize, outside: &mut [bool], queue: &mut VecDeque<usize>| {
        if data[idx] == 0 && !outside[idx] {
            outside[idx] = true;
            queue.push_back(idx);
        }
    };
    for x in 0..width {
        seed(x, &mut outside, &mut queue);
        seed((height - 1) * width + x, &mut outside, &mut queue);
    }
    for y in 0..height {
        seed(y * width, &mut outside, &mut queue);
        seed(y * width + width - 1, &mut outside, &mut queue);
    }

    // Background is 4-connected so diagonal gaps in an 8-connected outline
    // do not leak.
    while let Some(idx) = queue.pop_front() {
        let x = idx % width;
        let y = idx / width;
        if x > 0 {
            seed(idx - 1, &mut outside, &mut queue);
        }
        if x + 1 < width {
            seed(idx + 1, &mut outside, &mut queue);
        }
        if y > 0 {
            seed(idx - width, &mut outside, &mut queue);
        }
        if y + 1 < height {
            seed(idx + width, &mut outside, &mut queue);
        }
    }

    for (value, reached) in data.iter_mut().zip(outside) {
        if !reached {
            *value = 255;
        }
    }
}

fn runs_touch(a: &RowRun, b: &RowRun) -> bool {
    let overlap = cmp::min(a.end, b.end).saturating_sub(cmp::max(a.start, b.start));
    if overlap > 0 {
        return true;
    }
    let gap = if a.end <= b.start {
        b.start - a.end
    } else {
        a.start - b.end
    };
    gap < 1
}

struct DisjointSet {
    parent: Vec<u32>,
    rank: Vec<u8>,
}

impl DisjointSet {
    fn new() -> Self {
        Self {
            parent: Vec::new(),
            rank: Vec::new(),
        }
    }

    fn len(&self) -> usize {
        self.parent.len()
    }

    fn make_set(&mut self) -> u32 {
        let idx = self.parent.len() as u32;
        self.parent.push(idx);
        self.rank.push(0);
        idx
    }

    fn find(&mut self, x: u32) -> u32 {
        let mut root = x;
        while self.parent[root as usize] != root {
            root = self.parent[root as usize];
        }
        let mut node = x;
        while self.parent[node as usize] != root {
            let next = self.parent[node as usize];
            self.parent[node as usize] = root;
            node = next;
        }
        root
    }

    fn union(&mut self, a: u32, b: u32) {
        let mut root_a = self.find(a);
        let mut root_b = self.find(b);
        if root_a == root_b {
            return;
        }
        let rank_a = self.rank[root_a as usize];
        let rank_b = self.rank[root_b as usize];
        if rank_a < rank_b {
            std::mem::swap(&mut root_a, &mut root_b);
        }
        self.parent[root_b as usize] = root_a;
        if rank_a == rank_b {
            self.rank[root_a as usize] = rank_a + 1;
        }
    }
}

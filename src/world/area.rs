use crate::world::position::{Direction, Position};
use lru::LruCache;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;

/// Token values in an authored area grid.
pub const TOKEN_EMPTY: u8 = 0;
pub const TOKEN_AFFECTED: u8 = 1;
pub const TOKEN_CENTER: u8 = 2;
pub const TOKEN_AFFECTED_CENTER: u8 = 3;

/// Side length of the distance-ring template used by radius areas.
const RADIUS_TEMPLATE_SIZE: usize = 13;

/// Distance rings around the center cell (value 1); cells with a value up
/// to the radius are affected.
const RADIUS_TEMPLATE: [[u8; RADIUS_TEMPLATE_SIZE]; RADIUS_TEMPLATE_SIZE] = [
    [0, 0, 0, 0, 0, 0, 8, 0, 0, 0, 0, 0, 0],
    [0, 0, 0, 0, 8, 8, 7, 8, 8, 0, 0, 0, 0],
    [0, 0, 0, 8, 7, 6, 6, 6, 7, 8, 0, 0, 0],
    [0, 0, 8, 7, 6, 5, 5, 5, 6, 7, 8, 0, 0],
    [0, 8, 7, 6, 5, 4, 4, 4, 5, 6, 7, 8, 0],
    [0, 8, 6, 5, 4, 3, 2, 3, 4, 5, 6, 8, 0],
    [8, 7, 6, 5, 4, 2, 1, 2, 4, 5, 6, 7, 8],
    [0, 8, 6, 5, 4, 3, 2, 3, 4, 5, 6, 8, 0],
    [0, 8, 7, 6, 5, 4, 4, 4, 5, 6, 7, 8, 0],
    [0, 0, 8, 7, 6, 5, 5, 5, 6, 7, 8, 0, 0],
    [0, 0, 0, 8, 7, 6, 6, 6, 7, 8, 0, 0, 0],
    [0, 0, 0, 0, 8, 8, 7, 8, 8, 0, 0, 0, 0],
    [0, 0, 0, 0, 0, 0, 8, 0, 0, 0, 0, 0, 0],
];

/// Rectangular boolean footprint with a center cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatrixArea {
    rows: usize,
    cols: usize,
    cells: Vec<bool>,
    center_y: usize,
    center_x: usize,
}

impl MatrixArea {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            cells: vec![false; rows * cols],
            center_y: 0,
            center_x: 0,
        }
    }

    /// Builds a matrix from row-major tokens; `rows` must divide the list.
    pub fn from_tokens(tokens: &[u8], rows: usize) -> Result<Self, String> {
        if rows == 0 || tokens.is_empty() || tokens.len() % rows != 0 {
            return Err(format!(
                "area of {} tokens cannot be split into {} rows",
                tokens.len(),
                rows
            ));
        }
        let cols = tokens.len() / rows;
        let mut area = Self::new(rows, cols);
        for (index, token) in tokens.iter().enumerate() {
            if *token > TOKEN_AFFECTED_CENTER {
                return Err(format!("unknown area token {} at index {}", token, index));
            }
            let (y, x) = (index / cols, index % cols);
            if matches!(*token, TOKEN_AFFECTED | TOKEN_AFFECTED_CENTER) {
                area.set_value(y, x, true);
            }
            if matches!(*token, TOKEN_CENTER | TOKEN_AFFECTED_CENTER) {
                area.set_center(y, x);
            }
        }
        Ok(area)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn set_value(&mut self, row: usize, col: usize, value: bool) {
        debug_assert!(row < self.rows && col < self.cols);
        if let Some(cell) = self.cells.get_mut(row * self.cols + col) {
            *cell = value;
        }
    }

    pub fn get_value(&self, row: usize, col: usize) -> bool {
        debug_assert!(row < self.rows && col < self.cols);
        if row >= self.rows || col >= self.cols {
            return false;
        }
        self.cells[row * self.cols + col]
    }

    pub fn set_center(&mut self, y: usize, x: usize) {
        debug_assert!(y < self.rows && x < self.cols);
        self.center_y = y.min(self.rows.saturating_sub(1));
        self.center_x = x.min(self.cols.saturating_sub(1));
    }

    /// `(center_y, center_x)`.
    pub fn center(&self) -> (usize, usize) {
        (self.center_y, self.center_x)
    }

    pub fn affected_cells(&self) -> usize {
        self.cells.iter().filter(|cell| **cell).count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatrixOperation {
    Copy,
    Mirror,
    Flip,
    Rotate90,
    Rotate180,
    Rotate270,
}

impl MatrixOperation {
    fn angle(self) -> Option<f32> {
        match self {
            MatrixOperation::Rotate90 => Some(90.0),
            MatrixOperation::Rotate180 => Some(180.0),
            MatrixOperation::Rotate270 => Some(270.0),
            _ => None,
        }
    }
}

/// Legacy rounding: rounds up only when the fraction exceeds one half.
fn round_legacy(value: f32) -> i32 {
    let floor = value.floor();
    if value - floor > 0.5 {
        floor as i32 + 1
    } else {
        floor as i32
    }
}

/// Transforms `input` into `output`. Rotations turn around the input center
/// and put it at `(rows/2 - 1, cols/2 - 1)` of the output, which must be big
/// enough to hold the turned footprint.
pub fn copy_area(input: &MatrixArea, output: &mut MatrixArea, op: MatrixOperation) {
    let (center_y, center_x) = input.center();
    match op {
        MatrixOperation::Copy => {
            for y in 0..input.rows.min(output.rows) {
                for x in 0..input.cols.min(output.cols) {
                    output.set_value(y, x, input.get_value(y, x));
                }
            }
            output.set_center(center_y, center_x);
        }
        MatrixOperation::Mirror => {
            for y in 0..input.rows.min(output.rows) {
                for x in 0..input.cols {
                    let out_x = input.cols - 1 - x;
                    if out_x < output.cols {
                        output.set_value(y, out_x, input.get_value(y, x));
                    }
                }
            }
            // Legacy formula mixes rows into the column; only the geometric
            // one is usable when that underflows or leaves the output.
            let new_x = input
                .rows
                .saturating_sub(1)
                .checked_sub(center_x)
                .filter(|x| *x < output.cols)
                .unwrap_or(input.cols.saturating_sub(1 + center_x));
            output.set_center(center_y, new_x);
        }
        MatrixOperation::Flip => {
            for x in 0..input.cols.min(output.cols) {
                for y in 0..input.rows {
                    let out_y = input.rows - 1 - y;
                    if out_y < output.rows {
                        output.set_value(out_y, x, input.get_value(y, x));
                    }
                }
            }
            let new_y = input
                .cols
                .saturating_sub(1)
                .checked_sub(center_y)
                .filter(|y| *y < output.rows)
                .unwrap_or(input.rows.saturating_sub(1 + center_y));
            output.set_center(new_y, center_x);
        }
        rotation => {
            let angle = rotation.angle().unwrap_or(0.0);
            let rotate_center_x = (output.cols / 2).saturating_sub(1);
            let rotate_center_y = (output.rows / 2).saturating_sub(1);
            let radians = 3.1416_f32 * angle / 180.0;
            let (a, b, c, d) = (radians.cos(), -radians.sin(), radians.sin(), radians.cos());

            for y in 0..input.rows {
                for x in 0..input.cols {
                    let nx = x as f32 - center_x as f32;
                    let ny = y as f32 - center_y as f32;
                    let rotated_x = round_legacy(nx * a + ny * b);
                    let rotated_y = round_legacy(nx * c + ny * d);
                    let out_x = rotated_x + rotate_center_x as i32;
                    let out_y = rotated_y + rotate_center_y as i32;
                    if out_x < 0 || out_y < 0 {
                        continue;
                    }
                    let (out_x, out_y) = (out_x as usize, out_y as usize);
                    if out_x < output.cols && out_y < output.rows {
                        output.set_value(out_y, out_x, input.get_value(y, x));
                    }
                }
            }
            output.set_center(rotate_center_y, rotate_center_x);
        }
    }
}

/// Map access the area expansion needs.
pub trait TileGrid {
    fn is_sight_clear(&self, from: Position, to: Position, same_floor: bool) -> bool;

    /// Makes sure a tile exists at `position`, creating a static empty one
    /// when the map has none.
    fn ensure_tile(&mut self, position: Position);
}

/// Per-direction footprints of one area effect.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AreaCombat {
    areas: HashMap<Direction, MatrixArea>,
    has_ext_area: bool,
}

impl AreaCombat {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_ext_area(&self) -> bool {
        self.has_ext_area
    }

    pub fn area(&self, direction: Direction) -> Option<&MatrixArea> {
        self.areas.get(&direction)
    }

    fn canvas(template: &MatrixArea) -> MatrixArea {
        let size = template.rows.max(template.cols) * 2;
        MatrixArea::new(size, size)
    }

    fn derive(template: &MatrixArea, op: MatrixOperation) -> MatrixArea {
        let mut output = Self::canvas(template);
        copy_area(template, &mut output, op);
        output
    }

    /// Authored grid pointing north; the other compass directions are turned
    /// copies of it.
    pub fn setup_area(&mut self, tokens: &[u8], rows: usize) -> Result<(), String> {
        let north = MatrixArea::from_tokens(tokens, rows)?;
        self.areas
            .insert(Direction::South, Self::derive(&north, MatrixOperation::Rotate180));
        self.areas
            .insert(Direction::East, Self::derive(&north, MatrixOperation::Rotate90));
        self.areas
            .insert(Direction::West, Self::derive(&north, MatrixOperation::Rotate270));
        self.areas.insert(Direction::North, north);
        Ok(())
    }

    /// Beam of `length` rows that narrows by one column on each side every
    /// `spread` rows, ending at the caster. A spread of 0 is a straight line.
    pub fn setup_beam(&mut self, length: u32, spread: u32) -> Result<(), String> {
        self.setup_area(&beam_tokens(length, spread), length as usize)
    }

    /// Roughly circular area of the given radius (1 is the center only).
    pub fn setup_radius(&mut self, radius: u8) -> Result<(), String> {
        self.setup_area(&radius_tokens(radius), RADIUS_TEMPLATE_SIZE)
    }

    /// Authored grid pointing north-west; the other diagonals are mirrored
    /// and flipped copies. An empty list leaves the area untouched.
    pub fn setup_ext_area(&mut self, tokens: &[u8], rows: usize) -> Result<(), String> {
        if tokens.is_empty() {
            return Ok(());
        }
        let north_west = MatrixArea::from_tokens(tokens, rows)?;
        let north_east = Self::derive(&north_west, MatrixOperation::Mirror);
        let south_west = Self::derive(&north_west, MatrixOperation::Flip);
        let mut south_east = Self::canvas(&north_west);
        copy_area(&south_west, &mut south_east, MatrixOperation::Mirror);

        self.areas.insert(Direction::Northwest, north_west);
        self.areas.insert(Direction::Northeast, north_east);
        self.areas.insert(Direction::Southwest, south_west);
        self.areas.insert(Direction::Southeast, south_east);
        self.has_ext_area = true;
        Ok(())
    }

    /// Footprint facing from `center` towards `target`.
    pub fn get_area(&self, center: Position, target: Position) -> Option<&MatrixArea> {
        self.areas.get(&center.facing(target, self.has_ext_area))
    }

    /// Positions hit when the footprint facing `center -> target` is laid on
    /// `target`, in row-major order. Off-map cells and cells without line of
    /// sight from `target` are dropped. `None` when no footprint exists for
    /// that direction.
    pub fn get_list<G: TileGrid + ?Sized>(
        &self,
        center: Position,
        target: Position,
        grid: &mut G,
    ) -> Option<Vec<Position>> {
        let area = self.get_area(center, target)?;
        let (center_y, center_x) = area.center();
        let mut positions = Vec::with_capacity(area.affected_cells());

        for y in 0..area.rows() {
            for x in 0..area.cols() {
                if !area.get_value(y, x) {
                    continue;
                }
                let dx = x as i32 - center_x as i32;
                let dy = y as i32 - center_y as i32;
                let Some(position) = target.translated(dx, dy) else {
                    continue;
                };
                if !grid.is_sight_clear(target, position, true) {
                    continue;
                }
                grid.ensure_tile(position);
                positions.push(position);
            }
        }

        Some(positions)
    }
}

fn beam_tokens(length: u32, spread: u32) -> Vec<u8> {
    let rows = length as i64;
    let spread = i64::from(spread);
    let cols = if spread == 0 || rows == 0 {
        1
    } else {
        ((rows - rows % spread) / spread) * 2 + 1
    };

    let mut tokens = Vec::with_capacity((rows * cols) as usize);
    let mut col_spread = cols;
    for y in 1..=rows {
        let min_col = cols - col_spread + 1;
        let max_col = cols - (cols - col_spread);
        for x in 1..=cols {
            let token = if y == rows && x == (cols - cols % 2) / 2 + 1 {
                TOKEN_AFFECTED_CENTER
            } else if x >= min_col && x <= max_col {
                TOKEN_AFFECTED
            } else {
                TOKEN_EMPTY
            };
            tokens.push(token);
        }
        if spread > 0 && y % spread == 0 {
            col_spread -= 1;
        }
    }
    tokens
}

fn radius_tokens(radius: u8) -> Vec<u8> {
    RADIUS_TEMPLATE
        .iter()
        .flat_map(|row| row.iter())
        .map(|value| match *value {
            1 => TOKEN_AFFECTED_CENTER,
            v if v > 0 && v <= radius => TOKEN_AFFECTED,
            _ => TOKEN_EMPTY,
        })
        .collect()
}

/// Shape descriptor an area is built from; equal shapes share one area.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AreaShape {
    Grid {
        rows: usize,
        tokens: Vec<u8>,
        ext_rows: usize,
        ext_tokens: Vec<u8>,
    },
    Beam {
        length: u32,
        spread: u32,
    },
    Radius(u8),
}

impl AreaShape {
    pub fn build(&self) -> Result<AreaCombat, String> {
        let mut area = AreaCombat::new();
        match self {
            AreaShape::Grid {
                rows,
                tokens,
                ext_rows,
                ext_tokens,
            } => {
                area.setup_area(tokens, *rows)?;
                area.setup_ext_area(ext_tokens, *ext_rows)?;
            }
            AreaShape::Beam { length, spread } => area.setup_beam(*length, *spread)?,
            AreaShape::Radius(radius) => area.setup_radius(*radius)?,
        }
        Ok(area)
    }
}

#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64) / (total as f64)
        }
    }
}

/// LRU of built areas keyed by shape.
pub struct AreaCache {
    cache: LruCache<AreaShape, Arc<AreaCombat>>,
    stats: CacheStats,
}

impl AreaCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: LruCache::new(capacity),
            stats: CacheStats::default(),
        }
    }

    pub fn get_or_build(&mut self, shape: &AreaShape) -> Result<Arc<AreaCombat>, String> {
        if let Some(area) = self.cache.get(shape) {
            self.stats.hits += 1;
            return Ok(Arc::clone(area));
        }

        self.stats.misses += 1;
        let area = Arc::new(shape.build()?);
        if let Some((evicted, _)) = self.cache.push(shape.clone(), Arc::clone(&area)) {
            if &evicted != shape {
                self.stats.evictions += 1;
                tracing::debug!(?evicted, "area cache eviction");
            }
        }
        Ok(area)
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    /// Open field; every tile exists and nothing blocks sight.
    #[derive(Default)]
    struct OpenField {
        created: HashSet<Position>,
        walls: HashSet<Position>,
    }

    impl TileGrid for OpenField {
        fn is_sight_clear(&self, _from: Position, to: Position, _same_floor: bool) -> bool {
            !self.walls.contains(&to)
        }

        fn ensure_tile(&mut self, position: Position) {
            self.created.insert(position);
        }
    }

    fn offsets(area: &AreaCombat, facing: (i32, i32)) -> Vec<(i32, i32)> {
        let target = Position::new(100, 100, 7);
        let center = target
            .translated(-facing.0, -facing.1)
            .expect("center on map");
        let mut field = OpenField::default();
        let mut out: Vec<(i32, i32)> = area
            .get_list(center, target, &mut field)
            .expect("area")
            .into_iter()
            .map(|pos| (target.dx(pos), target.dy(pos)))
            .collect();
        out.sort_unstable();
        out
    }

    fn sorted(mut cells: Vec<(i32, i32)>) -> Vec<(i32, i32)> {
        cells.sort_unstable();
        cells
    }

    #[test]
    fn tokens_set_cells_and_center() {
        let area = MatrixArea::from_tokens(&[0, 1, 0, 1, 2, 1, 0, 1, 0], 3).expect("area");
        assert_eq!((area.rows(), area.cols()), (3, 3));
        assert_eq!(area.center(), (1, 1));
        assert!(!area.get_value(1, 1));
        assert_eq!(area.affected_cells(), 4);
        assert!(MatrixArea::from_tokens(&[1, 1, 1], 2).is_err());
        assert!(MatrixArea::from_tokens(&[], 1).is_err());
        assert!(MatrixArea::from_tokens(&[0, 1, 0, 1, 4, 1, 0, 1, 0], 3).is_err());
        assert!(AreaCombat::new().setup_area(&[1, 9, 3], 1).is_err());
    }

    #[test]
    fn line_turns_with_facing() {
        let mut area = AreaCombat::new();
        area.setup_area(&[1, 1, 3], 3).expect("setup");
        assert_eq!(offsets(&area, (0, -1)), sorted(vec![(0, -2), (0, -1), (0, 0)]));
        assert_eq!(offsets(&area, (1, 0)), sorted(vec![(2, 0), (1, 0), (0, 0)]));
        assert_eq!(offsets(&area, (0, 1)), sorted(vec![(0, 2), (0, 1), (0, 0)]));
        assert_eq!(offsets(&area, (-1, 0)), sorted(vec![(-2, 0), (-1, 0), (0, 0)]));
        // Standing on the target faces south.
        assert_eq!(offsets(&area, (0, 0)), sorted(vec![(0, 2), (0, 1), (0, 0)]));
    }

    #[test]
    fn diagonals_need_ext_area() {
        let mut area = AreaCombat::new();
        area.setup_area(&[1, 1, 3], 3).expect("setup");
        assert!(!area.has_ext_area());
        // Without diagonals the horizontal component wins.
        assert_eq!(offsets(&area, (1, 1)), offsets(&area, (1, 0)));

        area.setup_ext_area(&[], 0).expect("noop");
        assert!(!area.has_ext_area());

        area.setup_ext_area(&[1, 0, 0, 3], 2).expect("ext");
        assert!(area.has_ext_area());
        assert_eq!(offsets(&area, (-1, -1)), sorted(vec![(-1, -1), (0, 0)]));
        assert_eq!(offsets(&area, (1, -1)), sorted(vec![(1, -1), (0, 0)]));
        assert_eq!(offsets(&area, (-1, 1)), sorted(vec![(-1, 1), (0, 0)]));
        assert_eq!(offsets(&area, (1, 1)), sorted(vec![(1, 1), (0, 0)]));
    }

    #[test]
    fn rotations_keep_cell_count() {
        let mut state = 0x5eed_u64;
        for _ in 0..64 {
            let rows = 1 + (lcg_next(&mut state) % 5) as usize;
            let cols = 1 + (lcg_next(&mut state) % 5) as usize;
            let mut tokens: Vec<u8> = (0..rows * cols)
                .map(|_| (lcg_next(&mut state) % 2) as u8)
                .collect();
            let center = (lcg_next(&mut state) as usize) % tokens.len();
            tokens[center] = TOKEN_AFFECTED_CENTER;
            let template = MatrixArea::from_tokens(&tokens, rows).expect("template");

            let mut area = AreaCombat::new();
            area.setup_area(&tokens, rows).expect("setup");
            for direction in [
                Direction::North,
                Direction::East,
                Direction::South,
                Direction::West,
            ] {
                let turned = area.area(direction).expect("direction");
                assert_eq!(turned.affected_cells(), template.affected_cells());
                let (cy, cx) = turned.center();
                assert!(turned.get_value(cy, cx));
            }
        }
    }

    fn around_center(area: &MatrixArea) -> Vec<(i32, i32)> {
        let (cy, cx) = area.center();
        let mut cells = Vec::new();
        for y in 0..area.rows() {
            for x in 0..area.cols() {
                if area.get_value(y, x) {
                    cells.push((y as i32 - cy as i32, x as i32 - cx as i32));
                }
            }
        }
        cells.sort_unstable();
        cells
    }

    #[test]
    fn south_is_north_turned_half_way() {
        let tokens = [1, 1, 0, 0, 1, 0, 0, 3, 0];
        let mut area = AreaCombat::new();
        area.setup_area(&tokens, 3).expect("setup");
        let north = area.area(Direction::North).expect("north");
        assert_eq!(north, &MatrixArea::from_tokens(&tokens, 3).expect("template"));

        let mut turned = MatrixArea::new(6, 6);
        copy_area(north, &mut turned, MatrixOperation::Rotate180);
        assert_eq!(area.area(Direction::South), Some(&turned));
        assert_eq!(
            around_center(&turned),
            sorted(vec![(0, 0), (1, 0), (2, 0), (2, 1)])
        );
    }

    #[test]
    fn four_quarter_turns_restore_the_template() {
        let mut state = 0x7e57_u64;
        for _ in 0..32 {
            let rows = 1 + (lcg_next(&mut state) % 4) as usize;
            let cols = 1 + (lcg_next(&mut state) % 4) as usize;
            let mut tokens: Vec<u8> = (0..rows * cols)
                .map(|_| (lcg_next(&mut state) % 2) as u8)
                .collect();
            let center = (lcg_next(&mut state) as usize) % tokens.len();
            tokens[center] = TOKEN_AFFECTED_CENTER;
            let template = MatrixArea::from_tokens(&tokens, rows).expect("template");

            let mut current = template.clone();
            for _ in 0..4 {
                let size = current.rows().max(current.cols()) * 2;
                let mut next = MatrixArea::new(size, size);
                copy_area(&current, &mut next, MatrixOperation::Rotate90);
                current = next;
            }
            assert_eq!(around_center(&current), around_center(&template));
        }
    }

    #[test]
    fn one_blocked_cell_leaves_eight() {
        let mut area = AreaCombat::new();
        area.setup_area(&[1, 1, 1, 1, 3, 1, 1, 1, 1], 3).expect("setup");
        let target = Position::new(100, 100, 7);
        let caster = Position::new(100, 101, 7);
        let blocked = Position::new(101, 99, 7);
        let mut field = OpenField::default();
        field.walls.insert(blocked);

        let list = area.get_list(caster, target, &mut field).expect("list");
        assert_eq!(list.len(), 8);
        assert!(!list.contains(&blocked));
        assert!(list.contains(&target));
        assert_eq!(field.created.len(), 8);
    }

    #[test]
    fn off_map_and_blocked_cells_are_dropped() {
        let mut area = AreaCombat::new();
        area.setup_radius(2).expect("radius");
        let target = Position::new(0, 0, 7);
        let mut field = OpenField::default();
        field.walls.insert(Position::new(1, 0, 7));
        let list = area.get_list(target, target, &mut field).expect("list");
        assert!(list.iter().all(|pos| pos.x <= 1 && pos.y <= 1));
        assert!(!list.contains(&Position::new(1, 0, 7)));
        assert!(list.contains(&target));
        assert_eq!(field.created.len(), list.len());
    }

    #[test]
    fn radius_two_is_a_plus_with_corners_out() {
        let mut area = AreaCombat::new();
        area.setup_radius(2).expect("radius");
        assert_eq!(
            offsets(&area, (0, -1)),
            sorted(vec![(0, -1), (-1, 0), (0, 0), (1, 0), (0, 1)])
        );
        area.setup_radius(3).expect("radius");
        assert_eq!(offsets(&area, (0, -1)).len(), 9);
    }

    #[test]
    fn beam_narrows_towards_caster() {
        let tokens = beam_tokens(5, 3);
        assert_eq!(
            tokens,
            vec![1, 1, 1, 1, 1, 1, 1, 1, 1, 0, 1, 0, 0, 3, 0]
        );
        assert_eq!(beam_tokens(3, 0), vec![1, 1, 3]);

        let mut area = AreaCombat::new();
        area.setup_beam(5, 3).expect("beam");
        let north = area.area(Direction::North).expect("north");
        assert_eq!((north.rows(), north.cols()), (5, 3));
        assert_eq!(north.center(), (4, 1));
    }

    #[test]
    fn mirror_and_flip_move_the_center() {
        let template = MatrixArea::from_tokens(&[1, 0, 0, 3], 2).expect("template");
        let mut mirrored = MatrixArea::new(4, 4);
        copy_area(&template, &mut mirrored, MatrixOperation::Mirror);
        assert_eq!(mirrored.center(), (1, 0));
        assert!(mirrored.get_value(0, 1));

        let mut flipped = MatrixArea::new(4, 4);
        copy_area(&template, &mut flipped, MatrixOperation::Flip);
        assert_eq!(flipped.center(), (0, 1));
        assert!(flipped.get_value(1, 0));

        let mut copied = MatrixArea::new(2, 2);
        copy_area(&template, &mut copied, MatrixOperation::Copy);
        assert_eq!(copied, template);
    }

    #[test]
    fn cache_shares_equal_shapes() {
        let mut cache = AreaCache::new(2);
        let first = cache.get_or_build(&AreaShape::Radius(3)).expect("build");
        let again = cache.get_or_build(&AreaShape::Radius(3)).expect("build");
        assert!(Arc::ptr_eq(&first, &again));
        cache
            .get_or_build(&AreaShape::Beam { length: 4, spread: 0 })
            .expect("beam");
        cache.get_or_build(&AreaShape::Radius(4)).expect("build");
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.stats().hits, 1);
        assert_eq!(cache.stats().misses, 3);
        assert_eq!(cache.stats().evictions, 1);
        assert!(cache
            .get_or_build(&AreaShape::Grid {
                rows: 2,
                tokens: vec![1, 1, 1],
                ext_rows: 0,
                ext_tokens: Vec::new(),
            })
            .is_err());
    }

    fn lcg_next(state: &mut u64) -> u32 {
        *state = state
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1);
        (*state >> 32) as u32
    }
}

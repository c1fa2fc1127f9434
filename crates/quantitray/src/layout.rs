//! Static tray layout: the fixed grid of large and small wells.
//!
//! Layout JSON follows a parametric schema (`quantitray.layout.v1`): well slots
//! are generated at load time from overflow-well descriptors and two regular
//! grids. Per-slot coordinate lists are not part of the schema.
//!
//! All coordinates are normalized to the rectified tray: `x` grows to the
//! right, `y` grows downwards, the tray spans the unit square.

use std::path::Path;

use crate::error::{read_to_string, ReferenceError};

const LAYOUT_SCHEMA_V1: &str = "quantitray.layout.v1";

const DEFAULT_NAME: &str = "quanti_tray_2000";
const DEFAULT_ASPECT_RATIO: f32 = 0.64;

/// Role of a well in the MPN combination table.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum WellRole {
    Small,
    Large,
}

/// One well position on the tray.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct WellSlot {
    pub id: usize,
    pub role: WellRole,
    /// Expected center in normalized tray coordinates.
    pub center: [f32; 2],
    /// Expected well extent `[w, h]` in normalized tray coordinates.
    pub size: [f32; 2],
}

impl WellSlot {
    /// Expected well area as a fraction of the tray area.
    pub fn rel_area(&self) -> f32 {
        self.size[0] * self.size[1]
    }

    /// Expected center in pixels of a `width x height` rectified tray.
    pub fn center_px(&self, width: u32, height: u32) -> [f64; 2] {
        [
            self.center[0] as f64 * width as f64,
            self.center[1] as f64 * height as f64,
        ]
    }

    /// Expected extent in pixels of a `width x height` rectified tray.
    pub fn size_px(&self, width: u32, height: u32) -> [f64; 2] {
        [
            self.size[0] as f64 * width as f64,
            self.size[1] as f64 * height as f64,
        ]
    }

    /// Expected area in pixels of a `width x height` rectified tray.
    pub fn area_px(&self, width: u32, height: u32) -> f64 {
        let [w, h] = self.size_px(width, height);
        w * h
    }

    /// Width over height of the expected extent.
    pub fn aspect(&self, width: u32, height: u32) -> f64 {
        let [w, h] = self.size_px(width, height);
        w / h
    }
}

/// Runtime well layout shared read-only by all pipeline runs.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct WellLayout {
    pub name: String,
    /// Physical tray width over height; fixes the rectified canvas shape.
    pub aspect_ratio: f32,
    pub slots: Vec<WellSlot>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WellDescriptor {
    pub center: [f32; 2],
    pub size: [f32; 2],
}

/// A regular rows x cols block of identical wells.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GridSpec {
    pub rows: usize,
    pub cols: usize,
    /// Centers of the first and last column.
    pub x_range: [f32; 2],
    /// Centers of the first and last row.
    pub y_range: [f32; 2],
    pub well_size: [f32; 2],
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct WellLayoutSpecV1 {
    schema: String,
    name: String,
    aspect_ratio: f32,
    #[serde(default)]
    overflow_wells: Vec<WellDescriptor>,
    large_grid: GridSpec,
    small_grid: GridSpec,
}

impl WellLayout {
    /// Total number of well slots.
    pub fn n_slots(&self) -> usize {
        self.slots.len()
    }

    /// Number of slots with the given role.
    pub fn count_role(&self, role: WellRole) -> usize {
        self.slots.iter().filter(|s| s.role == role).count()
    }

    pub fn n_small(&self) -> usize {
        self.count_role(WellRole::Small)
    }

    pub fn n_large(&self) -> usize {
        self.count_role(WellRole::Large)
    }

    /// Look up a slot by ID. Slot IDs are dense, so this is an index.
    pub fn slot(&self, id: usize) -> Option<&WellSlot> {
        self.slots.get(id).filter(|s| s.id == id)
    }

    pub fn slots_with_role(&self, role: WellRole) -> impl Iterator<Item = &WellSlot> + '_ {
        self.slots.iter().filter(move |s| s.role == role)
    }

    /// Rectified canvas height for a given canvas width.
    pub fn canvas_height(&self, width: u32) -> u32 {
        ((width as f32 / self.aspect_ratio).round() as u32).max(1)
    }

    /// Load a layout from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self, ReferenceError> {
        Self::from_json_str(&read_to_string(path)?)
    }

    /// Parse a layout from a JSON document.
    pub fn from_json_str(data: &str) -> Result<Self, ReferenceError> {
        let spec: WellLayoutSpecV1 = serde_json::from_str(data)?;
        Self::from_layout_spec(spec)
    }

    fn from_layout_spec(spec: WellLayoutSpecV1) -> Result<Self, ReferenceError> {
        if spec.schema != LAYOUT_SCHEMA_V1 {
            return Err(ReferenceError::Schema {
                found: spec.schema,
                expected: LAYOUT_SCHEMA_V1,
            });
        }

        validate_layout_spec(&spec).map_err(ReferenceError::Invalid)?;

        let mut slots = Vec::new();
        for well in &spec.overflow_wells {
            slots.push(WellSlot {
                id: slots.len(),
                role: WellRole::Large,
                center: well.center,
                size: well.size,
            });
        }
        generate_grid(&spec.large_grid, WellRole::Large, &mut slots);
        generate_grid(&spec.small_grid, WellRole::Small, &mut slots);

        Ok(Self {
            name: spec.name,
            aspect_ratio: spec.aspect_ratio,
            slots,
        })
    }
}

impl Default for WellLayout {
    fn default() -> Self {
        let spec = WellLayoutSpecV1 {
            schema: LAYOUT_SCHEMA_V1.to_string(),
            name: DEFAULT_NAME.to_string(),
            aspect_ratio: DEFAULT_ASPECT_RATIO,
            overflow_wells: vec![WellDescriptor {
                center: [0.5, 0.06],
                size: [0.80, 0.07],
            }],
            large_grid: GridSpec {
                rows: 6,
                cols: 8,
                x_range: [0.09, 0.91],
                y_range: [0.17, 0.62],
                well_size: [0.085, 0.06],
            },
            small_grid: GridSpec {
                rows: 4,
                cols: 12,
                x_range: [0.07, 0.93],
                y_range: [0.72, 0.93],
                well_size: [0.05, 0.04],
            },
        };

        Self::from_layout_spec(spec).expect("default layout spec must be valid")
    }
}

fn validate_unit_pair(name: &str, v: [f32; 2], ordered: bool) -> Result<(), String> {
    if !v.iter().all(|x| x.is_finite() && (0.0..=1.0).contains(x)) {
        return Err(format!("{name} must lie inside [0, 1]"));
    }
    if ordered && v[0] > v[1] {
        return Err(format!("{name} must be ordered (min <= max)"));
    }
    Ok(())
}

fn validate_size(name: &str, size: [f32; 2]) -> Result<(), String> {
    if !size.iter().all(|s| s.is_finite() && *s > 0.0 && *s < 1.0) {
        return Err(format!("{name} must be finite and inside (0, 1)"));
    }
    Ok(())
}

fn validate_grid(name: &str, grid: &GridSpec) -> Result<(), String> {
    if grid.rows == 0 || grid.cols == 0 {
        return Err(format!("{name}: rows and cols must be >= 1"));
    }
    validate_unit_pair(&format!("{name}.x_range"), grid.x_range, true)?;
    validate_unit_pair(&format!("{name}.y_range"), grid.y_range, true)?;
    validate_size(&format!("{name}.well_size"), grid.well_size)?;

    if grid.cols > 1 {
        let pitch = grid_pitch(grid.x_range, grid.cols);
        if grid.well_size[0] >= pitch {
            return Err(format!(
                "{name}: well width ({:.4}) must be smaller than the column pitch ({:.4})",
                grid.well_size[0], pitch
            ));
        }
    }
    if grid.rows > 1 {
        let pitch = grid_pitch(grid.y_range, grid.rows);
        if grid.well_size[1] >= pitch {
            return Err(format!(
                "{name}: well height ({:.4}) must be smaller than the row pitch ({:.4})",
                grid.well_size[1], pitch
            ));
        }
    }
    Ok(())
}

fn validate_layout_spec(spec: &WellLayoutSpecV1) -> Result<(), String> {
    if spec.name.trim().is_empty() {
        return Err("layout name must not be empty".to_string());
    }
    if !spec.aspect_ratio.is_finite() || spec.aspect_ratio <= 0.0 {
        return Err("aspect_ratio must be finite and > 0".to_string());
    }
    for (i, well) in spec.overflow_wells.iter().enumerate() {
        validate_unit_pair(&format!("overflow_wells[{i}].center"), well.center, false)?;
        validate_size(&format!("overflow_wells[{i}].size"), well.size)?;
    }
    validate_grid("large_grid", &spec.large_grid)?;
    validate_grid("small_grid", &spec.small_grid)?;
    Ok(())
}

fn grid_pitch(range: [f32; 2], n: usize) -> f32 {
    if n <= 1 {
        return 0.0;
    }
    (range[1] - range[0]) / (n - 1) as f32
}

fn grid_coord(range: [f32; 2], n: usize, idx: usize) -> f32 {
    if n <= 1 {
        0.5 * (range[0] + range[1])
    } else {
        range[0] + grid_pitch(range, n) * idx as f32
    }
}

fn generate_grid(grid: &GridSpec, role: WellRole, slots: &mut Vec<WellSlot>) {
    for row in 0..grid.rows {
        let y = grid_coord(grid.y_range, grid.rows, row);
        for col in 0..grid.cols {
            let x = grid_coord(grid.x_range, grid.cols, col);
            slots.push(WellSlot {
                id: slots.len(),
                role,
                center: [x, y],
                size: grid.well_size,
            });
        }
    }
}

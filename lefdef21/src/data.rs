//!
//! # LefDef21 Data Model
//!
//! Library templates ([Macro], [LefPin], [Site]) as parsed from LEF,
//! and the design entities ([Cell], [Net], [Pin], [Io], [Row], [Die]) assembled from Verilog and DEF.
//!
//! All cross-references between entities are dense integer ids into the owning [crate::Database]'s arenas.
//!

// Std-Lib
use std::collections::HashMap;

// Crates.io Imports
use derive_builder::Builder;
use derive_more::{Add, AddAssign, Sub, SubAssign};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// Local imports
use crate::error::DbError;
use crate::utils::{enumstr, EnumStr};

///
/// # LefDecimal
///
/// Internal type alias for all decimal-valued library data.
/// Uses [rust_decimal](https://crates.io/crates/rust_decimal) internally,
/// so that conversion to database units is exact.
///
pub type LefDecimal = rust_decimal::Decimal;

///
/// # Location Integer Type-Alias
///
/// Used for all database-unit coordinates and areas.
///
pub type Int = i64;

/// Create a dense, zero-based arena index type
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize, JsonSchema)]
        pub struct $name(usize);

        impl $name {
            /// Create an id from its raw arena index
            pub fn new(index: usize) -> Self {
                Self(index)
            }
            /// Get the raw arena index
            pub fn index(self) -> usize {
                self.0
            }
        }
        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}
define_id!(
    /// Index of a [Macro] in the library
    MacroId
);
define_id!(
    /// Index of a [Site] in the library
    SiteId
);
define_id!(
    /// Index of a [Cell] in the database
    CellId
);
define_id!(
    /// Index of a [Net] in the database
    NetId
);
define_id!(
    /// Index of a [Pin] in the database
    PinId
);
define_id!(
    /// Index of an [Io] in the database
    IoId
);

/// # Point in database units
#[derive(
    Clone,
    Copy,
    Default,
    Debug,
    Deserialize,
    Serialize,
    JsonSchema,
    PartialEq,
    Eq,
    Hash,
    Add,
    AddAssign,
    Sub,
    SubAssign,
)]
pub struct Point {
    pub x: Int,
    pub y: Int,
}
impl Point {
    /// Create a new [Point] from (x,y) coordinates
    pub fn new(x: Int, y: Int) -> Self {
        Self { x, y }
    }
}
impl std::fmt::Display for Point {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

///
/// # Rectangle in database units
///
/// `p0` is always the lower-left corner and `p1` the upper-right,
/// for any [Rect] built through [Rect::from_points].
/// The empty rectangle has `p0` above and to the right of `p1`, and zero area.
///
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct Rect {
    pub p0: Point,
    pub p1: Point,
}
impl Rect {
    /// Create a new [Rect] from two opposite corners, in either order
    pub fn from_points(a: Point, b: Point) -> Self {
        Self {
            p0: Point::new(a.x.min(b.x), a.y.min(b.y)),
            p1: Point::new(a.x.max(b.x), a.y.max(b.y)),
        }
    }
    /// Create an empty, otherwise invalid [Rect]
    pub fn empty() -> Self {
        Self {
            p0: Point::new(Int::MAX, Int::MAX),
            p1: Point::new(Int::MIN, Int::MIN),
        }
    }
    /// Boolean indication of whether the rectangle is empty
    pub fn is_empty(&self) -> bool {
        self.p0.x > self.p1.x || self.p0.y > self.p1.y
    }
    /// Smallest [Rect] covering both `self` and `other`
    pub fn union(&self, other: &Rect) -> Rect {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        Rect {
            p0: Point::new(self.p0.x.min(other.p0.x), self.p0.y.min(other.p0.y)),
            p1: Point::new(self.p1.x.max(other.p1.x), self.p1.y.max(other.p1.y)),
        }
    }
    pub fn width(&self) -> Int {
        if self.is_empty() {
            0
        } else {
            self.p1.x - self.p0.x
        }
    }
    pub fn height(&self) -> Int {
        if self.is_empty() {
            0
        } else {
            self.p1.y - self.p0.y
        }
    }
    pub fn area(&self) -> Int {
        self.width() * self.height()
    }
    /// Center point, rounded toward negative infinity
    pub fn center(&self) -> Point {
        Point::new(
            (self.p0.x + self.p1.x).div_euclid(2),
            (self.p0.y + self.p1.y).div_euclid(2),
        )
    }
}
impl Default for Rect {
    fn default() -> Self {
        Self::empty()
    }
}

/// # Library Point, in microns
#[derive(Clone, Copy, Default, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct LefPoint {
    pub x: LefDecimal,
    pub y: LefDecimal,
}
impl LefPoint {
    /// Create a new [LefPoint]
    pub fn new(x: impl Into<LefDecimal>, y: impl Into<LefDecimal>) -> Self {
        Self {
            x: x.into(),
            y: y.into(),
        }
    }
}
impl std::fmt::Display for LefPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{} {}", self.x, self.y)
    }
}

/// # Library Rectangle
/// A `RECT` shape on layer `layer`, normalized so that `p0` is the lower-left corner.
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct LefRect {
    pub layer: String,
    pub p0: LefPoint,
    pub p1: LefPoint,
}
impl LefRect {
    pub fn new(layer: impl Into<String>, a: LefPoint, b: LefPoint) -> Self {
        Self {
            layer: layer.into(),
            p0: LefPoint::new(a.x.min(b.x), a.y.min(b.y)),
            p1: LefPoint::new(a.x.max(b.x), a.y.max(b.y)),
        }
    }
}

/// # Library Bounding Box
/// The default value is the degenerate box at the origin, as used for pins without shapes.
#[derive(Clone, Copy, Default, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct LefBox {
    pub p0: LefPoint,
    pub p1: LefPoint,
}
impl LefBox {
    /// Bounding box around all `rects`
    pub fn around(rects: &[LefRect]) -> Self {
        let mut iter = rects.iter();
        let first = match iter.next() {
            Some(r) => r,
            None => return Self::default(),
        };
        let mut bbox = Self {
            p0: first.p0,
            p1: first.p1,
        };
        for r in iter {
            bbox.p0.x = bbox.p0.x.min(r.p0.x);
            bbox.p0.y = bbox.p0.y.min(r.p0.y);
            bbox.p1.x = bbox.p1.x.max(r.p1.x);
            bbox.p1.y = bbox.p1.y.max(r.p1.y);
        }
        bbox
    }
    pub fn center(&self) -> LefPoint {
        let two = LefDecimal::from(2);
        LefPoint::new((self.p0.x + self.p1.x) / two, (self.p0.y + self.p1.y) / two)
    }
}

enumstr!(
    /// # Macro Classes
    #[derive(JsonSchema)]
    MacroClass {
        Core: "CORE",
        CoreSpacer: "CORE_SPACER",
        Pad: "PAD",
        Block: "BLOCK",
        EndCap: "ENDCAP",
    }
);
enumstr!(
    /// # Site Classes
    #[derive(JsonSchema)]
    SiteClass {
        Core: "CORE",
    }
);
enumstr!(
    /// # Pin Directions
    /// Shared by library pins and top-level design ports.
    #[derive(JsonSchema)]
    PinDirection {
        Input: "INPUT",
        Output: "OUTPUT",
        Inout: "INOUT",
    }
);
enumstr!(
    /// # Pin Usage
    #[derive(JsonSchema)]
    PinUsage {
        Signal: "SIGNAL",
        Power: "POWER",
        Ground: "GROUND",
        Clock: "CLOCK",
    }
);
enumstr!(
    /// # Placement Orientations
    ///
    /// North, South (rotated 180 degrees), and their mirror images about the y-axis.
    /// The rotated-90 family (W, E, FW, FE) is not supported.
    #[derive(JsonSchema)]
    Orient {
        N: "N",
        S: "S",
        FN: "FN",
        FS: "FS",
    }
);
impl Default for Orient {
    fn default() -> Self {
        Orient::N
    }
}

/// # Library Site
///
/// A unit placement-grid cell, tiled by [Row]s.
#[derive(Clone, Builder, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[builder(pattern = "owned", setter(into), build_fn(error = "DbError"))]
pub struct Site {
    /// Site Name
    pub name: String,
    /// Site Class
    pub class: SiteClass,
    /// Size (width, height), in microns
    pub size: (LefDecimal, LefDecimal),
}

/// # Library Pin
///
/// A named, directed pin of a [Macro], with its port shapes.
#[derive(Clone, Builder, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[builder(pattern = "owned", setter(into), build_fn(error = "DbError"))]
pub struct LefPin {
    /// Pin Name
    pub name: String,
    /// Direction
    #[builder(default = "PinDirection::Input")]
    pub direction: PinDirection,
    /// Usage
    #[builder(default = "PinUsage::Signal")]
    pub usage: PinUsage,
    /// Port shapes, across all `PORT` blocks
    #[builder(default)]
    pub shapes: Vec<LefRect>,
    /// Bounding box over `shapes`
    #[builder(default)]
    pub bbox: LefBox,
}
impl LefPin {
    /// Center of the pin's bounding box, relative to its macro's origin
    pub fn center(&self) -> LefPoint {
        self.bbox.center()
    }
}

///
/// # Library Macro
///
/// A reusable cell template: standard cell, pad, end-cap, or larger block.
/// Immutable once parsed.
///
#[derive(Clone, Builder, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
#[builder(pattern = "owned", setter(into), build_fn(error = "DbError"))]
pub struct Macro {
    /// Macro Name
    pub name: String,
    /// Macro Class
    pub class: MacroClass,
    /// Placement site. Always `Some` for non-block macros which declare a `SITE`.
    #[builder(default)]
    pub site: Option<SiteId>,
    /// Outline size (width, height), in microns
    #[builder(default)]
    pub size: (LefDecimal, LefDecimal),
    /// Origin offset, in microns
    #[builder(default)]
    pub origin: LefPoint,
    /// Pins, in declaration order
    #[builder(default)]
    pub pins: Vec<LefPin>,
    /// Pin name to index into `pins`
    #[builder(setter(skip))]
    pin_ids: HashMap<String, usize>,
}
impl Macro {
    /// Build the pin-name index. Called once, after all pins are added.
    /// The first pin of any repeated name wins.
    pub(crate) fn index_pins(&mut self) {
        self.pin_ids.clear();
        for (idx, pin) in self.pins.iter().enumerate() {
            self.pin_ids.entry(pin.name.clone()).or_insert(idx);
        }
    }
    /// Get the index of the pin named `name`
    pub fn pin_index(&self, name: &str) -> Option<usize> {
        self.pin_ids.get(name).copied()
    }
    /// Get the pin named `name`
    pub fn pin(&self, name: &str) -> Option<&LefPin> {
        self.pin_index(name).map(|idx| &self.pins[idx])
    }
    /// Boolean indication of a freestanding block macro
    pub fn is_block(&self) -> bool {
        self.class == MacroClass::Block
    }
}
impl std::fmt::Display for Macro {
    /// Per-macro info block: name, size, and signal pins (eight per line)
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        const PINS_PER_LINE: usize = 8;
        writeln!(f, "----------------------------------------")?;
        writeln!(f, "MACRO : {:<10}", self.name)?;
        writeln!(f, "CLASS : {}", self.class)?;
        writeln!(f, "SIZEX : {}", self.size.0)?;
        writeln!(f, "SIZEY : {}", self.size.1)?;
        write!(f, "PIN   : {:<3}", self.pins.len())?;
        let signals = self.pins.iter().filter(|p| p.usage == PinUsage::Signal);
        for (idx, pin) in signals.enumerate() {
            if idx % PINS_PER_LINE == 0 {
                writeln!(f)?;
            }
            write!(f, "{:<4} ", pin.name)?;
        }
        writeln!(f)?;
        writeln!(f, "----------------------------------------")
    }
}

/// # Cell Area Class
/// Standard cells and freestanding blocks are accounted separately in density metrics.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum CellClass {
    StdCell,
    Block,
}
impl From<MacroClass> for CellClass {
    fn from(class: MacroClass) -> Self {
        match class {
            MacroClass::Block => CellClass::Block,
            _ => CellClass::StdCell,
        }
    }
}

///
/// # Cell
///
/// A placed instance of a library [Macro].
///
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct Cell {
    pub id: CellId,
    /// Instance Name
    pub name: String,
    /// Macro Definition
    pub lef_macro: MacroId,
    /// Area class, from the macro class
    pub class: CellClass,
    /// Lower-left corner, in database units
    pub loc: Point,
    pub orient: Orient,
    /// (width, height) in database units. Fixed at creation.
    pub size: Point,
    /// Set by `FIXED` and `COVER` placements
    pub fixed: bool,
    /// Set when a DEF component placed this cell
    pub placed: bool,
    /// Set for cells created from DEF components absent from the netlist
    pub dummy: bool,
    /// Internal pins, in creation order
    pub pins: Vec<PinId>,
}
impl Cell {
    /// Footprint area, in database units squared
    pub fn area(&self) -> Int {
        self.size.x * self.size.y
    }
    /// Placed outline
    pub fn bbox(&self) -> Rect {
        Rect::from_points(self.loc, self.loc + self.size)
    }
    pub fn is_block(&self) -> bool {
        self.class == CellClass::Block
    }
}

/// # Net
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct Net {
    pub id: NetId,
    pub name: String,
    /// Attached pins, in connection-discovery order
    pub pins: Vec<PinId>,
}

/// # Reference to a [LefPin] within its [Macro]
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct LefPinRef {
    pub lef_macro: MacroId,
    pub index: usize,
}

/// # Pin Kinds
#[derive(Clone, Copy, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub enum PinKind {
    /// Pin of a cell instance
    Internal { cell: CellId, lef_pin: LefPinRef },
    /// Backing pin of a top-level design port
    External { io: IoId },
}

///
/// # Pin
///
/// Every [Pin] belongs to exactly one [Net] for its lifetime.
///
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct Pin {
    pub id: PinId,
    /// `<port>:<instance>` for internal pins, the port name for external pins
    pub name: String,
    pub net: NetId,
    pub kind: PinKind,
    /// For internal pins, the library pin's center relative to the cell's lower-left corner.
    /// For external pins, the absolute center of the port's shapes, once placed.
    pub offset: Point,
}
impl Pin {
    pub fn cell(&self) -> Option<CellId> {
        match self.kind {
            PinKind::Internal { cell, .. } => Some(cell),
            PinKind::External { .. } => None,
        }
    }
    pub fn io(&self) -> Option<IoId> {
        match self.kind {
            PinKind::Internal { .. } => None,
            PinKind::External { io } => Some(io),
        }
    }
    pub fn is_external(&self) -> bool {
        self.io().is_some()
    }
}

/// # Shape of a placed top-level port, relative to its origin
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct IoShape {
    pub layer: String,
    pub rect: Rect,
}

/// # Physical placement of a top-level port
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct IoPlacement {
    pub placed: bool,
    pub fixed: bool,
    pub origin: Point,
    pub orient: Orient,
    pub shapes: Vec<IoShape>,
}
impl IoPlacement {
    /// Absolute bounding box of all shapes, or the bare origin if there are none
    pub fn bbox(&self) -> Rect {
        let local = self
            .shapes
            .iter()
            .fold(Rect::empty(), |acc, s| acc.union(&s.rect));
        if local.is_empty() {
            return Rect::from_points(self.origin, self.origin);
        }
        Rect::from_points(local.p0 + self.origin, local.p1 + self.origin)
    }
}

/// # Top-level Design Port
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct Io {
    pub id: IoId,
    pub name: String,
    pub direction: PinDirection,
    /// Backing net, named as the port
    pub net: NetId,
    /// Backing external pin. Set by the netlist linking pass.
    pub pin: Option<PinId>,
    pub placement: IoPlacement,
}

/// # Placement Row
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct Row {
    pub name: String,
    pub site: SiteId,
    /// Origin, in database units
    pub origin: Point,
    pub orient: Orient,
    /// Site repetition counts
    pub num_x: Int,
    pub num_y: Int,
    /// Step pitch between sites, in database units
    pub step: Point,
    /// (width, height) in database units: site size times count
    pub size: Point,
}
impl Row {
    /// Covered area, assuming north orientation
    pub fn bbox(&self) -> Rect {
        Rect::from_points(self.origin, self.origin + self.size)
    }
}

/// # Die and Core Boundaries
#[derive(Clone, Copy, Debug, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct Die {
    /// Outer chip boundary, from `DIEAREA`
    pub die: Rect,
    /// Bounding box of all rows
    pub core: Rect,
}

//!
//! # Design Database
//!
//! The assembled, owned collection of library templates and design entities,
//! plus name indices and aggregate metrics.
//! The public read surface for every consumer of the loaded design.
//!

// Std-Lib
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

// Crates.io
use log::{debug, info, warn};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

// Local imports
use crate::data::*;
use crate::def::{DefLoader, PlacementUpdate};
use crate::error::{DbError, DbResult, LoadStage};
use crate::lef::{LefLoader, LefUpdate};
use crate::tokens::{self, TokenStream, DEF_TOKENS, LEF_TOKENS, VERILOG_TOKENS};
use crate::verilog::{NetlistUpdate, VerilogLoader};

/// Database units per micron, absent any LEF `UNITS` statement
pub const DEFAULT_DBU: Int = 1000;

///
/// # Library
///
/// Macro and site templates, merged across every loaded LEF file.
///
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
pub struct Library {
    pub(crate) macros: Vec<Macro>,
    pub(crate) macro_ids: HashMap<String, MacroId>,
    pub(crate) sites: Vec<Site>,
    pub(crate) site_ids: HashMap<String, SiteId>,
    /// Database units per micron, if set by a `UNITS` block
    pub(crate) dbu: Option<Int>,
    /// Files loaded so far
    pub(crate) loaded: HashSet<PathBuf>,
}
impl Library {
    pub fn macros(&self) -> &[Macro] {
        &self.macros
    }
    pub fn sites(&self) -> &[Site] {
        &self.sites
    }
    pub fn macro_id(&self, name: &str) -> Option<MacroId> {
        self.macro_ids.get(name).copied()
    }
    pub fn site_id(&self, name: &str) -> Option<SiteId> {
        self.site_ids.get(name).copied()
    }
    pub fn dbu(&self) -> Int {
        self.dbu.unwrap_or(DEFAULT_DBU)
    }
}

/// # Design-Wide Area Metrics
/// Areas in database units squared. Ratios with a zero (or negative) denominator are zero.
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct DesignMetrics {
    pub die_area: Int,
    pub core_area: Int,
    /// Sum over all cells
    pub total_inst_area: Int,
    /// Sum over standard cells
    pub stdcell_area: Int,
    /// Sum over block macros
    pub macro_area: Int,
    /// Total instance area over core area
    pub utilization: f64,
    /// Standard-cell area over the core area not covered by blocks
    pub density: f64,
}

/// # Library Statistics
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub struct LibrarySummary {
    pub num_macros: usize,
    pub num_sites: usize,
    pub dbu: Int,
}
impl std::fmt::Display for LibrarySummary {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        writeln!(f, "==================================")?;
        writeln!(f, "  LEF Statistic")?;
        writeln!(f, "==================================")?;
        writeln!(f, "| Num Macros  : {}", self.num_macros)?;
        writeln!(f, "| DB Units    : {}", self.dbu)?;
        writeln!(f, "| Num Sites   : {}", self.num_sites)?;
        writeln!(f, "==================================")
    }
}

/// # Design Statistics
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema, PartialEq)]
pub struct DesignSummary {
    pub design_name: String,
    pub module_name: String,
    pub num_pi: usize,
    pub num_po: usize,
    pub num_inout: usize,
    pub num_inst: usize,
    pub num_dummy: usize,
    pub num_net: usize,
    pub num_pin: usize,
    pub num_row: usize,
    pub dbu: Int,
    pub metrics: DesignMetrics,
}
impl std::fmt::Display for DesignSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let m = &self.metrics;
        writeln!(f, "==================================")?;
        writeln!(f, "  Design Statistic")?;
        writeln!(f, "==================================")?;
        writeln!(f, "| Design Name : {}", self.design_name)?;
        writeln!(f, "| Module Name : {}", self.module_name)?;
        writeln!(f, "| Num PI      : {}", self.num_pi)?;
        writeln!(f, "| Num PO      : {}", self.num_po)?;
        writeln!(f, "| Num Inout   : {}", self.num_inout)?;
        writeln!(f, "| Num Inst    : {}", self.num_inst)?;
        writeln!(f, "| Num Dummy   : {}", self.num_dummy)?;
        writeln!(f, "| Num Net     : {}", self.num_net)?;
        writeln!(f, "| Num Pin     : {}", self.num_pin)?;
        writeln!(f, "| Num Row     : {}", self.num_row)?;
        writeln!(f, "| DB Units    : {}", self.dbu)?;
        writeln!(f, "| Die Area    : {}", m.die_area)?;
        writeln!(f, "| Core Area   : {}", m.core_area)?;
        writeln!(f, "| Inst Area   : {}", m.total_inst_area)?;
        writeln!(f, "| Std Area    : {}", m.stdcell_area)?;
        writeln!(f, "| Macro Area  : {}", m.macro_area)?;
        writeln!(f, "| Utilization : {:.2}%", m.utilization * 100.0)?;
        writeln!(f, "| Density     : {:.2}%", m.density * 100.0)?;
        writeln!(f, "==================================")
    }
}

/// Primary-port counters
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, JsonSchema, PartialEq, Eq)]
pub(crate) struct PortCounts {
    pub num_pi: usize,
    pub num_po: usize,
    pub num_inout: usize,
}

///
/// # Design Database
///
/// Entities are stored in append-only arenas, indexed by their dense ids.
/// Loads must run in order: [Database::load_library], then [Database::load_netlist],
/// then [Database::load_placement]. Each load is all-or-nothing:
/// on failure, nothing it parsed is visible.
///
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
pub struct Database {
    pub(crate) lib: Library,
    /// Set by any successful library load, from file or string
    pub(crate) library_loaded: bool,
    /// Set by any successful netlist load
    pub(crate) netlist_loaded: bool,
    pub(crate) cells: Vec<Cell>,
    pub(crate) cell_ids: HashMap<String, CellId>,
    pub(crate) nets: Vec<Net>,
    pub(crate) net_ids: HashMap<String, NetId>,
    pub(crate) pins: Vec<Pin>,
    pub(crate) ios: Vec<Io>,
    pub(crate) io_ids: HashMap<String, IoId>,
    pub(crate) rows: Vec<Row>,
    pub(crate) die: Die,
    pub(crate) module_name: Option<String>,
    pub(crate) design_name: Option<String>,
    pub(crate) ports: PortCounts,
    pub(crate) num_dummy: usize,
}
impl Database {
    /// Create a new, empty [Database]
    pub fn new() -> Self {
        Self::default()
    }
    /// Remove every entity, index, and counter, including the record of loaded libraries
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Load LEF library file `path`.
    /// Loading a file already loaded is a no-op.
    pub fn load_library(&mut self, path: impl AsRef<Path>) -> DbResult<()> {
        let path = path.as_ref();
        let key = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
        if self.lib.loaded.contains(&key) {
            info!("Library {} already loaded", path.display());
            return Ok(());
        }
        info!("Loading library {}", path.display());
        let toks = tokens::tokenize_file(path, &LEF_TOKENS)?;
        self.read_library(&toks)?;
        self.lib.loaded.insert(key);
        Ok(())
    }
    /// Load LEF library content from string `src`
    pub fn load_library_str(&mut self, src: &str) -> DbResult<()> {
        let toks = tokens::tokenize_str(src, &LEF_TOKENS)?;
        self.read_library(&toks)
    }
    fn read_library(&mut self, toks: &TokenStream) -> DbResult<()> {
        let update = LefLoader::new(&self.lib, toks).load()?;
        self.merge_library(update);
        Ok(())
    }
    /// Load structural Verilog netlist file `path`
    pub fn load_netlist(&mut self, path: impl AsRef<Path>) -> DbResult<()> {
        let path = path.as_ref();
        self.require_library(LoadStage::Netlist)?;
        info!("Loading netlist {}", path.display());
        let toks = tokens::tokenize_file(path, &VERILOG_TOKENS)?;
        self.read_netlist(&toks)
    }
    /// Load structural Verilog content from string `src`
    pub fn load_netlist_str(&mut self, src: &str) -> DbResult<()> {
        self.require_library(LoadStage::Netlist)?;
        let toks = tokens::tokenize_str(src, &VERILOG_TOKENS)?;
        self.read_netlist(&toks)
    }
    fn read_netlist(&mut self, toks: &TokenStream) -> DbResult<()> {
        let update = VerilogLoader::new(self, toks).load()?;
        self.merge_netlist(update);
        Ok(())
    }
    /// Load DEF placement file `path`
    pub fn load_placement(&mut self, path: impl AsRef<Path>) -> DbResult<()> {
        let path = path.as_ref();
        self.require_library(LoadStage::Placement)?;
        info!("Loading placement {}", path.display());
        let toks = tokens::tokenize_file(path, &DEF_TOKENS)?;
        self.read_placement(&toks)
    }
    /// Load DEF placement content from string `src`
    pub fn load_placement_str(&mut self, src: &str) -> DbResult<()> {
        self.require_library(LoadStage::Placement)?;
        let toks = tokens::tokenize_str(src, &DEF_TOKENS)?;
        self.read_placement(&toks)
    }
    fn read_placement(&mut self, toks: &TokenStream) -> DbResult<()> {
        let update = DefLoader::new(self, toks).load()?;
        self.merge_placement(update);
        Ok(())
    }
    fn require_library(&self, stage: LoadStage) -> DbResult<()> {
        if !self.library_loaded {
            return Err(DbError::Precedence {
                stage,
                requires: LoadStage::Library,
            });
        }
        Ok(())
    }

    /// Merge a successfully parsed library
    fn merge_library(&mut self, update: LefUpdate) {
        let LefUpdate { sites, macros, dbu } = update;
        for site in sites {
            let id = SiteId::new(self.lib.sites.len());
            self.lib.site_ids.insert(site.name.clone(), id);
            self.lib.sites.push(site);
        }
        for mac in macros {
            debug!("\n{}", mac);
            let id = MacroId::new(self.lib.macros.len());
            self.lib.macro_ids.insert(mac.name.clone(), id);
            self.lib.macros.push(mac);
        }
        if let Some(dbu) = dbu {
            match self.lib.dbu {
                Some(prev) if prev != dbu => {
                    warn!("Database units changed from {} to {}", prev, dbu)
                }
                _ => (),
            }
            self.lib.dbu = Some(dbu);
        }
        self.library_loaded = true;
        info!("\n{}", self.library_summary());
    }
    /// Merge a successfully parsed netlist, and link its new pins
    fn merge_netlist(&mut self, update: NetlistUpdate) {
        let NetlistUpdate {
            module_name,
            cells,
            claimed,
            nets,
            ios,
            pins,
            ports,
        } = update;
        match &self.module_name {
            Some(prev) if *prev != module_name => {
                warn!("Module {} replaces {}", module_name, prev)
            }
            _ => (),
        }
        self.module_name = Some(module_name);
        for cell in cells {
            self.cell_ids.insert(cell.name.clone(), cell.id);
            self.cells.push(cell);
        }
        for id in claimed {
            self.cells[id.index()].dummy = false;
            self.num_dummy = self.num_dummy.saturating_sub(1);
        }
        for net in nets {
            self.net_ids.insert(net.name.clone(), net.id);
            self.nets.push(net);
        }
        for io in ios {
            self.io_ids.insert(io.name.clone(), io.id);
            self.ios.push(io);
        }
        // Linking pass, in pin-creation order
        for pin in pins {
            match pin.kind {
                PinKind::Internal { cell, .. } => self.cells[cell.index()].pins.push(pin.id),
                PinKind::External { io } => self.ios[io.index()].pin = Some(pin.id),
            }
            self.nets[pin.net.index()].pins.push(pin.id);
            self.pins.push(pin);
        }
        self.ports.num_pi += ports.num_pi;
        self.ports.num_po += ports.num_po;
        self.ports.num_inout += ports.num_inout;
        self.netlist_loaded = true;
        info!("\n{}", self.summary());
    }
    /// Merge a successfully parsed placement, and update the core boundary
    fn merge_placement(&mut self, update: PlacementUpdate) {
        let PlacementUpdate {
            design_name,
            units,
            die,
            rows,
            placements,
            cells,
            ios,
        } = update;
        if design_name.is_some() {
            self.design_name = design_name;
        }
        if let Some(units) = units {
            if units != self.dbu() {
                warn!(
                    "DEF units ({}) differ from library database units ({}); coordinates are not rescaled",
                    units,
                    self.dbu()
                );
            }
        }
        if let Some(die) = die {
            self.die.die = die;
        }
        self.rows.extend(rows);
        for (id, p) in placements {
            let cell = &mut self.cells[id.index()];
            cell.loc = p.loc;
            cell.orient = p.orient;
            cell.fixed = p.fixed;
            cell.placed = true;
        }
        for cell in cells {
            self.cell_ids.insert(cell.name.clone(), cell.id);
            self.cells.push(cell);
            self.num_dummy += 1;
        }
        for (id, placement) in ios {
            let io = &mut self.ios[id.index()];
            if let Some(pin) = io.pin {
                self.pins[pin.index()].offset = placement.bbox().center();
            }
            io.placement = placement;
        }
        self.die.core = self
            .rows
            .iter()
            .fold(Rect::empty(), |acc, row| acc.union(&row.bbox()));
        info!("\n{}", self.summary());
    }

    pub fn library(&self) -> &Library {
        &self.lib
    }
    pub fn macros(&self) -> &[Macro] {
        &self.lib.macros
    }
    pub fn sites(&self) -> &[Site] {
        &self.lib.sites
    }
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }
    pub fn nets(&self) -> &[Net] {
        &self.nets
    }
    pub fn pins(&self) -> &[Pin] {
        &self.pins
    }
    pub fn ios(&self) -> &[Io] {
        &self.ios
    }
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }
    pub fn lef_macro(&self, id: MacroId) -> Option<&Macro> {
        self.lib.macros.get(id.index())
    }
    pub fn site(&self, id: SiteId) -> Option<&Site> {
        self.lib.sites.get(id.index())
    }
    pub fn cell(&self, id: CellId) -> Option<&Cell> {
        self.cells.get(id.index())
    }
    pub fn net(&self, id: NetId) -> Option<&Net> {
        self.nets.get(id.index())
    }
    pub fn pin(&self, id: PinId) -> Option<&Pin> {
        self.pins.get(id.index())
    }
    pub fn io(&self, id: IoId) -> Option<&Io> {
        self.ios.get(id.index())
    }
    pub fn macro_by_name(&self, name: &str) -> Option<&Macro> {
        self.lib.macro_id(name).and_then(|id| self.lef_macro(id))
    }
    pub fn site_by_name(&self, name: &str) -> Option<&Site> {
        self.lib.site_id(name).and_then(|id| self.site(id))
    }
    pub fn cell_by_name(&self, name: &str) -> Option<&Cell> {
        self.cell_ids.get(name).and_then(|id| self.cell(*id))
    }
    pub fn net_by_name(&self, name: &str) -> Option<&Net> {
        self.net_ids.get(name).and_then(|id| self.net(*id))
    }
    pub fn io_by_name(&self, name: &str) -> Option<&Io> {
        self.io_ids.get(name).and_then(|id| self.io(*id))
    }
    pub fn die(&self) -> &Die {
        &self.die
    }
    /// Database units per micron
    pub fn dbu(&self) -> Int {
        self.lib.dbu()
    }
    /// DEF design name if one has been loaded, else the netlist module name
    pub fn design_name(&self) -> Option<&str> {
        self.design_name
            .as_deref()
            .or_else(|| self.module_name.as_deref())
    }
    pub fn module_name(&self) -> Option<&str> {
        self.module_name.as_deref()
    }
    /// Number of cells created from DEF components absent from the netlist
    pub fn num_dummy(&self) -> usize {
        self.num_dummy
    }

    /// Compute area sums and ratios over all cells
    pub fn metrics(&self) -> DesignMetrics {
        let mut m = DesignMetrics {
            die_area: self.die.die.area(),
            core_area: self.die.core.area(),
            ..Default::default()
        };
        for cell in self.cells.iter() {
            let area = cell.area();
            m.total_inst_area += area;
            match cell.class {
                CellClass::StdCell => m.stdcell_area += area,
                CellClass::Block => m.macro_area += area,
            }
        }
        m.utilization = ratio(m.total_inst_area, m.core_area);
        m.density = ratio(m.stdcell_area, m.core_area - m.macro_area);
        m
    }
    pub fn library_summary(&self) -> LibrarySummary {
        LibrarySummary {
            num_macros: self.lib.macros.len(),
            num_sites: self.lib.sites.len(),
            dbu: self.dbu(),
        }
    }
    /// All derived counts and metrics
    pub fn summary(&self) -> DesignSummary {
        DesignSummary {
            design_name: self.design_name().unwrap_or_default().to_string(),
            module_name: self.module_name().unwrap_or_default().to_string(),
            num_pi: self.ports.num_pi,
            num_po: self.ports.num_po,
            num_inout: self.ports.num_inout,
            num_inst: self.cells.len(),
            num_dummy: self.num_dummy,
            num_net: self.nets.len(),
            num_pin: self.pins.len(),
            num_row: self.rows.len(),
            dbu: self.dbu(),
            metrics: self.metrics(),
        }
    }

    ///
    /// Absolute location of pin `id`, in database units.
    ///
    /// Internal pins apply their cell's orientation to the pin offset, within the cell's outline.
    /// External pins report the center of their port's placed shapes.
    ///
    pub fn pin_location(&self, id: PinId) -> Option<Point> {
        let pin = self.pin(id)?;
        match pin.kind {
            PinKind::External { .. } => Some(pin.offset),
            PinKind::Internal { cell, .. } => {
                let cell = self.cell(cell)?;
                let (w, h) = (cell.size.x, cell.size.y);
                let off = pin.offset;
                let local = match cell.orient {
                    Orient::N => off,
                    Orient::S => Point::new(w - off.x, h - off.y),
                    Orient::FN => Point::new(w - off.x, off.y),
                    Orient::FS => Point::new(off.x, h - off.y),
                };
                Some(cell.loc + local)
            }
        }
    }
}

/// Ratio of `num` over `den`, or zero for non-positive denominators
fn ratio(num: Int, den: Int) -> f64 {
    if den <= 0 {
        return 0.0;
    }
    num as f64 / den as f64
}

//!
//! # LEF Library Loader
//!
//! Keyword-driven scan over `SITE`, `UNITS` and `MACRO` blocks, up to `END LIBRARY`.
//! Technology content (layers, vias, rules) is skipped without interpretation.
//!

// Std-Lib
use std::collections::HashMap;

// Crates.io
use log::{debug, warn};

// Local imports
use crate::data::*;
use crate::db::Library;
use crate::error::{DbResult, LoadStage, RefKind, ValueKind};
use crate::load::LoadContext;
use crate::tokens::TokenStream;
use crate::utils::{ErrorContext, ErrorHelper};

/// Top-level blocks closed by `END <name>`
const NAMED_BLOCKS: [&str; 4] = ["LAYER", "VIA", "VIARULE", "NONDEFAULTRULE"];
/// Top-level blocks closed by `END <keyword>`
const KEYWORD_BLOCKS: [&str; 2] = ["PROPERTYDEFINITIONS", "SPACING"];

/// Newly parsed library content, ready to merge
#[derive(Debug, Default)]
pub(crate) struct LefUpdate {
    pub sites: Vec<Site>,
    pub macros: Vec<Macro>,
    pub dbu: Option<Int>,
}

/// # LEF Loader
pub(crate) struct LefLoader<'t, 'l> {
    cx: LoadContext<'t>,
    /// Previously loaded library
    lib: &'l Library,
    update: LefUpdate,
    /// Ids of newly parsed sites
    site_ids: HashMap<String, SiteId>,
    /// Names of newly parsed macros
    macro_names: HashMap<String, usize>,
}
impl<'t, 'l> LefLoader<'t, 'l> {
    pub fn new(lib: &'l Library, toks: &'t TokenStream) -> Self {
        Self {
            cx: LoadContext::new(toks, LoadStage::Library),
            lib,
            update: LefUpdate::default(),
            site_ids: HashMap::new(),
            macro_names: HashMap::new(),
        }
    }
    /// Parse the entire token stream
    pub fn load(mut self) -> DbResult<LefUpdate> {
        let fname = self.cx.toks.path().display().to_string();
        self.cx.ctx.push(ErrorContext::Library(fname));
        loop {
            let key = match self.cx.peek() {
                Some(key) => key,
                None => {
                    warn!("Missing END LIBRARY in {}", self.cx.toks.path().display());
                    break;
                }
            };
            match key {
                "SITE" => self.parse_site()?,
                "UNITS" => self.parse_units()?,
                "MACRO" => self.parse_macro()?,
                "END" if self.cx.peek_nth(1) == Some("LIBRARY") => {
                    self.cx.pos += 2;
                    break;
                }
                k if NAMED_BLOCKS.contains(&k) => {
                    self.cx.advance();
                    let name = self.cx.get_name()?;
                    self.cx.skip_block(&name)?;
                }
                k if KEYWORD_BLOCKS.contains(&k) => {
                    self.cx.advance();
                    self.cx.skip_block(k)?;
                }
                _ => self.cx.advance(),
            }
        }
        self.cx.ctx.pop();
        Ok(self.update)
    }
    /// Consume the `END <name>` pair closing block `name`, if it is next.
    /// Fails at end of input.
    fn at_end(&mut self, name: &str) -> DbResult<bool> {
        if self.cx.done() {
            return self.cx.fail(format!("Missing `END {}`", name));
        }
        if self.cx.matches("END") && self.cx.peek_nth(1) == Some(name) {
            self.cx.pos += 2;
            return Ok(true);
        }
        Ok(false)
    }
    /// Look up a site, among both new and previously loaded sites
    fn site_id(&self, name: &str) -> Option<SiteId> {
        self.site_ids
            .get(name)
            .copied()
            .or_else(|| self.lib.site_id(name))
    }
    /// Parse a [Site] definition
    fn parse_site(&mut self) -> DbResult<()> {
        self.cx.expect("SITE")?;
        let name = self.cx.get_name()?;
        self.cx.ctx.push(ErrorContext::Site(name.clone()));
        let mut site = SiteBuilder::default()
            .name(name.clone())
            .class(SiteClass::Core)
            .size((LefDecimal::ZERO, LefDecimal::ZERO));
        while !self.at_end(&name)? {
            site = match self.cx.expect_some()? {
                "CLASS" => {
                    self.cx.advance();
                    site.class(self.cx.parse_enum::<SiteClass>(ValueKind::SiteClass)?)
                }
                "SIZE" => site.size(self.parse_size()?),
                _ => {
                    self.cx.advance();
                    site
                }
            }
        }
        let site = site.build()?;
        if self.site_id(&name).is_some() {
            warn!("Duplicate SITE {}, keeping the first definition", name);
        } else {
            let id = SiteId::new(self.lib.sites().len() + self.update.sites.len());
            self.site_ids.insert(name, id);
            self.update.sites.push(site);
        }
        self.cx.ctx.pop();
        Ok(())
    }
    /// Parse the `UNITS` block. Only `DATABASE MICRONS` is retained.
    fn parse_units(&mut self) -> DbResult<()> {
        self.cx.expect("UNITS")?;
        self.cx.ctx.push(ErrorContext::Units);
        while !self.at_end("UNITS")? {
            if self.cx.next()? == "DATABASE" {
                self.cx.expect("MICRONS")?;
                let dbu = self.cx.parse_int()?;
                if dbu <= 0 {
                    return self.cx.fail("Database units must be positive");
                }
                self.update.dbu = Some(dbu);
            }
        }
        self.cx.ctx.pop();
        Ok(())
    }
    /// Parse a [Macro] definition
    fn parse_macro(&mut self) -> DbResult<()> {
        self.cx.expect("MACRO")?;
        let name = self.cx.get_name()?;
        self.cx.ctx.push(ErrorContext::Macro(name.clone()));
        let mut class = None;
        let mut site_name = None;
        let mut mac = MacroBuilder::default().name(name.clone());
        let mut pins = Vec::new();
        while !self.at_end(&name)? {
            mac = match self.cx.expect_some()? {
                "CLASS" => {
                    self.cx.advance();
                    let mut c = self.cx.parse_enum::<MacroClass>(ValueKind::MacroClass)?;
                    if c == MacroClass::Core && self.cx.eat("SPACER") {
                        c = MacroClass::CoreSpacer;
                    }
                    class = Some(c);
                    mac
                }
                "ORIGIN" => {
                    self.cx.advance();
                    let x = self.cx.parse_number()?;
                    let y = self.cx.parse_number()?;
                    mac.origin(LefPoint::new(x, y))
                }
                "SITE" => {
                    self.cx.advance();
                    site_name = Some(self.cx.get_name()?);
                    mac
                }
                "SIZE" => mac.size(self.parse_size()?),
                "PIN" => {
                    pins.push(self.parse_pin()?);
                    mac
                }
                "OBS" => {
                    // Obstructions are not modeled
                    self.cx.advance();
                    self.cx.skip_past("END")?;
                    mac
                }
                _ => {
                    self.cx.advance();
                    mac
                }
            }
        }
        let class = class.unwrap_or_else(|| {
            debug!("MACRO {} has no CLASS, assuming CORE", name);
            MacroClass::Core
        });
        // Resolve the site. Blocks are placed freely, and need not name a known site.
        let site = match site_name {
            None => None,
            Some(s) => match self.site_id(&s) {
                Some(id) => Some(id),
                None if class == MacroClass::Block => {
                    debug!("Block MACRO {} names unknown SITE {}", name, s);
                    None
                }
                None => return self.cx.missing(RefKind::Site, s),
            },
        };
        let mut mac = mac.class(class).site(site).pins(pins).build()?;
        mac.index_pins();
        if self.lib.macro_id(&name).is_some() || self.macro_names.contains_key(&name) {
            warn!("Duplicate MACRO {}, keeping the first definition", name);
        } else {
            self.macro_names.insert(name, self.update.macros.len());
            self.update.macros.push(mac);
        }
        self.cx.ctx.pop();
        Ok(())
    }
    /// Parse a MACRO::PIN definition into a [LefPin]
    fn parse_pin(&mut self) -> DbResult<LefPin> {
        self.cx.expect("PIN")?;
        let name = self.cx.get_name()?;
        self.cx.ctx.push(ErrorContext::Pin(name.clone()));
        let mut pin = LefPinBuilder::default().name(name.clone());
        let mut shapes = Vec::new();
        while !self.at_end(&name)? {
            pin = match self.cx.expect_some()? {
                "DIRECTION" => {
                    self.cx.advance();
                    // Trailing qualifiers such as `OUTPUT TRISTATE` are skipped along with other unknown tokens
                    pin.direction(self.cx.parse_enum::<PinDirection>(ValueKind::PinDirection)?)
                }
                "USE" => {
                    self.cx.advance();
                    pin.usage(self.cx.parse_enum::<PinUsage>(ValueKind::PinUsage)?)
                }
                "PORT" => {
                    self.parse_port(&mut shapes)?;
                    pin
                }
                _ => {
                    self.cx.advance();
                    pin
                }
            }
        }
        let bbox = LefBox::around(&shapes);
        let pin = pin.shapes(shapes).bbox(bbox).build()?;
        self.cx.ctx.pop();
        Ok(pin)
    }
    /// Parse a `PORT` block, adding its rectangles to `shapes`
    fn parse_port(&mut self, shapes: &mut Vec<LefRect>) -> DbResult<()> {
        self.cx.expect("PORT")?;
        self.cx.ctx.push(ErrorContext::Port);
        let mut layer: Option<String> = None;
        loop {
            match self.cx.next()? {
                "END" => break,
                "LAYER" => layer = Some(self.cx.get_name()?),
                "RECT" => {
                    if self.cx.eat("MASK") {
                        self.cx.parse_int()?;
                    }
                    let lx = self.cx.parse_number()?;
                    let ly = self.cx.parse_number()?;
                    let ux = self.cx.parse_number()?;
                    let uy = self.cx.parse_number()?;
                    let layer = self.cx.unwrap(layer.clone(), "RECT before any LAYER")?;
                    shapes.push(LefRect::new(
                        layer,
                        LefPoint::new(lx, ly),
                        LefPoint::new(ux, uy),
                    ));
                }
                _ => (),
            }
        }
        self.cx.ctx.pop();
        Ok(())
    }
    /// Parse a `SIZE <w> BY <h>` statement
    fn parse_size(&mut self) -> DbResult<(LefDecimal, LefDecimal)> {
        self.cx.expect("SIZE")?;
        let x = self.cx.parse_number()?;
        self.cx.expect("BY")?;
        let y = self.cx.parse_number()?;
        Ok((x, y))
    }
}

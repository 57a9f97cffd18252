//! Reading and writing configuration artifacts: `.config` files, minimal
//! defconfigs, `autoconf.h`-style headers, and the per-symbol dependency
//! fragments that drive incremental builds.
//!
//! The `.config` output walks the finalized menu tree so the entry order
//! and the menu/comment header blocks match what the C tools emit.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::kconfig::Kconfig;
use crate::menu::MenuItem;
use crate::symbol::SymbolId;
use crate::types::{SymbolType, Tristate};
use crate::KconfigResult;

/// Default header comment for written `.config` files.
pub const DEFAULT_CONFIG_HEADER: &str =
    "#\n# Automatically generated file; DO NOT EDIT.\n#\n";

/// Default header comment for written autoconf headers.
pub const DEFAULT_AUTOCONF_HEADER: &str =
    "/* Automatically generated file; DO NOT EDIT. */\n";

impl Kconfig {
    /// Loads symbol values from a file in `.config` format, as if each
    /// assignment had been passed to `set_value()`. `# CONFIG_FOO is not
    /// set` lines assign `n`. With `replace` all existing user values are
    /// cleared first.
    ///
    /// Assignments to unknown symbols warn (when undef warnings are on) and
    /// are ignored. If the load changes any defined symbol's effective
    /// value, the instance's config-changed flag is raised.
    pub fn load_config<P: AsRef<Path>>(&mut self, path: P, replace: bool) -> KconfigResult<()> {
        let path = path.as_ref();
        let (contents, resolved) = self
            .read_file(path)
            .with_context(|| format!("could not open \"{}\"", path.display()))?;
        let filename = resolved.to_string_lossy().into_owned();

        let unique = self.unique_defined_syms();
        let before: Vec<String> = unique.iter().map(|&sym| self.sym_str_value(sym)).collect();

        if replace {
            // Invalidates all symbols as a side effect
            self.unset_values();
        } else {
            self.invalidate_all();
        }

        for (idx, raw_line) in contents.lines().enumerate() {
            let linenr = idx + 1;
            // The C tools ignore trailing whitespace
            let line = raw_line.trim_end();

            let (name, mut val, is_set_line) =
                if let Some(caps) = self.set_re.captures(line) {
                    (caps[1].to_owned(), caps[2].to_owned(), true)
                } else if let Some(caps) = self.unset_re.captures(line) {
                    (caps[1].to_owned(), "n".to_owned(), false)
                } else {
                    continue;
                };

            let sym = match self.lookup(&name) {
                Some(sym) => sym,
                None => {
                    self.warn_undef_assign(
                        &format!(
                            "attempt to assign the value \"{}\" to the undefined symbol {}",
                            val, name
                        ),
                        Some(&filename),
                        Some(linenr),
                    );
                    continue;
                }
            };

            if is_set_line {
                if self.symbol(sym).ty == SymbolType::String && val.starts_with('"') {
                    if val.len() < 2 || !val.ends_with('"') {
                        self.warn_at("malformed string literal", Some(&filename), Some(linenr));
                        continue;
                    }
                    // Strip the quotes and undo the escaping; " can only
                    // appear as \" inside the value
                    val = val[1..val.len() - 1]
                        .replace("\\\"", "\"")
                        .replace("\\\\", "\\");
                }

                if let Some(choice) = self.symbol(sym).choice() {
                    if let (Some(mode), Some(tri)) = (
                        self.choice(choice).user_value(),
                        Tristate::from_value_str(&val),
                    ) {
                        if tri != Tristate::No && mode != tri {
                            self.warn_at(
                                &format!(
                                    "the assignment to {} changes the mode of its \
                                     containing choice from {} to {}",
                                    name, mode, tri
                                ),
                                Some(&filename),
                                Some(linenr),
                            );
                        }
                    }
                }
            }

            if let Some(old) = self.symbol(sym).user_value() {
                let old = old.to_owned();
                self.warn_at(
                    &format!(
                        "{} set more than once. Old value: \"{}\", new value: \"{}\"",
                        name, old, val
                    ),
                    Some(&filename),
                    Some(linenr),
                );
            }

            self.set_value_no_invalidate(sym, &val, true);
        }

        for (i, &sym) in unique.iter().enumerate() {
            if self.sym_str_value(sym) != before[i] {
                self.config_changed.set(true);
                break;
            }
        }

        Ok(())
    }

    /// Writes the configuration in `.config` format, byte-compatible with
    /// the C tools (modulo the header comment).
    pub fn write_config<P: AsRef<Path>>(&self, path: P) -> KconfigResult<()> {
        self.write_config_with_header(path, DEFAULT_CONFIG_HEADER)
    }

    pub fn write_config_with_header<P: AsRef<Path>>(
        &self,
        path: P,
        header: &str,
    ) -> KconfigResult<()> {
        let path = path.as_ref();
        let mut out = String::from(header);
        out.push_str(&self.config_contents());
        fs::write(path, out).with_context(|| format!("could not write \"{}\"", path.display()))?;
        Ok(())
    }

    /// The `.config` body: a tree walk over the finalized menus, emitting
    /// each symbol once and a comment block for every visible menu and
    /// comment.
    fn config_contents(&self) -> String {
        let mut out = String::new();

        for &sym in self.defined_syms() {
            self.symbol(sym).already_written.set(false);
        }

        let mut node = match self.node(self.top_node()).list() {
            Some(first) => first,
            None => return out,
        };

        loop {
            match self.node(node).item() {
                Some(MenuItem::Sym(sym)) => {
                    // Multiply-defined symbols get one entry, at the first
                    // location
                    if !self.symbol(sym).already_written.get() {
                        self.symbol(sym).already_written.set(true);
                        if let Some(line) = self.sym_config_string(sym) {
                            out.push_str(&line);
                        }
                    }
                }
                Some(MenuItem::Menu) => {
                    let menu = self.node(node);
                    if self.expr_value(menu.dep()) != Tristate::No
                        && self.expr_value(menu.visibility()) != Tristate::No
                    {
                        if let Some((text, _)) = menu.prompt() {
                            out.push_str(&format!("\n#\n# {}\n#\n", text));
                        }
                    }
                }
                Some(MenuItem::Comment) => {
                    let comment = self.node(node);
                    if self.expr_value(comment.dep()) != Tristate::No {
                        if let Some((text, _)) = comment.prompt() {
                            out.push_str(&format!("\n#\n# {}\n#\n", text));
                        }
                    }
                }
                _ => {}
            }

            // Iterative tree walk using the parent pointers
            if let Some(child) = self.node(node).list() {
                node = child;
            } else if let Some(next) = self.node(node).next() {
                node = next;
            } else {
                loop {
                    match self.node(node).parent() {
                        Some(parent) => {
                            node = parent;
                            if let Some(next) = self.node(node).next() {
                                node = next;
                                break;
                            }
                        }
                        None => return out,
                    }
                }
            }
        }
    }

    /// The `.config` line for the symbol, or `None` when no line would be
    /// written (invisible with no active default or select, bound to the
    /// environment, or undefined).
    pub fn sym_config_string(&self, id: SymbolId) -> Option<String> {
        let sym = self.symbol(id);

        // Symbols with 'option env' never get written out
        if sym.env_var().is_some() {
            return None;
        }

        // The write flag is determined while the value is calculated
        let val = self.sym_str_value(id);
        if !sym.write_to_conf.get() {
            return None;
        }

        let prefix = self.config_prefix();
        Some(match sym.ty {
            SymbolType::Bool | SymbolType::Tristate => {
                if val == "n" {
                    format!("# {}{} is not set\n", prefix, sym.name())
                } else {
                    format!("{}{}={}\n", prefix, sym.name(), val)
                }
            }
            SymbolType::Int | SymbolType::Hex => {
                format!("{}{}={}\n", prefix, sym.name(), val)
            }
            SymbolType::String => {
                format!("{}{}=\"{}\"\n", prefix, sym.name(), escape_string_value(&val))
            }
            SymbolType::Unknown => return None,
        })
    }

    /// Writes a minimal configuration: only symbols whose value differs
    /// from the value they would take with no user input at all. Loading
    /// the result reproduces the current configuration.
    pub fn write_min_config<P: AsRef<Path>>(&self, path: P) -> KconfigResult<()> {
        let path = path.as_ref();
        let mut out = String::from(DEFAULT_CONFIG_HEADER);

        for sym in self.unique_defined_syms() {
            let symbol = self.symbol(sym);

            // Symbols the user cannot budge contribute nothing. Selects
            // don't apply to choice members, so only check the rest.
            if symbol.choice().is_none()
                && self.sym_visibility(sym) <= self.expr_value(symbol.rev_dep())
            {
                continue;
            }

            // Values matching the no-user-input state are implied
            if self.sym_str_value(sym) == self.sym_str_default(sym) {
                continue;
            }

            // So is the default selection of a mandatory bool choice
            if let Some(choice) = symbol.choice() {
                if !self.choice(choice).is_optional()
                    && self.choice_default_selection(choice) == Some(sym)
                    && self.sym_type(sym) == SymbolType::Bool
                    && self.sym_tri_value(sym) == Tristate::Yes
                {
                    continue;
                }
            }

            if let Some(line) = self.sym_config_string(sym) {
                out.push_str(&line);
            }
        }

        fs::write(path, out).with_context(|| format!("could not write \"{}\"", path.display()))?;
        Ok(())
    }

    /// The value the symbol would take if the user had set nothing.
    fn sym_str_default(&self, id: SymbolId) -> String {
        let sym = self.symbol(id);

        match sym.ty {
            SymbolType::Bool | SymbolType::Tristate => {
                let mut val = Tristate::No;

                if sym.choice().is_none() {
                    for (default, cond) in sym.defaults() {
                        let cond_val = self.expr_value(cond);
                        if cond_val != Tristate::No {
                            val = self.expr_value(default).and(cond_val);
                            break;
                        }
                    }

                    if self.expr_value(sym.direct_dep()) != Tristate::No {
                        let weak = self.expr_value(sym.weak_rev_dep());
                        if weak != Tristate::No {
                            val = val.or(weak);
                        }
                    }
                    val = val.or(self.expr_value(sym.rev_dep()));
                }

                if val == Tristate::Mod
                    && (self.sym_type(id) == SymbolType::Bool
                        || self.expr_value(sym.weak_rev_dep()) == Tristate::Yes)
                {
                    val = Tristate::Yes;
                }
                val.as_str().to_owned()
            }

            SymbolType::String => {
                for (default, cond) in sym.defaults() {
                    if self.expr_value(cond) != Tristate::No {
                        return self.default_leaf_str(default);
                    }
                }
                String::new()
            }

            SymbolType::Int | SymbolType::Hex => {
                // Mirrors the value calculation, minus the user value (and
                // without disturbing the write flags)
                let base = sym.ty.base();

                let mut active_range: Option<(i128, i128)> = None;
                for (low, high, cond) in sym.ranges() {
                    if self.expr_value(cond) != Tristate::No {
                        let low = crate::types::parse_num(&self.sym_str_value(*low), base)
                            .unwrap_or(0);
                        let high = crate::types::parse_num(&self.sym_str_value(*high), base)
                            .unwrap_or(0);
                        active_range = Some((low, high));
                        break;
                    }
                }

                for (default, cond) in sym.defaults() {
                    if self.expr_value(cond) == Tristate::No {
                        continue;
                    }
                    let val = self.default_leaf_str(default);
                    if let (Some(num), Some((low, high))) =
                        (crate::types::parse_num(&val, base), active_range)
                    {
                        if num < low {
                            return self.format_int_hex(id, low);
                        }
                        if num > high {
                            return self.format_int_hex(id, high);
                        }
                    }
                    return val;
                }

                if let Some((low, _)) = active_range {
                    if low > 0 {
                        return self.format_int_hex(id, low);
                    }
                }
                String::new()
            }

            SymbolType::Unknown => String::new(),
        }
    }

    /// Writes an `autoconf.h`-style C header: `#define CONFIG_X 1` for `y`,
    /// `#define CONFIG_X_MODULE 1` for `m`, quoted strings, and numeric
    /// values (hex with a guaranteed `0x` prefix). Symbols at `n` produce
    /// no define.
    pub fn write_autoconf<P: AsRef<Path>>(&self, path: P) -> KconfigResult<()> {
        self.write_autoconf_with_header(path, DEFAULT_AUTOCONF_HEADER)
    }

    pub fn write_autoconf_with_header<P: AsRef<Path>>(
        &self,
        path: P,
        header: &str,
    ) -> KconfigResult<()> {
        let path = path.as_ref();
        let mut out = String::from(header);

        for sym in self.unique_defined_syms() {
            if let Some(defines) = self.sym_autoconf_str(sym) {
                out.push_str(&defines);
            }
        }

        fs::write(path, out).with_context(|| format!("could not write \"{}\"", path.display()))?;
        Ok(())
    }

    /// The `#define` form of the symbol's current value, or `None` if the
    /// symbol contributes nothing to the header.
    fn sym_autoconf_str(&self, id: SymbolId) -> Option<String> {
        let sym = self.symbol(id);

        if sym.env_var().is_some() {
            return None;
        }

        let val = self.sym_str_value(id);
        if !sym.write_to_conf.get() {
            return None;
        }

        let prefix = self.config_prefix();
        match sym.ty {
            SymbolType::Bool | SymbolType::Tristate => match val.as_str() {
                "y" => Some(format!("#define {}{} 1\n", prefix, sym.name())),
                "m" => Some(format!("#define {}{}_MODULE 1\n", prefix, sym.name())),
                _ => None,
            },
            SymbolType::String => Some(format!(
                "#define {}{} \"{}\"\n",
                prefix,
                sym.name(),
                escape_string_value(&val)
            )),
            SymbolType::Int => {
                if val.is_empty() {
                    None
                } else {
                    Some(format!("#define {}{} {}\n", prefix, sym.name(), val))
                }
            }
            SymbolType::Hex => {
                if val.is_empty() {
                    None
                } else {
                    let val = if val.starts_with("0x") || val.starts_with("0X") {
                        val
                    } else {
                        format!("0x{}", val)
                    };
                    Some(format!("#define {}{} {}\n", prefix, sym.name(), val))
                }
            }
            SymbolType::Unknown => None,
        }
    }

    /// Refreshes the per-symbol dependency fragments under `dir` for
    /// incremental builds: each symbol whose value changed since the last
    /// sync gets its `<dir>/<NAME with '_' as '/'>.h` fragment rewritten
    /// with its current `#define` form; unchanged symbols' fragments are
    /// left untouched, preserving their mtimes. The previous state is kept
    /// in `<dir>/auto.conf`.
    pub fn sync_deps<P: AsRef<Path>>(&self, dir: P) -> KconfigResult<()> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)
            .with_context(|| format!("could not create \"{}\"", dir.display()))?;

        let auto_conf_path = dir.join("auto.conf");
        let mut old_vals: HashMap<String, String> = HashMap::new();
        if let Ok(contents) = fs::read_to_string(&auto_conf_path) {
            for line in contents.lines() {
                if let Some(caps) = self.set_re.captures(line) {
                    old_vals.insert(caps[1].to_owned(), caps[2].to_owned());
                }
            }
        }

        for sym in self.unique_defined_syms() {
            let name = self.symbol(sym).name().to_owned();
            let current = self.sym_auto_conf_value(sym);

            if old_vals.get(&name).map(String::as_str) == current.as_deref() {
                continue;
            }

            let fragment = dir.join(sym_header_path(&name));
            if let Some(parent) = fragment.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("could not create \"{}\"", parent.display()))?;
            }
            let contents = self.sym_autoconf_str(sym).unwrap_or_default();
            fs::write(&fragment, contents)
                .with_context(|| format!("could not write \"{}\"", fragment.display()))?;
        }

        let mut out = String::new();
        for sym in self.unique_defined_syms() {
            if let Some(val) = self.sym_auto_conf_value(sym) {
                out.push_str(&format!(
                    "{}{}={}\n",
                    self.config_prefix(),
                    self.symbol(sym).name(),
                    val
                ));
            }
        }
        fs::write(&auto_conf_path, out)
            .with_context(|| format!("could not write \"{}\"", auto_conf_path.display()))?;

        Ok(())
    }

    /// The right-hand side recorded in `auto.conf` for change tracking;
    /// `None` for symbols that are absent from the current config.
    fn sym_auto_conf_value(&self, id: SymbolId) -> Option<String> {
        let sym = self.symbol(id);

        if sym.env_var().is_some() {
            return None;
        }

        let val = self.sym_str_value(id);
        if !sym.write_to_conf.get() {
            return None;
        }

        match sym.ty {
            SymbolType::Bool | SymbolType::Tristate => {
                if val == "n" {
                    None
                } else {
                    Some(val)
                }
            }
            SymbolType::String => Some(format!("\"{}\"", escape_string_value(&val))),
            SymbolType::Int | SymbolType::Hex => {
                if val.is_empty() {
                    None
                } else {
                    Some(val)
                }
            }
            SymbolType::Unknown => None,
        }
    }
}

/// Escapes `\` and `"` for quoted `.config`/header values.
fn escape_string_value(val: &str) -> String {
    val.replace('\\', "\\\\").replace('"', "\\\"")
}

/// `FOO_BAR` keeps its case but nests: `FOO/BAR.h`.
fn sym_header_path(name: &str) -> PathBuf {
    PathBuf::from(format!("{}.h", name.replace('_', "/")))
}

//! Recursive-descent parser for Kconfig files.
//!
//! Parsing is driven a logical line at a time: `parse_block` consumes the
//! contents of a file, `if`, `menu`, or `choice` block and emits a chain of
//! menu nodes linked through `next`, while `parse_properties` consumes the
//! property lines following a `config`/`menuconfig`/`choice`/`menu`/
//! `comment` and attaches them to the node's item, with the surrounding
//! dependency context ANDed into every condition.
//!
//! Blocks nest through recursion; a nested block's node chain is tilted up
//! into the opening node's `list` pointer when the block closes. `if` nodes
//! are kept in the chain here and collapsed later by finalization.

use std::path::Path;
use std::rc::Rc;

use itertools::Itertools;

use crate::errors::KconfigError;
use crate::expr::{CmpOp, Expr};
use crate::kconfig::Kconfig;
use crate::lexer::{self, Keyword, Token};
use crate::menu::{MenuItem, MenuNode, NodeId};
use crate::symbol::SymbolId;
use crate::types::SymbolType;
use crate::KconfigResult;

#[cfg(test)]
mod tests;

/// Token stream for one logical line.
pub(crate) struct TokenFeed {
    tokens: Vec<Token>,
    i: usize,
}

impl TokenFeed {
    fn new(tokens: Vec<Token>) -> TokenFeed {
        TokenFeed { tokens, i: 0 }
    }

    fn next(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.i).cloned();
        if tok.is_some() {
            self.i += 1;
        }
        tok
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.i)
    }

    /// Consumes the next token if it equals `token`.
    fn check(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.i += 1;
            return true;
        }
        false
    }

    fn check_key(&mut self, kw: Keyword) -> bool {
        self.check(&Token::Key(kw))
    }

    fn reset(&mut self) {
        self.i = 0;
    }
}

/// Feeds logical lines from one Kconfig file. Lines ending in `\` are
/// joined with their successor, except when help text is being collected
/// (`next_no_join`).
pub(crate) struct FileFeed {
    pub(crate) filename: Rc<str>,
    lines: Vec<String>,
    /// 1-based number of the most recently returned line.
    pub(crate) linenr: usize,
}

impl FileFeed {
    fn new(contents: &str, filename: Rc<str>) -> FileFeed {
        FileFeed {
            filename,
            lines: contents.lines().map(str::to_owned).collect(),
            linenr: 0,
        }
    }

    fn next(&mut self) -> Option<String> {
        if self.linenr >= self.lines.len() {
            return None;
        }
        let mut line = self.lines[self.linenr].clone();
        self.linenr += 1;
        while line.ends_with('\\') && self.linenr < self.lines.len() {
            line.pop();
            line.push_str(&self.lines[self.linenr]);
            self.linenr += 1;
        }
        Some(line)
    }

    fn next_no_join(&mut self) -> Option<String> {
        if self.linenr >= self.lines.len() {
            return None;
        }
        let line = self.lines[self.linenr].clone();
        self.linenr += 1;
        Some(line)
    }

    /// Pushes the most recent (unjoined) line back.
    fn unread(&mut self) {
        self.linenr -= 1;
    }
}

/// Parses the Kconfig file at `path` into `kc`. `kc.top_node()`'s `list`
/// points at the first top-level node afterwards.
pub(crate) fn parse_kconfig(kc: &mut Kconfig, path: &Path) -> KconfigResult<()> {
    let top = kc.top_node();
    let visible_if = Rc::clone(&kc.expr_y);

    let mut parser = Parser {
        kc: &mut *kc,
        for_eval: false,
    };
    parser.source_file(path, None, top, &visible_if, top)?;

    let first = kc.node(top).next();
    kc.node_mut(top).list = first;
    kc.node_mut(top).next = None;
    Ok(())
}

/// Parses a bare expression string against `kc`'s symbols, for
/// `eval_string()`. Unknown symbol references warn and do not get
/// registered.
pub(crate) fn parse_expr_string(kc: &mut Kconfig, s: &str) -> KconfigResult<Rc<Expr>> {
    let tokens = lexer::tokenize_expr(s)?;
    let mut feed = TokenFeed::new(tokens);
    let mut parser = Parser { kc, for_eval: true };
    parser.parse_expr(&mut feed, s, "<expression>", 0, true)
}

struct Parser<'a> {
    kc: &'a mut Kconfig,
    /// True while parsing an `eval_string()` expression: symbol lookups
    /// must not register new symbols.
    for_eval: bool,
}

impl<'a> Parser<'a> {
    /// Opens `path` (relative paths fall back to `$srctree`) and parses it
    /// as a block appended after `prev_node`. `at` carries the location of
    /// the `source` statement for error messages.
    fn source_file(
        &mut self,
        path: &Path,
        at: Option<(&str, &str, usize)>,
        parent: NodeId,
        visible_if_deps: &Rc<Expr>,
        prev_node: NodeId,
    ) -> KconfigResult<NodeId> {
        let (contents, resolved) = match self.kc.read_file(path) {
            Ok(ok) => ok,
            Err(err) => {
                let msg = format!("could not open \"{}\": {}", path.display(), err);
                return Err(match at {
                    Some((line, filename, linenr)) => {
                        KconfigError::parse(line, &msg, filename, linenr).into()
                    }
                    None => KconfigError::Io(err).into(),
                });
            }
        };

        let filename: Rc<str> = Rc::from(resolved.to_string_lossy().as_ref());
        let mut feeder = FileFeed::new(&contents, filename);
        self.parse_block(&mut feeder, None, parent, visible_if_deps, None, prev_node)
    }

    /// Parses the contents of a file or an `if`/`menu`/`choice` block,
    /// ended by `end_token` (`None` for files). Returns the final node of
    /// the block, or `prev_node` if the block was empty.
    fn parse_block(
        &mut self,
        feeder: &mut FileFeed,
        end_token: Option<Keyword>,
        parent: NodeId,
        visible_if_deps: &Rc<Expr>,
        mut prev_line: Option<(String, TokenFeed)>,
        mut prev_node: NodeId,
    ) -> KconfigResult<NodeId> {
        loop {
            let (line, mut tokens) = match prev_line.take() {
                Some(saved) => saved,
                None => {
                    let line = match feeder.next() {
                        Some(line) => line,
                        None => {
                            if end_token.is_some() {
                                return Err(KconfigError::Syntax(format!(
                                    "unexpected end of file {}",
                                    feeder.filename
                                ))
                                .into());
                            }
                            self.kc.node_mut(prev_node).next = None;
                            return Ok(prev_node);
                        }
                    };
                    match lexer::tokenize_line(&line, &feeder.filename, feeder.linenr)? {
                        Some(tokens) => (line, TokenFeed::new(tokens)),
                        None => continue,
                    }
                }
            };

            let filename = Rc::clone(&feeder.filename);
            let linenr = feeder.linenr;

            let t0 = match tokens.next() {
                Some(Token::Key(kw)) => kw,
                _ => unreachable!("tokenize_line yields a keyword first"),
            };

            if Some(t0) == end_token {
                self.kc.node_mut(prev_node).next = None;
                return Ok(prev_node);
            }

            match t0 {
                Keyword::Config | Keyword::Menuconfig => {
                    let name = self.expect_name(&mut tokens, &line, &filename, linenr)?;
                    let sym = self.kc.lookup_sym(&name);

                    let node = self.new_node(Some(MenuItem::Sym(sym)), parent, feeder);
                    self.kc.node_mut(node).is_menuconfig = t0 == Keyword::Menuconfig;

                    prev_line = self.parse_properties(feeder, node, visible_if_deps)?;

                    self.kc.sym_mut(sym).nodes.push(node);
                    self.kc.defined_syms.push(sym);

                    self.kc.node_mut(prev_node).next = Some(node);
                    prev_node = node;
                }

                Keyword::Source | Keyword::Rsource | Keyword::Gsource => {
                    let pathstr = self.expect_string(&mut tokens, &line, &filename, linenr)?;
                    let at = Some((line.as_str(), &*filename, linenr));

                    match t0 {
                        Keyword::Source => {
                            prev_node = self.source_file(
                                Path::new(&pathstr),
                                at,
                                parent,
                                visible_if_deps,
                                prev_node,
                            )?;
                        }
                        Keyword::Rsource => {
                            let base = Path::new(&*filename)
                                .parent()
                                .unwrap_or_else(|| Path::new(""));
                            prev_node = self.source_file(
                                &base.join(&pathstr),
                                at,
                                parent,
                                visible_if_deps,
                                prev_node,
                            )?;
                        }
                        Keyword::Gsource => {
                            let base = Path::new(&*filename)
                                .parent()
                                .unwrap_or_else(|| Path::new(""));
                            let pattern = base.join(&pathstr);
                            let pattern_str = pattern.to_string_lossy();

                            let paths = glob::glob(&pattern_str).map_err(|err| {
                                KconfigError::parse(
                                    &line,
                                    &format!("malformed glob pattern: {}", err),
                                    &filename,
                                    linenr,
                                )
                            })?;

                            let matched = paths.filter_map(Result::ok).sorted();

                            // Zero matches is fine: gsource is include-if-exists
                            for path in matched {
                                prev_node = self.source_file(
                                    &path,
                                    at,
                                    parent,
                                    visible_if_deps,
                                    prev_node,
                                )?;
                            }
                        }
                        _ => unreachable!(),
                    }
                }

                Keyword::If => {
                    let cond = self.parse_expr(&mut tokens, &line, &filename, linenr, true)?;

                    let node = self.new_node(None, parent, feeder);
                    let parent_dep = Rc::clone(&self.kc.node(parent).dep);
                    self.kc.node_mut(node).dep = self.kc.make_and(&parent_dep, &cond);

                    self.parse_block(
                        feeder,
                        Some(Keyword::Endif),
                        node,
                        visible_if_deps,
                        None,
                        node,
                    )?;
                    let first_child = self.kc.node(node).next();
                    self.kc.node_mut(node).list = first_child;

                    self.kc.node_mut(prev_node).next = Some(node);
                    prev_node = node;
                }

                Keyword::Menu => {
                    let title = self.expect_string(&mut tokens, &line, &filename, linenr)?;

                    let node = self.new_node(Some(MenuItem::Menu), parent, feeder);

                    let saved = self.parse_properties(feeder, node, visible_if_deps)?;

                    let dep = Rc::clone(&self.kc.node(node).dep);
                    self.kc.node_mut(node).prompt = Some((title, dep));

                    let vis = Rc::clone(&self.kc.node(node).visibility);
                    let child_visible_if = self.kc.make_and(visible_if_deps, &vis);

                    self.parse_block(
                        feeder,
                        Some(Keyword::Endmenu),
                        node,
                        &child_visible_if,
                        saved,
                        node,
                    )?;
                    let first_child = self.kc.node(node).next();
                    self.kc.node_mut(node).list = first_child;

                    self.kc.node_mut(prev_node).next = Some(node);
                    prev_node = node;
                }

                Keyword::Comment => {
                    let text = self.expect_string(&mut tokens, &line, &filename, linenr)?;

                    let node = self.new_node(Some(MenuItem::Comment), parent, feeder);

                    prev_line = self.parse_properties(feeder, node, visible_if_deps)?;

                    let dep = Rc::clone(&self.kc.node(node).dep);
                    self.kc.node_mut(node).prompt = Some((text, dep));

                    self.kc.node_mut(prev_node).next = Some(node);
                    prev_node = node;
                }

                Keyword::Choice => {
                    let choice = match tokens.peek() {
                        Some(Token::Name(_) | Token::Literal(_)) => {
                            let name = match tokens.next() {
                                Some(Token::Name(n) | Token::Literal(n)) => n,
                                _ => unreachable!(),
                            };
                            self.kc.lookup_named_choice(&name)
                        }
                        _ => self.kc.new_choice(None),
                    };

                    let node = self.new_node(Some(MenuItem::Choice(choice)), parent, feeder);

                    let saved = self.parse_properties(feeder, node, visible_if_deps)?;
                    self.parse_block(
                        feeder,
                        Some(Keyword::Endchoice),
                        node,
                        visible_if_deps,
                        saved,
                        node,
                    )?;
                    let first_child = self.kc.node(node).next();
                    self.kc.node_mut(node).list = first_child;

                    self.kc.choice_mut(choice).nodes.push(node);

                    self.kc.node_mut(prev_node).next = Some(node);
                    prev_node = node;
                }

                Keyword::Mainmenu => {
                    let title = self.expect_string(&mut tokens, &line, &filename, linenr)?;
                    let top = self.kc.top_node();
                    let cond = Rc::clone(&self.kc.expr_y);
                    let top_node = self.kc.node_mut(top);
                    top_node.prompt = Some((title, cond));
                    top_node.filename = Rc::clone(&filename);
                    top_node.linenr = linenr;
                }

                _ => {
                    return Err(KconfigError::parse(
                        &line,
                        "unrecognized construct",
                        &filename,
                        linenr,
                    )
                    .into());
                }
            }
        }
    }

    /// Parses the property lines for `node` and attaches them to its item,
    /// with `depends on` and parent dependencies propagated into every
    /// condition. Returns the first line that turned out not to be a
    /// property, for reuse by the caller.
    fn parse_properties(
        &mut self,
        feeder: &mut FileFeed,
        node: NodeId,
        visible_if_deps: &Rc<Expr>,
    ) -> KconfigResult<Option<(String, TokenFeed)>> {
        // Properties found at this location only: a local 'depends on'
        // applies just to them when a symbol is defined in several places.
        let mut prompt: Option<(String, Rc<Expr>)> = None;
        let mut defaults: Vec<(Rc<Expr>, Rc<Expr>)> = Vec::new();
        let mut selects: Vec<(SymbolId, Rc<Expr>)> = Vec::new();
        let mut implies: Vec<(SymbolId, Rc<Expr>)> = Vec::new();
        let mut ranges: Vec<(SymbolId, SymbolId, Rc<Expr>)> = Vec::new();

        self.kc.node_mut(node).dep = Rc::clone(&self.kc.expr_y);

        let mut saved_line = None;

        loop {
            let line = match feeder.next() {
                Some(line) => line,
                None => break,
            };
            let filename = Rc::clone(&feeder.filename);
            let linenr = feeder.linenr;

            let mut tokens = match lexer::tokenize_line(&line, &filename, linenr)? {
                Some(tokens) => TokenFeed::new(tokens),
                None => continue,
            };

            let t0 = match tokens.next() {
                Some(Token::Key(kw)) => kw,
                _ => unreachable!("tokenize_line yields a keyword first"),
            };

            match t0 {
                Keyword::Depends => {
                    if !tokens.check_key(Keyword::On) {
                        return Err(KconfigError::parse(
                            &line,
                            "expected \"on\" after \"depends\"",
                            &filename,
                            linenr,
                        )
                        .into());
                    }
                    let cond = self.parse_expr(&mut tokens, &line, &filename, linenr, true)?;
                    let dep = Rc::clone(&self.kc.node(node).dep);
                    self.kc.node_mut(node).dep = self.kc.make_and(&dep, &cond);
                }

                Keyword::Help => {
                    self.parse_help(feeder, node);
                }

                Keyword::Select | Keyword::Imply => {
                    if self.node_sym(node).is_none() {
                        return Err(KconfigError::parse(
                            &line,
                            if t0 == Keyword::Select {
                                "only symbols can select"
                            } else {
                                "only symbols can imply"
                            },
                            &filename,
                            linenr,
                        )
                        .into());
                    }
                    let target = self.expect_sym(&mut tokens, &line, &filename, linenr)?;
                    let cond = self.parse_cond(&mut tokens, &line, &filename, linenr)?;
                    if t0 == Keyword::Select {
                        selects.push((target, cond));
                    } else {
                        implies.push((target, cond));
                    }
                }

                Keyword::Bool
                | Keyword::Tristate
                | Keyword::String
                | Keyword::Int
                | Keyword::Hex => {
                    self.set_item_type(node, keyword_type(t0), &filename, linenr);
                    if tokens.peek().is_some() {
                        let text = self.expect_string(&mut tokens, &line, &filename, linenr)?;
                        let cond = self.parse_cond(&mut tokens, &line, &filename, linenr)?;
                        prompt = Some((text, cond));
                    }
                }

                Keyword::Default => {
                    let val = self.parse_expr(&mut tokens, &line, &filename, linenr, false)?;
                    let cond = self.parse_cond(&mut tokens, &line, &filename, linenr)?;
                    defaults.push((val, cond));
                }

                Keyword::DefBool | Keyword::DefTristate => {
                    self.set_item_type(node, keyword_type(t0), &filename, linenr);
                    let val = self.parse_expr(&mut tokens, &line, &filename, linenr, false)?;
                    let cond = self.parse_cond(&mut tokens, &line, &filename, linenr)?;
                    defaults.push((val, cond));
                }

                Keyword::Prompt => {
                    // Within one definition later prompts override earlier
                    // ones; more prompts can come from other definitions.
                    let text = self.expect_string(&mut tokens, &line, &filename, linenr)?;
                    let cond = self.parse_cond(&mut tokens, &line, &filename, linenr)?;
                    prompt = Some((text, cond));
                }

                Keyword::Range => {
                    let low = self.expect_sym(&mut tokens, &line, &filename, linenr)?;
                    let high = self.expect_sym(&mut tokens, &line, &filename, linenr)?;
                    let cond = self.parse_cond(&mut tokens, &line, &filename, linenr)?;
                    ranges.push((low, high, cond));
                }

                Keyword::Option => {
                    if tokens.check_key(Keyword::Env) {
                        if !tokens.check(&Token::Equal) {
                            return Err(KconfigError::parse(
                                &line,
                                "expected '=' after \"env\"",
                                &filename,
                                linenr,
                            )
                            .into());
                        }
                        let var = self.expect_string(&mut tokens, &line, &filename, linenr)?;

                        if let Some(sym) = self.node_sym(node) {
                            self.kc.sym_mut(sym).env_var = Some(var.clone());
                        }

                        match std::env::var(&var) {
                            Ok(value) => {
                                let const_sym = self.kc.lookup_const_sym(&value);
                                defaults.push((
                                    Rc::new(Expr::Sym(const_sym)),
                                    Rc::clone(&self.kc.expr_y),
                                ));
                            }
                            Err(_) => {
                                let item = self.node_item_name(node);
                                self.kc.warn_at(
                                    &format!(
                                        "{} references the non-existent environment \
                                         variable {}, so the 'option env' has no effect",
                                        item, var
                                    ),
                                    Some(&filename),
                                    Some(linenr),
                                );
                            }
                        }
                    } else if tokens.check_key(Keyword::DefconfigList) {
                        if let Some(sym) = self.node_sym(node) {
                            if self.kc.defconfig_list.is_none() {
                                self.kc.defconfig_list = Some(sym);
                            } else {
                                self.kc.warn_at(
                                    "'option defconfig_list' is set on multiple symbols; \
                                     only the first one is used",
                                    Some(&filename),
                                    Some(linenr),
                                );
                            }
                        }
                    } else if tokens.check_key(Keyword::Modules) {
                        // The modules symbol is hardcoded to MODULES. Only
                        // warn when the option shows up somewhere else.
                        if self.node_sym(node) != Some(self.kc.modules) {
                            self.kc.warn_at(
                                "the 'modules' option is only supported on a symbol \
                                 named MODULES",
                                Some(&filename),
                                Some(linenr),
                            );
                        }
                    } else if tokens.check_key(Keyword::AllnoconfigY) {
                        match self.node_sym(node) {
                            Some(sym) => self.kc.sym_mut(sym).is_allnoconfig_y = true,
                            None => {
                                return Err(KconfigError::parse(
                                    &line,
                                    "the 'allnoconfig_y' option is only valid for symbols",
                                    &filename,
                                    linenr,
                                )
                                .into());
                            }
                        }
                    } else {
                        return Err(KconfigError::parse(
                            &line,
                            "unrecognized option",
                            &filename,
                            linenr,
                        )
                        .into());
                    }
                }

                Keyword::Visible => {
                    if !tokens.check_key(Keyword::If) {
                        return Err(KconfigError::parse(
                            &line,
                            "expected \"if\" after \"visible\"",
                            &filename,
                            linenr,
                        )
                        .into());
                    }
                    let cond = self.parse_expr(&mut tokens, &line, &filename, linenr, true)?;
                    let vis = Rc::clone(&self.kc.node(node).visibility);
                    self.kc.node_mut(node).visibility = self.kc.make_and(&vis, &cond);
                }

                Keyword::Optional => match self.kc.node(node).item() {
                    Some(MenuItem::Choice(choice)) => {
                        self.kc.choice_mut(choice).is_optional = true;
                    }
                    _ => {
                        return Err(KconfigError::parse(
                            &line,
                            "\"optional\" is only valid for choices",
                            &filename,
                            linenr,
                        )
                        .into());
                    }
                },

                _ => {
                    tokens.reset();
                    saved_line = Some((line, tokens));
                    break;
                }
            }
        }

        // Done with the property lines. Now add the collected properties,
        // with the node dependencies propagated into their conditions.

        let parent = self.kc.node(node).parent().expect("non-root node");
        let parent_dep = Rc::clone(&self.kc.node(parent).dep);
        let local_dep = Rc::clone(&self.kc.node(node).dep);
        let dep = self.kc.make_and(&local_dep, &parent_dep);
        self.kc.node_mut(node).dep = Rc::clone(&dep);

        match self.kc.node(node).item() {
            Some(MenuItem::Sym(sym)) => {
                let old = Rc::clone(&self.kc.symbol(sym).direct_dep);
                let new = self.kc.make_or(&old, &dep);
                self.kc.sym_mut(sym).direct_dep = new;

                self.attach_prompt(node, prompt, &dep, visible_if_deps);

                for (val, cond) in defaults {
                    let cond = self.kc.make_and(&cond, &dep);
                    self.kc.sym_mut(sym).defaults.push((val, cond));
                }
                for (low, high, cond) in ranges {
                    let cond = self.kc.make_and(&cond, &dep);
                    self.kc.sym_mut(sym).ranges.push((low, high, cond));
                }

                let sym_expr: Rc<Expr> = Rc::new(Expr::Sym(sym));

                for (target, cond) in selects {
                    let cond = self.kc.make_and(&cond, &dep);
                    self.kc.sym_mut(sym).selects.push((target, Rc::clone(&cond)));

                    // Strengthen the reverse dependency of the target
                    let forced = self.kc.make_and(&sym_expr, &cond);
                    let old = Rc::clone(&self.kc.symbol(target).rev_dep);
                    let new = self.kc.make_or(&old, &forced);
                    self.kc.sym_mut(target).rev_dep = new;
                }

                for (target, cond) in implies {
                    let cond = self.kc.make_and(&cond, &dep);
                    self.kc.sym_mut(sym).implies.push((target, Rc::clone(&cond)));

                    let implied = self.kc.make_and(&sym_expr, &cond);
                    let old = Rc::clone(&self.kc.symbol(target).weak_rev_dep);
                    let new = self.kc.make_or(&old, &implied);
                    self.kc.sym_mut(target).weak_rev_dep = new;
                }
            }

            Some(MenuItem::Choice(choice)) => {
                self.attach_prompt(node, prompt, &dep, visible_if_deps);

                for (val, cond) in defaults {
                    let cond = self.kc.make_and(&cond, &dep);
                    self.kc.choice_mut(choice).defaults.push((val, cond));
                }
            }

            _ => {}
        }

        Ok(saved_line)
    }

    fn attach_prompt(
        &mut self,
        node: NodeId,
        prompt: Option<(String, Rc<Expr>)>,
        dep: &Rc<Expr>,
        visible_if_deps: &Rc<Expr>,
    ) {
        match prompt {
            Some((text, cond)) => {
                let cond = self.kc.make_and(&cond, dep);
                let cond = self.kc.make_and(&cond, visible_if_deps);
                self.kc.node_mut(node).prompt = Some((text, cond));
            }
            None => {
                self.kc.node_mut(node).prompt = None;
            }
        }
    }

    /// Collects a help block. The first non-blank line fixes the indent
    /// column (tab stops every 8); the block runs until a non-blank line
    /// with less indent.
    fn parse_help(&mut self, feeder: &mut FileFeed, node: NodeId) {
        let first = loop {
            match feeder.next_no_join() {
                None => {
                    self.kc.node_mut(node).help = Some(String::new());
                    return;
                }
                Some(line) => {
                    if !line.trim().is_empty() {
                        break line;
                    }
                }
            }
        };

        let indent = lexer::indentation(&first);
        if indent == 0 {
            // A first line at column zero means there is no help text at all
            self.kc.node_mut(node).help = Some(String::new());
            feeder.unread();
            return;
        }

        let mut help_lines = vec![lexer::deindent(&first, indent).trim_end().to_owned()];

        loop {
            match feeder.next_no_join() {
                None => break,
                Some(line) => {
                    if !line.trim().is_empty() && lexer::indentation(&line) < indent {
                        feeder.unread();
                        break;
                    }
                    help_lines.push(lexer::deindent(&line, indent).trim_end().to_owned());
                }
            }
        }

        let help = help_lines.join("\n").trim_end().to_owned() + "\n";
        self.kc.node_mut(node).help = Some(help);
    }

    //
    // Expression parsing
    //
    // Grammar:
    //
    //   expr:     and_expr ['||' expr]
    //   and_expr: factor ['&&' and_expr]
    //   factor:   <symbol> ['='/'!='/'<'/... <symbol>]
    //             '!' factor
    //             '(' expr ')'
    //

    fn parse_expr(
        &mut self,
        feed: &mut TokenFeed,
        line: &str,
        filename: &str,
        linenr: usize,
        transform_m: bool,
    ) -> KconfigResult<Rc<Expr>> {
        let and_expr = self.parse_and_expr(feed, line, filename, linenr, transform_m)?;

        if feed.check(&Token::Or) {
            let rest = self.parse_expr(feed, line, filename, linenr, transform_m)?;
            Ok(Rc::new(Expr::Or(and_expr, rest)))
        } else {
            Ok(and_expr)
        }
    }

    fn parse_and_expr(
        &mut self,
        feed: &mut TokenFeed,
        line: &str,
        filename: &str,
        linenr: usize,
        transform_m: bool,
    ) -> KconfigResult<Rc<Expr>> {
        let factor = self.parse_factor(feed, line, filename, linenr, transform_m)?;

        if feed.check(&Token::And) {
            let rest = self.parse_and_expr(feed, line, filename, linenr, transform_m)?;
            Ok(Rc::new(Expr::And(factor, rest)))
        } else {
            Ok(factor)
        }
    }

    fn parse_factor(
        &mut self,
        feed: &mut TokenFeed,
        line: &str,
        filename: &str,
        linenr: usize,
        transform_m: bool,
    ) -> KconfigResult<Rc<Expr>> {
        let malformed =
            || KconfigError::parse(line, "malformed expression", filename, linenr);

        match feed.next() {
            Some(tok @ (Token::Name(_) | Token::Literal(_))) => {
                let sym = self.token_to_sym(&tok);

                let op = match feed.peek() {
                    Some(Token::Equal) => Some(CmpOp::Equal),
                    Some(Token::Unequal) => Some(CmpOp::Unequal),
                    Some(Token::Less) => Some(CmpOp::Less),
                    Some(Token::LessEqual) => Some(CmpOp::LessEqual),
                    Some(Token::Greater) => Some(CmpOp::Greater),
                    Some(Token::GreaterEqual) => Some(CmpOp::GreaterEqual),
                    _ => None,
                };

                match op {
                    Some(op) => {
                        feed.next();
                        let rhs = match feed.next() {
                            Some(tok @ (Token::Name(_) | Token::Literal(_))) => {
                                self.token_to_sym(&tok)
                            }
                            _ => return Err(malformed().into()),
                        };
                        Ok(Rc::new(Expr::Cmp(op, sym, rhs)))
                    }
                    None => {
                        // In conditional expressions a plain 'm' means
                        // 'm && MODULES'
                        if transform_m && sym == self.kc.m {
                            Ok(Rc::new(Expr::And(
                                Rc::clone(&self.kc.expr_m),
                                Rc::new(Expr::Sym(self.kc.modules)),
                            )))
                        } else {
                            Ok(Rc::new(Expr::Sym(sym)))
                        }
                    }
                }
            }

            Some(Token::Not) => {
                let operand = self.parse_factor(feed, line, filename, linenr, transform_m)?;
                Ok(Rc::new(Expr::Not(operand)))
            }

            Some(Token::OpenParen) => {
                let expr = self.parse_expr(feed, line, filename, linenr, transform_m)?;
                if !feed.check(&Token::CloseParen) {
                    return Err(KconfigError::parse(
                        line,
                        "missing end parenthesis",
                        filename,
                        linenr,
                    )
                    .into());
                }
                Ok(expr)
            }

            _ => Err(malformed().into()),
        }
    }

    //
    // Helpers
    //

    fn new_node(&mut self, item: Option<MenuItem>, parent: NodeId, feeder: &FileFeed) -> NodeId {
        let id = NodeId(self.kc.nodes.len() as u32);
        self.kc.nodes.push(MenuNode {
            item,
            prompt: None,
            help: None,
            dep: Rc::clone(&self.kc.expr_y),
            visibility: Rc::clone(&self.kc.expr_y),
            is_menuconfig: false,
            parent: Some(parent),
            list: None,
            next: None,
            filename: Rc::clone(&feeder.filename),
            linenr: feeder.linenr,
        });
        id
    }

    fn node_sym(&self, node: NodeId) -> Option<SymbolId> {
        match self.kc.node(node).item() {
            Some(MenuItem::Sym(sym)) => Some(sym),
            _ => None,
        }
    }

    fn node_item_name(&self, node: NodeId) -> String {
        match self.kc.node(node).item() {
            Some(MenuItem::Sym(sym)) => format!("the symbol {}", self.kc.symbol(sym).name()),
            Some(MenuItem::Choice(_)) => "the choice".to_owned(),
            _ => "the menu node".to_owned(),
        }
    }

    /// Resolves a `Name`/`Literal` token to a symbol. `n`/`m`/`y` and
    /// quoted strings intern as constant symbols; other names register (or,
    /// for `eval_string()`, warn and stay unregistered).
    fn token_to_sym(&mut self, tok: &Token) -> SymbolId {
        match tok {
            Token::Name(name) => {
                if matches!(name.as_str(), "n" | "m" | "y") {
                    return self.kc.lookup_const_sym(name);
                }
                if self.for_eval {
                    match self.kc.lookup(name) {
                        Some(id) => id,
                        None => {
                            self.kc
                                .warn(&format!("no symbol {} in configuration", name));
                            self.kc.alloc_sym(name, false)
                        }
                    }
                } else {
                    self.kc.lookup_sym(name)
                }
            }
            Token::Literal(text) => self.kc.lookup_const_sym(text),
            _ => unreachable!("not a symbol token"),
        }
    }

    fn parse_cond(
        &mut self,
        feed: &mut TokenFeed,
        line: &str,
        filename: &str,
        linenr: usize,
    ) -> KconfigResult<Rc<Expr>> {
        if feed.check_key(Keyword::If) {
            self.parse_expr(feed, line, filename, linenr, true)
        } else {
            Ok(Rc::clone(&self.kc.expr_y))
        }
    }

    fn expect_name(
        &mut self,
        feed: &mut TokenFeed,
        line: &str,
        filename: &str,
        linenr: usize,
    ) -> KconfigResult<String> {
        match feed.next() {
            Some(Token::Name(name)) => Ok(name),
            _ => Err(KconfigError::parse(line, "expected a symbol name", filename, linenr).into()),
        }
    }

    fn expect_string(
        &mut self,
        feed: &mut TokenFeed,
        line: &str,
        filename: &str,
        linenr: usize,
    ) -> KconfigResult<String> {
        match feed.next() {
            Some(Token::Name(text) | Token::Literal(text)) => Ok(text),
            _ => Err(KconfigError::parse(line, "expected a string", filename, linenr).into()),
        }
    }

    fn expect_sym(
        &mut self,
        feed: &mut TokenFeed,
        line: &str,
        filename: &str,
        linenr: usize,
    ) -> KconfigResult<SymbolId> {
        match feed.next() {
            Some(tok @ (Token::Name(_) | Token::Literal(_))) => Ok(self.token_to_sym(&tok)),
            _ => Err(KconfigError::parse(line, "expected a symbol", filename, linenr).into()),
        }
    }

    fn set_item_type(
        &mut self,
        node: NodeId,
        new_type: SymbolType,
        filename: &str,
        linenr: usize,
    ) {
        match self.kc.node(node).item() {
            Some(MenuItem::Sym(sym)) => {
                let current = self.kc.symbol(sym).ty;
                if current == SymbolType::Unknown {
                    self.kc.sym_mut(sym).ty = new_type;
                } else if current != new_type {
                    let name = self.kc.symbol(sym).name().to_owned();
                    self.kc.warn_at(
                        &format!(
                            "{} defined with multiple types, keeping {}",
                            name,
                            current.name()
                        ),
                        Some(filename),
                        Some(linenr),
                    );
                }
            }
            Some(MenuItem::Choice(choice)) => {
                let current = self.kc.choice(choice).ty;
                if current == SymbolType::Unknown {
                    self.kc.choice_mut(choice).ty = new_type;
                } else if current != new_type {
                    self.kc.warn_at(
                        &format!("the choice is defined with multiple types, keeping {}",
                            current.name()),
                        Some(filename),
                        Some(linenr),
                    );
                }
            }
            _ => {}
        }
    }
}

fn keyword_type(kw: Keyword) -> SymbolType {
    match kw {
        Keyword::Bool | Keyword::DefBool => SymbolType::Bool,
        Keyword::Tristate | Keyword::DefTristate => SymbolType::Tristate,
        Keyword::String => SymbolType::String,
        Keyword::Int => SymbolType::Int,
        Keyword::Hex => SymbolType::Hex,
        _ => unreachable!("not a type keyword"),
    }
}

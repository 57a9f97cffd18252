//! A library for parsing Kconfig-based configuration systems (the
//! configuration language used by the Linux kernel) and working with the
//! resulting model of symbols, choices, and menus.
//!
//! The entry point is [`Kconfig::load`], which parses a Kconfig file tree and
//! finalizes the menu structure. Symbols, choices, and menu nodes are
//! addressed through lightweight handles ([`SymbolId`], [`ChoiceId`],
//! [`NodeId`]) into arenas owned by the [`Kconfig`] instance; values are
//! computed lazily under tristate logic and recomputed only when a value they
//! depend on changes.
//!
//! ```no_run
//! use kconfig::Kconfig;
//!
//! let mut kc = Kconfig::load("Kconfig")?;
//! if let Some(foo) = kc.lookup("FOO") {
//!     kc.set_value(foo, "y");
//! }
//! kc.write_config(".config")?;
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod choice;
pub mod config_io;
pub mod errors;
pub mod eval;
pub mod expr;
pub mod finalize;
pub mod kconfig;
pub mod lexer;
pub mod menu;
pub mod parser;
pub mod symbol;
pub mod types;

pub use choice::{Choice, ChoiceId};
pub use errors::KconfigError;
pub use expr::{CmpOp, Expr};
pub use kconfig::Kconfig;
pub use menu::{MenuItem, MenuNode, NodeId};
pub use symbol::{Symbol, SymbolId};
pub use types::{SymbolType, Tristate};

pub type KconfigResult<T> = anyhow::Result<T>;

use phf::phf_map;

/// Kconfig keywords. The scanner recognizes these wherever an identifier
/// could appear; whether a non-keyword word names a symbol or is a bare
/// string is decided by the parser from context.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Keyword {
    AllnoconfigY,
    Bool,
    Choice,
    Comment,
    Config,
    DefBool,
    DefTristate,
    Default,
    DefconfigList,
    Depends,
    Endchoice,
    Endif,
    Endmenu,
    Env,
    Gsource,
    Help,
    Hex,
    If,
    Imply,
    Int,
    Mainmenu,
    Menu,
    Menuconfig,
    Modules,
    On,
    Option,
    Optional,
    Prompt,
    Range,
    Rsource,
    Select,
    Source,
    String,
    Tristate,
    Visible,
}

/// Keyword spellings. "boolean" is accepted as an alias for "bool", like
/// the C tools.
pub static KEYWORDS: phf::Map<&'static str, Keyword> = phf_map! {
    "allnoconfig_y" => Keyword::AllnoconfigY,
    "bool" => Keyword::Bool,
    "boolean" => Keyword::Bool,
    "choice" => Keyword::Choice,
    "comment" => Keyword::Comment,
    "config" => Keyword::Config,
    "def_bool" => Keyword::DefBool,
    "def_tristate" => Keyword::DefTristate,
    "default" => Keyword::Default,
    "defconfig_list" => Keyword::DefconfigList,
    "depends" => Keyword::Depends,
    "endchoice" => Keyword::Endchoice,
    "endif" => Keyword::Endif,
    "endmenu" => Keyword::Endmenu,
    "env" => Keyword::Env,
    "gsource" => Keyword::Gsource,
    "help" => Keyword::Help,
    "hex" => Keyword::Hex,
    "if" => Keyword::If,
    "imply" => Keyword::Imply,
    "int" => Keyword::Int,
    "mainmenu" => Keyword::Mainmenu,
    "menu" => Keyword::Menu,
    "menuconfig" => Keyword::Menuconfig,
    "modules" => Keyword::Modules,
    "on" => Keyword::On,
    "option" => Keyword::Option,
    "optional" => Keyword::Optional,
    "prompt" => Keyword::Prompt,
    "range" => Keyword::Range,
    "rsource" => Keyword::Rsource,
    "select" => Keyword::Select,
    "source" => Keyword::Source,
    "string" => Keyword::String,
    "tristate" => Keyword::Tristate,
    "visible" => Keyword::Visible,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Token {
    Key(Keyword),
    /// An identifier-like word that is not a keyword. Depending on context
    /// this is a symbol reference, an unquoted string (prompt text, menu
    /// title), or a numeric literal.
    Name(String),
    /// A quoted string, with escapes resolved.
    Literal(String),
    And,
    Or,
    Not,
    Equal,
    Unequal,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    OpenParen,
    CloseParen,
}

impl Token {
    pub fn as_keyword(&self) -> Option<Keyword> {
        match self {
            Token::Key(kw) => Some(*kw),
            _ => None,
        }
    }

    /// The textual payload of `Name`/`Literal` tokens.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Token::Name(s) | Token::Literal(s) => Some(s),
            _ => None,
        }
    }
}

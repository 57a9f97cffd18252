use pretty_assertions::assert_eq;

use crate::kconfig::Kconfig;
use crate::menu::MenuItem;
use crate::types::{SymbolType, Tristate};

/// Parses `content` as a standalone Kconfig file.
fn parse(content: &str) -> Kconfig {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("Kconfig");
    std::fs::write(&path, content).unwrap();
    let kc = Kconfig::load(&path).unwrap();
    kc.disable_stderr_warnings();
    kc
}


#[test]
fn empty_file_gives_empty_instance() {
    let kc = parse("");
    assert_eq!(kc.defined_syms().len(), 0);
    assert_eq!(kc.node(kc.top_node()).list(), None);
    assert_eq!(kc.mainmenu_text(), "Linux Kernel Configuration");
}

#[test]
fn minimal_bool() {
    let kc = parse("config FOO\n\tbool \"foo\"\n\tdefault y\n");

    let foo = kc.lookup("FOO").unwrap();
    let sym = kc.symbol(foo);
    assert_eq!(sym.raw_type(), SymbolType::Bool);
    assert_eq!(sym.defaults().len(), 1);
    assert_eq!(sym.nodes().len(), 1);
    assert!(kc.defined_syms().contains(&foo));
}

#[test]
fn mainmenu_sets_top_prompt() {
    let kc = parse("mainmenu \"My Project Configuration\"\n\nconfig A\n\tbool\n");
    assert_eq!(kc.mainmenu_text(), "My Project Configuration");
}

#[test]
fn prompt_collects_dependencies() {
    let kc = parse(
        "config DEP\n\
         \tbool \"dep\"\n\
         config FOO\n\
         \tbool \"foo\"\n\
         \tdepends on DEP\n",
    );

    let foo = kc.lookup("FOO").unwrap();
    let node = kc.symbol(foo).nodes()[0];
    let (text, cond) = kc.node(node).prompt().unwrap();
    assert_eq!(text, "foo");
    // The 'depends on' is folded into the prompt condition
    assert_eq!(kc.expr_str(cond), "DEP");
    assert_eq!(kc.expr_str(kc.symbol(foo).direct_dep()), "DEP");
}

#[test]
fn if_blocks_are_collapsed() {
    let kc = parse(
        "config A\n\
         \tbool \"a\"\n\
         if A\n\
         config B\n\
         \tbool \"b\"\n\
         endif\n\
         config C\n\
         \tbool \"c\"\n",
    );

    // B ends up as a child of A (it depends on A through the if), C as A's
    // sibling; the if node itself is gone.
    let a_node = kc.symbol(kc.lookup("A").unwrap()).nodes()[0];
    let b_node = kc.symbol(kc.lookup("B").unwrap()).nodes()[0];
    let c_node = kc.symbol(kc.lookup("C").unwrap()).nodes()[0];

    assert_eq!(kc.node(a_node).list(), Some(b_node));
    assert_eq!(kc.node(b_node).parent(), Some(a_node));
    assert_eq!(kc.node(a_node).next(), Some(c_node));

    let b = kc.lookup("B").unwrap();
    assert_eq!(kc.expr_str(kc.symbol(b).direct_dep()), "A");
}

#[test]
fn implicit_submenu_from_depends_on() {
    let kc = parse(
        "config A\n\
         \tbool \"a\"\n\
         config B\n\
         \tbool \"b\"\n\
         \tdepends on A\n\
         config C\n\
         \tbool \"c\"\n",
    );

    let a_node = kc.symbol(kc.lookup("A").unwrap()).nodes()[0];
    let b_node = kc.symbol(kc.lookup("B").unwrap()).nodes()[0];
    let c_node = kc.symbol(kc.lookup("C").unwrap()).nodes()[0];

    assert_eq!(kc.node(a_node).list(), Some(b_node), "B should nest under A");
    assert_eq!(kc.node(b_node).parent(), Some(a_node));
    assert_eq!(kc.node(b_node).next(), None);
    assert_eq!(kc.node(a_node).next(), Some(c_node), "C stays at the outer level");
}

#[test]
fn menu_nesting_and_visible_if() {
    let kc = parse(
        "config GATE\n\
         \tbool \"gate\"\n\
         menu \"Features\"\n\
         \tvisible if GATE\n\
         config FOO\n\
         \tbool \"foo\"\n\
         endmenu\n",
    );

    let top_first = kc.node(kc.top_node()).list().unwrap();
    let menu_node = kc.node(top_first).next().unwrap();
    assert_eq!(kc.node(menu_node).item(), Some(MenuItem::Menu));
    assert_eq!(kc.node(menu_node).prompt().unwrap().0, "Features");
    assert_eq!(kc.expr_str(kc.node(menu_node).visibility()), "GATE");

    // 'visible if' propagates into the member's prompt condition
    let foo = kc.lookup("FOO").unwrap();
    let foo_node = kc.symbol(foo).nodes()[0];
    assert_eq!(kc.node(foo_node).parent(), Some(menu_node));
    let (_, cond) = kc.node(foo_node).prompt().unwrap();
    assert_eq!(kc.expr_str(cond), "GATE");
}

#[test]
fn help_text() {
    let kc = parse(
        "config FOO\n\
         \tbool \"foo\"\n\
         \thelp\n\
         \t  First line.\n\
         \n\
         \t  Indented more:\n\
         \t    nested\n\
         config BAR\n\
         \tbool \"bar\"\n",
    );

    let node = kc.symbol(kc.lookup("FOO").unwrap()).nodes()[0];
    assert_eq!(
        kc.node(node).help(),
        Some("First line.\n\nIndented more:\n  nested\n")
    );
    // The line that ended the help block is still parsed
    assert!(kc.lookup("BAR").is_some());
}

#[test]
fn choice_membership_and_type_inheritance() {
    let kc = parse(
        "choice\n\
         \tprompt \"pick one\"\n\
         \tbool\n\
         config X\n\
         \tprompt \"x\"\n\
         config Y\n\
         \tprompt \"y\"\n\
         endchoice\n",
    );

    let x = kc.lookup("X").unwrap();
    let y = kc.lookup("Y").unwrap();
    let choice = kc.symbol(x).choice().expect("X should be a choice member");

    assert_eq!(kc.choice(choice).syms(), &[x, y]);
    assert_eq!(kc.symbol(y).choice(), Some(choice));
    // Untyped members inherit the choice type
    assert_eq!(kc.symbol(x).raw_type(), SymbolType::Bool);
    assert_eq!(kc.symbol(y).raw_type(), SymbolType::Bool);
}

#[test]
fn choice_type_from_first_typed_member() {
    let kc = parse(
        "choice\n\
         \tprompt \"pick\"\n\
         config X\n\
         \ttristate \"x\"\n\
         config Y\n\
         \tprompt \"y\"\n\
         endchoice\n",
    );

    let x = kc.lookup("X").unwrap();
    let choice = kc.symbol(x).choice().unwrap();
    assert_eq!(kc.choice(choice).raw_type(), SymbolType::Tristate);
    assert_eq!(kc.symbol(kc.lookup("Y").unwrap()).raw_type(), SymbolType::Tristate);
}

#[test]
fn multiple_definitions_merge() {
    let kc = parse(
        "config FOO\n\
         \tbool \"foo\"\n\
         \tdefault y\n\
         config FOO\n\
         \tdefault n if BAR\n\
         config BAR\n\
         \tbool \"bar\"\n",
    );

    let foo = kc.lookup("FOO").unwrap();
    assert_eq!(kc.symbol(foo).nodes().len(), 2);
    assert_eq!(kc.symbol(foo).defaults().len(), 2);
    // defined_syms has one entry per definition
    assert_eq!(
        kc.defined_syms().iter().filter(|&&s| s == foo).count(),
        2
    );
}

#[test]
fn conflicting_type_redeclaration_warns_and_keeps_first() {
    let kc = parse(
        "config FOO\n\
         \tbool \"foo\"\n\
         config FOO\n\
         \tint \"foo again\"\n",
    );

    let foo = kc.lookup("FOO").unwrap();
    assert_eq!(kc.symbol(foo).raw_type(), SymbolType::Bool);
    assert!(
        kc.warnings().iter().any(|w| w.contains("multiple types")),
        "expected a type-conflict warning, got: {:?}",
        *kc.warnings()
    );
}

#[test]
fn select_and_imply_accumulate_reverse_deps() {
    let kc = parse(
        "config A\n\
         \tbool \"a\"\n\
         config B\n\
         \tbool \"b\"\n\
         \tselect A\n\
         config C\n\
         \tbool \"c\"\n\
         \tselect A if B\n\
         \timply A\n",
    );

    let a = kc.symbol(kc.lookup("A").unwrap());
    assert_eq!(kc.expr_str(a.rev_dep()), "B || C && B");
    assert_eq!(kc.expr_str(a.weak_rev_dep()), "C");
}

#[test]
fn ranges_parse_as_symbols() {
    let kc = parse(
        "config N\n\
         \tint \"n\"\n\
         \trange 1 10\n\
         \trange 2 20 if FOO\n\
         config FOO\n\
         \tbool \"foo\"\n",
    );

    let n = kc.lookup("N").unwrap();
    assert_eq!(kc.symbol(n).ranges().len(), 2);
    let (low, high, _) = kc.symbol(n).ranges()[0];
    assert_eq!(kc.symbol(low).name(), "1");
    assert_eq!(kc.symbol(high).name(), "10");
}

#[test]
fn option_env_binds_default() {
    std::env::set_var("KCONFIG_PARSER_TEST_ARCH", "x86");
    let kc = parse(
        "config ARCH\n\
         \tstring\n\
         \toption env=\"KCONFIG_PARSER_TEST_ARCH\"\n",
    );

    let arch = kc.lookup("ARCH").unwrap();
    assert_eq!(kc.symbol(arch).env_var(), Some("KCONFIG_PARSER_TEST_ARCH"));
    assert_eq!(kc.sym_str_value(arch), "x86");
}

#[test]
fn option_defconfig_list_and_allnoconfig_y() {
    let kc = parse(
        "config DEFCONFIG_LIST\n\
         \tstring\n\
         \toption defconfig_list\n\
         \tdefault \"configs/defconfig\"\n\
         config TINY\n\
         \tbool \"tiny\"\n\
         \toption allnoconfig_y\n",
    );

    assert_eq!(kc.defconfig_list_sym(), kc.lookup("DEFCONFIG_LIST"));
    assert!(kc.symbol(kc.lookup("TINY").unwrap()).is_allnoconfig_y());
}

#[test]
fn source_and_rsource() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir(dir.path().join("sub")).unwrap();
    std::fs::write(
        dir.path().join("Kconfig"),
        format!(
            "config TOP\n\tbool \"top\"\nsource \"{}\"\n",
            dir.path().join("sub/Kconfig.sub").display()
        ),
    )
    .unwrap();
    std::fs::write(
        dir.path().join("sub/Kconfig.sub"),
        "config SUB\n\tbool \"sub\"\nrsource \"Kconfig.rel\"\n",
    )
    .unwrap();
    std::fs::write(
        dir.path().join("sub/Kconfig.rel"),
        "config REL\n\tbool \"rel\"\n",
    )
    .unwrap();

    let kc = Kconfig::load(dir.path().join("Kconfig")).unwrap();
    assert!(kc.lookup("TOP").is_some());
    assert!(kc.lookup("SUB").is_some());
    assert!(kc.lookup("REL").is_some());

    // Sourced symbols keep their own file locations
    let rel_node = kc.symbol(kc.lookup("REL").unwrap()).nodes()[0];
    assert!(kc.node(rel_node).filename().ends_with("Kconfig.rel"));
}

#[test]
fn gsource_globs_in_sorted_order_and_tolerates_no_matches() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("Kconfig"),
        "gsource \"Kconfig.*.frag\"\ngsource \"missing.*.frag\"\n",
    )
    .unwrap();
    std::fs::write(dir.path().join("Kconfig.b.frag"), "config B\n\tbool \"b\"\n").unwrap();
    std::fs::write(dir.path().join("Kconfig.a.frag"), "config A\n\tbool \"a\"\n").unwrap();

    let kc = Kconfig::load(dir.path().join("Kconfig")).unwrap();
    // Sorted: A (from Kconfig.a.frag) is defined before B
    let defined: Vec<&str> = kc
        .defined_syms()
        .iter()
        .map(|&s| kc.symbol(s).name())
        .collect();
    assert_eq!(defined, vec!["A", "B"]);
}

#[test]
fn missing_source_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("Kconfig"),
        "source \"does/not/exist\"\n",
    )
    .unwrap();
    assert!(Kconfig::load(dir.path().join("Kconfig")).is_err());
}

#[test]
fn mismatched_end_tokens_are_errors() {
    let dir = tempfile::tempdir().unwrap();
    for bad in [
        "menu \"m\"\nendif\n",
        "if FOO\nendmenu\n",
        "choice\nendmenu\n",
        "config FOO\n\tbool \"foo\"\nendchoice\n",
    ] {
        let path = dir.path().join("Kconfig");
        std::fs::write(&path, bad).unwrap();
        assert!(Kconfig::load(&path).is_err(), "should reject: {:?}", bad);
    }
}

#[test]
fn unterminated_block_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("Kconfig");
    std::fs::write(&path, "menu \"m\"\nconfig FOO\n\tbool \"foo\"\n").unwrap();
    assert!(Kconfig::load(&path).is_err());
}

#[test]
fn continuation_lines_join() {
    let kc = parse(
        "config FOO\n\
         \tbool \"foo\"\n\
         \tdepends on \\\n\
         BAR\n\
         config BAR\n\
         \tbool \"bar\"\n",
    );

    let foo = kc.lookup("FOO").unwrap();
    assert_eq!(kc.expr_str(kc.symbol(foo).direct_dep()), "BAR");
}

#[test]
fn expression_parsing_precedence() {
    let kc = parse(
        "config A\n\tbool \"a\"\nconfig B\n\tbool \"b\"\nconfig C\n\tbool \"c\"\n\
         config X\n\
         \tbool \"x\"\n\
         \tdepends on A || B && !C\n",
    );

    let x = kc.lookup("X").unwrap();
    // && binds tighter than ||
    assert_eq!(kc.expr_str(kc.symbol(x).direct_dep()), "A || B && !C");
}

#[test]
fn parenthesized_expressions_round_trip() {
    let kc = parse(
        "config A\n\tbool \"a\"\nconfig B\n\tbool \"b\"\nconfig C\n\tbool \"c\"\n\
         config X\n\
         \tbool \"x\"\n\
         \tdepends on (A || B) && C\n",
    );

    let x = kc.lookup("X").unwrap();
    assert_eq!(kc.expr_str(kc.symbol(x).direct_dep()), "(A || B) && C");
}

#[test]
fn symbol_printer_reparses() {
    let original = parse(
        "config FOO\n\
         \tint \"foo count\"\n\
         \tdefault 4 if BAR\n\
         \trange 1 8\n\
         \thelp\n\
         \t  A counter.\n\
         config BAR\n\
         \tbool \"bar\"\n",
    );

    let foo = original.lookup("FOO").unwrap();
    let printed = original.sym_kconfig_str(foo);

    let reparsed = parse(&format!("{}config BAR\n\tbool \"bar\"\n", printed));
    let foo2 = reparsed.lookup("FOO").unwrap();
    assert_eq!(reparsed.symbol(foo2).raw_type(), SymbolType::Int);
    assert_eq!(reparsed.symbol(foo2).defaults().len(), 1);
    assert_eq!(reparsed.symbol(foo2).ranges().len(), 1);
    assert_eq!(
        reparsed.node(reparsed.symbol(foo2).nodes()[0]).help(),
        Some("A counter.\n")
    );
}

#[test]
fn eval_string_matches_configuration() {
    let mut kc = parse(
        "config A\n\
         \tbool \"a\"\n\
         \tdefault y\n\
         config B\n\
         \tbool \"b\"\n",
    );

    assert_eq!(kc.eval_string("A").unwrap(), Tristate::Yes);
    assert_eq!(kc.eval_string("A && B").unwrap(), Tristate::No);
    assert_eq!(kc.eval_string("A || B").unwrap(), Tristate::Yes);
    assert_eq!(kc.eval_string("!A").unwrap(), Tristate::No);

    // Unknown references warn and evaluate to n without getting registered
    assert_eq!(kc.eval_string("NO_SUCH_SYM").unwrap(), Tristate::No);
    assert!(kc.lookup("NO_SUCH_SYM").is_none());
}

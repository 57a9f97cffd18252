//! Value-engine behavior: tristate evaluation, visibility, selects and
//! implies, choices, ranges, and the invalidation cascade.

use kconfig::{Kconfig, Tristate};
use pretty_assertions::assert_eq;

fn parse(content: &str) -> Kconfig {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("Kconfig");
    std::fs::write(&path, content).unwrap();
    let kc = Kconfig::load(&path).unwrap();
    kc.disable_stderr_warnings();
    kc
}

#[test]
fn minimal_bool_defaults_to_y() {
    let kc = parse("config FOO\n\tbool \"foo\"\n\tdefault y\n");
    let foo = kc.lookup("FOO").unwrap();
    assert_eq!(kc.sym_tri_value(foo), Tristate::Yes);
    assert_eq!(kc.sym_str_value(foo), "y");
}

#[test]
fn select_forces_value_above_visibility() {
    let kc = parse(
        "config A\n\
         \tbool \"a\"\n\
         config B\n\
         \tbool\n\
         \tselect A if B\n\
         \tdefault y\n",
    );

    let a = kc.lookup("A").unwrap();
    // No user input anywhere: B defaults to y and drags A up with it
    assert_eq!(kc.sym_tri_value(a), Tristate::Yes);
    // A cannot be disabled while B selects it
    assert_eq!(kc.sym_assignable(a), &[Tristate::Yes]);
}

#[test]
fn selected_symbol_rejects_n() {
    let mut kc = parse(
        "config A\n\
         \tbool \"a\"\n\
         config B\n\
         \tbool\n\
         \tselect A\n\
         \tdefault y\n",
    );

    let a = kc.lookup("A").unwrap();
    assert!(!kc.set_value(a, "n"));
    assert_eq!(kc.sym_tri_value(a), Tristate::Yes);
}

#[test]
fn tristate_choice_modes() {
    let mut kc = parse(
        "config MODULES\n\
         \tbool \"modules\"\n\
         \tdefault y\n\
         \toption modules\n\
         choice\n\
         \ttristate \"c\"\n\
         config X\n\
         \ttristate \"x\"\n\
         config Y\n\
         \ttristate \"y\"\n\
         endchoice\n",
    );

    let x = kc.lookup("X").unwrap();
    let y = kc.lookup("Y").unwrap();
    let choice = kc.symbol(x).choice().unwrap();

    // With modules enabled the choice can sit in m or y mode
    assert_eq!(kc.choice_assignable(choice), &[Tristate::Mod, Tristate::Yes]);

    assert!(kc.set_choice_value(choice, Tristate::Mod));
    assert_eq!(kc.choice_value(choice), Tristate::Mod);

    assert!(kc.set_value(x, "m"));
    assert_eq!(kc.sym_tri_value(x), Tristate::Mod);
    assert_eq!(kc.sym_tri_value(y), Tristate::No);

    // Assigning y to a member flips the choice into y mode and selects it
    assert!(kc.set_value(x, "y"));
    assert_eq!(kc.choice_value(choice), Tristate::Yes);
    assert_eq!(kc.choice_selection(choice), Some(x));
    assert_eq!(kc.sym_tri_value(x), Tristate::Yes);
    assert_eq!(kc.sym_tri_value(y), Tristate::No);
}

#[test]
fn comparison_in_default_condition() {
    let kc = parse(
        "config N\n\
         \tint\n\
         \tdefault 5\n\
         config M\n\
         \tbool\n\
         \tdefault y if N > 3\n",
    );

    let m = kc.lookup("M").unwrap();
    assert_eq!(kc.sym_tri_value(m), Tristate::Yes);
}

#[test]
fn hex_comparison() {
    let kc = parse(
        "config H\n\
         \thex\n\
         \tdefault 0x10\n\
         config M\n\
         \tbool\n\
         \tdefault y if H = 16\n\
         config L\n\
         \tbool\n\
         \tdefault y if H < 0xff\n",
    );

    // 0x10 == 16 numerically
    assert_eq!(kc.sym_tri_value(kc.lookup("M").unwrap()), Tristate::Yes);
    assert_eq!(kc.sym_tri_value(kc.lookup("L").unwrap()), Tristate::Yes);
}

#[test]
fn string_comparison_is_lexicographic() {
    let kc = parse(
        "config S\n\
         \tstring\n\
         \tdefault \"abc\"\n\
         config M\n\
         \tbool\n\
         \tdefault y if S = \"abc\"\n\
         config L\n\
         \tbool\n\
         \tdefault y if S < \"abd\"\n",
    );

    assert_eq!(kc.sym_tri_value(kc.lookup("M").unwrap()), Tristate::Yes);
    assert_eq!(kc.sym_tri_value(kc.lookup("L").unwrap()), Tristate::Yes);
}

#[test]
fn non_empty_string_symbol_counts_as_y_in_expressions() {
    let kc = parse(
        "config S\n\
         \tstring\n\
         \tdefault \"something\"\n\
         config E\n\
         \tstring\n\
         config DEP_S\n\
         \tbool\n\
         \tdefault y if S\n\
         config DEP_E\n\
         \tbool\n\
         \tdefault y if E\n",
    );

    assert_eq!(kc.sym_tri_value(kc.lookup("DEP_S").unwrap()), Tristate::Yes);
    assert_eq!(kc.sym_tri_value(kc.lookup("DEP_E").unwrap()), Tristate::No);
}

#[test]
fn undefined_symbols_evaluate_to_n() {
    let kc = parse(
        "config FOO\n\
         \tbool\n\
         \tdefault y if NEVER_DEFINED\n",
    );

    assert_eq!(kc.sym_tri_value(kc.lookup("FOO").unwrap()), Tristate::No);
    // The reference materialized a placeholder symbol
    assert!(kc.lookup("NEVER_DEFINED").is_some());
    assert_eq!(kc.check_undefined(), 1);
}

#[test]
fn not_inverts_bool_values() {
    let mut kc = parse(
        "config A\n\
         \tbool \"a\"\n\
         \tdefault y\n\
         config B\n\
         \tbool \"b\"\n",
    );

    assert_eq!(kc.eval_string("!A").unwrap(), Tristate::No);
    assert_eq!(kc.eval_string("!B").unwrap(), Tristate::Yes);
    assert_eq!(kc.eval_string("!(A && B)").unwrap(), Tristate::Yes);
}

#[test]
fn imply_promotes_but_user_n_wins() {
    let mut kc = parse(
        "config A\n\
         \tbool \"a\"\n\
         config B\n\
         \tbool \"b\"\n\
         \tdefault y\n\
         \timply A\n",
    );

    let a = kc.lookup("A").unwrap();
    // The imply acts like a weak default
    assert_eq!(kc.sym_tri_value(a), Tristate::Yes);
    // but unlike a select it can be turned off
    assert!(kc.sym_assignable(a).contains(&Tristate::No));
    assert!(kc.set_value(a, "n"));
    assert_eq!(kc.sym_tri_value(a), Tristate::No);
}

#[test]
fn imply_needs_direct_deps() {
    let kc = parse(
        "config GATE\n\
         \tbool \"gate\"\n\
         config A\n\
         \tbool \"a\"\n\
         \tdepends on GATE\n\
         config B\n\
         \tbool \"b\"\n\
         \tdefault y\n\
         \timply A\n",
    );

    // A's direct dependencies are unmet, so the imply has no effect
    let a = kc.lookup("A").unwrap();
    assert_eq!(kc.sym_tri_value(a), Tristate::No);
}

#[test]
fn visibility_clamps_user_value() {
    let mut kc = parse(
        "config MODULES\n\
         \tbool \"modules\"\n\
         \tdefault y\n\
         \toption modules\n\
         config GATE\n\
         \ttristate \"gate\"\n\
         \tdefault m\n\
         config FOO\n\
         \ttristate \"foo\"\n\
         \tdepends on GATE\n",
    );

    let foo = kc.lookup("FOO").unwrap();
    assert_eq!(kc.sym_visibility(foo), Tristate::Mod);
    // Only m is achievable while the gate is m
    assert_eq!(kc.sym_assignable(foo), &[Tristate::Mod]);
    assert!(!kc.set_value(foo, "y"));
    assert!(kc.set_value(foo, "m"));
    assert_eq!(kc.sym_tri_value(foo), Tristate::Mod);
}

#[test]
fn bool_symbol_clamps_m_to_y() {
    let mut kc = parse("config FOO\n\tbool \"foo\"\n");
    let foo = kc.lookup("FOO").unwrap();

    assert!(kc.set_value(foo, "m"));
    assert_eq!(kc.sym_tri_value(foo), Tristate::Yes);
    assert!(kc
        .warnings()
        .iter()
        .any(|w| w.contains("promoted to y")));
}

#[test]
fn invalid_values_are_rejected() {
    let mut kc = parse(
        "config FOO\n\
         \tbool \"foo\"\n\
         config N\n\
         \tint \"n\"\n",
    );

    let foo = kc.lookup("FOO").unwrap();
    let n = kc.lookup("N").unwrap();

    assert!(!kc.set_value(foo, "maybe"));
    assert_eq!(kc.symbol(foo).user_value(), None);
    assert!(!kc.set_value(n, "not a number"));
    assert_eq!(kc.symbol(n).user_value(), None);
}

#[test]
fn int_default_clamps_to_range() {
    let kc = parse(
        "config N\n\
         \tint \"n\"\n\
         \trange 10 20\n\
         \tdefault 5\n",
    );

    let n = kc.lookup("N").unwrap();
    assert_eq!(kc.sym_str_value(n), "10");
    assert!(kc
        .warnings()
        .iter()
        .any(|w| w.contains("outside its active range")));
}

#[test]
fn hex_default_clamps_with_prefix() {
    let kc = parse(
        "config H\n\
         \thex \"h\"\n\
         \trange 0x10 0xff\n\
         \tdefault 0x200\n",
    );

    let h = kc.lookup("H").unwrap();
    assert_eq!(kc.sym_str_value(h), "0xff");
}

#[test]
fn out_of_range_user_value_is_ignored_with_warning() {
    let mut kc = parse(
        "config N\n\
         \tint \"n\"\n\
         \trange 10 20\n\
         \tdefault 15\n",
    );

    let n = kc.lookup("N").unwrap();
    assert!(kc.set_value(n, "25"));
    assert!(kc
        .warnings()
        .iter()
        .any(|w| w.contains("outside its active range")));
    // Evaluation falls back on the default
    assert_eq!(kc.sym_str_value(n), "15");
}

#[test]
fn range_low_end_stands_in_for_missing_default() {
    let kc = parse(
        "config N\n\
         \tint \"n\"\n\
         \trange 3 9\n",
    );

    assert_eq!(kc.sym_str_value(kc.lookup("N").unwrap()), "3");
}

#[test]
fn choice_selection_snaps_back_to_user_choice() {
    let mut kc = parse(
        "choice\n\
         \tbool \"pick\"\n\
         config X\n\
         \tbool \"x\"\n\
         config Y\n\
         \tbool \"y\"\n\
         endchoice\n",
    );

    let x = kc.lookup("X").unwrap();
    let y = kc.lookup("Y").unwrap();
    let choice = kc.symbol(x).choice().unwrap();

    // Bool choices rest in y mode with the first visible member selected
    assert_eq!(kc.choice_value(choice), Tristate::Yes);
    assert_eq!(kc.choice_selection(choice), Some(x));
    assert_eq!(kc.sym_tri_value(x), Tristate::Yes);
    assert_eq!(kc.sym_tri_value(y), Tristate::No);

    assert!(kc.set_value(y, "y"));
    assert_eq!(kc.choice_selection(choice), Some(y));
    assert_eq!(kc.sym_tri_value(x), Tristate::No);
    assert_eq!(kc.sym_tri_value(y), Tristate::Yes);
}

#[test]
fn choice_defaults_pick_the_selection() {
    let kc = parse(
        "choice\n\
         \tbool \"pick\"\n\
         \tdefault Y\n\
         config X\n\
         \tbool \"x\"\n\
         config Y\n\
         \tbool \"y\"\n\
         endchoice\n",
    );

    let y = kc.lookup("Y").unwrap();
    let choice = kc.symbol(y).choice().unwrap();
    assert_eq!(kc.choice_default_selection(choice), Some(y));
    assert_eq!(kc.sym_tri_value(y), Tristate::Yes);
}

#[test]
fn optional_choice_can_rest_at_n() {
    let mut kc = parse(
        "choice\n\
         \tbool \"pick\"\n\
         \toptional\n\
         config X\n\
         \tbool \"x\"\n\
         endchoice\n",
    );

    let x = kc.lookup("X").unwrap();
    let choice = kc.symbol(x).choice().unwrap();

    assert_eq!(kc.choice_value(choice), Tristate::No);
    assert_eq!(kc.sym_tri_value(x), Tristate::No);
    assert_eq!(kc.choice_assignable(choice), &[Tristate::No, Tristate::Yes]);

    assert!(kc.set_choice_value(choice, Tristate::Yes));
    assert_eq!(kc.sym_tri_value(x), Tristate::Yes);
}

#[test]
fn writes_cascade_through_dependencies() {
    let mut kc = parse(
        "config B\n\
         \tbool \"b\"\n\
         config A\n\
         \tbool\n\
         \tdefault y if B\n\
         config DEEP\n\
         \tbool\n\
         \tdefault y if A\n",
    );

    let a = kc.lookup("A").unwrap();
    let b = kc.lookup("B").unwrap();
    let deep = kc.lookup("DEEP").unwrap();

    // Prime the caches
    assert_eq!(kc.sym_tri_value(a), Tristate::No);
    assert_eq!(kc.sym_tri_value(deep), Tristate::No);

    assert!(kc.set_value(b, "y"));
    assert_eq!(kc.sym_tri_value(a), Tristate::Yes);
    assert_eq!(kc.sym_tri_value(deep), Tristate::Yes);

    kc.unset_value(b);
    assert_eq!(kc.sym_tri_value(a), Tristate::No);
    assert_eq!(kc.sym_tri_value(deep), Tristate::No);
}

#[test]
fn cached_values_match_fresh_evaluation() {
    let content = "config MODULES\n\
                   \tbool \"modules\"\n\
                   \tdefault y\n\
                   \toption modules\n\
                   config A\n\
                   \ttristate \"a\"\n\
                   config B\n\
                   \ttristate \"b\"\n\
                   \tdepends on A\n\
                   config C\n\
                   \tbool \"c\"\n\
                   \tdefault y if B = m\n\
                   config D\n\
                   \ttristate \"d\"\n\
                   \tdefault m\n\
                   \tdepends on A\n";

    let mut live = parse(content);
    let writes: &[(&str, &str)] = &[("A", "m"), ("B", "m"), ("A", "y"), ("B", "m")];

    for &(name, val) in writes {
        let sym = live.lookup(name).unwrap();
        live.set_value(sym, val);
        // Interleave reads so the caches are hot in odd states
        for probe in ["A", "B", "C", "D"] {
            let _ = live.sym_tri_value(live.lookup(probe).unwrap());
        }
    }

    // A fresh instance fed the same writes must agree everywhere
    let mut fresh = parse(content);
    for &(name, val) in writes {
        let sym = fresh.lookup(name).unwrap();
        fresh.set_value(sym, val);
    }

    for name in ["MODULES", "A", "B", "C", "D"] {
        let l = live.lookup(name).unwrap();
        let f = fresh.lookup(name).unwrap();
        assert_eq!(
            live.sym_str_value(l),
            fresh.sym_str_value(f),
            "cache incoherence on {}",
            name
        );
    }
}

#[test]
fn modules_toggle_invalidates_everything() {
    let mut kc = parse(
        "config MODULES\n\
         \tbool \"modules\"\n\
         \tdefault y\n\
         \toption modules\n\
         config T\n\
         \ttristate \"t\"\n\
         \tdefault m\n",
    );

    let t = kc.lookup("T").unwrap();
    let modules = kc.modules_sym();

    assert_eq!(kc.sym_tri_value(t), Tristate::Mod);

    // Without modules, tristates collapse to bool and m promotes to y
    assert!(kc.set_value(modules, "n"));
    assert_eq!(kc.sym_tri_value(t), Tristate::Yes);
}

#[test]
fn rev_dep_never_exceeds_value() {
    let mut kc = parse(
        "config A\n\
         \tbool \"a\"\n\
         config B\n\
         \tbool \"b\"\n\
         \tselect A\n\
         config C\n\
         \tbool \"c\"\n\
         \tselect A if B\n",
    );

    let a = kc.lookup("A").unwrap();
    for (b_val, c_val) in [("n", "n"), ("n", "y"), ("y", "n"), ("y", "y")] {
        let b = kc.lookup("B").unwrap();
        let c = kc.lookup("C").unwrap();
        kc.set_value(b, b_val);
        kc.set_value(c, c_val);
        let rev = kc.expr_value(kc.symbol(a).rev_dep());
        assert!(
            rev <= kc.sym_tri_value(a),
            "rev_dep {} above value {} for B={} C={}",
            rev,
            kc.sym_tri_value(a),
            b_val,
            c_val
        );
    }
}

#[test]
fn unset_values_resets_everything() {
    let mut kc = parse(
        "config A\n\
         \tbool \"a\"\n\
         \tdefault y\n\
         config B\n\
         \tbool \"b\"\n",
    );

    let a = kc.lookup("A").unwrap();
    let b = kc.lookup("B").unwrap();

    kc.set_value(a, "n");
    kc.set_value(b, "y");
    assert_eq!(kc.sym_tri_value(a), Tristate::No);
    assert_eq!(kc.sym_tri_value(b), Tristate::Yes);

    kc.unset_values();
    assert_eq!(kc.symbol(a).user_value(), None);
    assert_eq!(kc.symbol(b).user_value(), None);
    assert_eq!(kc.sym_tri_value(a), Tristate::Yes);
    assert_eq!(kc.sym_tri_value(b), Tristate::No);
}

// Behavioural laws that hold across generator types.
//
// Everything here goes through the public factory, the way a caller would:
// build from text, produce, reset, render, rebuild. Per-type arithmetic is
// covered by the unit tests next to each generator; these tests check the
// contracts that tie the types together.

use paramgen::factory::registry;
use paramgen::quantize::Quantizer;
use paramgen::sieve::Sieve;
use paramgen::{Context, DescribeMode, Factory, GeneratorConfig, PmtrError, Value};

/// Build `text` with `seed` and produce `n` values from step 0.
fn run(text: &str, seed: u64, n: usize) -> Vec<Value> {
    let mut factory = Factory::new(seed);
    let mut pmtr = factory.build(text).unwrap();
    let ctx = Context::new();
    (0..n as i64).map(|t| pmtr.produce(t, &ctx)).collect()
}

fn nums(text: &str, seed: u64, n: usize) -> Vec<f64> {
    run(text, seed, n)
        .iter()
        .map(|v| v.as_f64().unwrap_or_else(|| panic!("non-numeric value {v} from {text}")))
        .collect()
}

const SAMPLES: &[&str] = &[
    "ru, 0, (bg, oc, (1, 2, 3))",
    "a, 1, (bg, rc, (1, -2, 3.5))",
    "m, r, (c, 0.2), (c, 0.8), (ru, -1, 2)",
    "sah, gte, (ru, 0, 1), (ru, 0, 1), (c, 0.5)",
    "sl, 3@1|4@2, -20, 20, bin, rp",
    "vs, 5@0|7@3, 60, 0, 10, oo",
    "sf, 3|4, 24, 0, 1, (ru, 0, 1)",
    "lp, -30, 12, wid, rw",
    "fs, 3, 12, -1, 1, ocr",
    "lm, 0.3, chaos, 0, 100",
    "hb, 0.2, 0.1, 1.4, 0.3, 300, yx, 0, 1, rnr",
    "cv, f{t}k{3}x{31}y{40}, (ru, 0, 2000), 0.01, ac, 0, 1, rc",
    "q, (c, 0.1), (bg, oc, (0.25, 0.5)), 2, (ru, 0.5, 1), (ru, -3, 3)",
    "mv, a{1}b{2}c{3}:{a=1|b=1|c=1}a:{b=3|c=1}, (ru, 0, 1)",
    "ig, (ru, 0, 1), (bg, rc, (-2, 1, 3))",
    "iw, ((ru, 0, 1), (c, 7)), (bg, oc, (2, -1, 3)), rp",
    "ih, (ru, 0, 1), (bg, rc, (3, 5)), (bg, oc, (4, 9)), rnr",
    "is, (ru, 0, 1), 6, 5, (ru, 0, 1)",
    "ic, (ru, 0, 1), (c, 10), (ru, 0, 1)",
    "bf, rc, (ru, 0, 1), 5",
    "bfs, (ru, -1, 1), 4, (ru, 0, 1)",
    "ms, (ru, 0, 1), 6, (c, 2), (ru, 4, 5), rp",
    "mr, w, (c, 0.3), (c, 0.6), (ru, 0, 1)",
    "fb, m, (ru, 0.4, 0.6), -1, 1, (ru, 0, 1)",
    "cg, du, -1, 1, 0.3",
    "mga, (bg, rc, (1, 2, 3)), 12, 2, (bg, oc, (0, 1, 2))",
];

#[test]
fn rendering_rebuilds_an_equivalent_generator() {
    for text in SAMPLES {
        let mut factory = Factory::new(4);
        let first = factory.build(text).unwrap();
        let rendered = first.describe_full();
        let mut factory = Factory::new(4);
        let second = factory.build(&rendered).unwrap();
        assert_eq!(second.describe_full(), rendered, "rendering of {text} is not stable");
        assert_eq!(
            run(text, 4, 60),
            run(&rendered, 4, 60),
            "{text} and its rendering {rendered} disagree"
        );
    }
}

#[test]
fn args_only_rendering_drops_the_type_name() {
    let mut factory = Factory::new(0);
    let pmtr = factory.build("ru, 0, 1").unwrap();
    assert_eq!(pmtr.describe(DescribeMode::ArgsOnly), "(constant, 0), (constant, 1)");
    assert_eq!(pmtr.describe(DescribeMode::Full), "randomUniform, (constant, 0), (constant, 1)");
}

#[test]
fn same_seed_same_output() {
    for text in SAMPLES {
        assert_eq!(run(text, 99, 80), run(text, 99, 80), "{text} is not deterministic");
    }
    assert_ne!(nums("ru, 0, 1", 1, 10), nums("ru, 0, 1", 2, 10));
}

#[test]
fn reset_replays_every_registered_type() {
    let ctx = Context::new();
    for entry in registry().entries() {
        let mut factory = Factory::new(13);
        let mut pmtr = factory.build(entry.name).unwrap();
        let first: Vec<Value> = (0..50).map(|t| pmtr.produce(t, &ctx)).collect();
        pmtr.reset();
        assert_eq!(pmtr.last(), None);
        let second: Vec<Value> = (0..50).map(|t| pmtr.produce(t, &ctx)).collect();
        assert_eq!(first, second, "{} did not replay after reset", entry.name);
    }
}

#[test]
fn default_arguments_pass_validation() {
    for entry in registry().entries() {
        let mut factory = Factory::new(0);
        let pmtr = factory.build(entry.name).unwrap();
        assert!(
            pmtr.check_args().is_ok(),
            "{} fails validation with its own defaults: {:?}",
            entry.name,
            pmtr.check_args()
        );
    }
}

#[test]
fn nesting_beyond_the_depth_ceiling_fails() {
    let nest = |levels: usize| {
        let mut text = "c, 2".to_string();
        for _ in 0..levels {
            text = format!("oo, ({text})");
        }
        text
    };
    let mut factory = Factory::new(0);
    assert!(factory.build(&nest(10)).is_ok());
    assert!(matches!(factory.build(&nest(80)), Err(PmtrError::TooDeep { .. })));

    let config = GeneratorConfig {
        max_depth: 4,
        ..GeneratorConfig::default()
    };
    let mut shallow = Factory::with_config(config, 0);
    assert!(matches!(shallow.build(&nest(10)), Err(PmtrError::TooDeep { .. })));
}

#[test]
fn unknown_types_and_bad_arity_fail_construction() {
    let mut factory = Factory::new(0);
    assert!(matches!(factory.build("wobble, 1"), Err(PmtrError::UnknownType { .. })));
    assert!(matches!(factory.build("ru, 0, 1, 2"), Err(PmtrError::ArgCount { .. })));
    assert!(matches!(factory.build("bg, rc, 3"), Err(PmtrError::ArgType { .. })));
}

#[test]
fn markov_zero_order_frequencies_follow_weights() {
    let out = nums("mv, a{1}b{2}:{a=1|b=3}", 8, 4000);
    let share = out.iter().filter(|v| **v == 1.0).count() as f64 / out.len() as f64;
    assert!((share - 0.25).abs() < 0.03, "share of a out of range: {share}");
}

#[test]
fn sieve_members_match_brute_force() {
    let cases: &[(&str, fn(i64) -> bool)] = &[
        ("3@1|4@2", |n| n.rem_euclid(3) == 1 || n.rem_euclid(4) == 2),
        ("6@0&4@0", |n| n.rem_euclid(12) == 0),
        ("-3@0&2@0", |n| n.rem_euclid(2) == 0 && n.rem_euclid(3) != 0),
        ("5@1^5@1|7@0", |n| n.rem_euclid(7) == 0),
    ];
    for (text, rule) in cases {
        let sieve = Sieve::parse(text).unwrap();
        let expected: Vec<i64> = (-40..=40).filter(|n| rule(*n)).collect();
        assert_eq!(sieve.members(-40, 40), expected, "{text}");
        let reparsed = Sieve::parse(&sieve.to_string()).unwrap();
        assert_eq!(reparsed.members(-40, 40), expected, "{text} after rendering");
    }
}

#[test]
fn sieve_list_cycles_its_segment() {
    let out = nums("sl, 3@0, 0, 10, int, oc", 0, 8);
    assert_eq!(out, vec![0.0, 3.0, 6.0, 9.0, 0.0, 3.0, 6.0, 9.0]);
}

#[test]
fn quantizer_laws() {
    let q = Quantizer::new(999);
    let grid = [0.5];
    for i in -40..40 {
        let v = i as f64 * 0.137;
        assert_eq!(q.attract(v, 0.0, 0.25, &grid), v, "pull 0 moved {v}");
        let snapped = q.attract(v, 1.0, 0.25, &grid);
        assert_eq!(((snapped - 0.25) * 2.0).fract(), 0.0, "{v} snapped off grid to {snapped}");
        assert!((snapped - v).abs() <= 0.25 + 1e-12, "{v} snapped too far to {snapped}");
        let half = q.attract(v, 0.5, 0.25, &grid);
        assert!((half - (v + snapped) / 2.0).abs() < 1e-12, "half pull of {v} gave {half}");
    }
}

#[test]
fn automaton_rows_have_the_extraction_width() {
    let out = nums("cl, f{s}x{9}y{4}w{5}, 30, 0, fr, oc", 0, 40);
    assert_eq!(out[..20], out[20..], "flat extraction should hold 4 rows of 5 cells");
    assert!(out.iter().all(|v| *v == 0.0 || *v == 1.0));
}

#[test]
fn all_zero_automaton_reductions() {
    let spec = "f{s}i{0}x{8}y{5}";
    assert!(nums(&format!("cl, {spec}, 0, 0, sr"), 0, 5).iter().all(|v| *v == 0.0));
    assert!(nums(&format!("cl, {spec}, 0, 0, ar"), 0, 5).iter().all(|v| *v == 0.0));
    // A row with no non-zero cells multiplies to the empty product.
    assert!(nums(&format!("cl, {spec}, 0, 0, pr"), 0, 5).iter().all(|v| *v == 1.0));
}

#[test]
fn permutation_selection_uses_each_value_once_per_cycle() {
    let out = nums("bg, rp, (1, 2, 3, 4, 5)", 6, 50);
    for chunk in out.chunks(5) {
        let mut sorted = chunk.to_vec();
        sorted.sort_by(f64::total_cmp);
        assert_eq!(sorted, vec![1.0, 2.0, 3.0, 4.0, 5.0]);
    }
}

#[test]
fn non_repeat_selection_never_repeats() {
    let out = nums("bg, rnr, (1, 2, 3)", 3, 200);
    assert!(out.windows(2).all(|w| w[0] != w[1]));
}

#[test]
fn chaotic_baskets_stay_in_range() {
    for text in ["hb", "lb", "hb, 0.63135448, 0.18940634, 1.4, 0.3, 5000, xy, -1, 1, rc"] {
        let out = nums(text, 0, 2000);
        let (lo, hi) = if text == "hb" || text == "lb" { (0.0, 1.0) } else { (-1.0, 1.0) };
        assert!(
            out.iter().all(|v| v.is_finite() && (lo..=hi).contains(v)),
            "{text} left [{lo}, {hi}]"
        );
    }
}

#[test]
fn string_values_flow_through_baskets() {
    let out = run("bg, oc, (c4, 2, d#3)", 0, 3);
    assert_eq!(out, vec![Value::Str("c4".into()), Value::Num(2.0), Value::Str("d#3".into())]);
}

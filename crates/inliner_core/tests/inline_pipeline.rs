use inliner_core::{
    ArgMap, ConstEnv, InlineError, InlineOutcome, MAX_RESOLVE_DEPTH, SourceFile, bind_and_inline,
    collect_visible_constants, is_deep_literal, literal_fold, literal_inline_comprehension,
    parse_expression, parse_source, render_expr, resolve, simplify,
};

fn inline_at(file: &SourceFile, marker: &str) -> Result<InlineOutcome, InlineError> {
    let offset = file.source().find(marker).unwrap();
    let site = file.call_at(offset)?;
    let definition = file
        .find_function(site.callee_name()?)
        .ok_or_else(|| InlineError::not_found("callee"))?;
    let env = collect_visible_constants(file, offset);
    bind_and_inline(&site, &definition, file, file, &env)
}

fn inline_text(source: &str, marker: &str) -> String {
    let file = parse_source("main.ts", source).unwrap();
    inline_at(&file, marker).unwrap().text
}

#[test]
fn named_arguments_keep_their_form() {
    let source = r#"
const addTwo = (a: number) => a + 2;
const three = 3;
console.log(addTwo(three));
console.log(addTwo(3));
"#;
    insta::assert_snapshot!(inline_text(source, "addTwo(three)"), @"three + 2");
    insta::assert_snapshot!(inline_text(source, "addTwo(3)"), @"5");
}

#[test]
fn if_chain_reduces_on_caller_constant() {
    let source = r#"
const fn = (flag: boolean) => { if (flag) return 1; else return 2 };
const OFF = false;
const chosen = fn(OFF);
"#;
    insta::assert_snapshot!(inline_text(source, "fn(OFF)"), @"2");
}

#[test]
fn switch_reduces_on_caller_constant() {
    let source = r#"
const label = (n: number) => {
  switch (n) {
    case 1: return "one";
    case 2: return "two";
    default: return "other";
  }
};
const TWO = 2;
const text = label(TWO);
"#;
    insta::assert_snapshot!(inline_text(source, "label(TWO)"), @r#""two""#);
}

#[test]
fn destructured_parameters_become_accesses() {
    let source = r#"
const sum = ({ a, b }: Pair) => a + b;
const first = ([x, y]: [number, number]) => x + y;
function use(pair: Pair, tup: [number, number]) {
  return [sum(pair), first(tup)];
}
"#;
    insta::assert_snapshot!(inline_text(source, "sum(pair)"), @"pair.a + pair.b");
    insta::assert_snapshot!(inline_text(source, "first(tup)"), @"tup[0] + tup[1]");
}

#[test]
fn async_callees_need_an_awaited_async_site() {
    let source = r#"
async function fetchName(id: number) { return lookup(id); }
function plain() { return fetchName(1); }
async function ok() { const name = await fetchName(2); return name; }
"#;
    let file = parse_source("main.ts", source).unwrap();
    let err = inline_at(&file, "fetchName(1)").unwrap_err();
    assert!(matches!(err, InlineError::NotAwaited(_)));
    insta::assert_snapshot!(err.to_string(), @"`fetchName` is async; the call must be awaited inside an async function");
    insta::assert_snapshot!(inline_at(&file, "fetchName(2)").unwrap().text, @"lookup(2)");
}

#[test]
fn replacement_is_parenthesized_for_its_position() {
    let source = r#"
const half = (n: number) => n / 2;
const pick = (on: boolean) => on ? left : right;
const total = half(width) + 3;
const chosen = pick(flag).name;
"#;
    insta::assert_snapshot!(inline_text(source, "half(width)"), @"width / 2");
    insta::assert_snapshot!(inline_text(source, "pick(flag)"), @"(flag ? left : right)");
}

#[test]
fn map_and_from_entries_collapse_to_literals() {
    let source = r#"
const myArray = [1, 2, 3];
const doubled = myArray.map(x => x * 2);
const table = Object.fromEntries([["a", 1], ["b", 2]]);
"#;
    let file = parse_source("main.ts", source).unwrap();
    let collapse = |marker: &str| {
        let offset = source.find(marker).unwrap();
        let site = file.comprehension_at(offset).unwrap();
        let env = collect_visible_constants(&file, offset);
        render_expr(&literal_inline_comprehension(&site.expr, &env).unwrap())
    };
    insta::assert_snapshot!(collapse("myArray.map"), @"[2, 4, 6]");
    insta::assert_snapshot!(collapse("Object.fromEntries"), @"{ a: 1, b: 2 }");
}

#[test]
fn literal_fold_on_its_own() {
    let source = r#"
const WIDTH = 4;
const SIZES = { small: WIDTH, large: WIDTH * 4 };
const area = SIZES.large * WIDTH;
const greeting = `size ${SIZES.small}px`;
"#;
    let file = parse_source("main.ts", source).unwrap();
    let fold = |marker: &str| {
        let offset = source.find(marker).unwrap();
        let site = file.expr_at(offset).unwrap();
        let env = collect_visible_constants(&file, offset);
        render_expr(&literal_fold(&site.expr, &env).unwrap())
    };
    insta::assert_snapshot!(fold("SIZES.large *"), @"64");
    insta::assert_snapshot!(fold("`size"), @r#""size 4px""#);
}

#[test]
fn folding_deep_literals_is_idempotent() {
    let inputs = ["42", "-7", "'text'", "[1, [true, 'x']]", "{ a: 1, b: { c: [2] } }"];
    for text in inputs {
        let expr = parse_expression(text).unwrap();
        assert!(is_deep_literal(&expr), "{text}");
        let once = simplify(&expr, &ArgMap::default(), &ConstEnv::new()).unwrap();
        let twice = simplify(&once, &ArgMap::default(), &ConstEnv::new()).unwrap();
        assert_eq!(render_expr(&once), render_expr(&twice));
    }
}

#[test]
fn resolution_terminates_on_cycles_and_long_chains() {
    let mut env = ConstEnv::new();
    env.insert("A", parse_expression("B").unwrap());
    env.insert("B", parse_expression("[A]").unwrap());
    assert!(resolve(&parse_expression("A").unwrap(), &env).is_none());

    let mut chain = ConstEnv::new();
    chain.insert("C0", parse_expression("0").unwrap());
    for depth in 1..=MAX_RESOLVE_DEPTH * 2 {
        chain.insert(format!("C{depth}"), parse_expression(&format!("C{}", depth - 1)).unwrap());
    }
    let last = parse_expression(&format!("C{}", MAX_RESOLVE_DEPTH * 2)).unwrap();
    assert!(resolve(&last, &chain).is_none());
}

#[test]
fn failures_carry_stable_codes() {
    let source = r#"
const twice = (n: number) => n * 2;
const value = twice(...args);
"#;
    let file = parse_source("main.ts", source).unwrap();
    let err = inline_at(&file, "twice(...args)").unwrap_err();
    assert_eq!(err.code(), "I1001");
}

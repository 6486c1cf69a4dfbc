//! Operator and algebra tables - parameterized over the documented cases

use rstest::rstest;
use repatch::{pattern, version, Record, Rule};
use std::cmp::Ordering;

#[rstest]
#[case("1.2.3", "x.x", "1.3.0")]
#[case("1", "x", "2")]
#[case("1.0.0", "x", "2")]
#[case("1", "x.x", "1.1")]
#[case("1.0.0", "x.x", "1.1.0")]
#[case("2.7.15", "x.x.x", "2.7.16")]
#[case("0.9", "x.x", "0.10")]
fn upper_bound_table(#[case] version: &str, #[case] pin: &str, #[case] expected: &str) {
    assert_eq!(version::upper_bound(version, pin).unwrap(), expected);
}

#[rstest]
#[case("1.2", "1.2.0", Ordering::Equal)]
#[case("1.9", "1.10", Ordering::Less)]
#[case("1.0a", "1.0", Ordering::Less)]
#[case("1.0rc1", "1.0rc2", Ordering::Less)]
#[case("2", "1.99", Ordering::Greater)]
fn version_compare_table(#[case] a: &str, #[case] b: &str, #[case] expected: Ordering) {
    assert_eq!(version::compare(a, b).unwrap(), expected);
}

#[rstest]
#[case("numpy?( *)", "numpy", true)]
#[case("numpy?( *)", "numpy >=1", true)]
#[case("numpy?( *)", "numpy-blah", false)]
#[case("numpy?( *)", "numpyextra", false)]
#[case("*openssl*", "lib mkl openssl 1.0", true)]
#[case("py?hon", "python", true)]
#[case("python 3.[67]*", "python 3.7.2", true)]
fn glob_table(#[case] pattern: &str, #[case] candidate: &str, #[case] expected: bool) {
    assert_eq!(pattern::matches(pattern, candidate).unwrap(), expected);
}

fn apply_to(depends: &[&str], op_yaml: &str) -> Vec<String> {
    let mut record = Record {
        name: "pkg".to_string(),
        version: "1.0".to_string(),
        depends: Some(depends.iter().map(|s| s.to_string()).collect()),
        ..Default::default()
    };
    let rule = Rule::from_yaml(&format!("if: {{}}\nthen:\n  - {}", op_yaml)).unwrap();
    repatch::mutate::apply(&rule, &mut record, "linux-64").unwrap();
    record.depends.unwrap_or_default()
}

#[rstest]
// open lower bound gains an upper
#[case("numpy >=1.11", "numpy >=1.11,<1.12a0")]
// existing upper only ever moves down
#[case("numpy >=1.0.0,<2.0.0a0", "numpy >=1.0.0,<1.1.0a0")]
#[case("numpy >=1.0.0,<1.0.5a0", "numpy >=1.0.0,<1.0.5a0")]
// alpha-marked lower keeps its marker, the bound comes from the version
#[case("numpy >=1.11.0a", "numpy >=1.11.0a,<1.12.0a0")]
// unrecognized shapes stay put
#[case("numpy ==1.11", "numpy ==1.11")]
#[case("numpy 1.11 py36_0", "numpy 1.11 py36_0")]
#[case("numpy", "numpy")]
fn tighten_table(#[case] input: &str, #[case] expected: &str) {
    let got = apply_to(&[input], "tighten_depends: {name: numpy, max_pin: x.x}");
    assert_eq!(got, vec![expected.to_string()]);
}

#[rstest]
// existing upper only ever moves up
#[case("numpy >=1.0,<1.5a0", "numpy >=1.0,<2.0a0")]
#[case("numpy >=1.0,<3.0a0", "numpy >=1.0,<3.0a0")]
// nothing to loosen without an upper bound
#[case("numpy >=1.0", "numpy >=1.0")]
#[case("numpy", "numpy")]
fn loosen_table(#[case] input: &str, #[case] expected: &str) {
    let got = apply_to(&[input], "loosen_depends: {name: numpy, upper_bound: '2.0'}");
    assert_eq!(got, vec![expected.to_string()]);
}

#[rstest]
// a bare exact pin with build is the only recognized form
#[case("numpy 1.9.3 py36_0", "numpy >=1.9.3,<1.10.0a0")]
// everything else keeps its information
#[case("numpy", "numpy")]
#[case("numpy 1.9.3", "numpy 1.9.3")]
#[case("numpy >=1.9 py36_0", "numpy >=1.9 py36_0")]
fn relax_table(#[case] input: &str, #[case] expected: &str) {
    let got = apply_to(&[input], "relax_exact_depends: {name: numpy, max_pin: x.x}");
    assert_eq!(got, vec![expected.to_string()]);
}

#[test]
fn rename_only_touches_the_name_token() {
    let got = apply_to(
        &["qt 5.6.2 vc14_1", "pyqt >=5.6"],
        "rename_depends: {old: qt, new: qt5}",
    );
    assert_eq!(got, vec!["qt5 5.6.2 vc14_1", "pyqt >=5.6"]);
}

#[test]
fn replace_swaps_whole_entries() {
    let got = apply_to(
        &["vc 14*", "zlib"],
        "replace_depends: {old: 'vc?( *)', new: 'vs2015_runtime'}",
    );
    assert_eq!(got, vec!["vs2015_runtime", "zlib"]);
}

#[test]
fn remove_by_glob_and_prune() {
    let got = apply_to(
        &["mkl 2018.0.3 1", "mkl-service >=1.1"],
        "remove_depends: ['mkl?( *)', 'mkl-service?( *)']",
    );
    assert!(got.is_empty());
}

//! End-to-end runs of both passes over small PHP projects

use std::fs;
use std::path::Path;

use phpverify_analyze::config::{Config, CONFIG_FILE_NAME};
use phpverify_analyze::issue::{IssueCollection, Severity};
use phpverify_analyze::output::{format_issues, OutputFormat};
use phpverify_analyze::solver::resolve;
use phpverify_analyze::Analyzer;

fn messages(issues: &IssueCollection) -> Vec<String> {
    issues
        .issues()
        .iter()
        .map(|i| format!("{}:{} {}", i.filename, i.line, i.message))
        .collect()
}

fn return_type(analyzer: &Analyzer, function: &str) -> String {
    let info = analyzer.index().get_function(function).unwrap();
    resolve(analyzer.index(), "", &info.typ).to_string()
}

#[test]
fn test_return_type_through_call() {
    let analyzer = Analyzer::with_defaults();
    analyzer
        .analyze_sources(&[(
            "funcs.php",
            "<?php\nfunction a(): int { return 1; }\nfunction b() { return a(); }\n",
        )])
        .unwrap();

    assert_eq!(return_type(&analyzer, "\\b"), "int");
}

#[test]
fn test_mutual_recursion_resolves_to_nothing() {
    let analyzer = Analyzer::with_defaults();
    analyzer
        .analyze_sources(&[
            ("p.php", "<?php\nfunction p() { return q(); }\n"),
            ("q.php", "<?php\nfunction q() { return p(); }\n"),
        ])
        .unwrap();

    assert_eq!(return_type(&analyzer, "\\p"), "");
    assert_eq!(return_type(&analyzer, "\\q"), "");
}

#[test]
fn test_late_static_binding_across_files() {
    let analyzer = Analyzer::with_defaults();
    analyzer
        .analyze_sources(&[
            (
                "base.php",
                "<?php\nabstract class Base { abstract public static function create(): static; }\n",
            ),
            ("derived.php", "<?php\nabstract class Derived extends Base {}\n"),
            ("use.php", "<?php\nfunction make() { return Derived::create(); }\n"),
        ])
        .unwrap();

    assert_eq!(return_type(&analyzer, "\\make"), "\\Derived");
}

#[test]
fn test_namespaced_call_falls_back_to_global() {
    let analyzer = Analyzer::with_defaults();
    analyzer
        .analyze_sources(&[(
            "ns.php",
            "<?php\nnamespace App;\nfunction size($s) { return strlen($s); }\n",
        )])
        .unwrap();

    assert_eq!(return_type(&analyzer, "\\App\\size"), "int");
}

#[test]
fn test_exiting_function_makes_caller_code_dead() {
    let analyzer = Analyzer::with_defaults();
    let issues = analyzer
        .analyze_sources(&[
            (
                "main.php",
                "<?php\nfunction run() {\n    stop();\n    echo 'unreachable';\n}\n",
            ),
            ("stop.php", "<?php\nfunction stop() { exit(1); }\n"),
        ])
        .unwrap();

    assert_eq!(messages(&issues), vec!["main.php:4 Unreachable code"]);
}

#[test]
fn test_function_with_normal_path_does_not_exit() {
    let analyzer = Analyzer::with_defaults();
    let issues = analyzer
        .analyze_sources(&[(
            "main.php",
            "<?php\nfunction maybe($c) { if ($c) { exit(1); } }\nfunction run($c) { maybe($c); echo 'fine'; }\n",
        )])
        .unwrap();

    assert!(issues.is_empty(), "{:?}", messages(&issues));
}

#[test]
fn test_pseudo_main_globals() {
    let analyzer = Analyzer::with_defaults();
    let issues = analyzer
        .analyze_sources(&[(
            "config.php",
            "<?php\n$settings = ['debug' => true];\nfunction debug() { global $settings; return $settings; }\n",
        )])
        .unwrap();

    assert!(issues.is_empty(), "{:?}", messages(&issues));
    assert!(analyzer.index().get_global_var("$settings").is_some());
}

#[test]
fn test_issues_sorted_by_file_and_line() {
    let analyzer = Analyzer::with_defaults();
    let issues = analyzer
        .analyze_sources(&[
            ("b.php", "<?php\nfunction g() {\n    echo $missing;\n}\n"),
            ("a.php", "<?php\nfunction f() {\n    $unused = 1;\n    return;\n    echo 1;\n}\n"),
        ])
        .unwrap();

    assert_eq!(
        messages(&issues),
        vec![
            "a.php:3 Variable $unused is unused (use $_ to ignore this inspection)",
            "a.php:5 Unreachable code",
            "b.php:3 Undefined variable: $missing",
        ]
    );
    assert_eq!(issues.error_count(), 1);
    assert_eq!(issues.count(Severity::Warning), 2);
}

#[test]
fn test_analyze_directory_with_config() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    fs::create_dir_all(root.join("src")).unwrap();
    fs::create_dir_all(root.join("vendor")).unwrap();
    fs::create_dir_all(root.join("legacy")).unwrap();
    fs::write(
        root.join(CONFIG_FILE_NAME),
        "[paths]\nexclude = [\"vendor/\"]\n\n[analysis]\nunused_var_regex = \"^_\"\nallow_disable = \"legacy\"\nthreads = 2\n",
    )
    .unwrap();
    fs::write(
        root.join("src/app.php"),
        "<?php\nfunction app() {\n    $_tmp = 1;\n    return helper();\n}\n",
    )
    .unwrap();
    fs::write(
        root.join("src/helper.php"),
        "<?php\nfunction helper() { return $undefined; }\n",
    )
    .unwrap();
    fs::write(root.join("vendor/lib.php"), "<?php\necho $nope;\n").unwrap();
    fs::write(
        root.join("legacy/old.php"),
        "<?php\n// @linter disable\nfunction old() { echo $nope; }\n",
    )
    .unwrap();

    let (config, _) = Config::load_from(root).unwrap().unwrap();
    let analyzer = Analyzer::new(config).unwrap();
    let issues = analyzer.analyze_paths(&[root]).unwrap();

    assert_eq!(issues.len(), 1, "{:?}", messages(&issues));
    let issue = &issues.issues()[0];
    assert!(issue.filename.ends_with("helper.php"));
    assert_eq!(issue.message, "Undefined variable: $undefined");
    assert!(analyzer.index().get_function("\\old").is_some());
}

#[test]
fn test_missing_path_is_error() {
    let analyzer = Analyzer::with_defaults();
    assert!(analyzer
        .analyze_paths(&[Path::new("/nonexistent/phpverify/src")])
        .is_err());
}

#[test]
fn test_text_output_reads_source() {
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("a.php");
    fs::write(&file, "<?php\nfunction f() {\n    echo $x;\n}\n").unwrap();

    let analyzer = Analyzer::with_defaults();
    let issues = analyzer.analyze_paths(&[file.as_path()]).unwrap();
    let output = format_issues(&issues, OutputFormat::Text);

    let lines: Vec<&str> = output.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("ERROR   undefined: Undefined variable: $x at "));
    assert!(lines[0].ends_with("a.php:3"));
    assert_eq!(lines[1], "        echo $x;");
    assert_eq!(lines[2], "             ^^");
}

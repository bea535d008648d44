//! Property-based tests for the `.properties` parser.

use std::collections::HashMap;

use dgen_driver::params::properties::{output_file_key, parse_properties};

/// Arbitrary key/value maps survive a render-then-parse cycle, even with
/// comment and blank lines mixed in.
#[test]
fn test_rendered_pairs_are_recovered_property() {
    let mut runner = proptest::test_runner::TestRunner::default();

    let pairs = proptest::collection::hash_map(
        "[a-z][a-z0-9.-]{0,15}",
        "[a-zA-Z0-9 /_.-]{0,20}",
        0..16,
    );

    runner
        .run(&pairs, |pairs: HashMap<String, String>| {
            let mut contents = String::from("# generated fixture\n\n");
            for (key, value) in &pairs {
                contents.push_str(&format!("{key}={value}\n"));
            }
            contents.push_str("! trailing comment\n");

            let parsed = parse_properties(&contents);
            assert_eq!(parsed.len(), pairs.len());
            for (key, value) in &pairs {
                assert_eq!(parsed.get(key).map(String::as_str), Some(value.trim()));
            }
            Ok(())
        })
        .unwrap();
}

/// Whitespace around either side of the separator never changes the result.
#[test]
fn test_separator_whitespace_is_insignificant_property() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(
            &("[a-z][a-z0-9.-]{0,15}", "[a-zA-Z0-9/_.-]{1,20}", 0usize..4, 0usize..4),
            |(key, value, pad_left, pad_right)| {
                let line = format!(
                    "{key}{}={}{value}\n",
                    " ".repeat(pad_left),
                    " ".repeat(pad_right)
                );
                let parsed = parse_properties(&line);
                assert_eq!(parsed.get(&key), Some(&value));
                Ok(())
            },
        )
        .unwrap();
}

/// Output file keys for distinct stages never collide.
#[test]
fn test_output_file_keys_are_stage_unique_property() {
    let mut runner = proptest::test_runner::TestRunner::default();

    runner
        .run(&("[a-z]{1,12}", "[a-z]{1,12}"), |(a, b)| {
            let key_a = output_file_key(&a);
            let key_b = output_file_key(&b);
            assert_eq!(a == b, key_a == key_b);
            assert!(key_a.starts_with("generator."));
            assert!(key_a.ends_with(".output-file"));
            Ok(())
        })
        .unwrap();
}

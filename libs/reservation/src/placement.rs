//! Parsing of the `exec_host` placement string.
//!
//! The job subsystem records placement as `host/slot+host/slot+...`, one token
//! per task slot. A host with several slots shows up in consecutive tokens:
//!
//! ```text
//! nid00012/0+nid00012/1+nid00013/0
//! ```
//!
//! A reservation only cares about hosts, so consecutive repeats collapse to a
//! single entry. Repeats that are not adjacent are kept.

/// Extracts the ordered host list from a placement string.
///
/// Each `+`-separated token is truncated at its first `/`. A host is skipped
/// when it is identical to the host of the token just before it. Empty hosts
/// (from `++`, a leading `/` or an empty input) are dropped without affecting
/// the comparison. Never fails: malformed input yields a shorter list.
pub fn parse_exec_host(exec_host: &str) -> Vec<&str> {
    let mut hosts = Vec::new();
    let mut prev: Option<&str> = None;

    for token in exec_host.split('+') {
        let host = token.split_once('/').map_or(token, |(host, _slot)| host);
        if host.is_empty() {
            continue;
        }

        if prev != Some(host) {
            hosts.push(host);
        }
        prev = Some(host);
    }

    hosts
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case::collapses_slots("nodeA/0+nodeA/1+nodeB/0", &["nodeA", "nodeB"])]
    #[case::keeps_non_adjacent("nodeA/0+nodeB/0+nodeA/0", &["nodeA", "nodeB", "nodeA"])]
    #[case::no_slot_suffix("nodeA+nodeB", &["nodeA", "nodeB"])]
    #[case::single_host("nid00042/7", &["nid00042"])]
    #[case::many_slots("n1/0+n1/1+n1/2+n1/3", &["n1"])]
    #[case::slot_range_suffix("n1/0-3+n2/0-3", &["n1", "n2"])]
    #[case::empty("", &[])]
    #[case::only_separators("+++", &[])]
    #[case::trailing_separator("n1/0+n2/0+", &["n1", "n2"])]
    #[case::missing_host("/0+n1/0", &["n1"])]
    #[case::double_separator("n1/0++n1/1", &["n1"])]
    fn test_parse_exec_host(#[case] input: &str, #[case] expected: &[&str]) {
        assert_eq!(parse_exec_host(input), expected);
    }

    #[test]
    fn test_truncates_at_first_slash() {
        assert_eq!(parse_exec_host("n1/0/extra"), vec!["n1"]);
    }

    #[test]
    fn test_hosts_borrow_from_input() {
        let raw = String::from("alpha/0+beta/1");
        let hosts = parse_exec_host(&raw);
        assert!(std::ptr::eq(hosts[0].as_ptr(), raw.as_ptr()));
    }

    fn distinct_adjacent_hosts() -> impl Strategy<Value = Vec<String>> {
        prop::collection::vec("[a-z][a-z0-9]{0,7}", 1..24).prop_map(|mut hosts| {
            hosts.dedup();
            hosts
        })
    }

    proptest! {
        #[test]
        fn prop_distinct_adjacent_tokens_preserved(
            hosts in distinct_adjacent_hosts(),
            slot in 0u32..64,
        ) {
            let raw = hosts
                .iter()
                .map(|h| format!("{h}/{slot}"))
                .collect::<Vec<_>>()
                .join("+");

            let parsed = parse_exec_host(&raw);
            prop_assert_eq!(parsed.len(), hosts.len());
            prop_assert!(parsed.iter().zip(&hosts).all(|(p, h)| *p == h.as_str()));
        }

        #[test]
        fn prop_no_adjacent_duplicates(raw in "[ab]{1,2}(/[0-9])?(\\+[ab]{1,2}(/[0-9])?){0,16}") {
            let parsed = parse_exec_host(&raw);
            prop_assert!(parsed.windows(2).all(|w| w[0] != w[1]));
        }
    }
}
